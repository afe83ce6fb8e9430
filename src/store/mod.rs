//! Chat history access — the pat guard's and context loader's view of past messages.

pub mod libsql_backend;
pub mod traits;

pub use libsql_backend::LibSqlHistoryStore;
pub use traits::{HistoryRecord, HistoryStore};

use std::future::Future;
use std::time::Duration;

use crate::error::DatabaseError;

/// Await a history lookup for at most `timeout`.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> Result<T, DatabaseError>
where
    F: Future<Output = Result<T, DatabaseError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(DatabaseError::Timeout(timeout)))
}
