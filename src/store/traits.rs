//! `HistoryStore` trait — read access to the host's chat history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// One prior message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// Sender username (protocol id, not display name).
    pub sender: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Backend-agnostic chat history lookup.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// The latest `limit` messages of `conversation` in the store at `store`,
    /// most recent first.
    async fn recent_messages(
        &self,
        store: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, DatabaseError>;
}
