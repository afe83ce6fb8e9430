//! libSQL backend — async `HistoryStore` implementation.
//!
//! Each store handle is a database path (or `:memory:`). One connection per
//! handle is opened lazily and reused for every later lookup.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dashmap::DashMap;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::store::traits::{HistoryRecord, HistoryStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        talker TEXT NOT NULL,
        sender TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        create_time TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_messages_talker_time ON messages(talker, create_time);
"#;

/// libSQL history store keyed by store handle.
#[derive(Default)]
pub struct LibSqlHistoryStore {
    connections: DashMap<String, (Arc<LibSqlDatabase>, Connection)>,
}

impl LibSqlHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or open) the connection for `handle`.
    async fn connection(&self, handle: &str) -> Result<Connection, DatabaseError> {
        if let Some(entry) = self.connections.get(handle) {
            return Ok(entry.1.clone());
        }

        let db = libsql::Builder::new_local(handle)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| DatabaseError::Query(format!("init_schema: {e}")))?;
        info!(store = %handle, "History store opened");

        // A concurrent open for the same handle may have won; keep the first.
        let entry = self
            .connections
            .entry(handle.to_string())
            .or_insert((Arc::new(db), conn));
        Ok(entry.1.clone())
    }

    /// Append a message to the mirror of a conversation.
    pub async fn record(
        &self,
        store: &str,
        conversation: &str,
        sender: &str,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let conn = self.connection(store).await?;
        let created = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO messages (talker, sender, content, create_time) VALUES (?1, ?2, ?3, ?4)",
            params![conversation, sender, content, created],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record: {e}")))?;
        Ok(())
    }
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn row_to_record(row: &libsql::Row) -> Result<HistoryRecord, libsql::Error> {
    let created_str: String = row.get(2)?;
    Ok(HistoryRecord {
        sender: row.get(0)?,
        content: row.get(1)?,
        created_at: parse_datetime(&created_str),
    })
}

#[async_trait]
impl HistoryStore for LibSqlHistoryStore {
    async fn recent_messages(
        &self,
        store: &str,
        conversation: &str,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, DatabaseError> {
        let conn = self.connection(store).await?;
        let mut rows = conn
            .query(
                "SELECT sender, content, create_time FROM messages WHERE talker = ?1 \
                 ORDER BY create_time DESC, id DESC LIMIT ?2",
                params![conversation, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("recent_messages: {e}")))?;

        let mut records = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_record(&row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Skipping history row: {e}");
                }
            }
        }
        debug!(
            conversation = %conversation,
            count = records.len(),
            "Loaded recent history"
        );
        Ok(records)
    }
}
