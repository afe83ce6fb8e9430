//! Loads recent conversation history for later handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::context::ExecutionContext;
use crate::error::PipelineError;
use crate::handlers::store_handle;
use crate::pipeline::Handler;
use crate::store::{self, HistoryRecord, HistoryStore};

pub const NAME: &str = "history-context-plugin";

pub struct HistoryContextHandler {
    store: Arc<dyn HistoryStore>,
    limit: usize,
    default_store: Option<String>,
    timeout: Duration,
}

impl HistoryContextHandler {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        limit: usize,
        default_store: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            limit,
            default_store,
            timeout,
        }
    }
}

/// Render records (most recent first) as `sender: content` lines, oldest first.
pub fn render_history(records: &[HistoryRecord]) -> String {
    records
        .iter()
        .rev()
        .map(|r| format!("{}: {}", r.sender, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Handler for HistoryContextHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Loads recent conversation history into the chat_history fact"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        let event = ctx.event();
        if !event.is_conversational() {
            return Ok(());
        }
        let (Some(handle), Some(conversation)) = (
            store_handle(event, self.default_store.as_deref()),
            event.conversation_id(),
        ) else {
            debug!("No history store or conversation for event, skipping");
            return Ok(());
        };

        let lookup = self.store.recent_messages(handle, conversation, self.limit);
        match store::bounded(self.timeout, lookup).await {
            Ok(records) => {
                debug!(count = records.len(), "Chat history loaded");
                ctx.facts_mut().chat_history = Some(render_history(&records));
            }
            Err(e) => warn!(error = %e, "Failed to load chat history"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::StubHistory;
    use crate::pipeline::types::{Event, MessageKind, Participant};

    fn handler(store: StubHistory) -> HistoryContextHandler {
        HistoryContextHandler::new(
            Arc::new(store),
            20,
            Some("/data/msg.db".into()),
            Duration::from_secs(1),
        )
    }

    fn group_text() -> Event {
        Event::new(MessageKind::Text, "在吗")
            .in_room(Participant::new("1@chatroom", "Rust 群"))
            .from_contact(Participant::new("wxid_alice", "Alice"))
    }

    #[tokio::test]
    async fn renders_oldest_first() {
        let handler = handler(StubHistory::with_senders(&["wxid_newest", "wxid_oldest"]));
        let mut ctx = ExecutionContext::new(group_text());
        handler.handle(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.facts().chat_history.as_deref(),
            Some("wxid_oldest: hello from wxid_oldest\nwxid_newest: hello from wxid_newest")
        );
    }

    #[tokio::test]
    async fn store_failure_leaves_fact_unset() {
        let handler = handler(StubHistory::broken());
        let mut ctx = ExecutionContext::new(group_text());
        handler.handle(&mut ctx).await.unwrap();
        assert!(ctx.facts().chat_history.is_none());
    }

    #[tokio::test]
    async fn ignores_non_conversational_events() {
        let handler = handler(StubHistory::with_senders(&["wxid_alice"]));
        let mut ctx = ExecutionContext::new(Event::new(MessageKind::Image, ""));
        handler.handle(&mut ctx).await.unwrap();
        assert!(ctx.facts().chat_history.is_none());
    }

    #[test]
    fn empty_history_renders_empty() {
        assert_eq!(render_history(&[]), "");
    }
}
