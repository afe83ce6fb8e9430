//! Relevance screening: asks a workflow whether a message is addressed to the bot.
//!
//! Fails closed. Any error, timeout, panic, or malformed answer marks the event
//! `not_for_bot`, and `bot_check` is set before the call so downstream handlers
//! know screening already happened. A panic is caught here rather than left to
//! the scheduler, whose rollback would erase both facts.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::{LlmError, PipelineError};
use crate::llm::{self, RelevanceVerdict, WorkflowClient, WorkflowRequest};
use crate::pipeline::Handler;
use crate::pipeline::classify::RelevanceOutcome;

pub const NAME: &str = "bot-check-plugin";

pub struct BotCheckHandler {
    workflow: Arc<dyn WorkflowClient>,
    /// The bot's display name.
    full_name: String,
    /// Extra name users call the bot by.
    nick_name: String,
    only_room: bool,
    timeout: Duration,
}

impl BotCheckHandler {
    pub fn new(
        workflow: Arc<dyn WorkflowClient>,
        full_name: String,
        nick_name: String,
        only_room: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            workflow,
            full_name,
            nick_name,
            only_room,
            timeout,
        }
    }
}

#[async_trait]
impl Handler for BotCheckHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Decides whether a message is addressed to the bot"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        let event = ctx.event();
        if !event.is_conversational() {
            return Ok(());
        }
        if self.only_room && !event.is_chatroom {
            debug!("Private chat, relevance screening limited to rooms");
            return Ok(());
        }

        let request = WorkflowRequest::new(event.conversation_id().unwrap_or_default())
            .input(
                "chat_history",
                ctx.facts().chat_history.clone().unwrap_or_default(),
            )
            .input("full_name", self.full_name.as_str())
            .input("nick_name", self.nick_name.as_str())
            .input("is_chatroom", if event.is_chatroom { 1 } else { 0 });

        ctx.facts_mut().bot_check = true;

        let call = llm::bounded("workflow", self.timeout, self.workflow.run(request));
        let verdict = AssertUnwindSafe(call)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(LlmError::RequestFailed {
                    provider: "workflow".into(),
                    reason: "workflow client panicked".into(),
                })
            })
            .and_then(|output| output.parse::<RelevanceVerdict>())
            .map(|v| v.is_for_bot);
        if let Err(e) = &verdict {
            warn!(error = %e, "Relevance check failed, treating as not for bot");
        }

        let outcome = RelevanceOutcome::from_verdict(verdict);
        info!(outcome = ?outcome, "Relevance screened");
        ctx.facts_mut().not_for_bot = !outcome.is_for_bot();
        Ok(())
    }
}
