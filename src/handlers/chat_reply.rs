//! LLM replies to text and quoted messages.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, info, warn};

use crate::context::{ExecutionContext, Facts};
use crate::error::PipelineError;
use crate::llm::{self, ChatCompleter, ChatMessage, ChatRequest};
use crate::pipeline::Handler;
use crate::pipeline::types::{Action, Event, MessageKind};

pub const NAME: &str = "openai-bot-plugin";

/// Four-per-em space the client inserts after an @-mention.
const MENTION_SPACE: char = '\u{2005}';

pub struct ChatReplyHandler {
    chat: Arc<dyn ChatCompleter>,
    model: String,
    prompt: String,
    bot_nickname: String,
    timeout: Duration,
}

impl ChatReplyHandler {
    pub fn new(
        chat: Arc<dyn ChatCompleter>,
        model: String,
        prompt: String,
        bot_nickname: String,
        timeout: Duration,
    ) -> Self {
        Self {
            chat,
            model,
            prompt,
            bot_nickname,
            timeout,
        }
    }

    /// Substitute the prompt placeholders for `event`.
    fn system_prompt(&self, event: &Event, chat_history: &str, time_now: &str) -> String {
        let room = event.room.as_ref().map(|r| r.display_name.as_str());
        let contact = event.contact.as_ref().map(|c| c.display_name.as_str());
        self.prompt
            .replace("{{chat_history}}", chat_history)
            .replace("{{time_now}}", time_now)
            .replace("{{self_nickname}}", &self.bot_nickname)
            .replace("{{room_nickname}}", room.unwrap_or_default())
            .replace("{{contact_nickname}}", contact.unwrap_or_default())
    }

    /// What the user asked, with the @-mention of the bot removed.
    fn user_content(&self, event: &Event) -> String {
        if event.kind == MessageKind::Quote {
            return event.content.clone();
        }
        event
            .parsed_content
            .replace(&format!("@{}", self.bot_nickname), "")
            .replace(MENTION_SPACE, "")
            .trim()
            .to_string()
    }
}

/// Whether the event deserves a reply.
///
/// A relevance verdict from earlier in the run is authoritative. Without one,
/// private chats always get a reply and groups only when the bot is mentioned
/// or its own message is quoted.
pub fn should_reply(event: &Event, facts: &Facts) -> bool {
    if facts.bot_check {
        return !facts.not_for_bot;
    }
    if !event.is_chatroom {
        return true;
    }
    match event.kind {
        MessageKind::Text => event.is_at,
        MessageKind::Quote => event.quote.as_ref().is_some_and(|q| q.is_self),
        _ => false,
    }
}

/// Text the executor searches for to quote the triggering message.
fn quote_text(event: &Event) -> String {
    if event.kind == MessageKind::Quote {
        event.content.clone()
    } else {
        event.parsed_content.replace(MENTION_SPACE, " ").trim().to_string()
    }
}

#[async_trait]
impl Handler for ChatReplyHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Answers messages addressed to the bot with a chat completion"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        let event = ctx.event();
        if !event.is_conversational() {
            return Ok(());
        }
        if !should_reply(event, ctx.facts()) {
            debug!("Message not addressed to the bot, no reply");
            return Ok(());
        }

        let time_now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let chat_history = ctx.facts().chat_history.as_deref().unwrap_or_default();
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt(event, chat_history, &time_now)),
                ChatMessage::user(self.user_content(event)),
            ],
            user: event.conversation_id().unwrap_or_default().to_string(),
        };

        let answer = match llm::bounded("openai", self.timeout, self.chat.complete(request)).await
        {
            Ok(answer) if !answer.is_empty() => Some(answer),
            Ok(_) => {
                warn!("Chat completion returned an empty answer");
                None
            }
            Err(e) => {
                warn!(error = %e, "Chat completion failed");
                None
            }
        };

        if let Some(content) = answer {
            let action = Action::SendText {
                content,
                target: event.reply_target().unwrap_or_default().to_string(),
                is_chatroom: event.is_chatroom,
                quote_message: event.is_chatroom.then(|| quote_text(event)),
                at_user_name: None,
            };
            info!(conversation = event.conversation_id().unwrap_or("unknown"), "Replying");
            ctx.add_action(action);
        }
        ctx.request_stop();
        Ok(())
    }
}
