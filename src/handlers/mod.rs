//! Handler adapters registered with the scheduler.
//!
//! Each handler reads the event and earlier facts, calls out to at most one
//! collaborator, and declares actions. `build_handlers` wires them from config.

pub mod bot_check;
pub mod chat_reply;
pub mod history_context;
pub mod media;
pub mod pat;
pub mod welcome;

pub use bot_check::BotCheckHandler;
pub use chat_reply::ChatReplyHandler;
pub use history_context::HistoryContextHandler;
pub use media::{ImageHandler, VideoHandler};
pub use pat::PatHandler;
pub use welcome::WelcomeHandler;

use std::sync::Arc;
use std::time::Duration;

use crate::config::TriageConfig;
use crate::llm::{ChatCompleter, WorkflowClient};
use crate::media::MediaFetcher;
use crate::pipeline::HandlerDescriptor;
use crate::pipeline::classify::RoomGate;
use crate::pipeline::dedup::PatGuard;
use crate::pipeline::types::Event;
use crate::store::HistoryStore;

/// External collaborators the handlers call out to.
#[derive(Clone)]
pub struct Collaborators {
    /// Workflow app answering "is this addressed to the bot".
    pub relevance: Arc<dyn WorkflowClient>,
    /// Workflow app rendering welcome posters.
    pub poster: Arc<dyn WorkflowClient>,
    pub chat: Arc<dyn ChatCompleter>,
    pub history: Arc<dyn HistoryStore>,
    pub media: Arc<dyn MediaFetcher>,
}

/// Build every handler with its configured priority and enabled flag.
pub fn build_handlers(config: &TriageConfig, deps: Collaborators) -> Vec<HandlerDescriptor> {
    let timeout = config.call_timeout();
    let default_store = config.history_db.clone();

    let history_context = HistoryContextHandler::new(
        deps.history.clone(),
        config.history_context.limit,
        default_store.clone(),
        timeout,
    );

    let bot_check = BotCheckHandler::new(
        deps.relevance,
        config.bot.nickname.clone(),
        config.bot_check.nick_name.clone(),
        config.bot_check.only_room,
        timeout,
    );

    let guard = Arc::new(PatGuard::with_cooldown(Duration::from_secs(
        config.pat.cooldown_secs,
    )));
    let pat = PatHandler::new(
        guard,
        deps.history,
        config.bot.account.clone(),
        config.pat.history_limit,
        default_store,
        timeout,
    );

    let welcome = WelcomeHandler::new(
        deps.poster,
        deps.media,
        RoomGate {
            all_room_allowed: config.welcome.all_room_allowed,
            allowed_room_list: config.welcome.allowed_room_list.clone(),
        },
        config.welcome.require_invite_pair,
        timeout,
    );

    let chat_reply = ChatReplyHandler::new(
        deps.chat,
        config.chat_reply.openai_model.clone(),
        config.chat_reply.prompt.clone(),
        config.bot.nickname.clone(),
        timeout,
    );

    vec![
        HandlerDescriptor::new(
            Arc::new(history_context),
            config.history_context.priority,
            config.history_context.enabled,
        ),
        HandlerDescriptor::new(
            Arc::new(bot_check),
            config.bot_check.priority,
            config.bot_check.enabled,
        ),
        HandlerDescriptor::new(Arc::new(pat), config.pat.priority, config.pat.enabled),
        HandlerDescriptor::new(
            Arc::new(welcome),
            config.welcome.priority,
            config.welcome.enabled,
        ),
        HandlerDescriptor::new(
            Arc::new(chat_reply),
            config.chat_reply.priority,
            config.chat_reply.enabled,
        ),
        HandlerDescriptor::new(
            Arc::new(ImageHandler),
            config.image.priority,
            config.image.enabled,
        ),
        HandlerDescriptor::new(
            Arc::new(VideoHandler),
            config.video.priority,
            config.video.enabled,
        ),
    ]
}

/// History store handle for `event`, falling back to the configured default.
fn store_handle<'a>(event: &'a Event, fallback: Option<&'a str>) -> Option<&'a str> {
    event.message_db_path.as_deref().or(fallback)
}

/// Where the executor should perform an action for `event`.
fn action_target(event: &Event) -> String {
    if event.target.is_empty() {
        event.reply_target().unwrap_or_default().to_string()
    } else {
        event.target.clone()
    }
}
