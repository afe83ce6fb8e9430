//! Pats back whoever patted the bot.
//!
//! Two checks guard the reciprocal pat, cheapest first: the per-contact
//! cooldown in `PatGuard`, then a look at recent history to make sure the
//! contact actually spoke in this conversation and can be located to pat.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::PipelineError;
use crate::handlers::{action_target, store_handle};
use crate::pipeline::Handler;
use crate::pipeline::dedup::{PatGuard, has_recent_message_from};
use crate::pipeline::types::{Action, MessageKind};
use crate::store::{self, HistoryStore};

pub const NAME: &str = "pat-plugin";

/// Title suffix of a pat notification, as in `"Alice" 拍了拍我`.
const PAT_TITLE_SUFFIX: &str = " 拍了拍我";

pub struct PatHandler {
    guard: Arc<PatGuard>,
    history: Arc<dyn HistoryStore>,
    bot_account: String,
    history_limit: usize,
    default_store: Option<String>,
    timeout: Duration,
}

impl PatHandler {
    pub fn new(
        guard: Arc<PatGuard>,
        history: Arc<dyn HistoryStore>,
        bot_account: String,
        history_limit: usize,
        default_store: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            guard,
            history,
            bot_account,
            history_limit,
            default_store,
            timeout,
        }
    }

    pub fn guard(&self) -> &PatGuard {
        &self.guard
    }
}

/// Name of the patter from the notification title.
pub fn patter_name(title: &str) -> Option<String> {
    let name = title.replace(PAT_TITLE_SUFFIX, "");
    let name = name.trim().trim_matches('"').trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[async_trait]
impl Handler for PatHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Pats back contacts who pat the bot"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        let event = ctx.event();
        if event.kind != MessageKind::Pat {
            return Ok(());
        }
        if event.patted_username.as_deref() != Some(self.bot_account.as_str()) {
            debug!("Pat aimed at someone else, ignoring");
            return Ok(());
        }
        let Some(contact) = event.contact.as_ref() else {
            debug!("Pat without a contact, ignoring");
            return Ok(());
        };

        if self.guard.should_suppress(&contact.display_name, Instant::now()) {
            info!(contact = %contact.display_name, "Repeated pat inside cooldown, suppressing");
            ctx.request_stop();
            return Ok(());
        }

        let plausible = match (
            store_handle(event, self.default_store.as_deref()),
            event.conversation_id(),
        ) {
            (Some(handle), Some(conversation)) => {
                let lookup = self
                    .history
                    .recent_messages(handle, conversation, self.history_limit);
                match store::bounded(self.timeout, lookup).await {
                    Ok(records) => has_recent_message_from(&records, &contact.username),
                    Err(e) => {
                        warn!(error = %e, "History lookup for pat failed");
                        false
                    }
                }
            }
            _ => false,
        };

        if !plausible {
            warn!(
                contact = %contact.username,
                "No recent message from patter, nobody to pat back"
            );
            ctx.request_stop();
            return Ok(());
        }

        let action = Action::Pat {
            target: action_target(event),
            user_name: patter_name(&event.title).unwrap_or_else(|| contact.display_name.clone()),
            is_chatroom: event.is_chatroom,
        };
        info!(contact = %contact.display_name, "Patting back");
        ctx.add_action(action);
        ctx.request_stop();
        Ok(())
    }
}
