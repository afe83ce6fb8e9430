//! Execution context — the mutable state of one pipeline run.

use crate::pipeline::types::{Action, Event};

/// Named facts handlers pass to later handlers in the same run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facts {
    /// Relevance screening already ran for this event.
    pub bot_check: bool,
    /// Screening concluded (or failed closed to) "not addressed to the bot".
    pub not_for_bot: bool,
    /// Recent conversation rendered as `sender: content` lines.
    pub chat_history: Option<String>,
}

/// Context for one event flowing through the handler chain.
#[derive(Debug)]
pub struct ExecutionContext {
    event: Event,
    facts: Facts,
    actions: Vec<Action>,
    stopped: bool,
}

impl ExecutionContext {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            facts: Facts::default(),
            actions: Vec::new(),
            stopped: false,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn facts(&self) -> &Facts {
        &self.facts
    }

    pub fn facts_mut(&mut self) -> &mut Facts {
        &mut self.facts
    }

    /// Append an action. Emission order is preserved.
    pub fn add_action(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Skip every handler after the current one. Cannot be undone.
    pub fn request_stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Snapshot of what a handler could change, taken before it runs.
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            facts: self.facts.clone(),
            action_count: self.actions.len(),
        }
    }

    /// Discard facts and actions written since `checkpoint`. The stop flag is kept.
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.facts = checkpoint.facts;
        self.actions.truncate(checkpoint.action_count);
    }

    /// Consume the context, yielding the actions for the executor.
    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }
}

/// State captured by [`ExecutionContext::checkpoint`].
#[derive(Debug)]
pub(crate) struct Checkpoint {
    facts: Facts,
    action_count: usize,
}
