//! Handler abstraction for the triage chain.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ExecutionContext;
use crate::error::PipelineError;

/// One unit of triage logic.
///
/// Handlers read the event and facts from the context, may write facts, and
/// declare side effects with `add_action`. They never perform sends themselves.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Unique handler name, also the config section it is read from.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Process the event in `ctx`.
    ///
    /// An `Err` is logged by the scheduler and otherwise ignored.
    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError>;
}

/// A handler together with its registration-time settings.
#[derive(Clone)]
pub struct HandlerDescriptor {
    pub name: String,
    /// Higher runs first.
    pub priority: i64,
    pub enabled: bool,
    pub handler: Arc<dyn Handler>,
}

impl HandlerDescriptor {
    pub fn new(handler: Arc<dyn Handler>, priority: i64, enabled: bool) -> Self {
        Self {
            name: handler.name().to_string(),
            priority,
            enabled,
            handler,
        }
    }
}

impl std::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish()
    }
}
