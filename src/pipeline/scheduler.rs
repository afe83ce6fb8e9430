//! Scheduler — runs one event through the handler chain.
//!
//! Handlers run strictly one after another, highest priority first, ties in
//! registration order. A failing or panicking handler is logged and its partial
//! writes are discarded; the run continues with the next handler. Once a handler
//! requests a stop, nothing after it runs.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::{debug, error, info};

use crate::context::ExecutionContext;
use crate::error::{ConfigError, PipelineError};
use crate::pipeline::handler::HandlerDescriptor;
use crate::pipeline::types::Event;

/// Ordered, read-only handler chain.
#[derive(Debug)]
pub struct Scheduler {
    handlers: Vec<HandlerDescriptor>,
}

impl Scheduler {
    /// Build a scheduler from handlers in registration order.
    ///
    /// Fails if two handlers share a name.
    pub fn new(handlers: Vec<HandlerDescriptor>) -> Result<Self, ConfigError> {
        {
            let mut seen = HashSet::new();
            for descriptor in &handlers {
                if !seen.insert(descriptor.name.as_str()) {
                    return Err(ConfigError::DuplicateHandler {
                        name: descriptor.name.clone(),
                    });
                }
            }
        }

        let mut handlers = handlers;
        // sort_by_key is stable, so equal priorities keep registration order
        handlers.sort_by_key(|d| Reverse(d.priority));

        for descriptor in &handlers {
            debug!(
                handler = %descriptor.name,
                priority = descriptor.priority,
                enabled = descriptor.enabled,
                "Registered handler"
            );
        }

        Ok(Self { handlers })
    }

    /// Handlers in execution order.
    pub fn handlers(&self) -> &[HandlerDescriptor] {
        &self.handlers
    }

    pub fn enabled_count(&self) -> usize {
        self.handlers.iter().filter(|d| d.enabled).count()
    }

    /// Run one event through every enabled handler until one stops the run.
    pub async fn run(&self, event: Event) -> ExecutionContext {
        info!(
            kind = ?event.kind,
            conversation = event.conversation_id().unwrap_or("unknown"),
            "Processing event"
        );

        let mut ctx = ExecutionContext::new(event);

        for descriptor in &self.handlers {
            if !descriptor.enabled {
                continue;
            }

            let checkpoint = ctx.checkpoint();
            let outcome = AssertUnwindSafe(descriptor.handler.handle(&mut ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(PipelineError::Panicked {
                        name: descriptor.name.clone(),
                    })
                });

            if let Err(e) = outcome {
                error!(
                    handler = %descriptor.name,
                    error = %e,
                    "Handler failed, discarding its output"
                );
                ctx.restore(checkpoint);
            }

            if ctx.is_stopped() {
                debug!(handler = %descriptor.name, "Handler stopped the run");
                break;
            }
        }

        info!(
            actions = ctx.actions().len(),
            stopped = ctx.is_stopped(),
            "Event processed"
        );
        ctx
    }
}
