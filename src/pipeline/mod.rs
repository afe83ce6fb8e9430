//! Message triage pipeline.
//!
//! Every decoded event flows through:
//! 1. `Scheduler::run()` — builds an `ExecutionContext`
//! 2. Handlers, highest priority first — write facts, declare actions
//! 3. The final action list — handed to the external executor
//!
//! Handlers never perform side effects directly; they only append `Action`s.

pub mod classify;
pub mod dedup;
pub mod handler;
pub mod scheduler;
pub mod types;

pub use handler::{Handler, HandlerDescriptor};
pub use scheduler::Scheduler;
pub use types::{Action, Event, MessageKind, Participant, QuotedMessage};
