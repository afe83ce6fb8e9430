//! Bot triage — message-triage pipeline for a chat bot.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod store;
