//! Error types for the triage pipeline.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Handler {name} registered more than once")]
    DuplicateHandler { name: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// History store errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("History lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Workflow and chat-completion collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors a handler can return from one invocation.
///
/// The scheduler logs these and carries on; none of them end a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Handler {name} failed: {reason}")]
    Handler { name: String, reason: String },

    #[error("Handler {name} panicked")]
    Panicked { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
