//! Workflow and chat-completion collaborators.
//!
//! - **Workflow**: Dify-style blocking runs over reqwest (relevance check, welcome posters)
//! - **Chat**: OpenAI-compatible completion through rig-core (replies)
//!
//! Handlers reach both through traits so tests can substitute stubs.

pub mod chat;
pub mod workflow;

pub use chat::{ChatCompleter, ChatMessage, ChatRequest, RigChatCompleter, Role};
pub use workflow::{
    DifyWorkflowClient, PosterResult, RelevanceVerdict, WorkflowClient, WorkflowOutput,
    WorkflowRequest,
};

use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Await a collaborator call for at most `timeout`.
///
/// Elapsing is reported as `LlmError::Timeout` so callers handle it like any
/// other failure of that call.
pub async fn bounded<T, F>(provider: &str, timeout: Duration, call: F) -> Result<T, LlmError>
where
    F: Future<Output = Result<T, LlmError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            provider: provider.to_string(),
            timeout,
        }),
    }
}
