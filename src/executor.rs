//! Hand-off of collected actions to the process that performs them.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::PipelineError;
use crate::pipeline::types::Action;

/// Performs (or forwards) the actions of one pipeline run, in order.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, actions: &[Action]) -> Result<(), PipelineError>;
}

/// Writes each action as one JSON line for the RPA process.
///
/// A run's actions are written under one lock, so lines from concurrent runs
/// never interleave.
pub struct JsonLinesExecutor<W> {
    writer: Mutex<W>,
}

impl JsonLinesExecutor<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesExecutor<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ActionExecutor for JsonLinesExecutor<W> {
    async fn execute(&self, actions: &[Action]) -> Result<(), PipelineError> {
        if actions.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for action in actions {
            serde_json::to_writer(&mut buf, action).map_err(std::io::Error::from)?;
            buf.push(b'\n');
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(&buf).await?;
        writer.flush().await?;

        for action in actions {
            info!(action = action.label(), "Action dispatched");
        }
        Ok(())
    }
}
