//! Workflow API client (Dify-style blocking workflow runs).
//!
//! Request: `{inputs, response_mode: "blocking", user}`.
//! Response: `data.outputs.text`, itself a JSON-encoded object.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::LlmError;

const PROVIDER: &str = "workflow";

/// One blocking workflow run.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRequest {
    pub inputs: Map<String, Value>,
    /// Subject id the run is attributed to.
    pub user: String,
}

impl WorkflowRequest {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            inputs: Map::new(),
            user: user.into(),
        }
    }

    pub fn input(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Serialize)]
struct RunBody<'a> {
    inputs: &'a Map<String, Value>,
    response_mode: &'static str,
    user: &'a str,
}

/// The decoded `data.outputs.text` object of a workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOutput(pub Value);

impl WorkflowOutput {
    /// Decode a full response body. A missing `text` field counts as `{}`.
    pub fn from_response_body(body: &Value) -> Result<Self, LlmError> {
        let outputs = body
            .get("data")
            .and_then(|d| d.get("outputs"))
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.into(),
                reason: "missing data.outputs".into(),
            })?;

        let text = match outputs.get("text") {
            None | Some(Value::Null) => "{}",
            Some(Value::String(s)) => s.as_str(),
            Some(other) => {
                return Err(LlmError::InvalidResponse {
                    provider: PROVIDER.into(),
                    reason: format!("data.outputs.text is not a string: {other}"),
                });
            }
        };

        Ok(Self(serde_json::from_str(text)?))
    }

    /// Read the output as a typed result.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, LlmError> {
        Ok(T::deserialize(&self.0)?)
    }
}

/// Output of the bot-relevance workflow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelevanceVerdict {
    #[serde(default)]
    pub is_for_bot: bool,
}

/// Output of the welcome-poster workflow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PosterResult {
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Anything that can run a workflow.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn run(&self, request: WorkflowRequest) -> Result<WorkflowOutput, LlmError>;
}

/// HTTP client for a Dify-compatible workflow endpoint.
pub struct DifyWorkflowClient {
    api_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl DifyWorkflowClient {
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            api_key,
            base_url: base_url.into(),
            client,
        })
    }

    fn run_url(&self) -> String {
        format!("{}/workflows/run", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkflowClient for DifyWorkflowClient {
    async fn run(&self, request: WorkflowRequest) -> Result<WorkflowOutput, LlmError> {
        let body = RunBody {
            inputs: &request.inputs,
            response_mode: "blocking",
            user: &request.user,
        };

        let resp = self
            .client
            .post(self.run_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.into(),
                reason: format!("status {status}: {detail}"),
            });
        }

        let json: Value = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.into(),
            reason: e.to_string(),
        })?;
        WorkflowOutput::from_response_body(&json)
    }
}
