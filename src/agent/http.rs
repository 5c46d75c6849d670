//! HTTP agent client.
//!
//! Posts `{"sessionId", "question", "endSession"}` to the agent service and
//! reads `{"response", "trace_data"}` back. Replies wrapped in a gateway-style
//! `{"body": "<json>"}` are unwrapped first.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{AgentClient, AgentReply};
use crate::error::{QueryDeskError, Result};

/// Agents may run several tool calls per question.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP agent client configuration.
#[derive(Debug, Clone)]
pub struct HttpAgentConfig {
    /// Agent invocation URL.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpAgentConfig {
    /// Creates a new config for the given URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Agent reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    config: HttpAgentConfig,
    client: Client,
}

impl HttpAgentClient {
    /// Creates a new client.
    pub fn new(config: HttpAgentConfig) -> Result<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            QueryDeskError::config(format!("Invalid agent endpoint '{}': {e}", config.endpoint))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryDeskError::agent(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    async fn invoke(&self, request: &InvokeRequest<'_>) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| QueryDeskError::agent(format!("Request to agent failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryDeskError::agent(format!(
                "agent returned {status}: {}",
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| QueryDeskError::agent(format!("Invalid agent response: {e}")))
    }
}

/// Extracts the reply from the agent's JSON, unwrapping a string `body` if present.
pub(crate) fn parse_reply(raw: serde_json::Value) -> Result<AgentReply> {
    let payload = match raw.get("body") {
        Some(serde_json::Value::String(body)) => serde_json::from_str(body)
            .map_err(|e| QueryDeskError::agent(format!("Invalid agent body: {e}")))?,
        Some(body) if body.is_object() => body.clone(),
        _ => raw,
    };

    let response = payload
        .get("response")
        .map(json_text)
        .ok_or_else(|| QueryDeskError::agent("agent reply has no response"))?;
    let trace = payload.get("trace_data").map(json_text).unwrap_or_default();

    Ok(AgentReply { response, trace })
}

fn json_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest<'a> {
    session_id: &'a str,
    question: &'a str,
    end_session: bool,
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn ask(&self, session_id: &str, question: &str) -> Result<AgentReply> {
        debug!(session_id, "Asking agent: {question}");
        let raw = self
            .invoke(&InvokeRequest {
                session_id,
                question,
                end_session: false,
            })
            .await?;
        parse_reply(raw)
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        debug!(session_id, "Ending agent session");
        self.invoke(&InvokeRequest {
            session_id,
            question: "placeholder to end session",
            end_session: true,
        })
        .await?;
        Ok(())
    }
}
