//! HTTP query engine client.
//!
//! Talks to a remote query service exposing the start / status / results
//! contract as JSON endpoints:
//!
//! - `POST {base}/executions` with `{"queryString", "outputLocation"}`
//! - `GET {base}/executions/{id}`
//! - `GET {base}/executions/{id}/results`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExecutionHandle, ExecutionState, QueryEngine, QueryRequest, QueryResult};
use crate::error::{QueryDeskError, Result};

/// Default timeout for a single API request.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP engine client configuration.
#[derive(Debug, Clone)]
pub struct HttpEngineConfig {
    /// Base URL of the engine API.
    pub endpoint: String,
    /// Optional bearer token.
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl HttpEngineConfig {
    /// Creates a new config for the given base URL.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Query engine reached over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpQueryEngine {
    config: HttpEngineConfig,
    client: Client,
}

impl HttpQueryEngine {
    /// Creates a new client with the given configuration.
    pub fn new(config: HttpEngineConfig) -> Result<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            QueryDeskError::config(format!("Invalid engine endpoint '{}': {e}", config.endpoint))
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QueryDeskError::engine(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Extracts a readable message from an error response body.
    fn parse_error(status: StatusCode, body: &str) -> String {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(error) => format!("{} ({status})", error.message),
            Err(_) if body.trim().is_empty() => format!("engine returned {status}"),
            Err(_) => format!("engine returned {status}: {}", body.trim()),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .authorize(self.client.get(self.url(path)))
            .send()
            .await
            .map_err(|e| QueryDeskError::engine(format!("Request to engine failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryDeskError::engine(Self::parse_error(status, &body)));
        }

        response
            .json()
            .await
            .map_err(|e| QueryDeskError::engine(format!("Invalid engine response: {e}")))
    }
}

#[async_trait]
impl QueryEngine for HttpQueryEngine {
    async fn start_execution(&self, request: &QueryRequest) -> Result<ExecutionHandle> {
        let body = StartExecutionRequest {
            query_string: request.query_text(),
            output_location: request.output_location(),
        };

        let response = self
            .authorize(self.client.post(self.url("executions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| QueryDeskError::submission(format!("Engine unavailable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryDeskError::submission(Self::parse_error(status, &body)));
        }

        let started: StartExecutionResponse = response
            .json()
            .await
            .map_err(|e| QueryDeskError::submission(format!("Invalid engine response: {e}")))?;

        debug!("Engine accepted execution {}", started.execution_id);
        Ok(ExecutionHandle::new(started.execution_id))
    }

    async fn get_status(&self, handle: &ExecutionHandle) -> Result<ExecutionState> {
        self.get_json(&format!("executions/{}", handle.id())).await
    }

    async fn get_results(&self, handle: &ExecutionHandle) -> Result<QueryResult> {
        self.get_json(&format!("executions/{}/results", handle.id()))
            .await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionRequest<'a> {
    query_string: &'a str,
    output_location: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionResponse {
    execution_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
}
