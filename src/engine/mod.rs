//! Query engine abstraction layer for querydesk.
//!
//! Provides a trait-based interface over an asynchronous query service, so the
//! submitter and poller work against any engine exposing the start / status /
//! results contract.

mod http;
mod local;
mod mock;
mod types;

pub use http::{HttpEngineConfig, HttpQueryEngine};
pub use local::LocalQueryEngine;
pub use mock::MockQueryEngine;
pub use types::{
    parse_output_location, render_table, ColumnInfo, ExecutionHandle, ExecutionState,
    ExecutionStatus, QueryRequest, QueryResult, Row, Value,
};

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::{QueryDeskError, Result};

/// Supported query engine backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// SQLite-backed engine running queries on background tasks.
    #[default]
    Local,
    /// Remote engine reached over HTTP/JSON.
    Http,
    /// Scripted in-memory engine (no real execution).
    Mock,
}

impl EngineKind {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Http => "http",
            Self::Mock => "mock",
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "sqlite" => Ok(Self::Local),
            "http" => Ok(Self::Http),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown engine: {s}. Expected: local, http, or mock")),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates a query engine for the configured backend.
///
/// This is the central factory function for engine connections.
pub async fn connect(config: &EngineConfig) -> Result<Arc<dyn QueryEngine>> {
    match config.kind {
        EngineKind::Local => {
            let engine = LocalQueryEngine::connect(&config.database_url).await?;
            Ok(Arc::new(engine))
        }
        EngineKind::Http => {
            let endpoint = config.endpoint.clone().ok_or_else(|| {
                QueryDeskError::config("engine.endpoint is required for the http engine")
            })?;
            let mut http_config =
                HttpEngineConfig::new(endpoint).with_timeout(config.request_timeout_secs);
            if let Some(token) = &config.token {
                http_config = http_config.with_token(token.clone());
            }
            Ok(Arc::new(HttpQueryEngine::new(http_config)?))
        }
        EngineKind::Mock => Ok(Arc::new(MockQueryEngine::demo())),
    }
}

/// Trait defining the interface for query engines.
///
/// All operations are async and return Results with QueryDeskError.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Starts executing a query and returns the engine's handle for it.
    ///
    /// Must not wait for the query to finish.
    async fn start_execution(&self, request: &QueryRequest) -> Result<ExecutionHandle>;

    /// Returns the current status of an execution.
    async fn get_status(&self, handle: &ExecutionHandle) -> Result<ExecutionState>;

    /// Fetches the results of a succeeded execution.
    async fn get_results(&self, handle: &ExecutionHandle) -> Result<QueryResult>;
}
