//! Configuration management for querydesk.
//!
//! Handles loading configuration from TOML files and environment variables:
//! which query engine to use, where results are written, the polling cadence,
//! the action route and the agent service.

use crate::engine::{parse_output_location, EngineKind};
use crate::error::{QueryDeskError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for querydesk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Query engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Polling cadence and timeout.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Action routing configuration.
    #[serde(default)]
    pub action: ActionConfig,

    /// Conversational agent configuration.
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Query engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine backend: "local", "http" or "mock".
    #[serde(default)]
    pub kind: EngineKind,

    /// SQLite database URL for the local engine.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Base URL for the http engine.
    pub endpoint: Option<String>,

    /// Bearer token for the http engine (prefer QUERYDESK_ENGINE_TOKEN).
    pub token: Option<String>,

    /// Per-request timeout for the http engine, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// URI the engine writes results to.
    #[serde(default = "default_output_location")]
    pub output_location: String,
}

fn default_database_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_output_location() -> String {
    let dir = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("querydesk")
        .join("results");
    url::Url::from_directory_path(&dir)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("file://{}/", dir.display()))
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            database_url: default_database_url(),
            endpoint: None,
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
            output_location: default_output_location(),
        }
    }
}

/// Polling cadence for the completion poller.
///
/// The cadence is fixed (no backoff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status checks in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Maximum time to wait for a terminal state, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn ceil_units(duration: Duration, unit: Duration) -> u64 {
    let units = duration.as_nanos().div_ceil(unit.as_nanos());
    u64::try_from(units).unwrap_or(u64::MAX)
}

impl PollingConfig {
    /// Creates a polling config from durations.
    ///
    /// Both are rounded up to whole units, so a non-zero duration never
    /// becomes zero.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval_ms: ceil_units(interval, Duration::from_millis(1)),
            timeout_secs: ceil_units(timeout, Duration::from_secs(1)),
        }
    }

    /// Returns the poll interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the polling timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Rejects zero intervals and timeouts.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(QueryDeskError::config(
                "polling.interval_ms must be greater than zero",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(QueryDeskError::config(
                "polling.timeout_secs must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Action routing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    /// The apiPath that triggers query execution.
    #[serde(default = "default_query_path")]
    pub query_path: String,
}

fn default_query_path() -> String {
    "/athenaQuery".to_string()
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            query_path: default_query_path(),
        }
    }
}

/// Conversational agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent service URL. Without one, the offline mock agent is used.
    pub endpoint: Option<String>,

    /// Session id sent with every question.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Number of exchanges kept in the transcript.
    #[serde(default = "default_max_exchanges")]
    pub max_exchanges: usize,
}

fn default_session_id() -> String {
    "querydesk-session".to_string()
}

fn default_max_exchanges() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            session_id: default_session_id(),
            max_exchanges: default_max_exchanges(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("querydesk")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file, falling back to defaults if it is missing.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| QueryDeskError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            QueryDeskError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies `QUERYDESK_*` environment variables over file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(location) = lookup("QUERYDESK_OUTPUT_LOCATION") {
            self.engine.output_location = location;
        }
        if let Some(url) = lookup("QUERYDESK_DATABASE_URL") {
            self.engine.database_url = url;
        }
        if let Some(endpoint) = lookup("QUERYDESK_ENGINE_URL") {
            self.engine.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup("QUERYDESK_ENGINE_TOKEN") {
            self.engine.token = Some(token);
        }
        if let Some(endpoint) = lookup("QUERYDESK_AGENT_URL") {
            self.agent.endpoint = Some(endpoint);
        }
    }

    /// Validates values that serde cannot check.
    pub fn validate(&self) -> Result<()> {
        self.polling.validate()?;
        parse_output_location(&self.engine.output_location)
            .map_err(|e| QueryDeskError::config(format!("engine.output_location: {e}")))?;
        if !self.action.query_path.starts_with('/') {
            return Err(QueryDeskError::config(format!(
                "action.query_path must start with '/', got '{}'",
                self.action.query_path
            )));
        }
        Ok(())
    }
}
