//! Error types for querydesk.
//!
//! Defines the main error enum used throughout the application. The three
//! query-lifecycle failures (submission, execution, polling timeout) are kept
//! as distinct variants so callers can tell them apart.

use std::time::Duration;

use thiserror::Error;

use crate::engine::ExecutionStatus;

/// Main error type for querydesk operations.
#[derive(Error, Debug)]
pub enum QueryDeskError {
    /// The query engine rejected the request, or the request was invalid.
    #[error("Submission error: {0}")]
    Submission(String),

    /// The engine finished the query without success (FAILED or CANCELLED).
    #[error("Query {}{}", .status.as_str(), reason_suffix(.reason))]
    QueryExecution {
        /// Terminal status reported by the engine.
        status: ExecutionStatus,
        /// State-change reason reported by the engine, if any.
        reason: Option<String>,
    },

    /// No terminal state was reached within the allotted time.
    #[error("Query did not finish within {}s", .timeout.as_secs_f64())]
    PollingTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The caller abandoned the wait.
    #[error("Query wait was cancelled")]
    Cancelled,

    /// Transport failure while talking to the query engine.
    #[error("Engine error: {0}")]
    Engine(String),

    /// Malformed action invocation payload.
    #[error("Invalid action request: {0}")]
    Envelope(String),

    /// Conversational agent service errors.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryDeskError {
    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Creates a query execution error for a terminal status.
    pub fn query_execution(status: ExecutionStatus, reason: Option<String>) -> Self {
        Self::QueryExecution { status, reason }
    }

    /// Creates a polling timeout error.
    pub fn polling_timeout(timeout: Duration) -> Self {
        Self::PollingTimeout { timeout }
    }

    /// Creates an engine error with the given message.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Creates an envelope error with the given message.
    pub fn envelope(msg: impl Into<String>) -> Self {
        Self::Envelope(msg.into())
    }

    /// Creates an agent error with the given message.
    pub fn agent(msg: impl Into<String>) -> Self {
        Self::Agent(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "Submission Error",
            Self::QueryExecution { .. } => "Query Execution Error",
            Self::PollingTimeout { .. } => "Polling Timeout",
            Self::Cancelled => "Cancelled",
            Self::Engine(_) => "Engine Error",
            Self::Envelope(_) => "Request Error",
            Self::Agent(_) => "Agent Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the HTTP status code reported in an action response envelope.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Submission(_) | Self::Envelope(_) => 400,
            Self::QueryExecution { .. } | Self::Engine(_) | Self::Agent(_) => 502,
            Self::Cancelled => 503,
            Self::PollingTimeout { .. } => 504,
            Self::Config(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the terminal status for query execution failures.
    pub fn terminal_status(&self) -> Option<ExecutionStatus> {
        match self {
            Self::QueryExecution { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}

/// Result type alias using QueryDeskError.
pub type Result<T> = std::result::Result<T, QueryDeskError>;
