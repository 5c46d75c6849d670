//! Conversational agent integration.
//!
//! The agent turns a natural-language question into SQL, invokes the query
//! action and replies with the result plus a trace of what it did.

mod http;
mod mock;

pub use http::{HttpAgentClient, HttpAgentConfig};
pub use mock::MockAgent;

use std::sync::Arc;

use async_trait::async_trait;

use crate::action::ActionRouter;
use crate::config::AgentConfig;
use crate::error::Result;

/// An agent's answer to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    /// The answer, often a JSON array of rows.
    pub response: String,
    /// Explanation of the steps the agent took.
    pub trace: String,
}

/// Trait for conversational agent clients.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Asks a question within a session.
    async fn ask(&self, session_id: &str, question: &str) -> Result<AgentReply>;

    /// Ends a session on the agent side.
    async fn end_session(&self, session_id: &str) -> Result<()>;
}

/// Creates the configured agent: the HTTP client when an endpoint is set,
/// otherwise the offline mock agent driving `router`.
pub fn create_agent(config: &AgentConfig, router: ActionRouter) -> Result<Arc<dyn AgentClient>> {
    match &config.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpAgentClient::new(HttpAgentConfig::new(
            endpoint.clone(),
        ))?)),
        None => Ok(Arc::new(MockAgent::new(router))),
    }
}
