//! Offline agent for demos and tests.
//!
//! Maps known questions to SQL over the demo schema, invokes the query action
//! through the [`ActionRouter`] with a regular invocation envelope and replies
//! the way a hosted agent would.

use async_trait::async_trait;
use tracing::info;

use super::{AgentClient, AgentReply};
use crate::action::{ActionEvent, ActionRouter};
use crate::engine::QueryResult;
use crate::error::Result;

/// Action group name used in generated envelopes.
pub const ACTION_GROUP: &str = "querydesk";

/// Reply when no SQL could be generated.
const NOT_UNDERSTOOD: &str = "I don't understand that question. Could you please rephrase it?";

/// Agent that answers from canned SQL without any model.
#[derive(Clone)]
pub struct MockAgent {
    router: ActionRouter,
}

impl MockAgent {
    /// Creates a mock agent that runs queries through `router`.
    pub fn new(router: ActionRouter) -> Self {
        Self { router }
    }

    /// Generates SQL for a question, or `None` if it is not understood.
    ///
    /// Questions that already are SQL pass through unchanged.
    pub fn generate_sql(question: &str) -> Option<String> {
        let q = question.trim();
        let lower = q.to_lowercase();

        if lower.starts_with("select ") || lower.starts_with("with ") {
            return Some(q.trim_end_matches(';').to_string());
        }

        let sql = if lower.contains("not insured") && lower.contains("customer") {
            "SELECT p.procedure_id, p.procedure_name, p.category, c.customer_name \
             FROM procedures p JOIN customers c ON p.customer_id = c.cust_id \
             WHERE p.insured = 0"
        } else if lower.contains("number of procedures")
            && lower.contains("laboratory")
            && lower.contains("imaging")
            && lower.contains("surgery")
        {
            "SELECT COUNT(*) AS procedure_count FROM procedures \
             WHERE category IN ('laboratory', 'imaging', 'surgery') AND insured = 1"
        } else if lower.contains("number of procedures") && lower.contains("laboratory") {
            "SELECT COUNT(*) AS procedure_count FROM procedures WHERE category = 'laboratory'"
        } else if lower.contains("imaging") && lower.contains("insured") {
            "SELECT * FROM procedures WHERE category = 'imaging' AND insured = 1"
        } else if lower.contains("past due") {
            "SELECT * FROM customers WHERE past_due > 70"
        } else if lower.contains("vip") && lower.contains("balance") {
            "SELECT * FROM customers WHERE vip = 1 AND balance > 300"
        } else {
            return None;
        };

        Some(sql.to_string())
    }
}

#[async_trait]
impl AgentClient for MockAgent {
    async fn ask(&self, session_id: &str, question: &str) -> Result<AgentReply> {
        let Some(sql) = Self::generate_sql(question) else {
            return Ok(AgentReply {
                response: NOT_UNDERSTOOD.to_string(),
                trace: "No SQL generated for the question.".to_string(),
            });
        };

        let event = ActionEvent::query(ACTION_GROUP, self.router.query_path(), sql.as_str())
            .with_session(session_id);
        let response = self.router.handle(&event).await;
        info!(session_id, status = response.status(), "Query action returned");

        let body = response.body().cloned().unwrap_or_default();
        let trace = format!(
            "Generated SQL: {sql}\nInvoked {}::{} -> {}",
            ACTION_GROUP,
            self.router.query_path(),
            response.status()
        );

        let answer = if response.is_success() {
            match serde_json::from_value::<QueryResult>(body) {
                Ok(result) => serde_json::Value::from(
                    result
                        .to_records()
                        .into_iter()
                        .map(serde_json::Value::Object)
                        .collect::<Vec<_>>(),
                )
                .to_string(),
                Err(e) => format!("The query finished but its result was unreadable: {e}"),
            }
        } else {
            let message = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown error");
            format!("I couldn't run that query. {message}")
        };

        Ok(AgentReply {
            response: answer,
            trace,
        })
    }

    async fn end_session(&self, session_id: &str) -> Result<()> {
        info!(session_id, "Session ended");
        Ok(())
    }
}
