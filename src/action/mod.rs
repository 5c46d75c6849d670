//! Action routing for agent invocations.
//!
//! Dispatches an invocation envelope on its `apiPath`, runs recognized query
//! requests through the [`QueryProxy`] and wraps the outcome in a response
//! envelope. Failures keep their kind: each maps to its own non-2xx status.

mod envelope;

pub use envelope::{
    ActionEvent, ActionProperty, ActionResponse, ActionResult, MediaContent, RequestBody,
    ResponseBody, JSON_MEDIA_TYPE, MESSAGE_VERSION, QUERY_PROPERTY,
};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{QueryDeskError, Result};
use crate::proxy::QueryProxy;

/// Routes recognized by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Query,
    Unknown,
}

/// Dispatches action invocations to the query proxy.
#[derive(Clone)]
pub struct ActionRouter {
    proxy: QueryProxy,
    query_path: String,
}

impl ActionRouter {
    /// Creates a router that runs queries for `query_path`.
    pub fn new(proxy: QueryProxy, query_path: impl Into<String>) -> Self {
        Self {
            proxy,
            query_path: query_path.into(),
        }
    }

    /// Returns the apiPath that triggers query execution.
    pub fn query_path(&self) -> &str {
        &self.query_path
    }

    fn route(&self, api_path: Option<&str>) -> Route {
        match api_path {
            Some(path) if path == self.query_path => Route::Query,
            _ => Route::Unknown,
        }
    }

    /// Handles one invocation and builds its response envelope.
    pub async fn handle(&self, event: &ActionEvent) -> ActionResponse {
        self.handle_with_cancel(event, CancellationToken::new())
            .await
    }

    /// Handles one invocation, abandoning the query wait if `cancel` fires.
    pub async fn handle_with_cancel(
        &self,
        event: &ActionEvent,
        cancel: CancellationToken,
    ) -> ActionResponse {
        let api_path = event.api_path.as_deref();
        info!(
            action_group = event.action_group.as_deref().unwrap_or(""),
            api_path = api_path.unwrap_or(""),
            "Action invoked"
        );
        if let Some(input) = event.input_text.as_deref() {
            debug!("Agent input: {input}");
        }

        match self.route(api_path) {
            Route::Query => match self.run_query(event, cancel).await {
                Ok(body) => ActionResponse::new(event, 200, body),
                Err(e) => {
                    warn!("{}: {}", e.category(), e);
                    ActionResponse::new(event, e.http_status(), error_body(&e))
                }
            },
            Route::Unknown => {
                let message = format!(
                    "Unrecognized api path: {}::{}",
                    event.action_group.as_deref().unwrap_or(""),
                    api_path.unwrap_or("")
                );
                warn!("{message}");
                ActionResponse::new(event, 404, json!({ "error": message }))
            }
        }
    }

    /// Parses a raw JSON event and handles it. Malformed JSON yields a 400 envelope.
    pub async fn handle_json(&self, raw: &str) -> ActionResponse {
        match serde_json::from_str::<ActionEvent>(raw) {
            Ok(event) => self.handle(&event).await,
            Err(e) => {
                let err = QueryDeskError::envelope(format!("malformed event JSON: {e}"));
                warn!("{err}");
                ActionResponse::new(&ActionEvent::default(), err.http_status(), error_body(&err))
            }
        }
    }

    async fn run_query(
        &self,
        event: &ActionEvent,
        cancel: CancellationToken,
    ) -> Result<serde_json::Value> {
        let sql = event
            .query_text()
            .ok_or_else(|| QueryDeskError::envelope("no query text in request properties"))?;
        info!("Received query: {sql}");

        let result = self.proxy.execute_with_cancel(sql, cancel).await?;
        serde_json::to_value(&result)
            .map_err(|e| QueryDeskError::internal(format!("failed to encode result: {e}")))
    }
}

/// Error payload carrying both the message and the error kind.
fn error_body(error: &QueryDeskError) -> serde_json::Value {
    let mut body = json!({
        "error": error.to_string(),
        "kind": error.category(),
    });
    if let Some(status) = error.terminal_status() {
        body["status"] = json!(status);
    }
    body
}
