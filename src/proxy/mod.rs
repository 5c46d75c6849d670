//! Asynchronous query-execution proxy.
//!
//! Connects the [`QuerySubmitter`] and [`CompletionPoller`]: build a request,
//! submit it, wait for a terminal state and hand back the result or a
//! classified error. Each call is an independent polling loop.

mod poller;
mod submitter;

pub use poller::CompletionPoller;
pub use submitter::QuerySubmitter;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::PollingConfig;
use crate::engine::{QueryEngine, QueryRequest, QueryResult};
use crate::error::Result;

/// Submits queries and waits for their results.
#[derive(Clone)]
pub struct QueryProxy {
    submitter: QuerySubmitter,
    poller: CompletionPoller,
    output_location: String,
    polling: PollingConfig,
}

impl QueryProxy {
    /// Creates a proxy over `engine`, writing results to `output_location`.
    pub fn new(
        engine: Arc<dyn QueryEngine>,
        output_location: impl Into<String>,
        polling: PollingConfig,
    ) -> Self {
        Self {
            submitter: QuerySubmitter::new(Arc::clone(&engine)),
            poller: CompletionPoller::new(engine),
            output_location: output_location.into(),
            polling,
        }
    }

    /// Returns the output location sent with each query.
    pub fn output_location(&self) -> &str {
        &self.output_location
    }

    /// Returns the polling cadence.
    pub fn polling(&self) -> PollingConfig {
        self.polling
    }

    /// Runs `query_text` to completion.
    pub async fn execute(&self, query_text: &str) -> Result<QueryResult> {
        self.execute_with_cancel(query_text, CancellationToken::new())
            .await
    }

    /// Runs `query_text` to completion unless `cancel` fires first.
    pub async fn execute_with_cancel(
        &self,
        query_text: &str,
        cancel: CancellationToken,
    ) -> Result<QueryResult> {
        let request = QueryRequest::new(query_text, self.output_location.as_str());
        let handle = self.submitter.submit(&request).await?;
        info!(execution_id = handle.id(), "Waiting for query to finish");

        self.poller
            .await_result_with_cancel(
                handle,
                self.polling.interval(),
                self.polling.timeout(),
                cancel,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecutionStatus, MockQueryEngine};
    use crate::error::QueryDeskError;
    use std::time::Duration;

    fn polling() -> PollingConfig {
        PollingConfig::new(Duration::from_secs(1), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_succeeds() {
        let engine = Arc::new(MockQueryEngine::demo());
        let proxy = QueryProxy::new(engine.clone(), "store://bucket/prefix", polling());

        let result = proxy.execute("SELECT 1").await.unwrap();

        assert_eq!(result.row_count, 1);
        assert_eq!(engine.start_calls(), 1);
        assert_eq!(engine.status_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_empty_query() {
        let engine = Arc::new(MockQueryEngine::new());
        let proxy = QueryProxy::new(engine.clone(), "store://bucket/prefix", polling());

        let err = proxy.execute("").await.unwrap_err();

        assert!(matches!(err, QueryDeskError::Submission(_)));
        assert_eq!(engine.start_calls(), 0);
        assert_eq!(engine.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_failure_keeps_kind() {
        let engine = Arc::new(MockQueryEngine::new().with_statuses([ExecutionStatus::Failed]));
        let proxy = QueryProxy::new(engine, "store://bucket/prefix", polling());

        let err = proxy.execute("SELECT broken").await.unwrap_err();
        assert_eq!(err.terminal_status(), Some(ExecutionStatus::Failed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_uses_configured_timeout() {
        let engine = Arc::new(MockQueryEngine::new().with_statuses([ExecutionStatus::Queued]));
        let proxy = QueryProxy::new(engine, "store://bucket/prefix", polling());

        let err = proxy.execute("SELECT 1").await.unwrap_err();
        assert!(
            matches!(err, QueryDeskError::PollingTimeout { timeout } if timeout == Duration::from_secs(10))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_with_cancelled_token() {
        let engine = Arc::new(MockQueryEngine::new().with_statuses([ExecutionStatus::Running]));
        let proxy = QueryProxy::new(engine.clone(), "store://bucket/prefix", polling());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = proxy.execute_with_cancel("SELECT 1", cancel).await.unwrap_err();

        assert!(matches!(err, QueryDeskError::Cancelled));
        // Submission still happened; the wait was abandoned before any poll.
        assert_eq!(engine.start_calls(), 1);
        assert_eq!(engine.status_calls(), 0);
    }
}
