//! Completion polling.
//!
//! Re-checks an execution's status on a fixed cadence until it reaches a
//! terminal state, then fetches the result or reports a classified failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::{ExecutionHandle, ExecutionState, ExecutionStatus, QueryEngine, QueryResult};
use crate::error::{QueryDeskError, Result};

/// Waits for executions to finish.
#[derive(Clone)]
pub struct CompletionPoller {
    engine: Arc<dyn QueryEngine>,
}

impl CompletionPoller {
    /// Creates a poller for the given engine.
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    /// Polls `handle` every `poll_interval` until it is terminal or `timeout` elapses.
    ///
    /// The handle is consumed: one handle, one polling loop. On timeout the
    /// engine-side execution keeps running; only the wait is abandoned.
    pub async fn await_result(
        &self,
        handle: ExecutionHandle,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<QueryResult> {
        let started = Instant::now();

        let polling = self.poll_until_terminal(&handle, poll_interval);
        let state = match tokio::time::timeout(timeout, polling).await {
            Ok(state) => state?,
            Err(_) => {
                warn!(
                    execution_id = handle.id(),
                    "No terminal state after {:?}; abandoning wait",
                    started.elapsed()
                );
                return Err(QueryDeskError::polling_timeout(timeout));
            }
        };

        info!(
            execution_id = handle.id(),
            status = %state.status,
            "Execution finished after {:?}",
            started.elapsed()
        );

        self.resolve(&handle, state).await
    }

    /// Like [`await_result`](Self::await_result), but also stops when `cancel` fires.
    pub async fn await_result_with_cancel(
        &self,
        handle: ExecutionHandle,
        poll_interval: Duration,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<QueryResult> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("Wait cancelled by caller");
                Err(QueryDeskError::Cancelled)
            }
            result = self.await_result(handle, poll_interval, timeout) => result,
        }
    }

    /// One status check per tick, suspended between ticks.
    async fn poll_until_terminal(
        &self,
        handle: &ExecutionHandle,
        poll_interval: Duration,
    ) -> Result<ExecutionState> {
        let mut tick: u64 = 0;
        loop {
            tick += 1;
            let state = self.engine.get_status(handle).await?;
            debug!(execution_id = handle.id(), tick, status = %state.status, "Polled execution");

            if state.status.is_terminal() {
                return Ok(state);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Maps a terminal state to the caller-facing outcome.
    async fn resolve(&self, handle: &ExecutionHandle, state: ExecutionState) -> Result<QueryResult> {
        match state.status {
            ExecutionStatus::Succeeded => self.engine.get_results(handle).await,
            ExecutionStatus::Failed | ExecutionStatus::Cancelled => {
                Err(QueryDeskError::query_execution(state.status, state.reason))
            }
            ExecutionStatus::Queued | ExecutionStatus::Running => Err(QueryDeskError::internal(
                format!("execution {handle} resolved in non-terminal state {}", state.status),
            )),
        }
    }
}
