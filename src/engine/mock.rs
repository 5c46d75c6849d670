//! Mock query engine for testing.
//!
//! Replays a scripted status sequence for every submission and counts calls,
//! so polling behaviour can be asserted without a real engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    ColumnInfo, ExecutionHandle, ExecutionState, ExecutionStatus, QueryEngine, QueryRequest,
    QueryResult, Value,
};
use crate::error::{QueryDeskError, Result};

/// Per-execution replay position.
#[derive(Debug)]
struct ScriptedExecution {
    query_text: String,
    position: usize,
    terminal: Option<ExecutionState>,
}

/// A mock engine that reports scripted statuses and returns predefined results.
///
/// Once the script is exhausted the last entry repeats. Terminal states are
/// sticky: re-reading a finished execution always yields the same state.
#[derive(Debug)]
pub struct MockQueryEngine {
    script: Vec<ExecutionState>,
    result: Option<QueryResult>,
    rejection: Option<String>,
    executions: Mutex<HashMap<String, ScriptedExecution>>,
    next_id: AtomicUsize,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    result_calls: AtomicUsize,
}

impl MockQueryEngine {
    /// Creates a mock engine whose executions succeed on the first poll.
    pub fn new() -> Self {
        Self {
            script: vec![ExecutionState::new(ExecutionStatus::Succeeded)],
            result: None,
            rejection: None,
            executions: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            result_calls: AtomicUsize::new(0),
        }
    }

    /// Creates the engine used by `--engine mock`: queued, running, then succeeded.
    pub fn demo() -> Self {
        Self::new().with_statuses([
            ExecutionStatus::Queued,
            ExecutionStatus::Running,
            ExecutionStatus::Succeeded,
        ])
    }

    /// Sets the status sequence reported for each execution.
    pub fn with_statuses(self, statuses: impl IntoIterator<Item = ExecutionStatus>) -> Self {
        self.with_states(statuses.into_iter().map(ExecutionState::new))
    }

    /// Sets the state sequence (status plus reason) reported for each execution.
    pub fn with_states(mut self, states: impl IntoIterator<Item = ExecutionState>) -> Self {
        let script: Vec<ExecutionState> = states.into_iter().collect();
        if !script.is_empty() {
            self.script = script;
        }
        self
    }

    /// Sets the result returned for succeeded executions.
    ///
    /// Without one, the engine echoes the submitted SQL in a single-row result.
    pub fn with_result(mut self, result: QueryResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Makes every submission fail with the given engine message.
    pub fn rejecting(mut self, message: impl Into<String>) -> Self {
        self.rejection = Some(message.into());
        self
    }

    /// Number of `start_execution` calls that reached the engine.
    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_status` calls.
    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_results` calls.
    pub fn result_calls(&self) -> usize {
        self.result_calls.load(Ordering::SeqCst)
    }

    fn echo_result(query_text: &str) -> QueryResult {
        QueryResult::with_data(
            vec![ColumnInfo::new("result", "varchar")],
            vec![vec![Value::String(format!("Mock result for: {query_text}"))]],
        )
    }

    fn lock_executions(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, ScriptedExecution>>> {
        self.executions
            .lock()
            .map_err(|_| QueryDeskError::internal("mock engine state poisoned"))
    }
}

impl Default for MockQueryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryEngine for MockQueryEngine {
    async fn start_execution(&self, request: &QueryRequest) -> Result<ExecutionHandle> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.rejection {
            return Err(QueryDeskError::submission(message.clone()));
        }

        let id = format!("E{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock_executions()?.insert(
            id.clone(),
            ScriptedExecution {
                query_text: request.query_text().to_string(),
                position: 0,
                terminal: None,
            },
        );
        Ok(ExecutionHandle::new(id))
    }

    async fn get_status(&self, handle: &ExecutionHandle) -> Result<ExecutionState> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let mut executions = self.lock_executions()?;
        let execution = executions
            .get_mut(handle.id())
            .ok_or_else(|| QueryDeskError::engine(format!("unknown execution {handle}")))?;

        if let Some(state) = &execution.terminal {
            return Ok(state.clone());
        }

        let index = execution.position.min(self.script.len() - 1);
        let state = self.script[index].clone();
        execution.position += 1;
        if state.status.is_terminal() {
            execution.terminal = Some(state.clone());
        }
        Ok(state)
    }

    async fn get_results(&self, handle: &ExecutionHandle) -> Result<QueryResult> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);

        let executions = self.lock_executions()?;
        let execution = executions
            .get(handle.id())
            .ok_or_else(|| QueryDeskError::engine(format!("unknown execution {handle}")))?;

        match &execution.terminal {
            Some(state) if state.status == ExecutionStatus::Succeeded => Ok(self
                .result
                .clone()
                .unwrap_or_else(|| Self::echo_result(&execution.query_text))),
            _ => Err(QueryDeskError::engine(format!(
                "execution {handle} has not succeeded"
            ))),
        }
    }
}
