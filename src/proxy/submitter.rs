//! Query submission.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::engine::{ExecutionHandle, QueryEngine, QueryRequest};
use crate::error::{QueryDeskError, Result};

/// Hands validated requests to the engine and returns its execution handle.
#[derive(Clone)]
pub struct QuerySubmitter {
    engine: Arc<dyn QueryEngine>,
}

impl QuerySubmitter {
    /// Creates a submitter for the given engine.
    pub fn new(engine: Arc<dyn QueryEngine>) -> Self {
        Self { engine }
    }

    /// Starts asynchronous execution of `request` without waiting for completion.
    ///
    /// Invalid requests fail before the engine is contacted. Every failure is a
    /// [`QueryDeskError::Submission`] and is never retried here.
    pub async fn submit(&self, request: &QueryRequest) -> Result<ExecutionHandle> {
        request.validate()?;

        debug!(
            output_location = request.output_location(),
            "Submitting query: {}",
            request.query_text()
        );

        match self.engine.start_execution(request).await {
            Ok(handle) => {
                debug!(execution_id = handle.id(), "Query submitted");
                Ok(handle)
            }
            Err(QueryDeskError::Submission(msg)) => {
                warn!("Engine rejected query: {msg}");
                Err(QueryDeskError::Submission(msg))
            }
            Err(e) => {
                warn!("Engine rejected query: {e}");
                Err(QueryDeskError::submission(e.to_string()))
            }
        }
    }
}
