//! Submit-then-poll scenarios through the public proxy API.

use std::sync::Arc;
use std::time::Duration;

use querydesk::config::PollingConfig;
use querydesk::engine::{
    ColumnInfo, ExecutionState, ExecutionStatus, MockQueryEngine, QueryRequest, QueryResult, Value,
};
use querydesk::error::QueryDeskError;
use querydesk::proxy::{CompletionPoller, QueryProxy, QuerySubmitter};
use tokio::time::Instant;

const OUTPUT: &str = "store://athena-destination-store/results/";

fn rows() -> QueryResult {
    QueryResult::with_data(
        vec![
            ColumnInfo::new("customer_name", "varchar"),
            ColumnInfo::new("balance", "double"),
        ],
        vec![
            vec![Value::String("Ana Ortiz".to_string()), Value::Float(520.0)],
            vec![Value::String("Eli Novak".to_string()), Value::Float(990.75)],
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn test_running_running_succeeded() {
    let engine = Arc::new(
        MockQueryEngine::new()
            .with_statuses([
                ExecutionStatus::Running,
                ExecutionStatus::Running,
                ExecutionStatus::Succeeded,
            ])
            .with_result(rows()),
    );
    let submitter = QuerySubmitter::new(engine.clone());
    let poller = CompletionPoller::new(engine.clone());

    let handle = submitter
        .submit(&QueryRequest::new("SELECT * FROM customers", OUTPUT))
        .await
        .unwrap();
    assert_eq!(handle.id(), "E1");

    let started = Instant::now();
    let result = poller
        .await_result(handle, Duration::from_secs(1), Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(result, rows());
    assert_eq!(engine.status_calls(), 3);
    assert_eq!(engine.result_calls(), 1);
    assert_eq!(started.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_failed_on_first_poll() {
    let engine = Arc::new(MockQueryEngine::new().with_states([
        ExecutionState::new(ExecutionStatus::Failed).with_reason("SYNTAX_ERROR: line 1:8"),
    ]));
    let proxy = QueryProxy::new(
        engine.clone(),
        OUTPUT,
        PollingConfig::new(Duration::from_secs(1), Duration::from_secs(30)),
    );

    let err = proxy.execute("SELEC 1").await.unwrap_err();

    match err {
        QueryDeskError::QueryExecution { status, reason } => {
            assert_eq!(status, ExecutionStatus::Failed);
            assert_eq!(reason.as_deref(), Some("SYNTAX_ERROR: line 1:8"));
        }
        other => panic!("Expected QueryExecution, got {other:?}"),
    }
    assert_eq!(engine.status_calls(), 1);
    assert_eq!(engine.result_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_query_never_reaches_engine() {
    let engine = Arc::new(MockQueryEngine::new());
    let proxy = QueryProxy::new(engine.clone(), OUTPUT, PollingConfig::default());

    let err = proxy.execute("   ").await.unwrap_err();

    assert!(matches!(err, QueryDeskError::Submission(_)));
    assert_eq!(engine.start_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_stops_polling() {
    let engine = Arc::new(MockQueryEngine::new().with_statuses([ExecutionStatus::Running]));
    let proxy = QueryProxy::new(
        engine.clone(),
        OUTPUT,
        PollingConfig::new(Duration::from_secs(1), Duration::from_secs(5)),
    );

    let err = proxy.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, QueryDeskError::PollingTimeout { .. }));
    assert_eq!(err.http_status(), 504);

    let polls = engine.status_calls();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(engine.status_calls(), polls);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_independent() {
    let engine = Arc::new(MockQueryEngine::demo());
    let proxy = QueryProxy::new(
        engine.clone(),
        OUTPUT,
        PollingConfig::new(Duration::from_millis(500), Duration::from_secs(30)),
    );

    let queries: Vec<String> = (0..5).map(|i| format!("SELECT {i}")).collect();
    let results =
        futures::future::join_all(queries.iter().map(|sql| proxy.execute(sql))).await;

    for (sql, result) in queries.iter().zip(results) {
        let result = result.unwrap();
        assert_eq!(
            result.rows[0][0],
            Value::String(format!("Mock result for: {sql}"))
        );
    }
    assert_eq!(engine.start_calls(), 5);
    assert_eq!(engine.status_calls(), 15);
}
