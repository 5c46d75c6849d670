//! The local SQLite engine behind the full proxy, seeded with the demo schema.

use std::sync::Arc;
use std::time::Duration;

use querydesk::config::PollingConfig;
use querydesk::engine::{ExecutionStatus, LocalQueryEngine, Value};
use querydesk::error::QueryDeskError;
use querydesk::proxy::QueryProxy;

const SEED: &str = include_str!("../../demos/seed.sql");

async fn seeded_proxy(dir: &tempfile::TempDir) -> QueryProxy {
    let engine = LocalQueryEngine::connect("sqlite::memory:").await.unwrap();
    engine.execute_script(SEED).await.unwrap();

    let location = url::Url::from_directory_path(dir.path()).unwrap().to_string();
    QueryProxy::new(
        Arc::new(engine),
        location,
        PollingConfig::new(Duration::from_millis(10), Duration::from_secs(10)),
    )
}

#[tokio::test]
async fn test_count_laboratory_procedures() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = seeded_proxy(&dir).await;

    let result = proxy
        .execute("SELECT COUNT(*) AS procedure_count FROM procedures WHERE category = 'laboratory'")
        .await
        .unwrap();

    assert_eq!(result.columns[0].name, "procedure_count");
    assert_eq!(result.rows, vec![vec![Value::Int(3)]]);

    let written: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].extension().and_then(|e| e.to_str()), Some("json"));
}

#[tokio::test]
async fn test_join_uninsured_with_customer_names() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = seeded_proxy(&dir).await;

    let result = proxy
        .execute(
            "SELECT p.procedure_name, c.customer_name FROM procedures p \
             JOIN customers c ON p.customer_id = c.cust_id \
             WHERE p.insured = 0 ORDER BY p.procedure_id",
        )
        .await
        .unwrap();

    assert_eq!(result.row_count, 4);
    assert_eq!(
        result.rows[0],
        vec![
            Value::String("CT Abdomen".to_string()),
            Value::String("Ben Carter".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_bad_sql_surfaces_failed_status() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = seeded_proxy(&dir).await;

    let err = proxy.execute("SELECT * FROM claims").await.unwrap_err();

    match err {
        QueryDeskError::QueryExecution { status, reason } => {
            assert_eq!(status, ExecutionStatus::Failed);
            assert!(reason.unwrap().contains("claims"));
        }
        other => panic!("Expected QueryExecution, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_file_location_is_rejected() {
    let engine = LocalQueryEngine::connect("sqlite::memory:").await.unwrap();
    let proxy = QueryProxy::new(
        Arc::new(engine),
        "store://athena-destination-store/results/",
        PollingConfig::default(),
    );

    let err = proxy.execute("SELECT 1").await.unwrap_err();
    assert!(matches!(err, QueryDeskError::Submission(_)));
}
