//! Action envelope handling through the router.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use querydesk::action::ActionRouter;
use querydesk::config::PollingConfig;
use querydesk::engine::{ColumnInfo, ExecutionStatus, MockQueryEngine, QueryResult, Value};
use querydesk::proxy::QueryProxy;
use serde_json::json;

fn router(engine: MockQueryEngine) -> ActionRouter {
    let proxy = QueryProxy::new(
        Arc::new(engine),
        "store://athena-destination-store/results/",
        PollingConfig::new(Duration::from_secs(1), Duration::from_secs(10)),
    );
    ActionRouter::new(proxy, "/athenaQuery")
}

fn event(api_path: &str, query: &str) -> String {
    json!({
        "messageVersion": "1.0",
        "sessionId": "MYSESSION",
        "actionGroup": "querydesk",
        "apiPath": api_path,
        "httpMethod": "POST",
        "parameters": [],
        "requestBody": {
            "content": {
                "application/json": {
                    "properties": [
                        { "name": "query", "type": "string", "value": query }
                    ]
                }
            }
        }
    })
    .to_string()
}

#[tokio::test(start_paused = true)]
async fn test_query_envelope_round_trip() {
    let engine = MockQueryEngine::demo().with_result(QueryResult::with_data(
        vec![ColumnInfo::new("procedure_count", "bigint")],
        vec![vec![Value::Int(3)]],
    ));

    let response = router(engine)
        .handle_json(&event(
            "/athenaQuery",
            "SELECT COUNT(*) AS procedure_count FROM procedures WHERE category = 'laboratory'",
        ))
        .await;

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["messageVersion"], json!("1.0"));
    assert_eq!(value["response"]["actionGroup"], json!("querydesk"));
    assert_eq!(value["response"]["apiPath"], json!("/athenaQuery"));
    assert_eq!(value["response"]["httpMethod"], json!("POST"));
    assert_eq!(value["response"]["httpStatusCode"], json!(200));

    let body = &value["response"]["responseBody"]["application/json"]["body"];
    assert_eq!(body["rows"], json!([[3]]));
    assert_eq!(body["row_count"], json!(1));
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let engine = MockQueryEngine::new();
    let response = router(engine).handle_json(&event("/unknown", "SELECT 1")).await;

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(
        value["response"],
        json!({
            "actionGroup": "querydesk",
            "apiPath": "/unknown",
            "httpMethod": "POST",
            "httpStatusCode": 404,
            "responseBody": {
                "application/json": {
                    "body": { "error": "Unrecognized api path: querydesk::/unknown" }
                }
            }
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_execution_is_reported() {
    let engine = MockQueryEngine::new().with_statuses([
        ExecutionStatus::Queued,
        ExecutionStatus::Cancelled,
    ]);
    let response = router(engine)
        .handle_json(&event("/athenaQuery", "SELECT 1"))
        .await;

    assert_eq!(response.status(), 502);
    let body = response.body().unwrap();
    assert_eq!(body["status"], json!("CANCELLED"));
    assert_eq!(body["kind"], json!("Query Execution Error"));
}

#[tokio::test]
async fn test_rejected_submission_is_400() {
    let engine = MockQueryEngine::new().rejecting("Output location bucket does not exist");
    let response = router(engine)
        .handle_json(&event("/athenaQuery", "SELECT 1"))
        .await;

    assert_eq!(response.status(), 400);
    let error = response.body().unwrap()["error"].as_str().unwrap();
    assert!(error.contains("Output location bucket does not exist"));
}
