//! Router tests against an in-memory Athena.

use std::sync::Arc;

use athenaviz_athena::testing::{execution, MockAthenaApi, MockProvider};
use athenaviz_athena::{AthenaColumn, AthenaConfig, AthenaQueryResult, AthenaResources, QueryRunner};
use athenaviz_server::{build_router, AppState};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn mock() -> MockAthenaApi {
    let done = Some(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
    MockAthenaApi::new()
        .with_work_group("primary", Some(1_000_000))
        .with_named_query(Some("primary"), "errors", "SELECT ts, n FROM errors")
        .with_execution(execution("e1", "SELECT ts, n FROM errors", "primary", "SUCCEEDED", done))
        .with_result(
            "e1",
            AthenaQueryResult {
                columns: vec![AthenaColumn::new("ts", "timestamp"), AthenaColumn::new("n", "bigint")],
                rows: vec![vec![Some("2024-05-01 08:00:00.000".into()), Some("7".into())]],
            },
        )
}

fn app(api: MockAthenaApi) -> axum::Router {
    let provider = Arc::new(MockProvider::new(Arc::new(api)));
    let config = AthenaConfig {
        wait_interval_ms: 0,
        ..AthenaConfig::default()
    };
    let state = AppState::new(
        Arc::new(AthenaResources::new(provider.clone(), config.clone())),
        Arc::new(QueryRunner::new(provider, config)),
        "us-east-1",
    );
    build_router(Arc::new(state), "*")
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = send(app(mock()), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok", "message": "Data source is working"}));
}

#[tokio::test]
async fn resources_are_keyed_by_name() {
    let (status, body) = send(
        app(mock()),
        get("/resources/named_query_names?region=default&workGroup=primary"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"named_query_names": ["errors"]}));

    let (status, body) = send(
        app(mock()),
        get("/resources/query_execution_ids?region=us-east-1&limit=-1&pattern=errors&to=2024-05-01T12:00:00.000Z"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"query_execution_ids": ["e1"]}));
}

#[tokio::test]
async fn resource_failures_are_400_with_error() {
    let (status, body) = send(app(mock()), get("/resources/query_executions?pattern=.*")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing parameter: limit");

    let (status, body) = send(app(mock()), get("/resources/tables")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown resource: tables");
}

#[tokio::test]
async fn query_returns_results_per_ref_id() {
    let request = json!({
        "from": "1714550400000",
        "to": "1714572000000",
        "queries": [
            {"refId": "A", "format": "table", "inputs": [{"queryExecutionId": "e1"}]},
            {"refId": "B", "format": "timeserie", "inputs": [{"queryExecutionId": "e1"}], "timestampColumn": "ts", "valueColumn": "missing"}
        ]
    });
    let (status, body) = send(
        app(mock()),
        Request::builder()
            .method("POST")
            .uri("/query")
            .header("content-type", "application/json")
            .body(Body::from(request.to_string()))
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"]["A"]["tables"][0]["rows"], json!([[1714550400000i64, 7]]));
    assert!(body["results"]["B"]["error"].as_str().unwrap().contains("missing"));
}
