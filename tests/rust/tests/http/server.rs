//! Demo server routes end to end

use axum::http::StatusCode;
use levelog_core::{Logger, Severity};
use levelog_http::AccessLog;
use levelog_server::{build_router, open_database_in_memory, AppState};
use levelog_sql::{SqlLogger, SqlLoggerConfig};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use tests::http::{body_string, get, post_json};
use tests::logs::TestLogDir;
use tower::ServiceExt;

fn server(logger: &Logger) -> (axum::Router, AccessLog) {
    let query_logger = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());
    let db = open_database_in_memory(Arc::new(query_logger)).unwrap();
    let access = AccessLog::new(logger.clone());
    (build_router(AppState::new(db), access.clone()), access)
}

#[tokio::test]
async fn test_create_then_fetch_item() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Debug);
    let (app, access_log) = server(&logger);

    let created = app
        .clone()
        .oneshot(post_json("/items", &json!({ "name": "lamp" })))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let fetched = app.oneshot(get("/items/1")).await.unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(fetched).await).unwrap();
    assert_eq!(body, json!({ "id": 1, "name": "lamp" }));
    access_log.settle().await;
    logger.flush().unwrap();

    assert_eq!(dir.stream_lines("access").len(), 2);

    // Schema, insert and select, all at debug
    let queries = dir.stream_lines("sql");
    assert_eq!(queries.len(), 3);
    assert!(queries.iter().all(|q| q["level"] == "DEBUG"));

    // Insert and select each ran inside their own request
    let access = dir.stream_lines("access");
    assert_ne!(queries[1]["trace_id"], queries[2]["trace_id"]);
    for query in &queries[1..] {
        assert!(access.iter().any(|a| a["trace_id"] == query["trace_id"]));
    }
}

#[tokio::test]
async fn test_missing_item_is_404_without_error_records() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);

    let (app, access_log) = server(&logger);
    let response = app.oneshot(get("/items/99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    access_log.settle().await;
    logger.flush().unwrap();

    assert!(dir.stream_files("error").is_empty());
    assert!(dir.stream_files("sql").is_empty());
    let access = dir.stream_lines("access");
    assert_eq!(access.len(), 1);
    assert_eq!(access[0]["status"], 404);
}

#[tokio::test]
async fn test_fail_route_records_both_errors() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);

    let (app, access_log) = server(&logger);
    let response = app.oneshot(get("/fail")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    access_log.settle().await;
    logger.flush().unwrap();

    assert_eq!(dir.stream_lines("error").len(), 2);
    assert!(dir.stream_files("access").is_empty());
}

#[tokio::test]
async fn test_empty_name_is_rejected() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);

    let (app, access_log) = server(&logger);
    let response = app
        .oneshot(post_json("/items", &json!({ "name": "  " })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    access_log.settle().await;
    logger.flush().unwrap();

    let errors = dir.stream_lines("error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["error"], "item name is empty");
    assert_eq!(errors[0]["status"], 400);
}
