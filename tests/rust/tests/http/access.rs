//! Access-log middleware against an axum router

use axum::{http::StatusCode, middleware, routing::get, Router};
use levelog_core::Severity;
use levelog_http::{
    access_log_middleware, correlation_middleware, record_error, AccessLog, HandlerError,
    RequestContext,
};
use pretty_assertions::assert_eq;
use tests::http::{body_string, get as get_request};
use tests::logs::TestLogDir;
use tower::ServiceExt;

fn app(access: AccessLog) -> Router {
    Router::new()
        .route("/ok", get(|| async { "fine" }))
        .route(
            "/boom",
            get(|| async {
                Err::<(), _>(HandlerError::new("payment gateway timeout").and("retry budget exhausted"))
            }),
        )
        .route(
            "/partial",
            get(|| async {
                let mut response = axum::response::IntoResponse::into_response("degraded");
                record_error(&mut response, "recommendations unavailable");
                response
            }),
        )
        .route(
            "/token",
            get(|RequestContext(ctx): RequestContext| async move {
                ctx.token().map(|t| t.to_string()).unwrap_or_default()
            }),
        )
        .layer(middleware::from_fn_with_state(access, access_log_middleware))
        .layer(middleware::from_fn(correlation_middleware))
}

#[tokio::test]
async fn test_500_with_two_errors_writes_two_error_records() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let access = AccessLog::new(logger.clone());

    let response = app(access.clone()).oneshot(get_request("/boom")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    access.settle().await;
    logger.flush().unwrap();

    let errors = dir.stream_lines("error");
    assert_eq!(errors.len(), 2);
    assert!(dir.stream_lines("access").is_empty());

    for key in ["status", "method", "path", "query", "ip", "user_agent", "elapsed", "trace_id"] {
        assert_eq!(errors[0][key], errors[1][key], "shared field {}", key);
    }
    assert_eq!(errors[0]["status"], 500);
    assert_eq!(errors[0]["method"], "GET");
    assert_eq!(errors[0]["path"], "/boom");
    assert_eq!(errors[0]["error"], "payment gateway timeout");
    assert_eq!(errors[1]["error"], "retry budget exhausted");
}

#[tokio::test]
async fn test_successful_request_writes_one_access_record() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let access = AccessLog::new(logger.clone());

    let response = app(access.clone())
        .oneshot(get_request("/ok?verbose=1"))
        .await
        .unwrap();
    assert_eq!(body_string(response).await, "fine");
    access.settle().await;
    logger.flush().unwrap();

    let records = dir.stream_lines("access");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "INFO");
    assert_eq!(records[0]["status"], 200);
    assert_eq!(records[0]["query"], "verbose=1");
    assert!(records[0]["trace_id"].is_string());
    assert!(dir.stream_files("error").is_empty());
    assert!(dir.stream_files("info").is_empty());
}

#[tokio::test]
async fn test_errors_recorded_on_success_status_still_go_to_error_stream() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let access = AccessLog::new(logger.clone());

    let response = app(access.clone()).oneshot(get_request("/partial")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    access.settle().await;
    logger.flush().unwrap();

    let errors = dir.stream_lines("error");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["status"], 200);
    assert!(dir.stream_files("access").is_empty());
}

#[tokio::test]
async fn test_access_record_carries_request_token() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let access = AccessLog::new(logger.clone());

    let response = app(access.clone()).oneshot(get_request("/token")).await.unwrap();
    let token = body_string(response).await;
    access.settle().await;
    logger.flush().unwrap();

    let records = dir.stream_lines("access");
    assert_eq!(records[0]["trace_id"], token.as_str());
}

#[tokio::test]
async fn test_access_filtered_below_minimum() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Warn);
    let access = AccessLog::new(logger.clone());

    app(access.clone()).oneshot(get_request("/ok")).await.unwrap();
    access.settle().await;
    logger.flush().unwrap();

    assert_eq!(dir.entry_count(), 0);
}
