//! Outcome classification of finished queries

use levelog_core::{CorrelationToken, LogContext, Severity};
use levelog_sql::{QueryError, QueryLogger, SqlLogger, SqlLoggerConfig};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::time::{Duration, Instant};
use tests::logs::TestLogDir;

fn started(ago_ms: u64) -> Instant {
    Instant::now()
        .checked_sub(Duration::from_millis(ago_ms))
        .expect("Clock too close to boot")
}

fn update() -> (String, i64) {
    ("UPDATE accounts SET balance = balance - 10 WHERE id = 3".to_string(), 1)
}

#[test]
fn test_fast_success_at_info_is_not_written() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let adapter = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());

    let called = Cell::new(false);
    adapter.trace(
        &LogContext::new(),
        started(5),
        &|| {
            called.set(true);
            update()
        },
        None,
    );
    logger.flush().unwrap();

    assert!(!called.get(), "statement text built for a discarded record");
    assert!(dir.stream_files("sql").is_empty());
}

#[test]
fn test_fast_success_at_debug() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Debug);
    let adapter = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());

    let ctx = LogContext::new().attach(CorrelationToken::from_string("batch-12"));
    adapter.trace(&ctx, started(5), &update, None);
    logger.flush().unwrap();

    let records = dir.stream_lines("sql");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "DEBUG");
    assert_eq!(records[0]["msg"], "query executed");
    assert_eq!(records[0]["rows"], 1);
    assert_eq!(records[0]["trace_id"], "batch-12");
    assert!(records[0].get("caller").is_none());
}

#[test]
fn test_slow_success_is_a_warning_with_caller() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let adapter = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());

    adapter.trace(&LogContext::new(), started(350), &update, None);
    logger.flush().unwrap();

    let records = dir.stream_lines("sql");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "WARN");
    assert_eq!(records[0]["msg"], "slow query");
    assert!(records[0]["caller"].is_string());
    assert!(records[0]["elapsed"].is_string());
    // Only the sql stream receives query records
    assert!(dir.stream_files("warn").is_empty());
}

#[test]
fn test_failure_is_an_error_record() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let adapter = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());

    let err = QueryError::Other("database is locked".to_string());
    adapter.trace(&LogContext::new(), started(5), &update, Some(&err));
    logger.flush().unwrap();

    let records = dir.stream_lines("sql");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "ERROR");
    assert_eq!(records[0]["msg"], "query failed");
    assert_eq!(records[0]["error"], "database is locked");
    assert!(records[0]["caller"].is_string());
}

#[test]
fn test_suppressed_not_found_is_debug_only() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let adapter = SqlLogger::new(logger.clone(), SqlLoggerConfig::default());

    adapter.trace(
        &LogContext::new(),
        started(5),
        &update,
        Some(&QueryError::RecordNotFound),
    );
    logger.flush().unwrap();
    assert!(dir.stream_files("sql").is_empty());

    // Unsuppressed, the same miss is an error
    let strict = SqlLogger::new(
        logger.clone(),
        SqlLoggerConfig::default().with_ignore_record_not_found(false),
    );
    strict.trace(
        &LogContext::new(),
        started(5),
        &update,
        Some(&QueryError::RecordNotFound),
    );
    logger.flush().unwrap();

    let records = dir.stream_lines("sql");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["level"], "ERROR");
}

#[test]
fn test_zero_threshold_disables_slow() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let adapter = SqlLogger::new(
        logger.clone(),
        SqlLoggerConfig::default().with_slow_threshold(Duration::ZERO),
    );

    adapter.trace(&LogContext::new(), started(2_000), &update, None);
    logger.flush().unwrap();

    assert!(dir.stream_files("sql").is_empty());
}
