//! Severity filtering and stream isolation

use levelog_core::{Field, LogContext, Severity};
use pretty_assertions::assert_eq;
use tests::logs::TestLogDir;

#[test]
fn test_below_minimum_writes_zero_bytes() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Error);
    let ctx = LogContext::new();

    for severity in [Severity::Debug, Severity::Info, Severity::Warn] {
        logger.log(&ctx, severity, "filtered", [Field::new("n", 1i64)]);
    }
    logger.flush().unwrap();

    assert_eq!(dir.entry_count(), 0);
}

#[test]
fn test_records_only_reach_their_own_stream() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Debug);
    let ctx = LogContext::new();

    for (i, severity) in Severity::ALL.iter().enumerate() {
        for _ in 0..=i {
            logger.log(&ctx, *severity, "routed", []);
        }
    }
    logger.flush().unwrap();

    for (i, severity) in Severity::ALL.iter().enumerate() {
        let records = dir.stream_lines(severity.as_str());
        assert_eq!(records.len(), i + 1, "stream {}", severity);
        assert!(records.iter().all(|r| r["level"] == severity.as_upper()));
    }
    assert!(dir.stream_files("access").is_empty());
    assert!(dir.stream_files("sql").is_empty());
}

#[test]
fn test_token_present_only_when_attached() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);

    let with_token = LogContext::new().with_new_token();
    logger.info(&with_token, "correlated", []);
    logger.info(&LogContext::new(), "uncorrelated", []);
    logger.flush().unwrap();

    let records = dir.stream_lines("info");
    assert_eq!(records[0]["trace_id"], with_token.token().unwrap().as_str());
    assert!(records[1].get("trace_id").is_none());
}

#[test]
fn test_child_logger_shares_streams() {
    let dir = TestLogDir::new();
    let logger = dir.logger(Severity::Info);
    let child = logger.with_fields([Field::new("component", "billing")]);

    logger.info(&LogContext::new(), "parent", []);
    child.info(&LogContext::new(), "child", [Field::new("invoice", 12i64)]);
    logger.flush().unwrap();

    let records = dir.stream_lines("info");
    assert_eq!(records.len(), 2);
    assert!(records[0].get("component").is_none());
    assert_eq!(records[1]["component"], "billing");
    assert_eq!(records[1]["invoice"], 12);
}
