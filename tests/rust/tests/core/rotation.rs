//! Rotation boundary and retention through the logger

use levelog_core::{Channel, LogContext, LoggerConfig, Logger, ManualClock, Severity};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tests::logs::{local, read_records, TestLogDir};

#[test]
fn test_write_before_and_after_midnight_split_files() {
    let dir = TestLogDir::new();
    let (logger, clock) = dir.logger_with_clock(Severity::Info, local(2026, 6, 30, 23, 59, 59));
    let ctx = LogContext::new();

    logger.info(&ctx, "before", []);
    clock.set(local(2026, 7, 1, 0, 0, 0));
    logger.info(&ctx, "after", []);
    logger.flush().unwrap();

    let before = read_records(&dir.path().join("info_20260630.log"));
    let after = read_records(&dir.path().join("info_20260701.log"));
    assert_eq!(before.len(), 1);
    assert_eq!(before[0]["msg"], "before");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0]["msg"], "after");
}

#[cfg(unix)]
#[test]
fn test_alias_points_at_current_file() {
    let dir = TestLogDir::new();
    let (logger, clock) = dir.logger_with_clock(Severity::Info, local(2026, 6, 30, 12, 0, 0));

    logger.info(&LogContext::new(), "day one", []);
    clock.set(local(2026, 7, 1, 12, 0, 0));
    logger.info(&LogContext::new(), "day two", []);
    logger.flush().unwrap();

    let target = std::fs::read_link(dir.path().join("info.log")).unwrap();
    assert_eq!(target.file_name().unwrap(), "info_20260701.log");
    let via_alias = read_records(&dir.path().join("info.log"));
    assert_eq!(via_alias[0]["msg"], "day two");
}

#[test]
fn test_hourly_rotation_file_names() {
    let dir = TestLogDir::new();
    let clock = Arc::new(ManualClock::new(local(2026, 3, 2, 9, 15, 0)));
    let config = dir
        .config(Severity::Info)
        .with_rotation_interval(Duration::from_secs(3600));
    let logger = Logger::builder(config).clock(clock.clone()).build().unwrap();

    logger.info(&LogContext::new(), "nine", []);
    clock.advance(Duration::from_secs(3600));
    logger.info(&LogContext::new(), "ten", []);
    logger.flush().unwrap();

    let names: Vec<String> = dir
        .stream_files("info")
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["info_20260302_0900.log", "info_20260302_1000.log"]);
}

#[test]
fn test_expired_files_are_purged_on_rotation() {
    let dir = TestLogDir::new();
    std::fs::write(dir.path().join("error_20260101.log"), "{}\n").unwrap();
    std::fs::write(dir.path().join("error_20260320.log"), "{}\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

    let clock = Arc::new(ManualClock::new(local(2026, 3, 25, 8, 0, 0)));
    let config = LoggerConfig::new(dir.path())
        .with_console(false)
        .with_retention(Duration::from_secs(30 * 24 * 3600));
    let logger = Logger::builder(config).clock(clock).build().unwrap();

    logger.error(&LogContext::new(), "trigger rotation", []);
    logger.flush().unwrap();

    assert!(!dir.path().join("error_20260101.log").exists());
    assert!(dir.path().join("error_20260320.log").exists());
    assert!(dir.path().join("notes.txt").exists());
    assert!(logger
        .current_path(Channel::Level(Severity::Error))
        .unwrap()
        .ends_with("error_20260325.log"));
}

#[test]
fn test_manual_rotate_and_purge() {
    let dir = TestLogDir::new();
    let (logger, clock) = dir.logger_with_clock(Severity::Info, local(2026, 1, 10, 10, 0, 0));

    logger.info(&LogContext::new(), "first", []);
    assert_eq!(logger.rotate().unwrap(), 0);

    clock.set(local(2026, 1, 11, 10, 0, 0));
    assert_eq!(logger.rotate().unwrap(), 1);
    assert!(logger
        .current_path(Channel::Level(Severity::Info))
        .unwrap()
        .ends_with("info_20260111.log"));

    // Past the default 30 day retention of the first day's file
    clock.set(local(2026, 2, 20, 10, 0, 0));
    assert_eq!(logger.purge().unwrap(), 1);
    assert!(!dir.path().join("info_20260110.log").exists());
}
