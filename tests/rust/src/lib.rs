//! Shared test utilities and fixtures for Levelog integration tests.

pub use levelog_core::{LogContext, Logger, LoggerConfig, Severity};

/// Log directory fixtures
pub mod logs {
    use chrono::{DateTime, Local, TimeZone};
    use levelog_core::{Logger, LoggerConfig, ManualClock, Severity};
    use serde_json::Value;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// A temporary log directory and helpers to read its streams.
    pub struct TestLogDir {
        temp_dir: TempDir,
    }

    impl TestLogDir {
        pub fn new() -> Self {
            Self {
                temp_dir: TempDir::new().expect("Failed to create temp dir"),
            }
        }

        pub fn path(&self) -> &Path {
            self.temp_dir.path()
        }

        /// Config for this directory with console output off.
        pub fn config(&self, min: Severity) -> LoggerConfig {
            LoggerConfig::new(self.path())
                .with_min_severity(min)
                .with_console(false)
        }

        pub fn logger(&self, min: Severity) -> Logger {
            Logger::new(self.config(min)).expect("Failed to build logger")
        }

        /// Logger driven by a manual clock starting at `start`.
        pub fn logger_with_clock(&self, min: Severity, start: DateTime<Local>) -> (Logger, Arc<ManualClock>) {
            let clock = Arc::new(ManualClock::new(start));
            let logger = Logger::builder(self.config(min))
                .clock(clock.clone())
                .build()
                .expect("Failed to build logger");
            (logger, clock)
        }

        /// Dated files of the `base` stream, sorted by name. The alias is
        /// not included.
        pub fn stream_files(&self, base: &str) -> Vec<PathBuf> {
            let prefix = format!("{}_", base);
            let mut files: Vec<PathBuf> = std::fs::read_dir(self.path())
                .expect("Failed to read log dir")
                .map(|e| e.expect("Failed to read dir entry").path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".log"))
                })
                .collect();
            files.sort();
            files
        }

        /// Every JSON record of the `base` stream, oldest file first.
        pub fn stream_lines(&self, base: &str) -> Vec<Value> {
            self.stream_files(base)
                .iter()
                .flat_map(|p| read_records(p))
                .collect()
        }

        /// Number of entries in the directory, aliases included.
        pub fn entry_count(&self) -> usize {
            std::fs::read_dir(self.path())
                .expect("Failed to read log dir")
                .count()
        }
    }

    impl Default for TestLogDir {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Parse a file of JSON lines.
    pub fn read_records(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .expect("Failed to read log file")
            .lines()
            .map(|l| serde_json::from_str(l).expect("Log line is not JSON"))
            .collect()
    }

    /// Local time helper for clock fixtures.
    pub fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(y, mo, d, h, mi, s)
            .single()
            .expect("Ambiguous local time")
    }
}

/// HTTP request helpers
pub mod http {
    use axum::body::Body;
    use axum::http::{Method, Request};
    use axum::response::Response;
    use http_body_util::BodyExt;

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request")
    }

    pub fn post_json(uri: &str, json: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("Failed to build request")
    }

    pub async fn body_string(response: Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
    }
}
