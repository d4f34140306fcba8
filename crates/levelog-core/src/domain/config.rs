//! Logger configuration and rotation policy

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::record::OutputFormat;
use super::severity::Severity;
use crate::error::{LogError, Result};

/// Default rotation interval (one day).
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default retention window (30 days).
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Shortest accepted rotation interval.
const MIN_ROTATION_INTERVAL: Duration = Duration::from_secs(60);

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Rotation and retention parameters for one file stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Directory holding the stream's files
    pub directory: PathBuf,
    /// Stream name, e.g. `error`, `access`, `sql`
    pub base_name: String,
    /// Length of one rotation period
    pub interval: Duration,
    /// Files whose period ended longer ago than this are purged
    pub retention: Duration,
    /// Stable alias file name pointing at the active file
    pub alias: String,
}

impl RotationPolicy {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        let base_name = base_name.into();
        Self {
            directory: directory.into(),
            alias: format!("{}.log", base_name),
            base_name,
            interval: DEFAULT_ROTATION_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    fn interval_secs(&self) -> i64 {
        self.interval.as_secs().max(1) as i64
    }

    fn is_daily(&self) -> bool {
        self.interval.as_secs() % SECS_PER_DAY == 0
    }

    /// Start of the rotation period containing `now`, in local wall time.
    ///
    /// Periods are aligned to the local epoch, so a 24h interval starts at
    /// local midnight.
    pub fn period_start(&self, now: DateTime<Local>) -> NaiveDateTime {
        let naive = now.naive_local();
        let secs = naive.and_utc().timestamp();
        let start = secs - secs.rem_euclid(self.interval_secs());
        DateTime::from_timestamp(start, 0)
            .map(|d| d.naive_utc())
            .unwrap_or(naive)
    }

    /// File name for the period starting at `start`.
    pub fn file_name_for(&self, start: NaiveDateTime) -> String {
        if self.is_daily() {
            format!("{}_{}.log", self.base_name, start.format("%Y%m%d"))
        } else {
            format!("{}_{}.log", self.base_name, start.format("%Y%m%d_%H%M"))
        }
    }

    pub fn path_for(&self, start: NaiveDateTime) -> PathBuf {
        self.directory.join(self.file_name_for(start))
    }

    pub fn alias_path(&self) -> PathBuf {
        self.directory.join(&self.alias)
    }

    /// Parse the period start back out of a file name produced by
    /// [`RotationPolicy::file_name_for`]. Returns `None` for foreign files.
    pub fn parse_period(&self, file_name: &str) -> Option<NaiveDateTime> {
        let stamp = file_name
            .strip_prefix(self.base_name.as_str())?
            .strip_prefix('_')?
            .strip_suffix(".log")?;
        match stamp.len() {
            8 => NaiveDate::parse_from_str(stamp, "%Y%m%d")
                .ok()?
                .and_hms_opt(0, 0, 0),
            13 => NaiveDateTime::parse_from_str(stamp, "%Y%m%d_%H%M").ok(),
            _ => None,
        }
    }

    /// Whether the period starting at `start` is past the retention window.
    pub fn is_expired(&self, start: NaiveDateTime, now: DateTime<Local>) -> bool {
        let Ok(interval) = chrono::Duration::from_std(self.interval) else {
            return false;
        };
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return false;
        };
        start + interval + retention <= now.naive_local()
    }
}

/// Process-level logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Directory holding every stream
    pub directory: PathBuf,
    /// Records below this severity are dropped
    pub min_severity: Severity,
    #[serde(with = "duration_serde")]
    pub rotation_interval: Duration,
    #[serde(with = "duration_serde")]
    pub retention: Duration,
    pub format: OutputFormat,
    /// Duplicate every record to stdout
    pub console: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            min_severity: Severity::Info,
            rotation_interval: DEFAULT_ROTATION_INTERVAL,
            retention: DEFAULT_RETENTION,
            format: OutputFormat::Json,
            console: true,
        }
    }
}

impl LoggerConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn with_min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = severity;
        self
    }

    pub fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Build a configuration from `LEVELOG_*` environment variables, falling
    /// back to defaults for anything unset.
    ///
    /// - `LEVELOG_DIR` - log directory
    /// - `LEVELOG_LEVEL` - minimum severity
    /// - `LEVELOG_ROTATION` / `LEVELOG_RETENTION` - durations such as `24h`, `30d`
    /// - `LEVELOG_FORMAT` - `json` or `text`
    /// - `LEVELOG_CONSOLE` - `true`/`false`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(dir) = lookup("LEVELOG_DIR") {
            config.directory = PathBuf::from(dir);
        }
        if let Some(level) = lookup("LEVELOG_LEVEL") {
            config.min_severity = Severity::parse(&level)
                .ok_or_else(|| LogError::InvalidConfig(format!("unknown level: {}", level)))?;
        }
        if let Some(rotation) = lookup("LEVELOG_ROTATION") {
            config.rotation_interval = parse_duration(&rotation)?;
        }
        if let Some(retention) = lookup("LEVELOG_RETENTION") {
            config.retention = parse_duration(&retention)?;
        }
        if let Some(format) = lookup("LEVELOG_FORMAT") {
            config.format = OutputFormat::parse(&format)
                .ok_or_else(|| LogError::InvalidConfig(format!("unknown format: {}", format)))?;
        }
        if let Some(console) = lookup("LEVELOG_CONSOLE") {
            config.console = parse_bool(&console)
                .ok_or_else(|| LogError::InvalidConfig(format!("invalid console flag: {}", console)))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(LogError::InvalidConfig("log directory is empty".into()));
        }
        if self.rotation_interval < MIN_ROTATION_INTERVAL {
            return Err(LogError::InvalidConfig(format!(
                "rotation interval {:?} is shorter than {:?}",
                self.rotation_interval, MIN_ROTATION_INTERVAL
            )));
        }
        if self.retention.is_zero() {
            return Err(LogError::InvalidConfig("retention must be positive".into()));
        }
        Ok(())
    }

    /// Rotation policy for the stream named `base_name` under this config.
    pub fn policy_for(&self, base_name: &str) -> RotationPolicy {
        RotationPolicy::new(&self.directory, base_name)
            .with_interval(self.rotation_interval)
            .with_retention(self.retention)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `250ms`, `10s`, `15m`, `24h` or `30d`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let invalid = || LogError::InvalidConfig(format!("invalid duration: {:?}", s));

    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: u64 = number.parse().map_err(|_| invalid())?;
    if unit == "ms" {
        return Ok(Duration::from_millis(value));
    }
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => SECS_PER_DAY,
        _ => return Err(invalid()),
    };
    value
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Render a duration in the largest whole unit accepted by [`parse_duration`].
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_nanos() != 0 {
        format!("{}ms", d.as_millis())
    } else if secs != 0 && secs % SECS_PER_DAY == 0 {
        format!("{}d", secs / SECS_PER_DAY)
    } else if secs != 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs != 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

pub mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
