//! Log record types and line encoding

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::panic::Location;
use std::time::Duration;

use super::correlation::CorrelationToken;
use super::severity::Severity;

/// Timestamp layout used by both encoders (local time, millisecond precision).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Keys owned by the record itself. User fields with these names are
/// written as `field.<key>`.
const RESERVED_KEYS: [&str; 6] = ["ts", "level", "caller", "msg", "trace_id", "error"];

fn field_key(key: &str) -> Cow<'_, str> {
    if RESERVED_KEYS.contains(&key) {
        Cow::Owned(format!("field.{}", key))
    } else {
        Cow::Borrowed(key)
    }
}

/// Typed value of a structured field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Duration(Duration),
}

impl FieldValue {
    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::I64(n) => serde_json::Value::from(*n),
            Self::U64(n) => serde_json::Value::from(*n),
            Self::F64(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Duration(d) => serde_json::Value::String(format!("{:?}", d)),
        }
    }

    fn to_text(&self) -> String {
        match self {
            Self::Str(s) => quote_if_needed(s),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::I64(n) => write!(f, "{}", n),
            Self::U64(n) => write!(f, "{}", n),
            Self::F64(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Duration(d) => write!(f, "{:?}", d),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::I64(value.into())
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        Self::U64(value.into())
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        Self::U64(value as u64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Duration> for FieldValue {
    fn from(value: Duration) -> Self {
        Self::Duration(value)
    }
}

/// A single structured `(key, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: Cow<'static, str>,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<FieldValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Source location a record is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerLocation {
    Known { file: String, line: u32 },
    /// Application function found, but the binary carries no line tables.
    Function(String),
    /// Attribution was attempted but no trustworthy frame was found.
    Unknown,
}

impl CallerLocation {
    pub fn from_location(location: &Location<'_>) -> Self {
        Self::Known {
            file: location.file().to_string(),
            line: location.line(),
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known { .. })
    }
}

impl fmt::Display for CallerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known { file, line } => write!(f, "{}:{}", short_path(file), line),
            Self::Function(symbol) => f.write_str(symbol),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Trim a source path to its last two components (`dir/file.rs`).
fn short_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches(['/', '\\']);
    let mut seps = trimmed.rmatch_indices(['/', '\\']);
    match (seps.next(), seps.next()) {
        (Some(_), Some((idx, _))) => &trimmed[idx + 1..],
        _ => trimmed,
    }
}

/// Line encoding of records.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Tab separated human-readable text with `key=value` fields.
    Text,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" | "console" | "logfmt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// A fully built log record.
///
/// Fields are private and only exposed through getters, so a record handed
/// to a writer can no longer change.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    severity: Severity,
    message: String,
    fields: Vec<Field>,
    token: Option<CorrelationToken>,
    caller: Option<CallerLocation>,
    error: Option<String>,
}

impl LogRecord {
    pub fn new(timestamp: DateTime<Local>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            severity,
            message: message.into(),
            fields: Vec::new(),
            token: None,
            caller: None,
            error: None,
        }
    }

    pub fn with_fields(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_token(mut self, token: Option<CorrelationToken>) -> Self {
        self.token = token;
        self
    }

    pub fn with_caller(mut self, caller: Option<CallerLocation>) -> Self {
        self.caller = caller;
        self
    }

    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.value)
    }

    pub fn token(&self) -> Option<&CorrelationToken> {
        self.token.as_ref()
    }

    pub fn caller(&self) -> Option<&CallerLocation> {
        self.caller.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Encode as a single newline-terminated line.
    pub fn encode(&self, format: OutputFormat) -> Vec<u8> {
        let mut line = match format {
            OutputFormat::Json => self.encode_json(),
            OutputFormat::Text => self.encode_text(),
        };
        line.push('\n');
        line.into_bytes()
    }

    fn encode_json(&self) -> String {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "ts".into(),
            self.timestamp.format(TIMESTAMP_FORMAT).to_string().into(),
        );
        obj.insert("level".into(), self.severity.as_upper().into());
        if let Some(caller) = &self.caller {
            obj.insert("caller".into(), caller.to_string().into());
        }
        obj.insert("msg".into(), self.message.clone().into());
        if let Some(token) = &self.token {
            obj.insert("trace_id".into(), token.as_str().into());
        }
        for field in &self.fields {
            obj.insert(field_key(&field.key).into_owned(), field.value.to_json());
        }
        if let Some(error) = &self.error {
            obj.insert("error".into(), error.clone().into());
        }
        // A map of plain JSON values always serializes.
        serde_json::to_string(&obj).unwrap_or_default()
    }

    fn encode_text(&self) -> String {
        let mut out = format!(
            "{}\t{}\t{}\t{}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.severity.as_upper(),
            self.caller
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            self.message.replace('\n', "\\n"),
        );
        let mut pairs = Vec::with_capacity(self.fields.len() + 2);
        if let Some(token) = &self.token {
            pairs.push(format!("trace_id={}", token));
        }
        for field in &self.fields {
            pairs.push(format!("{}={}", field_key(&field.key), field.value.to_text()));
        }
        if let Some(error) = &self.error {
            pairs.push(format!("error={}", quote_if_needed(error)));
        }
        if !pairs.is_empty() {
            out.push('\t');
            out.push_str(&pairs.join(" "));
        }
        out
    }
}

fn quote_if_needed(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '=' || c == '"') {
        format!("{:?}", s)
    } else {
        s.to_string()
    }
}
