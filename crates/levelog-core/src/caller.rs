//! Caller attribution
//!
//! Bounded scan over a captured call stack that reports the first frame not
//! owned by a "library" (the query layer, this crate, the standard library).
//! Frames are captured with [`std::backtrace::Backtrace`] and parsed into
//! plain [`CallFrame`] values so the scan itself is a pure function.

use lazy_static::lazy_static;
use regex::Regex;
use std::backtrace::Backtrace;

use crate::domain::CallerLocation;

lazy_static! {
    static ref FRAME_LOCATION: Regex = Regex::new(r"^\s*at (.+):(\d+)(?::\d+)?\s*$").unwrap();
    static ref FRAME_SYMBOL: Regex = Regex::new(r"^\s*(?:\d+:\s+)?(.+?)\s*$").unwrap();
    static ref SYMBOL_HASH: Regex = Regex::new(r"::h[0-9a-f]{16}$").unwrap();
}

/// Default number of frames examined after the skipped ones.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// One frame of a call stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    pub symbol: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl CallFrame {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    fn location(&self) -> Option<CallerLocation> {
        Some(CallerLocation::Known {
            file: self.file.clone()?,
            line: self.line?,
        })
    }
}

/// Predicate deciding which frames belong to library code.
#[derive(Debug, Clone, Default)]
pub struct FrameFilter {
    path_fragments: Vec<String>,
    symbol_prefixes: Vec<String>,
}

impl FrameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching the Rust runtime and this module.
    pub fn runtime() -> Self {
        Self::new()
            .with_paths(["/rustc/", "/library/std/", "/library/core/", "/library/alloc/"])
            .with_symbol_prefixes([
                "std::",
                "core::",
                "alloc::",
                "backtrace::",
                "rust_begin_unwind",
                "__rust",
                "levelog_core::caller::",
            ])
    }

    /// Add source path fragments, e.g. `"/rusqlite-"`. Matching uses `/`
    /// separators on every platform.
    pub fn with_paths<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.path_fragments.extend(fragments.into_iter().map(Into::into));
        self
    }

    /// Add symbol prefixes, e.g. `"rusqlite::"`.
    pub fn with_symbol_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbol_prefixes.extend(prefixes.into_iter().map(Into::into));
        self
    }

    pub fn is_library(&self, frame: &CallFrame) -> bool {
        if let Some(file) = &frame.file {
            let normalized = file.replace('\\', "/");
            if self.path_fragments.iter().any(|f| normalized.contains(f.as_str())) {
                return true;
            }
        }
        // `<T as Trait>::method` symbols start with the implementing type
        let symbol = frame.symbol.trim_start_matches('<');
        self.symbol_prefixes.iter().any(|p| symbol.starts_with(p.as_str()))
    }
}

/// Find the first non-library frame.
///
/// Skips `skip` frames, then examines at most `max_depth` more. The first
/// non-library frame with a source location wins. Without line tables (a
/// stripped release build) the first non-library symbol is reported instead.
/// Gives up with [`CallerLocation::Unknown`] rather than guessing.
pub fn attribute<I>(frames: I, skip: usize, max_depth: usize, filter: &FrameFilter) -> CallerLocation
where
    I: IntoIterator<Item = CallFrame>,
{
    let mut by_symbol = None;

    for frame in frames.into_iter().skip(skip).take(max_depth) {
        if filter.is_library(&frame) {
            continue;
        }
        if let Some(location) = frame.location() {
            return location;
        }
        if by_symbol.is_none() {
            let symbol = SYMBOL_HASH.replace(&frame.symbol, "");
            by_symbol = Some(CallerLocation::Function(symbol.into_owned()));
        }
    }

    by_symbol.unwrap_or(CallerLocation::Unknown)
}

/// Capture the current thread's stack as frames, innermost first.
///
/// Requires debug info for file/line data; without it every frame lacks a
/// location and attribution yields `Unknown`.
pub fn capture_frames() -> Vec<CallFrame> {
    parse_backtrace(&Backtrace::force_capture().to_string())
}

/// Capture the stack and attribute it in one step.
pub fn capture_caller(skip: usize, max_depth: usize, filter: &FrameFilter) -> CallerLocation {
    attribute(capture_frames(), skip, max_depth, filter)
}

/// Parse the textual form of a [`Backtrace`].
///
/// Each symbol line starts a frame (inlined symbols become frames of their
/// own); an `at file:line:col` line fills in the location of the frame above.
pub fn parse_backtrace(text: &str) -> Vec<CallFrame> {
    let mut frames: Vec<CallFrame> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = FRAME_LOCATION.captures(line) {
            if let Some(frame) = frames.last_mut() {
                frame.file = Some(caps[1].to_string());
                frame.line = caps[2].parse().ok();
            }
            continue;
        }
        if let Some(caps) = FRAME_SYMBOL.captures(line) {
            frames.push(CallFrame::new(&caps[1]));
        }
    }

    frames
}
