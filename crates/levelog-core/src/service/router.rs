//! Level router - one rotating writer per severity plus the auxiliary streams

use std::fmt;
use std::io;

use super::writer::{ensure_log_dir, RotatingWriter, SharedClock};
use crate::domain::{LoggerConfig, Severity};
use crate::error::Result;

/// Destination stream of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// The stream dedicated to one severity
    Level(Severity),
    /// HTTP access records
    Access,
    /// Database query records
    Sql,
}

impl Channel {
    /// Base file name of the stream.
    pub fn base_name(&self) -> &'static str {
        match self {
            Channel::Level(severity) => severity.as_str(),
            Channel::Access => "access",
            Channel::Sql => "sql",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// Maps severities and auxiliary channels to their writers.
///
/// Every severity owns its own [`RotatingWriter`], even though they share
/// rotation parameters, so each file only ever holds one severity.
pub struct LevelRouter {
    min_severity: Severity,
    levels: [RotatingWriter; 5],
    access: RotatingWriter,
    sql: RotatingWriter,
}

impl LevelRouter {
    /// Build all writers under `config.directory`.
    ///
    /// Fails if the directory cannot be created or written to. No stream file
    /// is created here.
    pub fn new(config: &LoggerConfig, clock: SharedClock) -> Result<Self> {
        config.validate()?;
        ensure_log_dir(&config.directory)?;

        let writer = |channel: Channel| {
            RotatingWriter::new(config.policy_for(channel.base_name()), clock.clone())
        };

        Ok(Self {
            min_severity: config.min_severity,
            levels: Severity::ALL.map(|s| writer(Channel::Level(s))),
            access: writer(Channel::Access),
            sql: writer(Channel::Sql),
        })
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }

    /// Whether records at `severity` pass the minimum. Allocation free.
    #[inline]
    pub fn should_emit(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// Writer dedicated to `severity`.
    pub fn route(&self, severity: Severity) -> &RotatingWriter {
        &self.levels[severity.index()]
    }

    pub fn channel(&self, channel: Channel) -> &RotatingWriter {
        match channel {
            Channel::Level(severity) => self.route(severity),
            Channel::Access => &self.access,
            Channel::Sql => &self.sql,
        }
    }

    pub fn writers(&self) -> impl Iterator<Item = &RotatingWriter> {
        self.levels.iter().chain([&self.access, &self.sql])
    }

    /// Flush every stream. All streams are attempted; the first error wins.
    pub fn flush_all(&self) -> io::Result<()> {
        self.writers()
            .map(RotatingWriter::flush)
            .fold(Ok(()), |acc, r| acc.and(r))
    }

    /// Rotate every open stream whose boundary has passed.
    pub fn rotate_all(&self) -> io::Result<usize> {
        let mut rotated = 0;
        for writer in self.writers() {
            if writer.rotate()? {
                rotated += 1;
            }
        }
        Ok(rotated)
    }

    /// Purge expired files of every stream.
    pub fn purge_all(&self) -> io::Result<usize> {
        let mut removed = 0;
        for writer in self.writers() {
            removed += writer.purge()?;
        }
        Ok(removed)
    }
}
