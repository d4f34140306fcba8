//! Rotating file writer - one physical log stream with time-based rotation

use chrono::{DateTime, Local, NaiveDateTime};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::RotationPolicy;
use crate::error::{LogError, Result};

/// Source of "now" for rotation decisions.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Local>;
}

pub type SharedClock = Arc<dyn Clock>;

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Manually driven clock for tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        if let Ok(delta) = chrono::Duration::from_std(by) {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// The file currently receiving writes.
struct ActiveFile {
    period: NaiveDateTime,
    path: PathBuf,
    file: BufWriter<File>,
}

/// Opens a stream file for appending.
type Opener = Box<dyn Fn(&Path) -> io::Result<File> + Send + Sync>;

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Writer for a single stream.
///
/// Safe for concurrent use: the rotate-check, the write and its retry all run
/// under one lock acquisition, so records never interleave. The target file
/// is chosen from the record's own timestamp, so a record stamped before a
/// boundary lands in the pre-boundary file even if it reaches the lock after
/// the boundary.
///
/// The physical file is created lazily on the first write.
pub struct RotatingWriter {
    policy: RotationPolicy,
    clock: SharedClock,
    opener: Opener,
    active: Mutex<Option<ActiveFile>>,
}

impl RotatingWriter {
    pub fn new(policy: RotationPolicy, clock: SharedClock) -> Self {
        Self {
            policy,
            clock,
            opener: Box::new(open_append),
            active: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn with_opener(mut self, opener: impl Fn(&Path) -> io::Result<File> + Send + Sync + 'static) -> Self {
        self.opener = Box::new(opener);
        self
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }

    /// Path of the file currently open, if any write has happened yet.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.active.lock().as_ref().map(|a| a.path.clone())
    }

    /// Append `buf` stamped with the clock's current time.
    pub fn write(&self, buf: &[u8]) -> io::Result<()> {
        self.write_at(self.clock.now(), buf)
    }

    /// Append `buf` to the file of the period containing `at`.
    ///
    /// A later period rotates the stream first. An earlier period (a record
    /// stamped before a boundary that another writer already crossed) is
    /// appended to its own file without moving the active one. A failed
    /// write is retried once against a freshly opened file.
    pub fn write_at(&self, at: DateTime<Local>, buf: &[u8]) -> io::Result<()> {
        let mut active = self.active.lock();
        let period = self.policy.period_start(at);

        match active.as_ref().map(|a| a.period) {
            Some(current) if current == period => {}
            Some(current) if period < current => return self.write_late(period, buf),
            _ => self.rotate_locked(&mut active, period, at)?,
        }

        let first = match active.as_mut() {
            Some(a) => a.file.write_all(buf),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "no active log file")),
        };

        if let Err(e) = first {
            debug!(stream = %self.policy.base_name, "write failed, reopening: {}", e);
            self.rotate_locked(&mut active, period, at)?;
            match active.as_mut() {
                Some(a) => a.file.write_all(buf)?,
                None => return Err(e),
            }
        }

        Ok(())
    }

    /// Append to a past period's file. Caller holds the lock.
    fn write_late(&self, period: NaiveDateTime, buf: &[u8]) -> io::Result<()> {
        let path = self.policy.path_for(period);
        let append = || -> io::Result<()> {
            let mut file = (self.opener)(&path)?;
            file.write_all(buf)
        };
        append().or_else(|e| {
            debug!(path = ?path, "late write failed, retrying: {}", e);
            append()
        })
    }

    /// Switch to the current period's file if the boundary has passed.
    ///
    /// Returns `true` when a new file was opened. A stream that has never been
    /// written to stays closed.
    pub fn rotate(&self) -> io::Result<bool> {
        let mut active = self.active.lock();
        let Some(current) = active.as_ref().map(|a| a.period) else {
            return Ok(false);
        };

        let now = self.clock.now();
        let period = self.policy.period_start(now);
        if current == period {
            return Ok(false);
        }

        self.rotate_locked(&mut active, period, now)?;
        Ok(true)
    }

    /// Delete this stream's files whose period ended before the retention
    /// window. Returns the number of files removed.
    pub fn purge(&self) -> io::Result<usize> {
        let active = self.active.lock();
        let keep = active.as_ref().map(|a| a.path.as_path());
        self.purge_files(keep, self.clock.now())
    }

    /// Flush buffered bytes and sync them to disk.
    pub fn flush(&self) -> io::Result<()> {
        let mut active = self.active.lock();
        if let Some(a) = active.as_mut() {
            a.file.flush()?;
            a.file.get_ref().sync_data()?;
        }
        Ok(())
    }

    fn rotate_locked(
        &self,
        active: &mut Option<ActiveFile>,
        period: NaiveDateTime,
        now: DateTime<Local>,
    ) -> io::Result<()> {
        // Drain the outgoing file; anything already accepted belongs to it
        if let Some(mut old) = active.take() {
            if let Err(e) = old.file.flush() {
                warn!(path = ?old.path, "Failed to flush rotated log file: {}", e);
            }
        }

        let path = self.policy.path_for(period);
        let file = (self.opener)(&path)?;
        debug!(path = ?path, "Opened log file");

        self.update_alias(&path);

        if let Err(e) = self.purge_files(Some(&path), now) {
            warn!(dir = ?self.policy.directory, "Failed to purge old log files: {}", e);
        }

        *active = Some(ActiveFile {
            period,
            path,
            file: BufWriter::new(file),
        });
        Ok(())
    }

    fn purge_files(&self, keep: Option<&Path>, now: DateTime<Local>) -> io::Result<usize> {
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.policy.directory)? {
            let entry = entry?;
            let path = entry.path();
            if Some(path.as_path()) == keep {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(start) = self.policy.parse_period(name) else {
                continue;
            };
            if !self.policy.is_expired(start, now) {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed expired log file: {:?}", path);
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove expired log file {:?}: {}", path, e),
            }
        }

        Ok(removed)
    }

    /// Point the stable alias at `target`. Best effort.
    fn update_alias(&self, target: &Path) {
        let alias = self.policy.alias_path();
        if std::fs::symlink_metadata(&alias).is_ok() {
            if let Err(e) = std::fs::remove_file(&alias) {
                warn!("Failed to remove log alias {:?}: {}", alias, e);
                return;
            }
        }
        if let Err(e) = link_alias(target, &alias) {
            warn!("Failed to link log alias {:?} -> {:?}: {}", alias, target, e);
        }
    }
}

#[cfg(unix)]
fn link_alias(target: &Path, alias: &Path) -> io::Result<()> {
    // Relative target so the directory can be moved as a whole
    let relative = target.file_name().map(Path::new).unwrap_or(target);
    std::os::unix::fs::symlink(relative, alias)
}

#[cfg(windows)]
fn link_alias(target: &Path, alias: &Path) -> io::Result<()> {
    std::fs::hard_link(target, alias)
}

#[cfg(not(any(unix, windows)))]
fn link_alias(_target: &Path, _alias: &Path) -> io::Result<()> {
    Ok(())
}

/// Create `dir` if needed and prove it accepts new files.
pub fn ensure_log_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|source| LogError::CreateDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let marker = dir.join(".testwrite");
    std::fs::write(&marker, b"test").map_err(|source| LogError::DirectoryUnwritable {
        path: dir.to_path_buf(),
        source,
    })?;
    let _ = std::fs::remove_file(&marker);

    Ok(())
}
