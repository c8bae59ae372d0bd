//! Cross-process guard for recurrence generation.
//!
//! Two `dutycal generate` runs against the same store would both see an
//! occurrence as missing and race to write it. The scheduler takes this lock
//! around a full pass so the existence check and the write stay paired.

use fs2::FileExt;
use std::fs::{File, OpenOptions, create_dir_all};
use std::io;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default wait for a scheduler lock held by another generator run.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const RETRY_EVERY: Duration = Duration::from_millis(10);

/// Failure to take the scheduler lock.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("E5001: scheduler lock {} still held after {waited:?}", path.display())]
    Timeout { path: PathBuf, waited: Duration },
    #[error("E5002: {0}")]
    IoError(#[from] io::Error),
}

impl LockError {
    /// Stable code identifier (`E####`), in the same space as
    /// [`crate::error::ErrorKind::code`].
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "E5001",
            Self::IoError(_) => "E5002",
        }
    }

    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        Some(match self {
            Self::Timeout { .. } => {
                "Another generator run holds the lock; wait for it or raise the timeout."
            }
            Self::IoError(_) => "Check that the lock directory exists and is writable.",
        })
    }
}

/// Exclusive advisory lock on a file next to the event store; unlocked on
/// drop. Only processes that also take it are excluded.
#[derive(Debug)]
pub struct SchedulerLock {
    handle: File,
    location: PathBuf,
}

impl SchedulerLock {
    /// Take the lock at `location`, retrying until `timeout` has passed.
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// [`LockError::Timeout`] if another holder keeps the lock past
    /// `timeout`, [`LockError::IoError`] if the lock file cannot be opened.
    pub fn acquire(location: &Path, timeout: Duration) -> Result<Self, LockError> {
        if let Some(dir) = location.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_dir_all(dir)?;
        }
        let handle = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(location)?;

        let began = Instant::now();
        while handle.try_lock_exclusive().is_err() {
            let waited = began.elapsed();
            if waited >= timeout {
                tracing::warn!(path = %location.display(), ?waited, "scheduler lock busy");
                return Err(LockError::Timeout {
                    path: location.to_path_buf(),
                    waited,
                });
            }
            sleep(RETRY_EVERY);
        }

        tracing::debug!(path = %location.display(), "scheduler lock acquired");
        Ok(Self {
            handle,
            location: location.to_path_buf(),
        })
    }

    /// Give the lock up before the guard goes out of scope.
    pub fn release(self) {}

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.location
    }
}

impl Drop for SchedulerLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.handle) {
            tracing::debug!(path = %self.location.display(), %err, "scheduler unlock failed");
        }
    }
}
