//! Process-identity lock file.
//!
//! At most one live poller runs at a time. The lock file holds the active
//! poller's pid; liveness is checked with a no-op signal, so a lock left
//! behind by a dead process is cleared automatically while a live holder
//! refuses startup. Dropping the guard removes the file.

use std::fs;
use std::path::{Path, PathBuf};

use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};

/// Guard for the poller's single-instance lock.
///
/// Holds the lock file path; the file contains this process's pid for as
/// long as the guard lives.
#[derive(Debug)]
pub struct ProcessLock {
    path: PathBuf,
}

impl ProcessLock {
    /// Take the lock, writing this process's pid.
    ///
    /// Fails with [`PipelineError::AlreadyRunning`] when the file names a
    /// still-live process. A stale lock (dead pid, or unreadable content)
    /// is cleared and replaced.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(pid) = read_pid(path) {
            if process_alive(pid) {
                return Err(PipelineError::AlreadyRunning { pid });
            }
            warn!(pid, lock = %path.display(), "clearing stale lock from dead process");
            fs::remove_file(path)?;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, std::process::id().to_string())?;
        debug!(lock = %path.display(), pid = std::process::id(), "lock acquired");
        Ok(Self { path: path.to_path_buf() })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the lock file names a live process.
    ///
    /// The launcher's status verb maps to this check.
    pub fn holder_is_alive(path: &Path) -> bool {
        read_pid(path).is_some_and(process_alive)
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to remove lock file");
        } else {
            debug!(lock = %self.path.display(), "lock released");
        }
    }
}

/// Pid stored in the lock file, if the file exists and parses.
fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

/// Liveness check via the no-op signal.
fn process_alive(pid: i32) -> bool {
    kill(Pid::from_raw(pid), None).is_ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A pid that cannot belong to a live process (beyond any real pid_max).
    const DEAD_PID: i32 = i32::MAX - 1;

    fn lock_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("poller.lock")
    }

    #[test]
    fn acquire_writes_own_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        let lock = ProcessLock::acquire(&path).unwrap();
        let stored = fs::read_to_string(&path).unwrap();
        assert_eq!(stored, std::process::id().to_string());
        assert_eq!(lock.path(), path);
    }

    #[test]
    fn live_holder_refuses_second_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        // The current process is definitionally alive.
        let _held = ProcessLock::acquire(&path).unwrap();
        let err = ProcessLock::acquire(&path).unwrap_err();
        assert!(matches!(err, PipelineError::AlreadyRunning { .. }));
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn stale_lock_is_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        fs::write(&path, DEAD_PID.to_string()).unwrap();

        let _lock = ProcessLock::acquire(&path).unwrap();
        let stored: i32 = fs::read_to_string(&path).unwrap().trim().parse().unwrap();
        assert_ne!(stored, DEAD_PID);
    }

    #[test]
    fn unreadable_lock_content_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);
        fs::write(&path, "not a pid").unwrap();

        let _lock = ProcessLock::acquire(&path).unwrap();
        let stored = fs::read_to_string(&path).unwrap();
        assert_eq!(stored, std::process::id().to_string());
    }

    #[test]
    fn drop_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        {
            let _lock = ProcessLock::acquire(&path).unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn acquire_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state/poller.lock");
        let _lock = ProcessLock::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn holder_liveness_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        assert!(!ProcessLock::holder_is_alive(&path)); // no file
        fs::write(&path, DEAD_PID.to_string()).unwrap();
        assert!(!ProcessLock::holder_is_alive(&path)); // dead pid

        fs::write(&path, std::process::id().to_string()).unwrap();
        assert!(ProcessLock::holder_is_alive(&path)); // this process
    }

    #[test]
    fn reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = lock_path(&dir);

        drop(ProcessLock::acquire(&path).unwrap());
        let _second = ProcessLock::acquire(&path).unwrap();
        assert!(path.exists());
    }
}
