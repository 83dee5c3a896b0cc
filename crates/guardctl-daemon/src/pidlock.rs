//! Startup PID-file lock: rejects a second daemon instance while the
//! previous one is still alive, replaces a stale lock otherwise.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PidLockError {
    #[error("another guardctl-daemon instance is running (pid {0})")]
    AlreadyRunning(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed pid file at {0}")]
    Malformed(PathBuf),
}

/// A held PID-file lock; removes the file on drop.
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Acquire the lock at `path`, rejecting startup if the PID it
    /// names is still alive (signal-0 probe), replacing it otherwise.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, PidLockError> {
        let path = path.into();
        if let Ok(contents) = std::fs::read_to_string(&path) {
            let existing: u32 = contents
                .trim()
                .parse()
                .map_err(|_| PidLockError::Malformed(path.clone()))?;
            if is_alive(existing) {
                return Err(PidLockError::AlreadyRunning(existing));
            }
            tracing::warn!(stale_pid = existing, "replacing stale pid file");
        }

        let pid = std::process::id();
        std::fs::write(&path, pid.to_string())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_fresh_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardctl.pid");
        let lock = PidLock::acquire(&path).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), std::process::id().to_string());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn replaces_stale_lock_from_dead_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardctl.pid");
        std::fs::write(&path, "999999999").unwrap();
        let lock = PidLock::acquire(&path).unwrap();
        assert_eq!(std::fs::read_to_string(lock.path()).unwrap(), std::process::id().to_string());
    }

    #[test]
    fn malformed_pid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardctl.pid");
        std::fs::write(&path, "not-a-pid").unwrap();
        assert!(matches!(PidLock::acquire(&path), Err(PidLockError::Malformed(_))));
    }

    #[test]
    fn rejects_startup_against_self_pid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardctl.pid");
        std::fs::write(&path, std::process::id().to_string()).unwrap();
        assert!(matches!(PidLock::acquire(&path), Err(PidLockError::AlreadyRunning(_))));
    }
}
