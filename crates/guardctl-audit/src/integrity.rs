//! Binary hash self-check and tamper-event emission (component H).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A tamper event written when the integrity check fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TamperEvent {
    pub ts: String,
    pub message: String,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Errors from the integrity self-check.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("I/O error during integrity check: {0}")]
    Io(#[from] std::io::Error),
    /// The self-hash did not match the expected value; a tamper event was
    /// written (or attempted) to `tamper_dir`.
    #[error("integrity failure: binary hash does not match expected value")]
    Mismatch {
        event: TamperEvent,
        tamper_dir: PathBuf,
    },
}

/// Callback invoked with a [`TamperEvent`] on mismatch, e.g. to fire a
/// best-effort alert webhook. Kept as an injected callback rather than an
/// owned HTTP client so this crate stays free of network dependencies —
/// the caller wires in whatever transport it uses.
pub type AlertSink<'a> = &'a dyn Fn(&TamperEvent);

/// Compute `sha256:<hex>` of the file at `path`.
pub fn hash_file(path: &Path) -> Result<String, IntegrityError> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

/// Verify that the binary at `binary_path` hashes to `expected_hash`. On
/// mismatch: write a tamper event (JSON line, mode 0600) to a dedicated
/// directory (mode 0700), fire `alert` best-effort, and return
/// [`IntegrityError::Mismatch`] (callers map this to exit code 78).
pub fn self_check(
    binary_path: &Path,
    expected_hash: &str,
    tamper_dir: &Path,
    alert: Option<AlertSink<'_>>,
) -> Result<(), IntegrityError> {
    let actual = hash_file(binary_path)?;
    if actual == expected_hash {
        return Ok(());
    }

    let event = TamperEvent {
        ts: guardctl_common::time::format(&Utc::now()),
        message: "binary self-hash mismatch".to_string(),
        expected_hash: expected_hash.to_string(),
        actual_hash: actual,
    };

    if let Err(e) = write_tamper_event(tamper_dir, &event) {
        tracing::warn!(error = %e, "failed to persist tamper event");
    }

    if let Some(sink) = alert {
        sink(&event);
    }

    Err(IntegrityError::Mismatch { event, tamper_dir: tamper_dir.to_path_buf() })
}

#[cfg(unix)]
fn write_tamper_event(tamper_dir: &Path, event: &TamperEvent) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(tamper_dir)?;
    std::fs::set_permissions(tamper_dir, std::fs::Permissions::from_mode(0o700))?;

    let path = tamper_dir.join("tamper.log");
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

#[cfg(not(unix))]
fn write_tamper_event(tamper_dir: &Path, event: &TamperEvent) -> std::io::Result<()> {
    std::fs::create_dir_all(tamper_dir)?;
    let path = tamper_dir.join("tamper.log");
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_hash_passes() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin");
        std::fs::write(&binary, b"payload").unwrap();
        let expected = hash_file(&binary).unwrap();
        assert!(self_check(&binary, &expected, &dir.path().join("tamper"), None).is_ok());
    }

    #[test]
    fn mismatch_writes_tamper_event_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin");
        std::fs::write(&binary, b"payload").unwrap();
        let tamper_dir = dir.path().join("tamper");

        let result = self_check(&binary, "sha256:deadbeef", &tamper_dir, None);
        assert!(matches!(result, Err(IntegrityError::Mismatch { .. })));
        assert!(tamper_dir.join("tamper.log").exists());
    }

    #[test]
    fn alert_sink_is_invoked_on_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin");
        std::fs::write(&binary, b"payload").unwrap();
        let fired = std::cell::Cell::new(false);
        let sink = |_event: &TamperEvent| fired.set(true);
        let _ = self_check(&binary, "sha256:deadbeef", &dir.path().join("tamper"), Some(&sink));
        assert!(fired.get());
    }

    #[cfg(unix)]
    #[test]
    fn tamper_dir_and_file_have_restrictive_modes() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("bin");
        std::fs::write(&binary, b"payload").unwrap();
        let tamper_dir = dir.path().join("tamper");
        let _ = self_check(&binary, "sha256:deadbeef", &tamper_dir, None);
        let dir_mode = std::fs::metadata(&tamper_dir).unwrap().permissions().mode() & 0o777;
        let file_mode = std::fs::metadata(tamper_dir.join("tamper.log")).unwrap().permissions().mode() & 0o777;
        assert_eq!(dir_mode, 0o700);
        assert_eq!(file_mode, 0o600);
    }
}
