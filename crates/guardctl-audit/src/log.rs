//! Append-only writer for the hash-chained audit log (component G).
//!
//! Concurrent writers within one process are serialised by a mutex;
//! concurrent writers across processes are unsupported by design — the
//! spec requires per-agent or per-trace log files instead.

use crate::entry::AuditEntry;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Errors from audit log I/O.
#[derive(Debug, Error)]
pub enum AuditLogError {
    #[error("I/O error writing audit log: {0}")]
    Io(#[from] io::Error),
}

struct Inner {
    writer: BufWriter<std::fs::File>,
    last_hash: String,
}

/// An append-only, hash-chained audit log writer.
pub struct AuditLog {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl AuditLog {
    /// Open (creating if absent) an audit log at `path` for append,
    /// recovering `last_hash` from the final line if the file already has
    /// entries, or the genesis hash otherwise.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AuditLogError> {
        let path = path.into();
        let last_hash = Self::recover_last_hash(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            inner: Mutex::new(Inner { writer: BufWriter::new(file), last_hash }),
        })
    }

    fn recover_last_hash(path: &Path) -> Result<String, AuditLogError> {
        if !path.exists() {
            return Ok(AuditEntry::genesis_hash());
        }
        let contents = std::fs::read_to_string(path)?;
        match contents.lines().last() {
            Some(line) if !line.trim().is_empty() => {
                let entry: AuditEntry = serde_json::from_str(line)
                    .map_err(|e| AuditLogError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
                Ok(entry.content_hash())
            }
            _ => Ok(AuditEntry::genesis_hash()),
        }
    }

    /// Append one decision to the log. Computes `prev_hash` from the
    /// in-memory last-hash, serialises, writes exactly one line followed
    /// by `\n`, flushes, and updates the last-hash.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        ts: chrono::DateTime<chrono::Utc>,
        trace_id: &str,
        tool: &str,
        resource: &str,
        decision: &str,
        reason: &str,
        tier: u8,
        policy_hash: &str,
    ) -> Result<AuditEntry, AuditLogError> {
        let mut guard = self.inner.lock().expect("audit log mutex poisoned");
        let entry = AuditEntry::new(
            ts,
            trace_id,
            tool,
            resource,
            decision,
            reason,
            tier,
            policy_hash,
            guard.last_hash.clone(),
        );
        let line = serde_json::to_string(&entry)
            .map_err(|e| AuditLogError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        guard.writer.write_all(line.as_bytes())?;
        guard.writer.write_all(b"\n")?;
        guard.writer.flush()?;
        guard.last_hash = entry.content_hash();
        Ok(entry)
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
