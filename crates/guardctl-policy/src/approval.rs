//! Persistent, file-rooted approval lifecycle (component E).
//!
//! Each record lives in its own file under the store root, written with
//! the write-temp-then-rename pattern for crash safety, the same
//! discipline `assay-evidence::bundle::writer` and
//! `assay-core::kill_switch` use for durable state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lifecycle status of an [`ApprovalRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Consumed,
    Expired,
}

/// A persisted approval, keyed by `approval_key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approval_key: String,
    pub status: ApprovalStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub reason: String,
    pub policy_id: Option<String>,
    pub resource_excerpt: String,
}

/// Errors returned by [`ApprovalStore`] operations.
#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt approval record at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// File-rooted approval store.
pub struct ApprovalStore {
    root: PathBuf,
}

fn record_path(root: &Path, approval_key: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(approval_key.as_bytes());
    let digest = hex::encode(hasher.finalize());
    root.join(format!("{digest}.json"))
}

fn write_atomic(path: &Path, record: &ApprovalRecord) -> Result<(), ApprovalError> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(record).expect("ApprovalRecord always serializes");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ApprovalStore {
    /// Open (creating if absent) an approval store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ApprovalError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn read_record(&self, approval_key: &str) -> Result<Option<ApprovalRecord>, ApprovalError> {
        let path = record_path(&self.root, approval_key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        let record: ApprovalRecord = serde_json::from_slice(&bytes)
            .map_err(|source| ApprovalError::Corrupt { path: path.clone(), source })?;
        Ok(Some(record))
    }

    /// Insert a `pending` record for `approval_key` if absent. Idempotent:
    /// a repeated request for the same key is a no-op.
    pub fn request(
        &self,
        approval_key: &str,
        reason: &str,
        policy_id: Option<String>,
        resource_excerpt: &str,
    ) -> Result<ApprovalRecord, ApprovalError> {
        if let Some(existing) = self.read_record(approval_key)? {
            return Ok(existing);
        }
        let record = ApprovalRecord {
            approval_key: approval_key.to_string(),
            status: ApprovalStatus::Pending,
            created_at: Utc::now(),
            expires_at: None,
            reason: reason.to_string(),
            policy_id,
            resource_excerpt: resource_excerpt.to_string(),
        };
        write_atomic(&record_path(&self.root, approval_key), &record)?;
        Ok(record)
    }

    /// Flip `pending` → `approved`. `duration` of zero means one-shot:
    /// the approval is consumed on first use via [`ApprovalStore::consume`].
    pub fn approve(
        &self,
        approval_key: &str,
        duration: Duration,
    ) -> Result<Option<ApprovalRecord>, ApprovalError> {
        let Some(mut record) = self.read_record(approval_key)? else {
            return Ok(None);
        };
        if record.status != ApprovalStatus::Pending {
            return Ok(Some(record));
        }
        record.status = ApprovalStatus::Approved;
        record.expires_at = if duration.is_zero() { None } else { Some(Utc::now() + duration) };
        write_atomic(&record_path(&self.root, approval_key), &record)?;
        Ok(Some(record))
    }

    /// Flip `pending` → `denied`.
    pub fn deny(&self, approval_key: &str) -> Result<Option<ApprovalRecord>, ApprovalError> {
        let Some(mut record) = self.read_record(approval_key)? else {
            return Ok(None);
        };
        if record.status == ApprovalStatus::Pending {
            record.status = ApprovalStatus::Denied;
            write_atomic(&record_path(&self.root, approval_key), &record)?;
        }
        Ok(Some(record))
    }

    /// Current status, auto-transitioning `approved` → `expired` when
    /// `now > expires_at`. Does not mutate the file unless that
    /// transition fires.
    pub fn check(&self, approval_key: &str) -> Result<Option<ApprovalRecord>, ApprovalError> {
        let Some(mut record) = self.read_record(approval_key)? else {
            return Ok(None);
        };
        if record.status == ApprovalStatus::Approved {
            if let Some(expires_at) = record.expires_at {
                if Utc::now() > expires_at {
                    record.status = ApprovalStatus::Expired;
                    write_atomic(&record_path(&self.root, approval_key), &record)?;
                }
            }
        }
        Ok(Some(record))
    }

    /// Atomically flip `approved` → `consumed`. Returns `true` if the
    /// transition happened; a caller must treat any other outcome as "not
    /// authorized". A `consumed` record never again satisfies a
    /// `require_approval` query.
    pub fn consume(&self, approval_key: &str) -> Result<bool, ApprovalError> {
        let Some(record) = self.check(approval_key)? else {
            return Ok(false);
        };
        if record.status != ApprovalStatus::Approved {
            return Ok(false);
        }
        let mut record = record;
        record.status = ApprovalStatus::Consumed;
        write_atomic(&record_path(&self.root, approval_key), &record)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApprovalStore::open(dir.path()).unwrap();
        let first = store.request("key-1", "why", None, "ls -la").unwrap();
        let second = store.request("key-1", "different reason", None, "ls -la").unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.reason, "why");
    }

    #[test]
    fn approve_then_consume_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApprovalStore::open(dir.path()).unwrap();
        store.request("key-1", "why", None, "rsrc").unwrap();
        store.approve("key-1", Duration::zero()).unwrap();
        assert!(store.consume("key-1").unwrap());
        let record = store.check("key-1").unwrap().unwrap();
        assert_eq!(record.status, ApprovalStatus::Consumed);
        assert!(!store.consume("key-1").unwrap());
    }

    #[test]
    fn approve_expires_after_duration() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApprovalStore::open(dir.path()).unwrap();
        store.request("key-1", "why", None, "rsrc").unwrap();
        store.approve("key-1", Duration::milliseconds(-1)).unwrap();
        let record = store.check("key-1").unwrap().unwrap();
        assert_eq!(record.status, ApprovalStatus::Expired);
    }

    #[test]
    fn deny_flips_pending_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApprovalStore::open(dir.path()).unwrap();
        store.request("key-1", "why", None, "rsrc").unwrap();
        store.deny("key-1").unwrap();
        let record = store.check("key-1").unwrap().unwrap();
        assert_eq!(record.status, ApprovalStatus::Denied);
    }

    #[test]
    fn missing_key_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = ApprovalStore::open(dir.path()).unwrap();
        assert!(store.check("nope").unwrap().is_none());
    }
}
