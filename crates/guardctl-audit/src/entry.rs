//! `AuditEntry` and canonicalisation (component G).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The `tool`/`resource` pair recorded for the action under audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRef {
    pub tool: String,
    pub resource: String,
}

/// Genesis `prev_hash` used for the first entry in a log.
pub const GENESIS_HASH: &str = "sha256:0000000000000000000000000000000000000000000000000000000000000000";

fn genesis() -> String {
    format!("sha256:{}", "0".repeat(64))
}

/// One line of the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub ts: String,
    pub trace_id: String,
    pub action: ActionRef,
    pub decision: String,
    pub reason: String,
    pub tier: u8,
    pub policy_hash: String,
    pub prev_hash: String,
}

impl AuditEntry {
    /// Construct a new entry; `ts` is formatted as RFC-3339 UTC with
    /// millisecond precision.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ts: DateTime<Utc>,
        trace_id: impl Into<String>,
        tool: impl Into<String>,
        resource: impl Into<String>,
        decision: impl Into<String>,
        reason: impl Into<String>,
        tier: u8,
        policy_hash: impl Into<String>,
        prev_hash: impl Into<String>,
    ) -> Self {
        Self {
            ts: guardctl_common::time::format(&ts),
            trace_id: trace_id.into(),
            action: ActionRef { tool: tool.into(), resource: resource.into() },
            decision: decision.into(),
            reason: reason.into(),
            tier,
            policy_hash: policy_hash.into(),
            prev_hash: prev_hash.into(),
        }
    }

    /// Canonical bytes used for hashing: every field present in a fixed
    /// (JCS, RFC 8785) key order, excluding `prev_hash` itself.
    ///
    /// # Panics
    ///
    /// Panics if `self` fails to serialize to JSON, which cannot happen
    /// for this struct's field types.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut value = serde_json::to_value(self).expect("AuditEntry always serializes");
        if let Some(obj) = value.as_object_mut() {
            obj.remove("prev_hash");
        }
        serde_jcs::to_vec(&value).expect("canonicalized value always serializes")
    }

    /// `sha256:<hex>` of [`Self::canonical_bytes`], used as the next
    /// entry's `prev_hash`.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// The genesis `prev_hash` value used by the first entry in a log.
    #[must_use]
    pub fn genesis_hash() -> String {
        genesis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_constant_matches_helper() {
        assert_eq!(AuditEntry::genesis_hash(), GENESIS_HASH);
    }

    #[test]
    fn canonical_bytes_exclude_prev_hash() {
        let ts = Utc::now();
        let a = AuditEntry::new(ts, "t1", "command", "ls", "allow", "default", 0, "sha256:aa", "sha256:one");
        let b = AuditEntry::new(ts, "t1", "command", "ls", "allow", "default", 0, "sha256:aa", "sha256:two");
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn content_hash_changes_when_any_other_field_changes() {
        let ts = Utc::now();
        let a = AuditEntry::new(ts, "t1", "command", "ls", "allow", "default", 0, "sha256:aa", "sha256:x");
        let b = AuditEntry::new(ts, "t1", "command", "ls -la", "allow", "default", 0, "sha256:aa", "sha256:x");
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
