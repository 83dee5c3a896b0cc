//! Action / Decision / `TraceState` value types (component A).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sensitivity level attached to an action's metadata. Unknown values
/// deserialize to `Low` per the spec invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    #[default]
    Low,
    Medium,
    High,
}

impl Sensitivity {
    /// Parse from a free-form string, falling back to `Low` for anything
    /// unrecognised (spec §3 invariant: "unknown sensitivity is treated as
    /// low").
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "medium" => Sensitivity::Medium,
            "high" => Sensitivity::High,
            _ => Sensitivity::Low,
        }
    }
}

/// Direction of data movement for an action, from `Action.metadata.egress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Egress {
    Internal,
    External,
}

/// Recognised metadata keys on an [`Action`]. Extra keys are preserved in
/// `extra` but play no role in evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub rows: Option<u64>,
    #[serde(default)]
    pub egress: Option<Egress>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An attempted operation submitted for evaluation.
///
/// Invariant: `resource` is non-empty. Construction through [`Action::new`]
/// enforces this; callers deserializing from untrusted input should call
/// [`Action::validate`] before evaluating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub tool: String,
    pub resource: String,
    pub operation: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Action {
    /// Construct a new action, validating the non-empty `resource`
    /// invariant.
    ///
    /// # Errors
    ///
    /// Returns an error if `resource` is empty.
    pub fn new(
        tool: impl Into<String>,
        resource: impl Into<String>,
        operation: impl Into<String>,
    ) -> Result<Self, String> {
        let action = Self {
            tool: tool.into(),
            resource: resource.into(),
            operation: operation.into(),
            metadata: Metadata::default(),
        };
        action.validate()?;
        Ok(action)
    }

    /// Validate the `resource` non-empty invariant.
    ///
    /// # Errors
    ///
    /// Returns an error describing the violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.resource.is_empty() {
            return Err("Action.resource must not be empty".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Closed sum type for the five possible decisions (component A).
///
/// Total order for "more restrictive" (spec §3):
/// `allow < allow_with_redaction < rewrite_output < require_approval < deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    AllowWithRedaction,
    RewriteOutput,
    RequireApproval,
    Deny,
}

impl Decision {
    fn rank(self) -> u8 {
        match self {
            Decision::Allow => 0,
            Decision::AllowWithRedaction => 1,
            Decision::RewriteOutput => 2,
            Decision::RequireApproval => 3,
            Decision::Deny => 4,
        }
    }

    /// Human-readable lowercase-with-underscores name, matching the audit
    /// log's `decision` field (spec §6).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::AllowWithRedaction => "allow_with_redaction",
            Decision::RewriteOutput => "rewrite_output",
            Decision::RequireApproval => "require_approval",
            Decision::Deny => "deny",
        }
    }
}

impl PartialOrd for Decision {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decision {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Reversibility tier, 0 (informational) through 3 (irreversible).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    Informational = 0,
    Reversible = 1,
    RequiresApproval = 2,
    Irreversible = 3,
}

impl Tier {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Redaction directive attached to an `allow_with_redaction` result: an
/// extra PII key the enforcement wrapper (component I) must mask beyond
/// its fixed list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedactionDirective {
    pub key: String,
}

/// The output of evaluating a single [`Action`] (component A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResult {
    pub decision: Decision,
    pub reason: String,
    #[serde(default)]
    pub policy_id: Option<String>,
    #[serde(default)]
    pub approval_key: Option<String>,
    #[serde(default)]
    pub redaction_directives: Vec<RedactionDirective>,
    #[serde(default)]
    pub rewrite_text: Option<String>,
    pub tier: Tier,
}

impl PolicyResult {
    #[must_use]
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            reason: "default allow".to_string(),
            policy_id: None,
            approval_key: None,
            redaction_directives: Vec::new(),
            rewrite_text: None,
            tier: Tier::Informational,
        }
    }

    #[must_use]
    pub fn deny(reason: impl Into<String>, policy_id: impl Into<String>) -> Self {
        Self {
            decision: Decision::Deny,
            reason: reason.into(),
            policy_id: Some(policy_id.into()),
            approval_key: None,
            redaction_directives: Vec::new(),
            rewrite_text: None,
            tier: Tier::Irreversible,
        }
    }

    #[must_use]
    pub fn require_approval(
        reason: impl Into<String>,
        policy_id: Option<String>,
        approval_key: impl Into<String>,
    ) -> Self {
        Self {
            decision: Decision::RequireApproval,
            reason: reason.into(),
            policy_id,
            approval_key: Some(approval_key.into()),
            redaction_directives: Vec::new(),
            rewrite_text: None,
            tier: Tier::RequiresApproval,
        }
    }
}

/// Per-session accumulator carrying history across actions for
/// zone-escalation decisions (component A).
///
/// Mutated only by the evaluator at decision time; destroyed when its
/// owning proxy/daemon task ends. The audit log, not `TraceState`, is the
/// durable record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceState {
    pub trace_id: String,
    pub zones_entered: Vec<String>,
    pub bytes_total: u64,
    pub rows_total: u64,
    pub denials: u64,
    pub sequence: u64,
}

impl TraceState {
    /// Create a fresh accumulator for `trace_id`.
    ///
    /// # Panics
    ///
    /// Panics if `trace_id` is empty — callers must supply a non-empty
    /// opaque session identifier per the spec invariant.
    #[must_use]
    pub fn new(trace_id: impl Into<String>) -> Self {
        let trace_id = trace_id.into();
        assert!(!trace_id.is_empty(), "trace_id must be non-empty");
        Self {
            trace_id,
            ..Default::default()
        }
    }

    /// Record a non-deny decision: merge new zone tags, add byte/row
    /// totals, and bump the sequence counter.
    pub(crate) fn record_allowed(&mut self, zone_tags: &[String], bytes: u64, rows: u64) {
        for tag in zone_tags {
            if !self.zones_entered.contains(tag) {
                self.zones_entered.push(tag.clone());
            }
        }
        self.bytes_total += bytes;
        self.rows_total += rows;
        self.sequence += 1;
    }

    /// Record a deny decision: bump the denial counter and sequence, but
    /// do not merge zone tags or totals.
    pub(crate) fn record_denied(&mut self) {
        self.denials += 1;
        self.sequence += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_total_order() {
        assert!(Decision::Allow < Decision::AllowWithRedaction);
        assert!(Decision::AllowWithRedaction < Decision::RewriteOutput);
        assert!(Decision::RewriteOutput < Decision::RequireApproval);
        assert!(Decision::RequireApproval < Decision::Deny);
    }

    #[test]
    fn unknown_sensitivity_is_low() {
        assert_eq!(Sensitivity::parse_lenient("bogus"), Sensitivity::Low);
        assert_eq!(Sensitivity::parse_lenient("HIGH"), Sensitivity::High);
    }

    #[test]
    fn action_requires_non_empty_resource() {
        assert!(Action::new("command", "", "execute").is_err());
        assert!(Action::new("command", "ls -la", "execute").is_ok());
    }

    #[test]
    fn trace_state_rejects_empty_trace_id() {
        let result = std::panic::catch_unwind(|| TraceState::new(""));
        assert!(result.is_err());
    }
}
