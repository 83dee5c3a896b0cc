//! Work Order (WO): the approval-gated handoff artefact (component N).

use chrono::{DateTime, Utc};
use guardctl_common::ids::{new_work_order_id, validate_id};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Redaction mode recorded on a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    Local,
    Cloud,
}

/// Execution constraints handed to whatever downstream agent acts on the
/// work order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    #[serde(default)]
    pub allow_paths: Vec<String>,
    #[serde(default)]
    pub deny_paths: Vec<String>,
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub sudo: bool,
    pub max_steps: u32,
}

/// A single piece of evidence produced by the runbook runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub step: String,
    pub summary: String,
    #[serde(default)]
    pub evidence: serde_json::Value,
}

/// The target of a work order, mirroring a job's target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkOrderTarget {
    #[serde(default)]
    pub host: Option<String>,
    pub scope: String,
}

/// The typed handoff artefact (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkOrder {
    pub wo_version: u32,
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub incident_id: String,
    pub target: WorkOrderTarget,
    pub observations: Vec<Observation>,
    pub constraints: Constraints,
    pub proposed_goals: Vec<String>,
    pub redaction_mode: RedactionMode,
    #[serde(default)]
    pub token_map_ref: Option<String>,
}

/// Validation errors for a constructed work order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkOrderError {
    #[error("invalid work order id: {0}")]
    InvalidId(String),
    #[error("proposed_goals must contain at least one goal")]
    EmptyGoals,
    #[error("constraints.max_steps must be greater than zero")]
    NonPositiveMaxSteps,
    #[error("token_map_ref is required when redaction_mode is cloud")]
    MissingTokenMapRef,
}

impl WorkOrder {
    /// Construct a new work order with a freshly generated id
    /// (`wo-` + 8 random hex digits).
    #[must_use]
    pub fn new(
        incident_id: impl Into<String>,
        target: WorkOrderTarget,
        observations: Vec<Observation>,
        constraints: Constraints,
        proposed_goals: Vec<String>,
        redaction_mode: RedactionMode,
        token_map_ref: Option<String>,
    ) -> Self {
        Self {
            wo_version: 1,
            id: new_work_order_id(),
            created_at: Utc::now(),
            incident_id: incident_id.into(),
            target,
            observations,
            constraints,
            proposed_goals,
            redaction_mode,
            token_map_ref,
        }
    }

    /// Validate the structural invariants from spec §3.
    pub fn validate(&self) -> Result<(), WorkOrderError> {
        validate_id(&self.id).map_err(WorkOrderError::InvalidId)?;
        if self.proposed_goals.is_empty() {
            return Err(WorkOrderError::EmptyGoals);
        }
        if self.constraints.max_steps == 0 {
            return Err(WorkOrderError::NonPositiveMaxSteps);
        }
        if self.redaction_mode == RedactionMode::Cloud && self.token_map_ref.is_none() {
            return Err(WorkOrderError::MissingTokenMapRef);
        }
        Ok(())
    }

    /// The file name this work order is written under in the outbox:
    /// `<id>.json` where `id` matches the owning job's id, not the WO's
    /// own `wo-` id — processors name outbox files by job id so the
    /// duplicate-submission check in spec scenario 6 can find them.
    #[must_use]
    pub fn outbox_file_name(job_id: &str) -> String {
        format!("{job_id}.json")
    }
}

/// Lifecycle status recorded alongside a work order in the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Done,
    PendingApproval,
    Failed,
    Approved,
    Rejected,
    Expired,
}

/// The full on-disk outbox record: a work order (when one was produced)
/// plus its lifecycle status and an optional error string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub status: WorkOrderStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub work_order: Option<WorkOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> WorkOrder {
        WorkOrder::new(
            "incident-1",
            WorkOrderTarget { host: None, scope: "/tmp".to_string() },
            vec![Observation { step: "scan".to_string(), summary: "found x".to_string(), evidence: serde_json::json!({}) }],
            Constraints { allow_paths: vec![], deny_paths: vec![], network: false, sudo: false, max_steps: 3 },
            vec!["remediate".to_string()],
            RedactionMode::Local,
            None,
        )
    }

    #[test]
    fn valid_work_order_passes() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn rejects_empty_goals() {
        let mut wo = base();
        wo.proposed_goals.clear();
        assert_eq!(wo.validate(), Err(WorkOrderError::EmptyGoals));
    }

    #[test]
    fn rejects_zero_max_steps() {
        let mut wo = base();
        wo.constraints.max_steps = 0;
        assert_eq!(wo.validate(), Err(WorkOrderError::NonPositiveMaxSteps));
    }

    #[test]
    fn cloud_mode_requires_token_map_ref() {
        let mut wo = base();
        wo.redaction_mode = RedactionMode::Cloud;
        assert_eq!(wo.validate(), Err(WorkOrderError::MissingTokenMapRef));
        wo.token_map_ref = Some("tm-1".to_string());
        assert!(wo.validate().is_ok());
    }

    #[test]
    fn generated_id_has_wo_prefix() {
        assert!(base().id.starts_with("wo-"));
    }
}
