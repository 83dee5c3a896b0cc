//! Job input file (component L input, spec §3/§6).

use chrono::{DateTime, Utc};
use guardctl_common::ids::validate_id;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Job type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Investigate,
    Observe,
}

/// The investigation target.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    #[serde(default)]
    pub host: Option<String>,
    pub scope: String,
}

/// A job submitted to the inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub target: Target,
    #[serde(default)]
    pub brief: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Validation errors for an incoming job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("invalid job id: {0}")]
    InvalidId(String),
    #[error("target.scope must not be empty")]
    EmptyScope,
}

impl Job {
    /// Validate the id-character-class and non-empty-scope invariants
    /// (spec §3).
    pub fn validate(&self) -> Result<(), JobError> {
        validate_id(&self.id).map_err(JobError::InvalidId)?;
        if self.target.scope.is_empty() {
            return Err(JobError::EmptyScope);
        }
        Ok(())
    }

    /// The file name this job must be admitted under: `<id>.json`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.json", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, scope: &str) -> Job {
        Job {
            id: id.to_string(),
            job_type: JobType::Observe,
            target: Target { host: None, scope: scope.to_string() },
            brief: "x".to_string(),
            source: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_dotdot_ids() {
        assert_eq!(job("../etc", "/tmp").validate(), Err(JobError::InvalidId(
            "id '../etc' must not contain '..'".to_string()
        )));
    }

    #[test]
    fn rejects_empty_scope() {
        assert_eq!(job("job-1", "").validate(), Err(JobError::EmptyScope));
    }

    #[test]
    fn accepts_well_formed_job() {
        assert!(job("job-1", "/tmp").validate().is_ok());
    }

    #[test]
    fn round_trips_through_json() {
        let original = job("job-1", "/tmp");
        let json = serde_json::to_string(&original).unwrap();
        let parsed: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, original.id);
    }

    #[test]
    fn rejects_unknown_top_level_fields() {
        let json = r#"{"id":"job-1","type":"observe","target":{"scope":"/tmp"},"bogus":1}"#;
        assert!(serde_json::from_str::<Job>(json).is_err());
    }
}
