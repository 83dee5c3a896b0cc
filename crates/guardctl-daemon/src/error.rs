//! Daemon-local error taxonomy and its conversion into the shared
//! [`guardctl_common::Error`] kind at the component boundary.

use crate::admit::AdmitError;
use crate::cache::CacheError;
use crate::job::JobError;
use crate::pidlock::PidLockError;
use crate::runbook::RunbookError;
use crate::workorder::WorkOrderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("invalid job: {0}")]
    Job(#[from] JobError),
    #[error("invalid work order: {0}")]
    WorkOrder(#[from] WorkOrderError),
    #[error(transparent)]
    Admission(#[from] AdmitError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    PidLock(#[from] PidLockError),
    #[error(transparent)]
    Runbook(#[from] RunbookError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON in {path}: {source}")]
    MalformedJson { path: std::path::PathBuf, source: serde_json::Error },
    #[error("job {id} was interrupted mid-processing by a prior crash")]
    Orphan { id: String },
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("duplicate job id: {id} already has an outbox result")]
    Duplicate { id: String },
}

impl From<DaemonError> for guardctl_common::Error {
    fn from(e: DaemonError) -> Self {
        match e {
            DaemonError::Job(err) => guardctl_common::Error::InvalidInput(err.to_string()),
            DaemonError::WorkOrder(err) => guardctl_common::Error::InvalidInput(err.to_string()),
            DaemonError::MalformedJson { path, source } => {
                guardctl_common::Error::InvalidInput(format!("{}: {source}", path.display()))
            }
            DaemonError::Admission(AdmitError::Symlink(path)) => {
                guardctl_common::Error::InvalidInput(format!("refused symlink: {}", path.display()))
            }
            DaemonError::Orphan { id, .. } => guardctl_common::Error::Orphan { id, reason: "interrupted".to_string() },
            DaemonError::Io(err) => guardctl_common::Error::TransientIo(err.to_string()),
            DaemonError::Admission(AdmitError::Io(err)) => guardctl_common::Error::TransientIo(err.to_string()),
            DaemonError::Cache(err) => guardctl_common::Error::TransientIo(err.to_string()),
            DaemonError::PidLock(err) => guardctl_common::Error::IntegrityFailure(err.to_string()),
            DaemonError::Runbook(err) => guardctl_common::Error::InvalidInput(err.to_string()),
            DaemonError::Serialize(err) => guardctl_common::Error::Json(err),
            DaemonError::Duplicate { id } => {
                guardctl_common::Error::InvalidInput(format!("duplicate job id: {id}"))
            }
        }
    }
}
