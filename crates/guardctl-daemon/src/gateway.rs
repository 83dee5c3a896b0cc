//! Gateway: approval, rejection, and TTL expiry of work orders
//! (component M).

use crate::error::DaemonError;
use crate::processor::Directories;
use crate::workorder::{OutboxRecord, WorkOrderStatus};
use chrono::{DateTime, Duration, Utc};
use guardctl_common::ids::validate_id;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Default time-to-live for a pending work order before the expiration
/// sweeper rejects it.
pub const DEFAULT_TTL: Duration = Duration::hours(24);

/// A pending work order decorated with its computed expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingWorkOrder {
    pub id: String,
    pub record: OutboxRecord,
    pub expires_at: DateTime<Utc>,
}

/// Serialises mutations to outbox/approved/rejected/ingested state
/// within one process, mirroring the approval store's single mutex.
pub struct Gateway {
    dirs: Directories,
    ttl: Duration,
    lock: Mutex<()>,
}

impl Gateway {
    pub fn new(dirs: Directories, ttl: Duration) -> Self {
        Self { dirs, ttl, lock: Mutex::new(()) }
    }

    /// List outbox files whose status is `pending_approval`, each
    /// decorated with its expiry timestamp.
    pub fn pending_wos(&self) -> Result<Vec<PendingWorkOrder>, DaemonError> {
        let _guard = self.lock.lock().unwrap();
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dirs.outbox)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let record: OutboxRecord = serde_json::from_slice(&std::fs::read(&path)?)?;
            if record.status != WorkOrderStatus::PendingApproval {
                continue;
            }
            let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let created_at = record
                .work_order
                .as_ref()
                .map(|wo| wo.created_at)
                .unwrap_or_else(Utc::now);
            out.push(PendingWorkOrder { id, expires_at: created_at + self.ttl, record });
        }
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }

    /// Move a pending, unexpired work order from outbox to
    /// `state/approved/`, re-checking status and expiry, then write an
    /// ingest payload to `state/ingested/` with the raw `data` field
    /// stripped from each observation's evidence.
    pub fn approve(&self, id: &str) -> Result<(), DaemonError> {
        validate_id(id).map_err(crate::job::JobError::InvalidId)?;
        let _guard = self.lock.lock().unwrap();

        let outbox_path = self.dirs.outbox.join(format!("{id}.json"));
        let mut record: OutboxRecord = serde_json::from_slice(&std::fs::read(&outbox_path)?)?;
        if record.status != WorkOrderStatus::PendingApproval {
            return Err(DaemonError::Job(crate::job::JobError::InvalidId(format!(
                "work order {id} is not pending approval"
            ))));
        }
        if let Some(wo) = &record.work_order {
            if Utc::now() > wo.created_at + self.ttl {
                return Err(DaemonError::Job(crate::job::JobError::InvalidId(format!(
                    "work order {id} has expired"
                ))));
            }
        }

        record.status = WorkOrderStatus::Approved;
        let approved_path = self.dirs.approved.join(format!("{id}.json"));
        let tmp = approved_path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&record)?)?;
        std::fs::rename(&tmp, &approved_path)?;

        let ingest = strip_raw_data(&record);
        let ingested_path = self.dirs.ingested.join(format!("{id}.json"));
        let ingest_tmp = ingested_path.with_extension("tmp");
        std::fs::write(&ingest_tmp, serde_json::to_vec(&ingest)?)?;
        std::fs::rename(&ingest_tmp, &ingested_path)?;

        std::fs::remove_file(&outbox_path)?;
        Ok(())
    }

    /// Write an updated rejected record, then unlink the outbox entry.
    pub fn reject(&self, id: &str, reason: &str) -> Result<(), DaemonError> {
        validate_id(id).map_err(crate::job::JobError::InvalidId)?;
        let _guard = self.lock.lock().unwrap();

        let outbox_path = self.dirs.outbox.join(format!("{id}.json"));
        let mut record: OutboxRecord = serde_json::from_slice(&std::fs::read(&outbox_path)?)?;
        record.status = WorkOrderStatus::Rejected;
        record.error = Some(reason.to_string());

        let rejected_path = self.dirs.rejected.join(format!("{id}.json"));
        let tmp = rejected_path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&record)?)?;
        std::fs::rename(&tmp, &rejected_path)?;

        std::fs::remove_file(&outbox_path)?;
        Ok(())
    }

    /// Expiration sweeper: move every pending work order older than
    /// the configured TTL to `state/rejected/` with `error="expired"`.
    pub fn sweep_expired(&self) -> Result<Vec<String>, DaemonError> {
        let mut expired = Vec::new();
        for pending in self.pending_wos()? {
            if Utc::now() > pending.expires_at {
                let mut record = pending.record;
                record.status = WorkOrderStatus::Expired;
                record.error = Some("expired".to_string());
                let _guard = self.lock.lock().unwrap();
                let rejected_path = self.dirs.rejected.join(format!("{}.json", pending.id));
                let tmp = rejected_path.with_extension("tmp");
                std::fs::write(&tmp, serde_json::to_vec(&record)?)?;
                std::fs::rename(&tmp, &rejected_path)?;
                let outbox_path = self.dirs.outbox.join(format!("{}.json", pending.id));
                std::fs::remove_file(&outbox_path)?;
                expired.push(pending.id);
            }
        }
        Ok(expired)
    }
}

fn strip_raw_data(record: &OutboxRecord) -> OutboxRecord {
    let mut stripped = record.clone();
    if let Some(wo) = &mut stripped.work_order {
        for observation in &mut wo.observations {
            if let serde_json::Value::Object(map) = &mut observation.evidence {
                map.remove("data");
            }
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workorder::{Constraints, Observation, RedactionMode, WorkOrder, WorkOrderTarget};

    fn gateway_with_pending(id: &str) -> (tempfile::TempDir, Gateway) {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(dir.path()).unwrap();
        let wo = WorkOrder::new(
            "incident-1",
            WorkOrderTarget { host: None, scope: "/tmp".to_string() },
            vec![Observation { step: "scan".to_string(), summary: "x".to_string(), evidence: serde_json::json!({"data": "secret", "summary": "ok"}) }],
            Constraints { allow_paths: vec![], deny_paths: vec![], network: false, sudo: false, max_steps: 3 },
            vec!["remediate".to_string()],
            RedactionMode::Local,
            None,
        );
        let record = OutboxRecord { status: WorkOrderStatus::PendingApproval, error: None, work_order: Some(wo) };
        std::fs::write(dirs.outbox.join(format!("{id}.json")), serde_json::to_vec(&record).unwrap()).unwrap();
        let gateway = Gateway::new(dirs, DEFAULT_TTL);
        (dir, gateway)
    }

    #[test]
    fn pending_wos_lists_the_one_pending_entry() {
        let (_dir, gateway) = gateway_with_pending("job-1");
        let pending = gateway.pending_wos().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "job-1");
    }

    #[test]
    fn approve_moves_to_approved_and_ingested_and_strips_raw_data() {
        let (dir, gateway) = gateway_with_pending("job-1");
        gateway.approve("job-1").unwrap();
        assert!(!dir.path().join("outbox/job-1.json").exists());
        assert!(dir.path().join("state/approved/job-1.json").exists());
        let ingested: OutboxRecord = serde_json::from_slice(&std::fs::read(dir.path().join("state/ingested/job-1.json")).unwrap()).unwrap();
        let evidence = &ingested.work_order.unwrap().observations[0].evidence;
        assert!(evidence.get("data").is_none());
        assert!(evidence.get("summary").is_some());
    }

    #[test]
    fn reject_writes_rejected_record_and_unlinks_outbox() {
        let (dir, gateway) = gateway_with_pending("job-1");
        gateway.reject("job-1", "not needed").unwrap();
        assert!(!dir.path().join("outbox/job-1.json").exists());
        let rejected: OutboxRecord = serde_json::from_slice(&std::fs::read(dir.path().join("state/rejected/job-1.json")).unwrap()).unwrap();
        assert_eq!(rejected.status, WorkOrderStatus::Rejected);
        assert_eq!(rejected.error.as_deref(), Some("not needed"));
    }

    #[test]
    fn approve_rejects_invalid_id() {
        let (_dir, gateway) = gateway_with_pending("job-1");
        assert!(gateway.approve("../etc").is_err());
    }

    #[test]
    fn sweep_expired_moves_stale_pending_wo_to_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(dir.path()).unwrap();
        let mut wo = WorkOrder::new(
            "incident-1",
            WorkOrderTarget { host: None, scope: "/tmp".to_string() },
            vec![],
            Constraints { allow_paths: vec![], deny_paths: vec![], network: false, sudo: false, max_steps: 3 },
            vec!["remediate".to_string()],
            RedactionMode::Local,
            None,
        );
        wo.created_at = Utc::now() - Duration::hours(48);
        let record = OutboxRecord { status: WorkOrderStatus::PendingApproval, error: None, work_order: Some(wo) };
        std::fs::write(dirs.outbox.join("job-1.json"), serde_json::to_vec(&record).unwrap()).unwrap();

        let gateway = Gateway::new(dirs, DEFAULT_TTL);
        let expired = gateway.sweep_expired().unwrap();
        assert_eq!(expired, vec!["job-1".to_string()]);
        assert!(dir.path().join("state/rejected/job-1.json").exists());
        assert!(!dir.path().join("outbox/job-1.json").exists());
    }
}
