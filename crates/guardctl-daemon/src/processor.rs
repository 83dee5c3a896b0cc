//! Inbox → processing → outbox state machine (component L).

use crate::admit::{move_file, reject_symlink};
use crate::error::DaemonError;
use crate::job::Job;
use crate::runbook::{Runbook, StepExecutor};
use crate::workorder::{Constraints, OutboxRecord, Observation, RedactionMode, WorkOrder, WorkOrderStatus, WorkOrderTarget};
use std::path::{Path, PathBuf};

/// The fixed directory layout the processor reads and writes.
#[derive(Debug, Clone)]
pub struct Directories {
    pub inbox: PathBuf,
    pub processing: PathBuf,
    pub outbox: PathBuf,
    pub rejected: PathBuf,
    pub approved: PathBuf,
    pub ingested: PathBuf,
}

impl Directories {
    /// Lay out and create every directory under `root`.
    pub fn create_all(root: &Path) -> std::io::Result<Self> {
        let dirs = Self {
            inbox: root.join("inbox"),
            processing: root.join("state/processing"),
            outbox: root.join("outbox"),
            rejected: root.join("state/rejected"),
            approved: root.join("state/approved"),
            ingested: root.join("state/ingested"),
        };
        for dir in [&dirs.inbox, &dirs.processing, &dirs.outbox, &dirs.rejected, &dirs.approved, &dirs.ingested] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }
}

/// Observation-only runs are hard-locked to the `clawbot` enforcement
/// profile; the processor never exposes an override for them.
pub const OBSERVE_PROFILE: &str = "clawbot";

/// Drives a single job from `inbox/<id>.json` through to an outbox
/// record, enforcing the admission security invariants from spec §4.L.
pub struct Processor<'a> {
    pub dirs: Directories,
    pub runbook: Runbook,
    pub executor: &'a dyn StepExecutor,
}

impl<'a> Processor<'a> {
    pub fn new(dirs: Directories, runbook: Runbook, executor: &'a dyn StepExecutor) -> Self {
        Self { dirs, runbook, executor }
    }

    /// Admit a single file named `file_name` out of the inbox: reject
    /// symlinks, parse and validate the job, check the file name
    /// matches the job id, reject a job id that already has an outbox
    /// result (spec §8 scenario 6), then move it into
    /// `state/processing/`. Returns the job and its new path in
    /// processing.
    pub fn admit(&self, file_name: &str) -> Result<(Job, PathBuf), DaemonError> {
        let inbox_path = self.dirs.inbox.join(file_name);
        reject_symlink(&inbox_path)?;

        let bytes = std::fs::read(&inbox_path)?;
        let job: Job = serde_json::from_slice(&bytes)
            .map_err(|source| DaemonError::MalformedJson { path: inbox_path.clone(), source })?;
        job.validate()?;

        if job.file_name() != file_name {
            return Err(DaemonError::Job(crate::job::JobError::InvalidId(format!(
                "file name {file_name} does not match job id {}",
                job.id
            ))));
        }

        if self.dirs.outbox.join(WorkOrder::outbox_file_name(&job.id)).exists() {
            let record = OutboxRecord {
                status: WorkOrderStatus::Failed,
                error: Some(format!("duplicate job id: {}", job.id)),
                work_order: None,
            };
            self.write_outbox(&job.id, &record)?;
            std::fs::remove_file(&inbox_path)?;
            return Err(DaemonError::Duplicate { id: job.id });
        }

        let processing_path = self.dirs.processing.join(file_name);
        move_file(&inbox_path, &processing_path)?;
        Ok((job, processing_path))
    }

    /// Run the admitted job's runbook and write the corresponding
    /// outbox record, then remove the processing file. Errors during
    /// execution still produce a `failed` outbox record rather than
    /// propagating, matching the three-way branch in spec §4.L; only
    /// admission/storage failures before this point propagate.
    pub fn process(&self, job: &Job, processing_path: &Path) -> Result<(), DaemonError> {
        let outcome = self.runbook.run(job, self.executor);
        let record = match outcome {
            Ok(observations) if observations.is_empty() => {
                OutboxRecord { status: WorkOrderStatus::Done, error: None, work_order: None }
            }
            Ok(observations) => {
                let work_order = self.build_work_order(job, observations);
                OutboxRecord { status: WorkOrderStatus::PendingApproval, error: None, work_order: Some(work_order) }
            }
            Err(e) => OutboxRecord { status: WorkOrderStatus::Failed, error: Some(e.to_string()), work_order: None },
        };

        self.write_outbox(&job.id, &record)?;
        std::fs::remove_file(processing_path)?;
        Ok(())
    }

    fn build_work_order(&self, job: &Job, observations: Vec<Observation>) -> WorkOrder {
        WorkOrder::new(
            job.id.clone(),
            WorkOrderTarget { host: job.target.host.clone(), scope: job.target.scope.clone() },
            observations,
            Constraints { allow_paths: vec![], deny_paths: vec![], network: false, sudo: false, max_steps: 10 },
            vec!["review findings".to_string()],
            RedactionMode::Local,
            None,
        )
    }

    fn write_outbox(&self, job_id: &str, record: &OutboxRecord) -> Result<(), DaemonError> {
        let path = self.dirs.outbox.join(WorkOrder::outbox_file_name(job_id));
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(record)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Recover from a crash: every file left in `state/processing/` is
    /// an orphan from an interrupted run and is moved to the outbox as
    /// a failed result with reason `"interrupted"`.
    pub fn recover_orphans(&self) -> Result<Vec<String>, DaemonError> {
        let mut recovered = Vec::new();
        for entry in std::fs::read_dir(&self.dirs.processing)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let id = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string();
            let record = OutboxRecord {
                status: WorkOrderStatus::Failed,
                error: Some("interrupted".to_string()),
                work_order: None,
            };
            self.write_outbox(&id, &record)?;
            std::fs::remove_file(&path)?;
            recovered.push(id);
        }
        Ok(recovered)
    }

    /// Pre-existing files in the inbox at startup, to be dispatched
    /// before the watcher takes over.
    pub fn scan_inbox(&self) -> std::io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dirs.inbox)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") && !name.ends_with(".tmp") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobType, Target};
    use crate::runbook::{RunbookError, StepResult};
    use chrono::Utc;

    struct EchoExecutor;
    impl StepExecutor for EchoExecutor {
        fn execute(&self, command: &str) -> Result<StepResult, RunbookError> {
            Ok(StepResult { step: command.to_string(), summary: "ok".to_string(), evidence: serde_json::json!({}) })
        }
    }

    struct FailingExecutor;
    impl StepExecutor for FailingExecutor {
        fn execute(&self, _command: &str) -> Result<StepResult, RunbookError> {
            Err(RunbookError::ExecutionFailed("boom".to_string()))
        }
    }

    fn write_job(dirs: &Directories, id: &str) -> PathBuf {
        let job = Job {
            id: id.to_string(),
            job_type: JobType::Observe,
            target: Target { host: None, scope: "/tmp".to_string() },
            brief: String::new(),
            source: None,
            created_at: Utc::now(),
        };
        let path = dirs.inbox.join(job.file_name());
        std::fs::write(&path, serde_json::to_vec(&job).unwrap()).unwrap();
        path
    }

    #[test]
    fn admits_and_processes_job_with_no_observations() {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(root.path()).unwrap();
        write_job(&dirs, "job-1");
        let runbook = Runbook { name: "noop".to_string(), steps: vec![] };
        let processor = Processor::new(dirs.clone(), runbook, &EchoExecutor);

        let (job, processing_path) = processor.admit("job-1.json").unwrap();
        assert!(!dirs.inbox.join("job-1.json").exists());
        processor.process(&job, &processing_path).unwrap();

        let outbox_path = dirs.outbox.join("job-1.json");
        let record: OutboxRecord = serde_json::from_slice(&std::fs::read(outbox_path).unwrap()).unwrap();
        assert_eq!(record.status, WorkOrderStatus::Done);
    }

    #[test]
    fn processing_failure_yields_failed_record() {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(root.path()).unwrap();
        write_job(&dirs, "job-1");
        let runbook = Runbook { name: "broken".to_string(), steps: vec![crate::runbook::StepTemplate { name: "x".to_string(), command_template: "ls {scope}".to_string() }] };
        let processor = Processor::new(dirs.clone(), runbook, &FailingExecutor);

        let (job, processing_path) = processor.admit("job-1.json").unwrap();
        processor.process(&job, &processing_path).unwrap();

        let record: OutboxRecord = serde_json::from_slice(&std::fs::read(dirs.outbox.join("job-1.json")).unwrap()).unwrap();
        assert_eq!(record.status, WorkOrderStatus::Failed);
    }

    #[test]
    fn rejects_id_mismatched_file_name() {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(root.path()).unwrap();
        let job = Job {
            id: "job-1".to_string(),
            job_type: JobType::Observe,
            target: Target { host: None, scope: "/tmp".to_string() },
            brief: String::new(),
            source: None,
            created_at: Utc::now(),
        };
        std::fs::write(dirs.inbox.join("other.json"), serde_json::to_vec(&job).unwrap()).unwrap();
        let runbook = Runbook { name: "noop".to_string(), steps: vec![] };
        let processor = Processor::new(dirs, runbook, &EchoExecutor);
        assert!(processor.admit("other.json").is_err());
    }

    #[test]
    fn recovers_orphaned_processing_file_as_failed() {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(root.path()).unwrap();
        std::fs::write(dirs.processing.join("job-2.json"), b"{}").unwrap();
        let runbook = Runbook { name: "noop".to_string(), steps: vec![] };
        let processor = Processor::new(dirs.clone(), runbook, &EchoExecutor);

        let recovered = processor.recover_orphans().unwrap();
        assert_eq!(recovered, vec!["job-2".to_string()]);
        let record: OutboxRecord = serde_json::from_slice(&std::fs::read(dirs.outbox.join("job-2.json")).unwrap()).unwrap();
        assert_eq!(record.status, WorkOrderStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("interrupted"));
        assert!(!dirs.processing.join("job-2.json").exists());
    }

    #[test]
    fn resubmitting_the_same_job_id_yields_duplicate_failure() {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(root.path()).unwrap();
        write_job(&dirs, "job-1");
        let runbook = Runbook { name: "noop".to_string(), steps: vec![] };
        let processor = Processor::new(dirs.clone(), runbook, &EchoExecutor);

        let (job, processing_path) = processor.admit("job-1.json").unwrap();
        processor.process(&job, &processing_path).unwrap();

        write_job(&dirs, "job-1");
        let err = processor.admit("job-1.json").unwrap_err();
        assert!(matches!(err, DaemonError::Duplicate { .. }));

        let record: OutboxRecord = serde_json::from_slice(&std::fs::read(dirs.outbox.join("job-1.json")).unwrap()).unwrap();
        assert_eq!(record.status, WorkOrderStatus::Failed);
        assert!(record.error.unwrap().contains("duplicate"));
        assert!(!dirs.inbox.join("job-1.json").exists());
    }

    #[test]
    fn scan_inbox_ignores_tmp_files() {
        let root = tempfile::tempdir().unwrap();
        let dirs = Directories::create_all(root.path()).unwrap();
        write_job(&dirs, "job-1");
        std::fs::write(dirs.inbox.join("job-2.json.tmp"), b"{}").unwrap();
        let runbook = Runbook { name: "noop".to_string(), steps: vec![] };
        let processor = Processor::new(dirs, runbook, &EchoExecutor);
        assert_eq!(processor.scan_inbox().unwrap(), vec!["job-1.json".to_string()]);
    }
}
