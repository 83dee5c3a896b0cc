//! Inbox/outbox job daemon: runbook runner, observation cache,
//! processor, gateway, and work-order schema — components J, K, L, M, N.

pub mod admit;
pub mod cache;
pub mod error;
pub mod gateway;
pub mod job;
pub mod pidlock;
pub mod processor;
pub mod runbook;
pub mod sweepers;
pub mod watcher;
pub mod workorder;

pub use cache::{CachedObservation, ObservationCache};
pub use error::DaemonError;
pub use gateway::{Gateway, PendingWorkOrder, DEFAULT_TTL};
pub use job::{Job, JobError, JobType, Target};
pub use pidlock::{PidLock, PidLockError};
pub use processor::{Directories, Processor, OBSERVE_PROFILE};
pub use runbook::{Runbook, RunbookError, StepExecutor, StepResult, StepTemplate};
pub use sweepers::{Classifier, ClassifyOutcome, CACHE_RETRY_INTERVAL, EXPIRATION_INTERVAL};
pub use workorder::{
    Constraints, Observation, OutboxRecord, RedactionMode, WorkOrder, WorkOrderError, WorkOrderStatus,
    WorkOrderTarget,
};
