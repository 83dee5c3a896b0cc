//! Append-only, hash-chained audit log and binary integrity self-check —
//! components G and H.

pub mod entry;
pub mod integrity;
pub mod log;
pub mod verify;

pub use entry::{ActionRef, AuditEntry};
pub use integrity::{self_check, AlertSink, IntegrityError, TamperEvent};
pub use log::{AuditLog, AuditLogError};
pub use verify::{verify_file, verify_reader, ChainBreak, VerifyError, VerifyReport};
