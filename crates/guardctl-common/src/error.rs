//! Shared error taxonomy for all guardctl subsystems.
//!
//! Local subsystems (policy, redaction, audit, daemon) define their own
//! error enums and convert into [`Error`] at the component boundary, the
//! same discipline `assay-core::errors::RunError` applies to provider
//! failures.

use thiserror::Error;

/// Result type alias used across guardctl crates.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy from spec §7.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON, schema violations, invalid job id, unknown job type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The evaluator returned `deny` or `require_approval`.
    #[error("policy block: {reason}")]
    PolicyBlock {
        /// Human-readable reason attached to the decision.
        reason: String,
        /// Rule or denylist id that produced the decision, if any.
        policy_id: Option<String>,
    },

    /// Post-validation detected a raw sensitive value in an LLM response.
    #[error("redaction leak detected: {0}")]
    RedactionLeak(String),

    /// Binary self-hash mismatch or checksum file mismatch.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// Rename EXDEV, partial writes, and other retryable I/O conditions.
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    /// A `state/processing/<id>.json` file survived a restart.
    #[error("orphaned job {id}: {reason}")]
    Orphan {
        /// The job id that was orphaned.
        id: String,
        /// Why it is considered orphaned (e.g. "interrupted").
        reason: String,
    },

    /// The audit verifier found a `prev_hash` mismatch.
    #[error("audit chain broken at line {line}: expected {expected}, got {actual}")]
    ChainBreak {
        /// 1-indexed line number of the first bad entry.
        line: usize,
        /// The hash the verifier recomputed.
        expected: String,
        /// The hash recorded in the file.
        actual: String,
    },

    /// Wrapper for lower-level I/O errors not yet classified.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper for JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code mapping from spec §6.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::PolicyBlock { .. } => 77,
            Error::IntegrityFailure(_) => 78,
            Error::ChainBreak { .. } => 1,
            _ => 1,
        }
    }

    /// True when the error is transient and the caller may retry the
    /// underlying operation (rename EXDEV, partial write).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo(_))
    }
}
