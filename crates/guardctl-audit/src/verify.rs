//! Offline verifier for the hash-chained audit log (component G).

use crate::entry::AuditEntry;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;

/// A single chain-integrity violation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainBreak {
    /// 1-indexed line number of the first entry whose `prev_hash` no
    /// longer matches.
    pub line: usize,
    pub expected: String,
    pub actual: String,
}

/// Result of verifying an audit log end to end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyReport {
    pub valid: bool,
    pub entry_count: usize,
    pub error: Option<ChainBreak>,
}

/// Errors unrelated to chain integrity: malformed JSON lines, I/O.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("I/O error reading audit log: {0}")]
    Io(#[from] io::Error),
    #[error("malformed JSON on line {line}: {source}")]
    Malformed { line: usize, source: serde_json::Error },
}

/// Stream the file at `path` line by line, recomputing each `prev_hash`
/// and reporting `valid=true` only if every entry matches.
///
/// Truncation of a prefix of the file is NOT cryptographically detected —
/// the truncated prefix remains internally valid. Operators must detect
/// truncation via entry-count monitoring. Deletion of the file surfaces
/// as an I/O error from this function, not as an invalid report.
pub fn verify_file(path: &Path) -> Result<VerifyReport, VerifyError> {
    let file = std::fs::File::open(path)?;
    verify_reader(io::BufReader::new(file))
}

/// Verify an arbitrary reader of newline-delimited audit entries.
pub fn verify_reader<R: BufRead>(reader: R) -> Result<VerifyReport, VerifyError> {
    let mut expected_prev = AuditEntry::genesis_hash();
    let mut count = 0usize;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let entry: AuditEntry = serde_json::from_str(&line)
            .map_err(|source| VerifyError::Malformed { line: line_no, source })?;
        count += 1;

        if entry.prev_hash != expected_prev {
            return Ok(VerifyReport {
                valid: false,
                entry_count: count,
                error: Some(ChainBreak { line: line_no, expected: expected_prev, actual: entry.prev_hash }),
            });
        }
        expected_prev = entry.content_hash();
    }

    Ok(VerifyReport { valid: true, entry_count: count, error: None })
}
