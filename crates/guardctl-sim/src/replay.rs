//! Audit log replay/diff simulator (component O).

use guardctl_policy::{evaluate, Action, Decision, Denylist, EvaluatorConfig, Policy, TraceState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The subset of an `AuditEntry` the replayer needs. Kept independent
/// of `guardctl-audit`'s concrete type so this crate can replay either
/// a live log or a hand-built fixture.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordedEntry {
    pub trace_id: String,
    pub tool: String,
    pub resource: String,
    pub operation: String,
    pub purpose: String,
    pub agent: String,
    #[serde(default)]
    pub sensitivity: guardctl_policy::model::Sensitivity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub rows: Option<u64>,
    pub old_decision: Decision,
}

/// One trace/action pair whose decision changed under the candidate
/// policy.
#[derive(Debug, Clone, Serialize)]
pub struct Divergence {
    pub trace_id: String,
    pub tool: String,
    pub resource: String,
    pub old_decision: Decision,
    pub new_decision: Decision,
}

/// Summary of a replay run, per spec §4.O: counts of decisions that
/// became more restrictive (`newly_blocked`) or less restrictive
/// (`newly_allowed`) under the candidate policy, using the total order
/// in §3 (`allow < allow_with_redaction < rewrite_output <
/// require_approval < deny`).
#[derive(Debug, Clone, Serialize, Default)]
pub struct ReplaySummary {
    pub total: usize,
    pub newly_blocked: usize,
    pub newly_allowed: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub summary: ReplaySummary,
    pub divergences: Vec<Divergence>,
}

/// Group entries by `trace_id`, preserving first-appearance order,
/// rebuild a fresh `TraceState` per trace, and re-run the evaluator on
/// each recorded action against the candidate denylist/policy,
/// collecting `(old_decision, new_decision)` pairs where they differ.
#[must_use]
pub fn replay(
    entries: &[RecordedEntry],
    denylist: &Denylist,
    policy: &Policy,
    config: &EvaluatorConfig,
) -> ReplayReport {
    let mut order: Vec<String> = Vec::new();
    let mut by_trace: BTreeMap<String, Vec<&RecordedEntry>> = BTreeMap::new();
    for entry in entries {
        if !by_trace.contains_key(&entry.trace_id) {
            order.push(entry.trace_id.clone());
        }
        by_trace.entry(entry.trace_id.clone()).or_default().push(entry);
    }

    let mut summary = ReplaySummary::default();
    let mut divergences = Vec::new();

    for trace_id in order {
        let mut state = TraceState::new(&trace_id);
        for entry in &by_trace[&trace_id] {
            let action = match Action::new(&entry.tool, &entry.resource, &entry.operation) {
                Ok(action) => action.with_metadata(guardctl_policy::model::Metadata {
                    sensitivity: entry.sensitivity,
                    tags: entry.tags.clone(),
                    bytes: entry.bytes,
                    rows: entry.rows,
                    ..Default::default()
                }),
                Err(e) => {
                    tracing::warn!(error = %e, trace_id = %trace_id, "skipping unreplayable recorded action");
                    continue;
                }
            };

            let result = evaluate(&action, &mut state, &entry.purpose, &entry.agent, denylist, policy, config);
            summary.total += 1;

            if result.decision == entry.old_decision {
                summary.unchanged += 1;
                continue;
            }

            if result.decision > entry.old_decision {
                summary.newly_blocked += 1;
            } else {
                summary.newly_allowed += 1;
            }

            divergences.push(Divergence {
                trace_id: trace_id.clone(),
                tool: entry.tool.clone(),
                resource: entry.resource.clone(),
                old_decision: entry.old_decision,
                new_decision: result.decision,
            });
        }
    }

    ReplayReport { summary, divergences }
}
