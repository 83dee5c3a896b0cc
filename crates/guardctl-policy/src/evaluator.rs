//! The deterministic decision function (component D).

use crate::denylist::Denylist;
use crate::model::{Action, Decision, PolicyResult, Tier, TraceState};
use crate::rule::Policy;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Per-agent resource budgets consulted by the evaluator's budget stage.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    pub max_bytes: Option<u64>,
    pub max_rows: Option<u64>,
}

/// Configuration consumed by [`evaluate`]: which tags count as "zones" for
/// escalation purposes, and per-agent budgets.
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    pub sensitive_tags: HashSet<String>,
    pub budgets: HashMap<String, Budget>,
}

/// Evaluate a single action. Pure with respect to `state`: the same
/// `(action, state, ...)` yields the same result before `state` is
/// mutated by this call. The evaluation order is fixed and first-match-wins
/// within each stage.
#[must_use]
pub fn evaluate(
    action: &Action,
    state: &mut TraceState,
    purpose: &str,
    agent: &str,
    denylist: &Denylist,
    policy: &Policy,
    config: &EvaluatorConfig,
) -> PolicyResult {
    // Stage 1: denylist.
    let (blocked, reason) = denylist.is_blocked(&action.resource, &action.tool);
    if blocked {
        let result = PolicyResult::deny(
            reason.unwrap_or_else(|| "matched denylist".to_string()),
            "denylist.block",
        );
        state.record_denied();
        return result;
    }

    // Stage 2: rule set, first match wins.
    for rule in &policy.rules {
        if rule.matches(
            purpose,
            &action.resource,
            &action.tool,
            agent,
            action.metadata.sensitivity,
            &action.metadata.tags,
        ) {
            let result = apply_rule_decision(rule, action, purpose);
            commit(state, &result, action);
            return result;
        }
    }

    // Stage 3: zone escalation.
    let zone_tags: Vec<String> = action
        .metadata
        .tags
        .iter()
        .filter(|t| config.sensitive_tags.contains(*t))
        .cloned()
        .collect();
    let new_zone = zone_tags.iter().find(|t| !state.zones_entered.contains(t));
    let existing_sensitive_zone =
        state.zones_entered.iter().find(|t| config.sensitive_tags.contains(*t));
    if let (Some(existing), Some(new_tag)) = (existing_sensitive_zone, new_zone) {
        let approval_key = format!("zone:{existing}+{new_tag}");
        let result = PolicyResult::require_approval(
            format!("crossing from zone '{existing}' into zone '{new_tag}' requires approval"),
            None,
            approval_key,
        );
        commit(state, &result, action);
        return result;
    }

    // Stage 4: budget.
    if let Some(budget) = config.budgets.get(agent) {
        let projected_bytes = state.bytes_total + action.metadata.bytes;
        let projected_rows = state.rows_total + action.metadata.rows.unwrap_or(0);
        let over_bytes = budget.max_bytes.is_some_and(|max| projected_bytes > max);
        let over_rows = budget.max_rows.is_some_and(|max| projected_rows > max);
        if over_bytes || over_rows {
            let result = PolicyResult::deny("budget exceeded", "budget.exceeded");
            state.record_denied();
            return result;
        }
    }

    // Stage 5: default allow.
    let result = PolicyResult::allow();
    commit(state, &result, action);
    result
}

fn apply_rule_decision(rule: &crate::rule::Rule, action: &Action, purpose: &str) -> PolicyResult {
    let tier = match rule.decision {
        Decision::Allow => Tier::Informational,
        Decision::AllowWithRedaction | Decision::RewriteOutput => Tier::Reversible,
        Decision::RequireApproval => Tier::RequiresApproval,
        Decision::Deny => Tier::Irreversible,
    };
    let reason = format!("matched rule '{}'", rule.id);
    let approval_key = (rule.decision == Decision::RequireApproval).then(|| {
        format!("rule:{}:{}:{}", action.tool, rule.resource_pattern, purpose)
    });
    PolicyResult {
        decision: rule.decision,
        reason,
        policy_id: Some(rule.id.clone()),
        approval_key,
        redaction_directives: Vec::new(),
        rewrite_text: None,
        tier,
    }
}

fn commit(state: &mut TraceState, result: &PolicyResult, action: &Action) {
    if result.decision == Decision::Deny {
        state.record_denied();
        return;
    }
    let zone_tags: Vec<String> = action.metadata.tags.clone();
    state.record_allowed(
        &zone_tags,
        action.metadata.bytes,
        action.metadata.rows.unwrap_or(0),
    );
}

/// Content hash of the policy + denylist active at evaluation time, stored
/// on each audit entry as `policy_hash` so a replay (component O) can
/// detect that a given decision was made under a different configuration.
#[must_use]
pub fn policy_hash(policy: &Policy, denylist_spec: &crate::denylist::DenylistSpec) -> String {
    let mut hasher = Sha256::new();
    let policy_json = serde_json::to_vec(policy).unwrap_or_default();
    let denylist_json = serde_json::to_vec(denylist_spec).unwrap_or_default();
    hasher.update(&policy_json);
    hasher.update(&denylist_json);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
