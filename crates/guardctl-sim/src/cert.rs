//! Certification: run curated scenario suites against a profile
//! (component P).

use guardctl_policy::{evaluate, Action, Decision, Denylist, EvaluatorConfig, Policy, Tier, TraceState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One named scenario: an action to evaluate and the decision/tier it
/// is expected to produce.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub name: String,
    pub tool: String,
    pub resource: String,
    pub operation: String,
    #[serde(default = "default_purpose")]
    pub purpose: String,
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Scenarios sharing a `group` run against the same `TraceState`,
    /// in list order, so zone-escalation scenarios can be expressed.
    /// Scenarios with no group get a fresh state each.
    #[serde(default)]
    pub group: Option<String>,
    pub expected_decision: Decision,
    #[serde(default)]
    pub expected_tier: Option<Tier>,
}

fn default_purpose() -> String {
    "certification".to_string()
}

fn default_agent() -> String {
    "cert-suite".to_string()
}

/// A named collection of scenarios, loaded from YAML.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    pub name: String,
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Error)]
pub enum CertError {
    #[error("failed to parse suite YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Suite {
    pub fn from_yaml(yaml: &str) -> Result<Self, CertError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: &std::path::Path) -> Result<Self, CertError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

/// Outcome of a single scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub name: String,
    pub passed: bool,
    pub expected_decision: Decision,
    pub actual_decision: Decision,
}

/// Summary + per-scenario results of a suite run.
#[derive(Debug, Clone, Serialize)]
pub struct CertReport {
    pub suite: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<ScenarioResult>,
}

impl CertReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Run every scenario in `suite` against `denylist`/`policy`/`config`.
/// Scenarios without a `group` each get a fresh `TraceState`; grouped
/// scenarios share one, in the order they appear in the suite.
#[must_use]
pub fn run_suite(suite: &Suite, denylist: &Denylist, policy: &Policy, config: &EvaluatorConfig) -> CertReport {
    let mut group_states: std::collections::HashMap<String, TraceState> = std::collections::HashMap::new();
    let mut results = Vec::with_capacity(suite.scenarios.len());
    let mut passed = 0;
    let mut failed = 0;

    for scenario in &suite.scenarios {
        let action = match Action::new(&scenario.tool, &scenario.resource, &scenario.operation) {
            Ok(action) => action.with_metadata(guardctl_policy::model::Metadata {
                tags: scenario.tags.clone(),
                ..Default::default()
            }),
            Err(e) => {
                results.push(ScenarioResult {
                    name: scenario.name.clone(),
                    passed: false,
                    expected_decision: scenario.expected_decision,
                    actual_decision: scenario.expected_decision,
                });
                tracing::warn!(scenario = %scenario.name, error = %e, "scenario action failed to construct");
                failed += 1;
                continue;
            }
        };

        let result = match &scenario.group {
            Some(group) => {
                let state = group_states.entry(group.clone()).or_insert_with(|| TraceState::new(group));
                evaluate(&action, state, &scenario.purpose, &scenario.agent, denylist, policy, config)
            }
            None => {
                let mut state = TraceState::new(&scenario.name);
                evaluate(&action, &mut state, &scenario.purpose, &scenario.agent, denylist, policy, config)
            }
        };

        let decision_ok = result.decision == scenario.expected_decision;
        let tier_ok = match scenario.expected_tier {
            Some(expected) => expected == result.tier,
            None => true,
        };
        let ok = decision_ok && tier_ok;

        if ok {
            passed += 1;
        } else {
            failed += 1;
        }

        results.push(ScenarioResult {
            name: scenario.name.clone(),
            passed: ok,
            expected_decision: scenario.expected_decision,
            actual_decision: result.decision,
        });
    }

    CertReport { suite: suite.name.clone(), total: suite.scenarios.len(), passed, failed, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guardctl_policy::DenylistSpec;

    fn scenario(name: &str, resource: &str, expected: Decision) -> Scenario {
        Scenario {
            name: name.to_string(),
            tool: "command".to_string(),
            resource: resource.to_string(),
            operation: "execute".to_string(),
            purpose: default_purpose(),
            agent: default_agent(),
            tags: vec![],
            group: None,
            expected_decision: expected,
            expected_tier: None,
        }
    }

    #[test]
    fn passing_scenario_is_counted() {
        let suite = Suite { name: "basic".to_string(), scenarios: vec![scenario("list", "ls -la", Decision::Allow)] };
        let denylist = Denylist::default();
        let policy = Policy::default();
        let config = EvaluatorConfig::default();
        let report = run_suite(&suite, &denylist, &policy, &config);
        assert_eq!(report.passed, 1);
        assert!(report.all_passed());
    }

    #[test]
    fn failing_scenario_is_reported() {
        let suite = Suite { name: "basic".to_string(), scenarios: vec![scenario("list", "ls -la", Decision::Deny)] };
        let denylist = Denylist::default();
        let policy = Policy::default();
        let config = EvaluatorConfig::default();
        let report = run_suite(&suite, &denylist, &policy, &config);
        assert_eq!(report.failed, 1);
        assert!(!report.all_passed());
    }

    #[test]
    fn denylisted_scenario_passes_when_deny_expected() {
        let suite = Suite {
            name: "basic".to_string(),
            scenarios: vec![scenario("rm", "rm -rf /", Decision::Deny)],
        };
        let denylist = Denylist::from_spec(&DenylistSpec { commands: vec!["rm -rf /".to_string()], ..Default::default() });
        let policy = Policy::default();
        let config = EvaluatorConfig::default();
        let report = run_suite(&suite, &denylist, &policy, &config);
        assert!(report.all_passed());
    }

    #[test]
    fn grouped_scenarios_share_trace_state_for_zone_escalation() {
        let mut config = EvaluatorConfig::default();
        config.sensitive_tags.insert("payment".to_string());
        config.sensitive_tags.insert("credential".to_string());

        let mut first = scenario("enter-payment", "https://pay.example/charge", Decision::Allow);
        first.tool = "http_proxy".to_string();
        first.tags = vec!["payment".to_string()];
        first.group = Some("zone-walk".to_string());

        let mut second = scenario("enter-credential", "/root/.aws/credentials", Decision::RequireApproval);
        second.tool = "file_read".to_string();
        second.tags = vec!["credential".to_string()];
        second.group = Some("zone-walk".to_string());

        let suite = Suite { name: "zones".to_string(), scenarios: vec![first, second] };
        let denylist = Denylist::default();
        let policy = Policy::default();
        let report = run_suite(&suite, &denylist, &policy, &config);
        assert!(report.all_passed(), "{:?}", report.results);
    }
}
