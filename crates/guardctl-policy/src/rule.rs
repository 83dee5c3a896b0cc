//! Rule set consulted by the evaluator's rule stage (component D, stage 2).

use crate::model::{Decision, Sensitivity};
use serde::{Deserialize, Serialize};

/// A single policy rule. A rule matches an action when all of its present
/// predicates are satisfied; absent predicates are wildcards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub id: String,
    pub purpose: String,
    pub resource_pattern: String,
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub min_sensitivity: Option<Sensitivity>,
    #[serde(default)]
    pub required_tags: Vec<String>,
    pub decision: Decision,
}

impl Rule {
    /// True when every predicate on this rule is satisfied by the given
    /// action attributes.
    #[must_use]
    pub fn matches(
        &self,
        purpose: &str,
        resource: &str,
        tool: &str,
        agent: &str,
        sensitivity: Sensitivity,
        tags: &[String],
    ) -> bool {
        if !crate::glob::full_match(&self.purpose, purpose) {
            return false;
        }
        if !crate::glob::full_match(&self.resource_pattern, resource) {
            return false;
        }
        if let Some(expected_tool) = &self.tool {
            if expected_tool != tool {
                return false;
            }
        }
        if let Some(expected_agent) = &self.agent {
            if expected_agent != agent {
                return false;
            }
        }
        if let Some(min) = self.min_sensitivity {
            if sensitivity < min {
                return false;
            }
        }
        if !self
            .required_tags
            .iter()
            .all(|required| tags.iter().any(|t| t == required))
        {
            return false;
        }
        true
    }
}

/// An ordered rule set. Rules are iterated in order; the first match wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Policy {
    /// Prepend `extra` rules ahead of the current rule set (profile
    /// composition never removes rules, only adds ahead of the base).
    pub fn prepend(&mut self, mut extra: Vec<Rule>) {
        extra.extend(std::mem::take(&mut self.rules));
        self.rules = extra;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_matches_all_predicates() {
        let rule = Rule {
            id: "r1".to_string(),
            purpose: "payments.*".to_string(),
            resource_pattern: "https://api.example.com/**".to_string(),
            tool: Some("http_proxy".to_string()),
            agent: None,
            min_sensitivity: Some(Sensitivity::Medium),
            required_tags: vec!["payment".to_string()],
            decision: Decision::RequireApproval,
        };
        assert!(rule.matches(
            "payments.charge",
            "https://api.example.com/v1/charges",
            "http_proxy",
            "agent-1",
            Sensitivity::High,
            &["payment".to_string()],
        ));
        assert!(!rule.matches(
            "payments.charge",
            "https://api.example.com/v1/charges",
            "http_proxy",
            "agent-1",
            Sensitivity::Low,
            &["payment".to_string()],
        ));
    }
}
