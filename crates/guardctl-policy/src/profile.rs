//! Loading, validating and layering safety profiles onto the base policy
//! and denylist (component C).

use crate::denylist::{Denylist, DenylistSpec};
use crate::model::Tier;
use crate::rule::{Policy, Rule};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An instruction-level regex flagging that the agent is being asked to
/// do something outside its delegated mandate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorityBoundary {
    pub pattern: String,
    pub reason: String,
}

/// A named safety bundle applied additively to the base policy and
/// denylist. Profiles never remove rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub authority_boundaries: Vec<AuthorityBoundary>,
    #[serde(default)]
    pub execution_boundaries: DenylistSpec,
    #[serde(default)]
    pub policy: Option<Policy>,
    #[serde(default)]
    pub min_tier: Option<Tier>,
}

/// Errors that can occur while loading or composing a profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to parse profile YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to read profile file: {0}")]
    Io(#[from] std::io::Error),
}

impl Profile {
    /// Parse a profile from strict YAML (unknown top-level keys are
    /// rejected by `#[serde(deny_unknown_fields)]`).
    pub fn from_yaml(yaml: &str) -> Result<Self, ProfileError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a profile from a file on disk.
    pub fn load(path: &std::path::Path) -> Result<Self, ProfileError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Apply this profile additively onto `policy` and `denylist`:
    /// execution boundaries merge into the denylist, profile rules are
    /// prepended ahead of the base rule set so they are consulted first.
    pub fn apply(&self, policy: &mut Policy, denylist: &mut Denylist) {
        for pattern in &self.execution_boundaries.urls {
            denylist.add_url_pattern(pattern);
        }
        for pattern in &self.execution_boundaries.files {
            denylist.add_file_pattern(pattern);
        }
        for pattern in &self.execution_boundaries.commands {
            denylist.add_command_substring(pattern);
        }
        if let Some(profile_policy) = &self.policy {
            policy.prepend(profile_policy.rules.clone());
        }
    }

    /// Check free-form instruction text against this profile's authority
    /// boundaries, returning every boundary whose pattern matches along
    /// with its reason.
    #[must_use]
    pub fn check_authority_boundaries<'a>(&'a self, instruction: &str) -> Vec<&'a AuthorityBoundary> {
        self.authority_boundaries
            .iter()
            .filter(|boundary| {
                Regex::new(&format!("(?i){}", boundary.pattern))
                    .is_ok_and(|re| re.is_match(instruction))
            })
            .collect()
    }
}

/// Compose a base policy and denylist with a sequence of profiles, applied
/// in order. Profile composition is flat: there is no inheritance graph
/// between profiles, only layering onto the same base.
pub fn compose(base_policy: &Policy, base_denylist_spec: &DenylistSpec, profiles: &[Profile]) -> (Policy, Denylist) {
    let mut policy = base_policy.clone();
    let mut denylist = Denylist::from_spec(base_denylist_spec);
    for profile in profiles {
        profile.apply(&mut policy, &mut denylist);
    }
    (policy, denylist)
}
