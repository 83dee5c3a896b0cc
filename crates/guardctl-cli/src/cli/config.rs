//! Loads the policy/denylist/profile/evaluator configuration rooted at
//! `GUARDCTL_CONFIG_DIR` (default `.guardctl/`), composing profiles onto
//! the base policy and denylist per spec §4.C.

use anyhow::Context;
use guardctl_policy::{compose, Denylist, DenylistSpec, EvaluatorConfig, Policy, Profile};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Per-agent budget limits, keyed by agent name.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct BudgetSpec {
    #[serde(default)]
    max_bytes: Option<u64>,
    #[serde(default)]
    max_rows: Option<u64>,
}

/// `config.yaml`: evaluator-wide settings that are not patterns or
/// rules (sensitivity tags counted as zones, per-agent budgets).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ConfigSpec {
    #[serde(default)]
    sensitive_tags: HashSet<String>,
    #[serde(default)]
    budgets: HashMap<String, BudgetSpec>,
}

/// The fully composed configuration a command needs to call
/// [`guardctl_policy::evaluate`].
pub struct LoadedConfig {
    pub policy: Policy,
    pub denylist: Denylist,
    pub denylist_spec: DenylistSpec,
    pub config: EvaluatorConfig,
}

fn default_config_dir() -> PathBuf {
    std::env::var("GUARDCTL_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".guardctl"))
}

/// Load the base policy/denylist, apply every named profile in order,
/// and build the evaluator config. `config_dir` defaults to
/// `GUARDCTL_CONFIG_DIR`/`.guardctl`; a missing directory or missing
/// individual file yields an empty/default value rather than an error,
/// so a bare `guardctl policy eval` works against an unconfigured
/// host.
pub fn load(config_dir: Option<&Path>, profile_names: &[String]) -> anyhow::Result<LoadedConfig> {
    let root = config_dir.map(Path::to_path_buf).unwrap_or_else(default_config_dir);

    let base_policy = read_yaml::<Policy>(&root.join("policy.yaml"))?.unwrap_or_default();
    let base_denylist_spec = read_yaml::<DenylistSpec>(&root.join("denylist.yaml"))?.unwrap_or_default();
    let config_spec = read_yaml::<ConfigSpec>(&root.join("config.yaml"))?.unwrap_or_default();

    let mut profiles = Vec::with_capacity(profile_names.len());
    for name in profile_names {
        let path = root.join("profiles").join(format!("{name}.yaml"));
        let profile = Profile::load(&path)
            .with_context(|| format!("loading profile '{name}' from {}", path.display()))?;
        profiles.push(profile);
    }

    let (policy, denylist) = compose(&base_policy, &base_denylist_spec, &profiles);

    let mut denylist_spec = base_denylist_spec;
    for profile in &profiles {
        denylist_spec.urls.extend(profile.execution_boundaries.urls.iter().cloned());
        denylist_spec.files.extend(profile.execution_boundaries.files.iter().cloned());
        denylist_spec.commands.extend(profile.execution_boundaries.commands.iter().cloned());
    }

    let mut budgets = HashMap::new();
    for (agent, spec) in config_spec.budgets {
        budgets.insert(agent, guardctl_policy::Budget { max_bytes: spec.max_bytes, max_rows: spec.max_rows });
    }

    Ok(LoadedConfig {
        policy,
        denylist,
        denylist_spec,
        config: EvaluatorConfig { sensitive_tags: config_spec.sensitive_tags, budgets },
    })
}

/// Resolve the audit log path: an explicit CLI flag wins, then
/// `GUARDCTL_AUDIT_LOG`, then `.guardctl/audit.jsonl`.
pub fn audit_log_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    std::env::var("GUARDCTL_AUDIT_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".guardctl/audit.jsonl"))
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value = serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}
