//! Runbook runner: expands parameterised investigation steps and
//! collects evidence (component J).
//!
//! The bodies of concrete runbooks (what commands to run for a given
//! job type) are an external collaborator per the purpose/scope
//! section — this module only owns the expansion and evidence
//! collection contract a runbook body is driven through.

use crate::job::Job;
use crate::workorder::Observation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One parameterised step in a runbook, before expansion against a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepTemplate {
    pub name: String,
    /// Template string with `{scope}` / `{host}` placeholders
    /// substituted from the job's target.
    pub command_template: String,
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runbook {
    pub name: String,
    pub steps: Vec<StepTemplate>,
}

/// The outcome of running a single expanded step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: String,
    pub summary: String,
    pub evidence: serde_json::Value,
}

/// Something that can execute an expanded step and report a result.
/// Concrete investigation logic (shelling out, calling an API) lives
/// outside this crate and is supplied by the caller.
pub trait StepExecutor {
    fn execute(&self, command: &str) -> Result<StepResult, RunbookError>;
}

/// Errors raised while expanding or running a runbook.
#[derive(Debug, Error)]
pub enum RunbookError {
    #[error("step template references unknown placeholder: {0}")]
    UnknownPlaceholder(String),
    #[error("step execution failed: {0}")]
    ExecutionFailed(String),
}

impl StepTemplate {
    /// Substitute `{scope}` and `{host}` in the command template with
    /// values drawn from the job's target. `{host}` is only valid when
    /// the job's target has a host set.
    pub fn expand(&self, job: &Job) -> Result<String, RunbookError> {
        let mut out = self.command_template.replace("{scope}", &job.target.scope);
        if out.contains("{host}") {
            let host = job
                .target
                .host
                .as_deref()
                .ok_or_else(|| RunbookError::UnknownPlaceholder("{host}".to_string()))?;
            out = out.replace("{host}", host);
        }
        Ok(out)
    }
}

impl Runbook {
    /// Run every step in order against `job`, using `executor` to
    /// actually perform each expanded command. Stops and returns the
    /// error at the first step that fails to expand or execute —
    /// partial evidence collected before the failure is discarded by
    /// the caller, per the "no observations / error" outbox branches
    /// in the processor's state machine.
    pub fn run(&self, job: &Job, executor: &dyn StepExecutor) -> Result<Vec<Observation>, RunbookError> {
        let mut observations = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let command = step.expand(job)?;
            let result = executor.execute(&command)?;
            observations.push(Observation {
                step: result.step,
                summary: result.summary,
                evidence: result.evidence,
            });
        }
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{JobType, Target};
    use chrono::Utc;

    struct EchoExecutor;
    impl StepExecutor for EchoExecutor {
        fn execute(&self, command: &str) -> Result<StepResult, RunbookError> {
            Ok(StepResult { step: command.to_string(), summary: "ok".to_string(), evidence: serde_json::json!({}) })
        }
    }

    fn job(scope: &str, host: Option<&str>) -> Job {
        Job {
            id: "job-1".to_string(),
            job_type: JobType::Investigate,
            target: Target { host: host.map(str::to_string), scope: scope.to_string() },
            brief: String::new(),
            source: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expands_scope_placeholder() {
        let step = StepTemplate { name: "list".to_string(), command_template: "ls {scope}".to_string() };
        assert_eq!(step.expand(&job("/tmp", None)).unwrap(), "ls /tmp");
    }

    #[test]
    fn missing_host_for_host_placeholder_errors() {
        let step = StepTemplate { name: "ping".to_string(), command_template: "ping {host}".to_string() };
        assert!(step.expand(&job("/tmp", None)).is_err());
    }

    #[test]
    fn runbook_collects_observation_per_step() {
        let runbook = Runbook {
            name: "investigate".to_string(),
            steps: vec![
                StepTemplate { name: "list".to_string(), command_template: "ls {scope}".to_string() },
                StepTemplate { name: "stat".to_string(), command_template: "stat {scope}".to_string() },
            ],
        };
        let observations = runbook.run(&job("/tmp", None), &EchoExecutor).unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].step, "ls /tmp");
    }
}
