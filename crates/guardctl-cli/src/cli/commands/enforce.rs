//! Enforcement wrapper (component I): evaluate one action and either
//! block, mask, rewrite, or execute per spec §4.I.

use anyhow::Context;
use clap::Args;
use guardctl_audit::AuditLog;
use guardctl_policy::{evaluate, policy_hash, Action, Decision, Metadata, Sensitivity, TraceState};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;

use crate::cli::config;

#[derive(Args, Debug)]
pub struct EnforceArgs {
    /// Tool performing the action, e.g. `command`, `http_proxy`, `file_read`.
    #[arg(long, default_value = "command")]
    pub tool: String,

    /// The resource being acted on. For `tool=command` this is the
    /// command line executed verbatim via the shell on `allow`.
    #[arg(long)]
    pub resource: Option<String>,

    /// The operation being performed.
    #[arg(long, default_value = "execute")]
    pub operation: String,

    /// Declared purpose of the action, matched against rule `purpose` globs.
    #[arg(long, default_value = "*")]
    pub purpose: String,

    /// Agent identifier, matched against rule `agent` predicates.
    #[arg(long, default_value = "cli")]
    pub agent: String,

    /// Trace id this action belongs to; a fresh trace state is built
    /// per invocation, so zone escalation across invocations requires
    /// a long-lived caller (the daemon/proxy), not this one-shot CLI.
    #[arg(long, default_value = "cli")]
    pub trace_id: String,

    /// Sensitivity of the resource: low, medium, high.
    #[arg(long, default_value = "low")]
    pub sensitivity: String,

    /// Tags attached to the action's metadata.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Safety profile(s) layered onto the base policy, in order.
    /// Defaults to `GUARDCTL_PROFILE` when no `--profile` flag is given.
    #[arg(long = "profile", env = "GUARDCTL_PROFILE", value_delimiter = ',')]
    pub profiles: Vec<String>,

    /// Directory containing policy.yaml/denylist.yaml/config.yaml/profiles/.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,

    /// Path to the audit log file.
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Disable output scanning for literal API-key patterns on allow.
    #[arg(long)]
    pub no_scan_output: bool,

    /// The command and its arguments, executed verbatim on `allow`
    /// when `tool=command`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// The block sentinel emitted on stderr for `deny`/`require_approval`
/// (spec §6).
#[derive(Debug, Serialize)]
struct BlockSentinel<'a> {
    blocked: bool,
    command: &'a str,
    decision: &'a str,
    reason: &'a str,
    policy_id: Option<&'a str>,
    approval_key: Option<&'a str>,
}

const PII_KEYS: &[&str] = &["password", "secret", "token", "api_key", "ssn", "credit_card"];
const MASK: &str = "<<REDACTED>>";

fn mask_pii_keys(value: &mut serde_json::Value, extra_keys: &[String]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if PII_KEYS.contains(&key.as_str()) || extra_keys.iter().any(|k| k == key) {
                    *v = serde_json::Value::String(MASK.to_string());
                } else {
                    mask_pii_keys(v, extra_keys);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                mask_pii_keys(item, extra_keys);
            }
        }
        _ => {}
    }
}

/// API-key-shaped literal patterns the wrapper scans `allow`ed stdout
/// for (spec §4.I): `gsk_*`, `sk-*`, `sk-ant-*`, bearer-JWT prefixes,
/// long hex tokens. Base64-encoded secrets and AWS `AKIA…` keys are a
/// documented gap, not a bug.
fn output_scan_pattern() -> Regex {
    Regex::new(r"(?:gsk_[A-Za-z0-9]{10,}|sk-ant-[A-Za-z0-9_-]{10,}|sk-[A-Za-z0-9]{10,}|eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+|\b[0-9a-fA-F]{32,}\b)")
        .expect("output scan pattern always compiles")
}

pub async fn run(args: EnforceArgs) -> anyhow::Result<i32> {
    let resource = args
        .resource
        .clone()
        .or_else(|| (!args.command.is_empty()).then(|| args.command.join(" ")))
        .context("either --resource or a trailing command is required")?;

    let loaded = config::load(args.config_dir.as_deref(), &args.profiles)?;

    let action = Action::new(&args.tool, &resource, &args.operation)
        .map_err(anyhow::Error::msg)?
        .with_metadata(Metadata {
            sensitivity: Sensitivity::parse_lenient(&args.sensitivity),
            tags: args.tags.clone(),
            ..Default::default()
        });

    let mut state = TraceState::new(&args.trace_id);
    let result = evaluate(
        &action,
        &mut state,
        &args.purpose,
        &args.agent,
        &loaded.denylist,
        &loaded.policy,
        &loaded.config,
    );

    let hash = policy_hash(&loaded.policy, &loaded.denylist_spec);
    let log_path = config::audit_log_path(args.audit_log.as_deref());
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let log = AuditLog::open(&log_path).context("opening audit log")?;
    log.record(
        guardctl_common::time::now(),
        &args.trace_id,
        &args.tool,
        &resource,
        result.decision.as_str(),
        &result.reason,
        result.tier.as_u8(),
        &hash,
    )
    .context("writing audit entry")?;

    match result.decision {
        Decision::Deny | Decision::RequireApproval => {
            let sentinel = BlockSentinel {
                blocked: true,
                command: &resource,
                decision: result.decision.as_str(),
                reason: &result.reason,
                policy_id: result.policy_id.as_deref(),
                approval_key: result.approval_key.as_deref(),
            };
            eprintln!("{}", serde_json::to_string(&sentinel)?);
            Ok(77)
        }
        Decision::AllowWithRedaction => {
            let mut value: serde_json::Value =
                serde_json::from_str(&resource).unwrap_or_else(|_| serde_json::Value::String(resource.clone()));
            let extra_keys: Vec<String> =
                result.redaction_directives.iter().map(|d| d.key.clone()).collect();
            mask_pii_keys(&mut value, &extra_keys);
            println!("{value}");
            Ok(0)
        }
        Decision::RewriteOutput => {
            println!("{}", result.rewrite_text.unwrap_or_default());
            Ok(0)
        }
        Decision::Allow => run_child(&args.command, &resource, !args.no_scan_output).await,
    }
}

#[cfg(unix)]
async fn wait_for_terminating_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    let mut int = signal(SignalKind::interrupt()).expect("installing SIGINT handler");
    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_terminating_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run_child(command: &[String], resource: &str, scan_output: bool) -> anyhow::Result<i32> {
    let mut child = if command.is_empty() {
        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(resource)
            .stdin(Stdio::inherit())
            .stdout(if scan_output { Stdio::piped() } else { Stdio::inherit() })
            .stderr(Stdio::inherit())
            .spawn()
    } else {
        tokio::process::Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::inherit())
            .stdout(if scan_output { Stdio::piped() } else { Stdio::inherit() })
            .stderr(Stdio::inherit())
            .spawn()
    }
    .context("spawning child process")?;

    let stdout_task = scan_output.then(|| {
        let stdout = child.stdout.take().expect("stdout was piped");
        tokio::spawn(scan_and_forward(stdout))
    });

    let status = tokio::select! {
        status = child.wait() => status.context("waiting for child process")?,
        () = wait_for_terminating_signal() => {
            child.start_kill().ok();
            child.wait().await.context("waiting for killed child process")?
        }
    };

    if let Some(task) = stdout_task {
        task.await.ok();
    }

    Ok(status.code().unwrap_or(1))
}

async fn scan_and_forward(mut stdout: tokio::process::ChildStdout) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    let mut buf = Vec::new();
    if stdout.read_to_end(&mut buf).await.is_err() {
        return;
    }
    let text = String::from_utf8_lossy(&buf);
    let pattern = output_scan_pattern();
    let redacted = pattern.replace_all(&text, MASK);
    let _ = tokio::io::stdout().write_all(redacted.as_bytes()).await;
}
