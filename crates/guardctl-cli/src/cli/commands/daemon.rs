//! `daemon start`: runs the inbox watcher, processor dispatch, and the
//! expiration sweeper until a termination signal arrives.

use anyhow::Context;
use clap::Args;
use guardctl_daemon::{
    sweepers, watcher, Directories, Gateway, JobType, PidLock, Processor, Runbook, RunbookError,
    StepExecutor, StepResult, DEFAULT_TTL, OBSERVE_PROFILE,
};
use guardctl_policy::{evaluate, Action, Decision, Metadata, TraceState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::config::{self, LoadedConfig};

fn default_daemon_root() -> PathBuf {
    std::env::var("GUARDCTL_DAEMON_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".guardctl/daemon"))
}

fn default_config_root() -> PathBuf {
    std::env::var("GUARDCTL_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".guardctl"))
}

/// `observe` jobs are hard-locked to the `clawbot` profile, but only if
/// one is actually configured; an unconfigured host (no
/// `profiles/clawbot.yaml`) runs observe jobs against the bare base
/// policy/denylist rather than failing to start, matching `config::load`'s
/// own missing-file-is-permissive convention.
fn clawbot_profile_names(config_dir: Option<&PathBuf>) -> Vec<String> {
    let root = config_dir.cloned().unwrap_or_else(default_config_root);
    if root.join("profiles").join(format!("{OBSERVE_PROFILE}.yaml")).exists() {
        vec![OBSERVE_PROFILE.to_string()]
    } else {
        vec![]
    }
}

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Root directory the daemon's inbox/outbox/state layout lives under.
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Runbook definition (YAML) describing the steps an investigation
    /// job runs. Defaults to an empty runbook when omitted.
    #[arg(long)]
    pub runbook: Option<PathBuf>,
    #[arg(long, default_value_t = watcher::DEFAULT_WORKERS)]
    pub workers: usize,
    #[arg(long, default_value_t = watcher::DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
    /// Safety profile(s) layered onto the base policy for `investigate`
    /// jobs. Defaults to `GUARDCTL_PROFILE`. `observe` jobs ignore this
    /// entirely and are hard-locked to the `clawbot` profile (spec §4.L).
    #[arg(long = "profile", env = "GUARDCTL_PROFILE", value_delimiter = ',')]
    pub profiles: Vec<String>,
    /// Directory containing policy.yaml/denylist.yaml/config.yaml/profiles/.
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

/// Evaluates each runbook step as a `command` action before shelling it
/// out via `sh -c`; a `deny`/`require_approval` verdict fails the step
/// instead of running it.
struct PolicyGatedExecutor {
    label: String,
    config: LoadedConfig,
}

impl StepExecutor for PolicyGatedExecutor {
    fn execute(&self, command: &str) -> Result<StepResult, RunbookError> {
        let action = Action::new("command", command, "execute")
            .map_err(RunbookError::ExecutionFailed)?
            .with_metadata(Metadata::default());
        let mut state = TraceState::new(&self.label);
        let result = evaluate(&action, &mut state, "*", &self.label, &self.config.denylist, &self.config.policy, &self.config.config);
        if matches!(result.decision, Decision::Deny | Decision::RequireApproval) {
            return Err(RunbookError::ExecutionFailed(format!(
                "blocked by policy ({}): {}",
                result.decision.as_str(),
                result.reason
            )));
        }

        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|e| RunbookError::ExecutionFailed(e.to_string()))?;
        let summary = if output.status.success() { "ok" } else { "failed" };
        Ok(StepResult {
            step: command.to_string(),
            summary: summary.to_string(),
            evidence: serde_json::json!({
                "stdout": String::from_utf8_lossy(&output.stdout),
                "stderr": String::from_utf8_lossy(&output.stderr),
                "status": output.status.code(),
            }),
        })
    }
}

pub async fn run(args: DaemonArgs) -> anyhow::Result<i32> {
    let root = args.root.unwrap_or_else(default_daemon_root);
    std::fs::create_dir_all(&root).context("creating daemon root")?;
    let lock = PidLock::acquire(root.join("daemon.pid")).context("acquiring daemon pid lock")?;

    let dirs = Directories::create_all(&root).context("laying out daemon directories")?;
    let runbook: Runbook = match &args.runbook {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading runbook {}", path.display()))?;
            serde_yaml::from_slice(&bytes).context("parsing runbook")?
        }
        None => Runbook { name: "noop".to_string(), steps: vec![] },
    };

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_terminating_signal().await;
        signal_cancel.cancel();
    });

    let gateway = Gateway::new(dirs.clone(), DEFAULT_TTL);
    let sweeper_cancel = cancel.clone();
    let sweeper_handle = tokio::spawn(async move {
        sweepers::run_expiration_sweeper(&gateway, sweeper_cancel).await;
    });

    if !args.profiles.is_empty() && args.profiles != [OBSERVE_PROFILE.to_string()] {
        tracing::warn!(
            requested = ?args.profiles,
            "observe jobs ignore --profile/GUARDCTL_PROFILE and are hard-locked to the clawbot profile"
        );
    }
    let investigate_config = config::load(args.config_dir.as_deref(), &args.profiles)
        .context("loading investigate profile configuration")?;
    let observe_config = config::load(args.config_dir.as_deref(), &clawbot_profile_names(args.config_dir.as_ref()))
        .context("loading clawbot observe profile configuration")?;
    let investigate_executor = Arc::new(PolicyGatedExecutor { label: "investigate".to_string(), config: investigate_config });
    let observe_executor = Arc::new(PolicyGatedExecutor { label: "observe".to_string(), config: observe_config });
    let runbook = Arc::new(runbook);

    let startup_names = {
        let processor = Processor::new(dirs.clone(), (*runbook).clone(), &*investigate_executor);
        let orphans = processor.recover_orphans().context("recovering orphaned jobs")?;
        for id in &orphans {
            tracing::info!(job_id = %id, "recovered orphaned job as failed");
        }
        processor.scan_inbox().context("scanning inbox for existing jobs")?
    };
    for name in &startup_names {
        dispatch_one(&dirs, &runbook, &investigate_executor, &observe_executor, name.clone()).await;
    }

    let watch_dirs = dirs.clone();
    let watch_runbook = Arc::clone(&runbook);
    let watch_investigate = Arc::clone(&investigate_executor);
    let watch_observe = Arc::clone(&observe_executor);
    let watch_cancel = cancel.clone();

    watcher::run(
        dirs.inbox.clone(),
        args.workers,
        args.queue_depth,
        watch_cancel,
        move |name| {
            let dirs = watch_dirs.clone();
            let runbook = Arc::clone(&watch_runbook);
            let investigate = Arc::clone(&watch_investigate);
            let observe = Arc::clone(&watch_observe);
            async move { dispatch_one(&dirs, &runbook, &investigate, &observe, name).await }
        },
    )
    .await
    .context("running inbox watcher")?;

    cancel.cancel();
    let _ = sweeper_handle.await;
    drop(lock);
    Ok(0)
}

/// Routes a job to the investigate- or observe-scoped policy-gated
/// executor depending on its declared type; observe jobs never see the
/// operator-selected investigate profile set (spec §4.L).
async fn dispatch_one(
    dirs: &Directories,
    runbook: &Arc<Runbook>,
    investigate_executor: &Arc<PolicyGatedExecutor>,
    observe_executor: &Arc<PolicyGatedExecutor>,
    file_name: String,
) {
    let peek_processor = Processor::new(dirs.clone(), (**runbook).clone(), &**investigate_executor);
    let (job, processing_path) = match peek_processor.admit(&file_name) {
        Ok(admitted) => admitted,
        Err(e) => {
            tracing::warn!(error = %e, file = %file_name, "job admission failed");
            return;
        }
    };

    let executor: &Arc<PolicyGatedExecutor> = match job.job_type {
        JobType::Observe => observe_executor,
        JobType::Investigate => investigate_executor,
    };
    let processor = Processor::new(dirs.clone(), (**runbook).clone(), &**executor);
    if let Err(e) = processor.process(&job, &processing_path) {
        tracing::warn!(error = %e, job_id = %job.id, "job processing failed");
    }
}

#[cfg(unix)]
async fn wait_for_terminating_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut int = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_terminating_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
