//! Policy simulation: replay a recorded log against a candidate
//! config, or certify a policy against a scenario suite (component O).

use anyhow::Context;
use clap::{Args, Subcommand};
use guardctl_sim::cert::run_suite;
use guardctl_sim::{replay, RecordedEntry, Suite};
use std::path::PathBuf;

use crate::cli::config;

#[derive(Args, Debug)]
pub struct SimArgs {
    #[command(subcommand)]
    pub cmd: SimCmd,
}

#[derive(Subcommand, Debug)]
pub enum SimCmd {
    /// Re-evaluate recorded entries against a candidate config and
    /// report decisions that became more or less restrictive.
    Replay(ReplayArgs),
    /// Run a scenario suite against a candidate config and report
    /// pass/fail per scenario.
    Cert(CertArgs),
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file of recorded entries (one `RecordedEntry` per line).
    pub entries: PathBuf,
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
    #[arg(long = "profile")]
    pub profiles: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CertArgs {
    /// Scenario suite YAML file.
    pub suite: PathBuf,
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
    #[arg(long = "profile")]
    pub profiles: Vec<String>,
}

pub async fn run(args: SimArgs) -> anyhow::Result<i32> {
    match args.cmd {
        SimCmd::Replay(args) => replay_cmd(args).await,
        SimCmd::Cert(args) => cert_cmd(args).await,
    }
}

fn load_entries(path: &std::path::Path) -> anyhow::Result<Vec<RecordedEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading recorded entries {}", path.display()))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).context("parsing recorded entry"))
        .collect()
}

async fn replay_cmd(args: ReplayArgs) -> anyhow::Result<i32> {
    let loaded = config::load(args.config_dir.as_deref(), &args.profiles)?;
    let entries = load_entries(&args.entries)?;
    let report = replay(&entries, &loaded.denylist, &loaded.policy, &loaded.config);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.summary.newly_allowed > 0 { 1 } else { 0 })
}

async fn cert_cmd(args: CertArgs) -> anyhow::Result<i32> {
    let loaded = config::load(args.config_dir.as_deref(), &args.profiles)?;
    let suite = Suite::load(&args.suite)
        .with_context(|| format!("loading scenario suite {}", args.suite.display()))?;
    let report = run_suite(&suite, &loaded.denylist, &loaded.policy, &loaded.config);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.all_passed() { 0 } else { 1 })
}
