//! Non-executing policy evaluation: print the decision a command would
//! receive without running it, for scripting and CI gating.

use anyhow::Context;
use clap::{Args, Subcommand};
use guardctl_policy::{evaluate, Action, Metadata, Sensitivity, TraceState};
use std::path::PathBuf;

use crate::cli::config;

#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub cmd: PolicyCmd,
}

#[derive(Subcommand, Debug)]
pub enum PolicyCmd {
    /// Evaluate a single action and print the `PolicyResult` as JSON.
    Eval(EvalArgs),
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[arg(long, default_value = "command")]
    pub tool: String,
    #[arg(long)]
    pub resource: String,
    #[arg(long, default_value = "execute")]
    pub operation: String,
    #[arg(long, default_value = "*")]
    pub purpose: String,
    #[arg(long, default_value = "cli")]
    pub agent: String,
    #[arg(long, default_value = "low")]
    pub sensitivity: String,
    #[arg(long = "tag")]
    pub tags: Vec<String>,
    /// Defaults to `GUARDCTL_PROFILE` when no `--profile` flag is given.
    #[arg(long = "profile", env = "GUARDCTL_PROFILE", value_delimiter = ',')]
    pub profiles: Vec<String>,
    #[arg(long)]
    pub config_dir: Option<PathBuf>,
}

pub async fn run(args: PolicyArgs) -> anyhow::Result<i32> {
    match args.cmd {
        PolicyCmd::Eval(args) => eval(args).await,
    }
}

async fn eval(args: EvalArgs) -> anyhow::Result<i32> {
    let loaded = config::load(args.config_dir.as_deref(), &args.profiles)?;
    let action = Action::new(&args.tool, &args.resource, &args.operation)
        .map_err(anyhow::Error::msg)
        .context("constructing action")?
        .with_metadata(Metadata {
            sensitivity: Sensitivity::parse_lenient(&args.sensitivity),
            tags: args.tags,
            ..Default::default()
        });

    let mut state = TraceState::new("policy-eval");
    let result = evaluate(
        &action,
        &mut state,
        &args.purpose,
        &args.agent,
        &loaded.denylist,
        &loaded.policy,
        &loaded.config,
    );

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(match result.decision {
        guardctl_policy::Decision::Deny | guardctl_policy::Decision::RequireApproval => 77,
        _ => 0,
    })
}
