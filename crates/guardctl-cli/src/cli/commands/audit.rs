//! Offline audit log verification (component G).

use anyhow::Context;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::config;

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub cmd: AuditCmd,
}

#[derive(Subcommand, Debug)]
pub enum AuditCmd {
    /// Recompute the hash chain and report the first break, if any.
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Defaults to `GUARDCTL_AUDIT_LOG` / `.guardctl/audit.jsonl`.
    pub path: Option<PathBuf>,
}

pub async fn run(args: AuditArgs) -> anyhow::Result<i32> {
    match args.cmd {
        AuditCmd::Verify(args) => verify(args).await,
    }
}

async fn verify(args: VerifyArgs) -> anyhow::Result<i32> {
    let path = config::audit_log_path(args.path.as_deref());
    let report = guardctl_audit::verify_file(&path).context("verifying audit log")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.valid { 0 } else { 1 })
}
