//! Approval lifecycle operations (component E) exposed as CLI verbs for
//! operators approving or denying a `require_approval` decision.

use anyhow::Context;
use chrono::Duration;
use clap::{Args, Subcommand};
use guardctl_policy::ApprovalStore;
use std::path::PathBuf;

fn default_store_dir() -> PathBuf {
    std::env::var("GUARDCTL_CONFIG_DIR")
        .map(|d| PathBuf::from(d).join("approvals"))
        .unwrap_or_else(|_| PathBuf::from(".guardctl/approvals"))
}

#[derive(Args, Debug)]
pub struct ApprovalArgs {
    /// Directory the approval store is rooted at.
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: ApprovalCmd,
}

#[derive(Subcommand, Debug)]
pub enum ApprovalCmd {
    /// Record a pending approval request. Idempotent for a repeated key.
    Request(RequestArgs),
    /// Approve a pending request for `duration_secs` (0 = one-shot).
    Approve(ApproveArgs),
    /// Deny a pending request.
    Deny(KeyArgs),
    /// Print the current status of a request.
    Check(KeyArgs),
}

#[derive(Args, Debug)]
pub struct RequestArgs {
    pub approval_key: String,
    #[arg(long, default_value = "")]
    pub reason: String,
    #[arg(long)]
    pub policy_id: Option<String>,
    #[arg(long, default_value = "")]
    pub resource_excerpt: String,
}

#[derive(Args, Debug)]
pub struct ApproveArgs {
    pub approval_key: String,
    #[arg(long, default_value_t = 0)]
    pub duration_secs: i64,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    pub approval_key: String,
}

pub async fn run(args: ApprovalArgs) -> anyhow::Result<i32> {
    let store = ApprovalStore::open(args.store_dir.unwrap_or_else(default_store_dir))
        .context("opening approval store")?;

    match args.cmd {
        ApprovalCmd::Request(r) => {
            let record = store
                .request(&r.approval_key, &r.reason, r.policy_id, &r.resource_excerpt)
                .context("recording approval request")?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ApprovalCmd::Approve(a) => {
            let record = store
                .approve(&a.approval_key, Duration::seconds(a.duration_secs))
                .context("approving request")?;
            print_or_missing(record)?;
        }
        ApprovalCmd::Deny(k) => {
            let record = store.deny(&k.approval_key).context("denying request")?;
            print_or_missing(record)?;
        }
        ApprovalCmd::Check(k) => {
            let record = store.check(&k.approval_key).context("checking request")?;
            print_or_missing(record)?;
        }
    }
    Ok(0)
}

fn print_or_missing(record: Option<guardctl_policy::ApprovalRecord>) -> anyhow::Result<()> {
    match record {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("{{\"found\":false}}"),
    }
    Ok(())
}
