//! Gateway operations (component M): list, approve, and reject pending
//! work orders produced by the daemon.

use anyhow::Context;
use clap::{Args, Subcommand};
use guardctl_daemon::{Directories, Gateway, DEFAULT_TTL};
use std::path::PathBuf;

fn default_daemon_root() -> PathBuf {
    std::env::var("GUARDCTL_DAEMON_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".guardctl/daemon"))
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    /// Root directory the daemon's inbox/outbox/state layout lives under.
    #[arg(long)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: GatewayCmd,
}

#[derive(Subcommand, Debug)]
pub enum GatewayCmd {
    /// List pending work orders awaiting approval, with expiry timestamps.
    Pending,
    /// Approve a pending work order, ingesting it with raw data stripped.
    Approve(IdArgs),
    /// Reject a pending work order with a reason.
    Reject(RejectArgs),
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct RejectArgs {
    pub id: String,
    pub reason: String,
}

pub async fn run(args: GatewayArgs) -> anyhow::Result<i32> {
    let root = args.root.unwrap_or_else(default_daemon_root);
    let dirs = Directories::create_all(&root).context("laying out daemon directories")?;
    let gateway = Gateway::new(dirs, DEFAULT_TTL);

    match args.cmd {
        GatewayCmd::Pending => {
            let pending = gateway.pending_wos().context("listing pending work orders")?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        GatewayCmd::Approve(a) => {
            gateway.approve(&a.id).context("approving work order")?;
            println!("approved {}", a.id);
        }
        GatewayCmd::Reject(r) => {
            gateway.reject(&r.id, &r.reason).context("rejecting work order")?;
            println!("rejected {}", r.id);
        }
    }
    Ok(0)
}
