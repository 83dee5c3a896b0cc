//! Binary self-hash verification (component H), exposed as a verb so an
//! operator (or a startup wrapper script) can run the same check the
//! daemon/CLI would run against themselves before trusting a binary.

use clap::{Args, Subcommand};
use guardctl_audit::{self_check, IntegrityError};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct IntegrityArgs {
    #[command(subcommand)]
    pub cmd: IntegrityCmd,
}

#[derive(Subcommand, Debug)]
pub enum IntegrityCmd {
    /// Hash `binary` and compare against `expected_hash` (`sha256:<hex>`).
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    pub binary: PathBuf,
    pub expected_hash: String,
    /// Directory tamper events are written to on mismatch. Defaults to
    /// `GUARDCTL_CONFIG_DIR/tamper`.
    #[arg(long)]
    pub tamper_dir: Option<PathBuf>,
}

fn default_tamper_dir() -> PathBuf {
    std::env::var("GUARDCTL_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".guardctl"))
        .join("tamper")
}

pub async fn run(args: IntegrityArgs) -> anyhow::Result<i32> {
    match args.cmd {
        IntegrityCmd::Check(args) => check(args).await,
    }
}

async fn check(args: CheckArgs) -> anyhow::Result<i32> {
    let tamper_dir = args.tamper_dir.unwrap_or_else(default_tamper_dir);
    match self_check(&args.binary, &args.expected_hash, &tamper_dir, None) {
        Ok(()) => {
            println!("{{\"ok\":true}}");
            Ok(0)
        }
        Err(IntegrityError::Mismatch { event, .. }) => {
            eprintln!("{}", serde_json::to_string(&event)?);
            Ok(78)
        }
        Err(e) => Err(e.into()),
    }
}
