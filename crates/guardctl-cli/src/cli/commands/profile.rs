//! Profile tooling: validate a safety profile YAML file against the
//! strict schema without applying it.

use anyhow::Context;
use clap::{Args, Subcommand};
use guardctl_policy::Profile;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub cmd: ProfileCmd,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCmd {
    /// Parse a profile file and report whether it matches the strict schema.
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    pub path: PathBuf,
}

pub async fn run(args: ProfileArgs) -> anyhow::Result<i32> {
    match args.cmd {
        ProfileCmd::Validate(args) => validate(args).await,
    }
}

async fn validate(args: ValidateArgs) -> anyhow::Result<i32> {
    let profile = Profile::load(&args.path)
        .with_context(|| format!("validating profile {}", args.path.display()))?;
    println!(
        "profile '{}' is valid: {} authority boundaries, {} policy rules",
        profile.name,
        profile.authority_boundaries.len(),
        profile.policy.as_ref().map(|p| p.rules.len()).unwrap_or(0),
    );
    Ok(0)
}
