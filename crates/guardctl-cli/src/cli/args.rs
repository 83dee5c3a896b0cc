use clap::{Parser, Subcommand};

use crate::cli::commands::{
    approval::ApprovalArgs, audit::AuditArgs, daemon::DaemonArgs, enforce::EnforceArgs,
    gateway::GatewayArgs, integrity::IntegrityArgs, policy::PolicyArgs, profile::ProfileArgs,
    redact::RedactArgs, sim::SimArgs,
};

/// Transparent command wrapper and out-of-band control surface for
/// safety-policy-governed agent actions.
#[derive(Parser, Debug)]
#[command(name = "guardctl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate and, on allow, execute a command (or other action) under policy.
    Enforce(EnforceArgs),
    /// Evaluate an action without executing it.
    Policy(PolicyArgs),
    /// Validate a safety profile file.
    Profile(ProfileArgs),
    /// Manage pending approval requests.
    Approval(ApprovalArgs),
    /// Verify the tamper-evident audit log.
    Audit(AuditArgs),
    /// List, approve, or reject daemon work orders.
    Gateway(GatewayArgs),
    /// Run the inbox-watching investigation daemon.
    Daemon(DaemonArgs),
    /// Replay or certify a policy against recorded/scripted scenarios.
    Sim(SimArgs),
    /// Tokenise or restore sensitive text, or resolve a redaction mode.
    Redact(RedactArgs),
    /// Verify a binary's self-hash against an expected value.
    Integrity(IntegrityArgs),
}
