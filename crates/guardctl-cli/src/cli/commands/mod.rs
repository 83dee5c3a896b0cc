pub mod approval;
pub mod audit;
pub mod daemon;
pub mod enforce;
pub mod gateway;
pub mod integrity;
pub mod policy;
pub mod profile;
pub mod redact;
pub mod sim;

use crate::cli::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Enforce(args) => enforce::run(args).await,
        Command::Policy(args) => policy::run(args).await,
        Command::Profile(args) => profile::run(args).await,
        Command::Approval(args) => approval::run(args).await,
        Command::Audit(args) => audit::run(args).await,
        Command::Gateway(args) => gateway::run(args).await,
        Command::Daemon(args) => daemon::run(args).await,
        Command::Sim(args) => sim::run(args).await,
        Command::Redact(args) => redact::run(args).await,
        Command::Integrity(args) => integrity::run(args).await,
    }
}
