//! Redaction pipeline tooling (component F) exposed standalone, for
//! operators preparing evidence or testing mode resolution before it
//! reaches a cloud LLM endpoint.

use anyhow::Context;
use clap::{Args, Subcommand};
use guardctl_redact::{detoken, redact, resolve_mode, ModeOverride, TokenMap};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct RedactArgs {
    #[command(subcommand)]
    pub cmd: RedactCmd,
}

#[derive(Subcommand, Debug)]
pub enum RedactCmd {
    /// Tokenise sensitive values in `text`, printing the redacted text
    /// and the resulting token map as JSON.
    Text(TextArgs),
    /// Restore original values in `text` using a previously saved
    /// token map.
    Detoken(DetokenArgs),
    /// Resolve whether an endpoint requires cloud-mode tokenisation.
    Mode(ModeArgs),
}

#[derive(Args, Debug)]
pub struct TextArgs {
    pub text: String,
    /// Write the resulting token map to this path instead of stdout.
    #[arg(long)]
    pub token_map_out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DetokenArgs {
    pub text: String,
    pub token_map: PathBuf,
}

#[derive(Args, Debug)]
pub struct ModeArgs {
    pub endpoint: String,
    /// Force `always`/`never` tokenisation regardless of endpoint host.
    /// Defaults to `GUARDCTL_REDACTION_MODE`, or `unset` if absent.
    #[arg(long, env = "GUARDCTL_REDACTION_MODE", default_value = "unset")]
    pub r#override: String,
}

pub async fn run(args: RedactArgs) -> anyhow::Result<i32> {
    match args.cmd {
        RedactCmd::Text(args) => text(args).await,
        RedactCmd::Detoken(args) => detoken_cmd(args).await,
        RedactCmd::Mode(args) => mode(args).await,
    }
}

async fn text(args: TextArgs) -> anyhow::Result<i32> {
    let mut token_map = TokenMap::new();
    let redacted = redact(&args.text, &mut token_map);
    println!("{redacted}");

    let json = serde_json::to_string_pretty(&token_map)?;
    match args.token_map_out {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("writing token map to {}", path.display()))?,
        None => eprintln!("{json}"),
    }
    Ok(0)
}

async fn detoken_cmd(args: DetokenArgs) -> anyhow::Result<i32> {
    let bytes = std::fs::read(&args.token_map)
        .with_context(|| format!("reading token map {}", args.token_map.display()))?;
    let token_map: TokenMap = serde_json::from_slice(&bytes).context("parsing token map")?;
    println!("{}", detoken(&args.text, &token_map));
    Ok(0)
}

async fn mode(args: ModeArgs) -> anyhow::Result<i32> {
    let override_mode = ModeOverride::parse(&args.r#override);
    let mode = resolve_mode(&args.endpoint, override_mode);
    println!("{mode:?}");
    Ok(0)
}
