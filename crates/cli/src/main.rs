//! Fincrm CLI - terminal host for the authenticated service clients

mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use commands::Commands;
use logging::LogLevel;
use std::path::PathBuf;
use tracing::{debug, error};

#[derive(Parser)]
#[command(name = "fincrm")]
#[command(about = "Talk to the fincrm services with a persistent login session")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Client configuration file (defaults to <state dir>/config/client.toml)
    #[arg(short = 'c', long, global = true, env = "FINCRM_CONFIG")]
    config: Option<PathBuf>,

    /// State directory for configuration and the persisted session
    #[arg(short = 'd', long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into(), cli.log_json)?;
    debug!("Starting fincrm CLI");

    if let Err(e) = cli.command.execute(cli.config, cli.state_dir).await {
        error!("Command failed: {e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}
