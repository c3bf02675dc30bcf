use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use refit::config::RunConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "refit")]
#[command(version, about = "Force-field refitting workflow orchestrator")]
pub struct Cli {
    /// Working directory of the optimization run. Defaults to the current directory.
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// The verbosity of the run logger.
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Perform the optimization, resuming from a previous checkpoint when one exists
    Run {
        /// Resume from the last completed iteration instead of starting clean
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        restart: bool,

        /// Path to the evaluator server configuration file
        #[arg(long)]
        server_config: Option<PathBuf>,
    },
    /// Report per-target iteration progress without modifying anything
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    refit::logging::init(&cli.log_level)?;

    let working_dir = match cli.working_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = RunConfig::new(working_dir);

    match &cli.command {
        Commands::Run {
            restart,
            server_config,
        } => {
            cmd::cmd_run(&config, *restart, server_config.as_deref()).await?;
        }
        Commands::Status => cmd::cmd_status(&config)?,
    }

    Ok(())
}
