//! possync CLI - Command-line interface for the POS sync engine
//!
//! Provides commands for:
//! - Running a full sync, a pull or a push
//! - Viewing sync status and probing the server
//! - Changing the sync endpoint settings
//! - Inspecting and trimming the sync log
//! - Listing and resolving conflicts
//!
//! Every command opens the POS database directly and runs in-process.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    check::CheckCommand, config::ConfigCommand, conflicts::ConflictsCommand, log::LogCommand,
    status::StatusCommand, sync::SyncCommand,
};
use context::AppContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "possync", version, about = "POS database synchronization")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize with the cloud (pull then push)
    Sync(SyncCommand),
    /// Show pending changes, conflicts and the last sync
    Status(StatusCommand),
    /// Check that the sync server is reachable
    Check(CheckCommand),
    /// View and change sync settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// View or clean the sync log
    #[command(subcommand)]
    Log(LogCommand),
    /// Manage sync conflicts
    #[command(subcommand)]
    Conflicts(ConflictsCommand),
}

/// Maps `-v` repetitions to a filter; `RUST_LOG` wins when set
fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = AppContext::load(cli.config, OutputFormat::from_flag(cli.json));

    let result = match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Check(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Log(cmd) => cmd.execute(&ctx).await,
        Commands::Conflicts(cmd) => cmd.execute(&ctx).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ctx.formatter().error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
