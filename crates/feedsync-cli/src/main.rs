//! FeedSync CLI - Command-line interface for FeedSync
//!
//! Provides commands for:
//! - Signing in to Dropbox or a Miniflux account
//! - Pulling and pushing reading state
//! - Managing feeds and sync settings
//! - Inspecting configuration and failure reports

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod adapters;
mod commands;
mod context;
mod output;

use commands::{
    auth::AuthCommand, config::ConfigCommand, feed::FeedCommand, report::ReportCommand,
    settings::SettingsCommand, status::StatusCommand, sync::SyncCommand,
};
use feedsync_core::config::Config;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "feedsync", version, about = "Reading-state sync for RSS readers")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
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
    /// Sign in to or out of a sync service
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Pull or push reading state
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Manage subscribed feeds
    #[command(subcommand)]
    Feed(FeedCommand),
    /// Show sync status
    Status(StatusCommand),
    /// View and change sync settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage failure reports
    #[command(subcommand)]
    Report(ReportCommand),
}

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOpts {
    pub format: OutputFormat,
    pub config_path: PathBuf,
}

/// Picks the log filter: `-v` wins over `RUST_LOG`, which wins over the
/// configured level
fn env_filter(verbose: u8, configured: &str) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let level = Config::load_or_default(&config_path).logging.level;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose, &level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let opts = GlobalOpts {
        format: if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        },
        config_path,
    };

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&opts).await,
        Commands::Sync(cmd) => cmd.execute(&opts).await,
        Commands::Feed(cmd) => cmd.execute(&opts).await,
        Commands::Status(cmd) => cmd.execute(&opts).await,
        Commands::Settings(cmd) => cmd.execute(&opts).await,
        Commands::Config(cmd) => cmd.execute(&opts).await,
        Commands::Report(cmd) => cmd.execute(&opts).await,
    }
}
