//! # thermostat
//!
//! Console for setpoint-sync against a simulated, flaky thermostat.
//!
//! ## Commands
//!
//! - `session`: Interactive session (default)
//! - `demo`: Scripted offline, reconnect and conflict walkthrough
//!
//! ## Example
//!
//! ```bash
//! # Interactive session with defaults
//! thermostat
//!
//! # Scripted demo with JSON status output and debug logs
//! RUST_LOG=setpoint_sync_client=debug thermostat --json demo
//!
//! # Custom latency and retry settings
//! thermostat --config thermostat.toml session
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{build_engine, demo, session};
use config::Config;

/// Config file read when `--config` is not given, if present.
const DEFAULT_CONFIG_PATH: &str = "thermostat.toml";

/// Console for setpoint-sync against a simulated thermostat.
#[derive(Parser, Debug)]
#[command(name = "thermostat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Print state snapshots as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive session reading commands from stdin
    Session,

    /// Scripted walkthrough of offline edits, reconnect and a conflict
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(cli.config.as_deref(), Path::new(DEFAULT_CONFIG_PATH))
        .context("Failed to load configuration")?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let engine = build_engine(&config);

    match cli.command.unwrap_or(Commands::Session) {
        Commands::Session => session::run(engine, cli.json).await?,
        Commands::Demo => demo::run(engine, cli.json).await?,
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG` overrides `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
