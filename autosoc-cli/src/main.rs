//! AutoSOC CLI — operator console for the incident lifecycle engine.
//!
//! Provides one-shot commands and an interactive REPL.

mod commands;
mod render;
mod repl;

use autosoc_core::{Console, StatusFilter};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// AutoSOC: automated incident response console
#[derive(Parser, Debug)]
#[command(name = "autosoc", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fixed RNG seed for a reproducible session
    #[arg(long)]
    seed: Option<u64>,

    /// Start the REPL with live mode off
    #[arg(long)]
    paused: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    /// Subcommand (starts the interactive console if omitted)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run live mode in the foreground, streaming events
    Run {
        /// Stop after this many seconds (runs until Ctrl-C if omitted)
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// List seeded incidents
    Incidents {
        /// Status filter: all, pending, running, completed, failed, paused
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List the playbook catalog
    Playbooks {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show dashboard metrics for a seeded console
    Metrics {
        /// Print JSON instead of a panel
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = stderr_filter(cli.verbose, cli.quiet);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "autosoc", "autosoc")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "autosoc.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let mut config = autosoc_core::load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(seed) = cli.seed {
        config.simulation.rng_seed = Some(seed);
    }

    if let Some(command) = cli.command {
        return commands::handle_command(command, config).await;
    }

    let start_live = config.simulation.start_live && !cli.paused;
    let console = Console::new(config)?;
    console.set_live_mode(start_live)?;
    repl::run_interactive(console).await
}

/// Stderr log level for the `-v`/`-q` flags.
fn stderr_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
