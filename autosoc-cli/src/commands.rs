//! One-shot subcommand handlers.

use std::time::Duration;

use autosoc_core::{Console, ConsoleConfig, ConsoleEvent, StatusFilter};
use tokio::sync::broadcast::error::RecvError;

use crate::Commands;
use crate::render;

pub async fn handle_command(command: Commands, config: ConsoleConfig) -> anyhow::Result<()> {
    match command {
        Commands::Run { duration } => handle_run(config, duration).await,
        Commands::Incidents { status, json } => handle_incidents(config, status, json),
        Commands::Playbooks { json } => handle_playbooks(config, json),
        Commands::Metrics { json } => handle_metrics(config, json),
        Commands::Config => handle_config(&config),
    }
}

/// Live mode in the foreground: stream events and print metrics after each
/// tick until Ctrl-C or the optional duration elapses.
async fn handle_run(config: ConsoleConfig, duration: Option<u64>) -> anyhow::Result<()> {
    let console = Console::new(config)?;
    let mut events = console.subscribe();
    println!("{}", render::metrics_panel(&console.metrics()));
    console.set_live_mode(true)?;

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(ConsoleEvent::Ticked { .. }) => {
                    println!("{}", render::metrics_panel(&console.metrics()));
                }
                Ok(event) => {
                    if let Some(line) = render::event_line(&event) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    console.set_live_mode(false)?;
    println!("{}", render::metrics_panel(&console.metrics()));
    Ok(())
}

fn handle_incidents(config: ConsoleConfig, status: StatusFilter, json: bool) -> anyhow::Result<()> {
    let console = Console::new(config)?;
    let incidents = console.list_incidents(status);
    if json {
        println!("{}", serde_json::to_string_pretty(&incidents)?);
        return Ok(());
    }
    if incidents.is_empty() {
        println!("No incidents.");
    }
    for incident in &incidents {
        println!("{}", render::incident_line(incident));
    }
    Ok(())
}

fn handle_playbooks(config: ConsoleConfig, json: bool) -> anyhow::Result<()> {
    let catalog = config.catalog.load_catalog()?;
    if json {
        println!("{}", serde_json::to_string_pretty(catalog.all())?);
        return Ok(());
    }
    for playbook in catalog.all() {
        println!("{}", render::playbook_line(playbook));
    }
    Ok(())
}

fn handle_metrics(config: ConsoleConfig, json: bool) -> anyhow::Result<()> {
    let metrics = Console::new(config)?.metrics();
    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!("{}", render::metrics_panel(&metrics));
    }
    Ok(())
}

fn handle_config(config: &ConsoleConfig) -> anyhow::Result<()> {
    if let Some(path) = autosoc_core::config::user_config_path() {
        println!("# User config: {}", path.display());
    }
    print!("{}", config.to_toml()?);
    Ok(())
}
