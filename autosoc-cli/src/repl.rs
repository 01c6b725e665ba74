//! Interactive operator REPL.
//!
//! Reads commands from stdin while echoing console events, so live-mode
//! progress shows up between prompts.

use std::io::Write;

use autosoc_core::{ActionOutcome, Console, OperatorAction, StatusFilter};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::render;

const HELP: &str = "\
Commands:
  list [status]        List incidents (all, running, completed, failed, pending, paused)
  show <id>            Show one incident with its steps
  metrics              Dashboard metrics
  playbooks            List playbooks
  toggle <playbook>    Enable or disable a playbook
  pause <id>           Pause a running incident
  resume <id>          Resume a paused incident
  abort <id>           Abort a running or paused incident
  retry <id>           Retry a failed incident
  escalate <id>        Escalate an incident to on-call
  live [on|off]        Toggle or set live mode
  tick                 Run one lifecycle tick now
  inject               Inject a new running incident
  history              Show dispatched operator actions
  help                 Show this help
  quit                 Exit";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ReplCommand {
    List(StatusFilter),
    Show(String),
    Metrics,
    Playbooks,
    Toggle(String),
    Action(OperatorAction, String),
    Live(Option<bool>),
    Tick,
    Inject,
    History,
    Help,
    Quit,
}

impl ReplCommand {
    pub(crate) fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let required = |what: &str| -> Result<String, String> {
            arg.map(str::to_string)
                .ok_or_else(|| format!("usage: {command} <{what}>"))
        };

        let parsed = match command.to_ascii_lowercase().as_str() {
            "list" | "ls" => ReplCommand::List(match arg {
                Some(s) => s.parse().map_err(|e| format!("{e}"))?,
                None => StatusFilter::All,
            }),
            "show" => ReplCommand::Show(required("id")?),
            "metrics" => ReplCommand::Metrics,
            "playbooks" => ReplCommand::Playbooks,
            "toggle" => ReplCommand::Toggle(required("playbook")?),
            "live" => ReplCommand::Live(match arg {
                None => None,
                Some("on") => Some(true),
                Some("off") => Some(false),
                Some(other) => return Err(format!("expected on or off, got '{other}'")),
            }),
            "tick" => ReplCommand::Tick,
            "inject" => ReplCommand::Inject,
            "history" => ReplCommand::History,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" | "q" => ReplCommand::Quit,
            other => match other.parse::<OperatorAction>() {
                Ok(action) => ReplCommand::Action(action, required("id")?),
                Err(_) => return Err(format!("unknown command '{other}' (try 'help')")),
            },
        };
        Ok(Some(parsed))
    }
}

fn prompt(console: &Console) {
    let mode = if console.is_live() { "live" } else { "paused" };
    print!("\x1b[36mautosoc\x1b[0m [{mode}]> ");
    let _ = std::io::stdout().flush();
}

/// Execute one command. Returns false when the session should end.
fn execute(console: &Console, command: ReplCommand) -> anyhow::Result<bool> {
    match command {
        ReplCommand::List(filter) => {
            let incidents = console.list_incidents(filter);
            if incidents.is_empty() {
                println!("No incidents.");
            }
            for incident in &incidents {
                println!("{}", render::incident_line(incident));
            }
        }
        ReplCommand::Show(id) => match console.incident(&id) {
            Some(incident) => println!("{}", render::incident_detail(&incident)),
            None => println!("No incident '{id}'."),
        },
        ReplCommand::Metrics => println!("{}", render::metrics_panel(&console.metrics())),
        ReplCommand::Playbooks => {
            for playbook in console.list_playbooks() {
                println!("{}", render::playbook_line(&playbook));
            }
        }
        ReplCommand::Toggle(id) => match console.toggle_playbook(&id) {
            Some(enabled) => println!("{id} {}", if enabled { "enabled" } else { "disabled" }),
            None => println!("No playbook '{id}'."),
        },
        ReplCommand::Action(action, id) => match console.apply_action(action, &id) {
            ActionOutcome::Ignored { reason } => println!("\x1b[33mIgnored:\x1b[0m {reason}"),
            outcome => println!("{id}: {outcome}"),
        },
        ReplCommand::Live(target) => {
            let live = target.unwrap_or(!console.is_live());
            console.set_live_mode(live)?;
        }
        ReplCommand::Tick => {
            let report = console.tick();
            println!(
                "Tick: {} advanced, {} completed, {} failed{}",
                report.advanced.len(),
                report.completed.len(),
                report.failed.len(),
                report
                    .injected
                    .map(|id| format!(", injected {id}"))
                    .unwrap_or_default()
            );
        }
        ReplCommand::Inject => {
            if let Some(incident) = console.inject_incident() {
                println!("{}", render::incident_line(&incident));
            }
        }
        ReplCommand::History => {
            let history = console.action_history();
            if history.is_empty() {
                println!("No actions dispatched yet.");
            }
            for record in history {
                println!(
                    "{} {:<8} {} {}",
                    record.at.format("%H:%M:%S"),
                    record.action.to_string(),
                    record.incident_id,
                    record.outcome
                );
            }
        }
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// Run the interactive session until `quit`, EOF or Ctrl-C.
pub async fn run_interactive(console: Console) -> anyhow::Result<()> {
    println!("\x1b[1;36mAutoSOC\x1b[0m incident response console");
    println!("{}", render::metrics_panel(&console.metrics()));
    println!("Type 'help' for commands.\n");

    let mut events = console.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(&console);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ReplCommand::parse(&line) {
                    Ok(Some(command)) => {
                        if !execute(&console, command)? {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                }
                prompt(&console);
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = render::event_line(&event) {
                        println!("\r{line}");
                        prompt(&console);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    console.set_live_mode(false)?;
    println!("Goodbye.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosoc_core::IncidentStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(ReplCommand::parse("   "), Ok(None));
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(
            ReplCommand::parse("list"),
            Ok(Some(ReplCommand::List(StatusFilter::All)))
        );
        assert_eq!(
            ReplCommand::parse("list failed"),
            Ok(Some(ReplCommand::List(StatusFilter::Only(IncidentStatus::Failed))))
        );
        assert!(ReplCommand::parse("list broken").is_err());
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            ReplCommand::parse("pause INC-001000"),
            Ok(Some(ReplCommand::Action(
                OperatorAction::Pause,
                "INC-001000".into()
            )))
        );
        assert_eq!(
            ReplCommand::parse("RETRY INC-001001"),
            Ok(Some(ReplCommand::Action(
                OperatorAction::Retry,
                "INC-001001".into()
            )))
        );
        assert_eq!(
            ReplCommand::parse("abort"),
            Err("usage: abort <id>".to_string())
        );
    }

    #[test]
    fn test_parse_live() {
        assert_eq!(ReplCommand::parse("live"), Ok(Some(ReplCommand::Live(None))));
        assert_eq!(ReplCommand::parse("live on"), Ok(Some(ReplCommand::Live(Some(true)))));
        assert_eq!(ReplCommand::parse("live off"), Ok(Some(ReplCommand::Live(Some(false)))));
        assert!(ReplCommand::parse("live maybe").is_err());
    }

    #[test]
    fn test_parse_unknown() {
        assert!(ReplCommand::parse("delete INC-1").is_err());
        assert_eq!(ReplCommand::parse("q"), Ok(Some(ReplCommand::Quit)));
    }

    #[test]
    fn test_execute_quit_ends_session() {
        let mut config = autosoc_core::ConsoleConfig::default();
        config.simulation.seed_incidents = 0;
        let console = Console::new(config).unwrap();
        assert!(!execute(&console, ReplCommand::Quit).unwrap());
        assert!(execute(&console, ReplCommand::Metrics).unwrap());
    }
}
