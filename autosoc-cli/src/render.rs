//! Terminal rendering for incidents, playbooks, metrics and console events.

use autosoc_core::{
    ConsoleEvent, DashboardMetrics, Incident, IncidentStatus, OperatorAction, Playbook, Severity,
    StepStatus,
};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[90m";

fn status_color(status: IncidentStatus) -> &'static str {
    match status {
        IncidentStatus::Running => "\x1b[36m",
        IncidentStatus::Completed => "\x1b[32m",
        IncidentStatus::Failed => "\x1b[31m",
        IncidentStatus::Pending => "\x1b[33m",
        IncidentStatus::Paused => "\x1b[35m",
    }
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "\x1b[31m",
        Severity::High => "\x1b[33m",
        Severity::Medium => "\x1b[36m",
    }
}

fn step_marker(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Completed => "\x1b[32m✓\x1b[0m",
        StepStatus::Running => "\x1b[36m▶\x1b[0m",
        StepStatus::Failed => "\x1b[31m✗\x1b[0m",
        StepStatus::Pending => "\x1b[90m·\x1b[0m",
    }
}

/// `125` -> `2m 5s`
pub fn format_elapsed(secs: u64) -> String {
    format!("{}m {}s", secs / 60, secs % 60)
}

pub fn incident_line(incident: &Incident) -> String {
    format!(
        "{id}  {sc}{status:<9}{RESET} {vc}{severity:<8}{RESET} {trigger:<20} {step}/{total}  {elapsed:>8}  {DIM}{playbook}{RESET}",
        id = incident.id,
        sc = status_color(incident.status),
        status = incident.status.to_string(),
        vc = severity_color(incident.severity),
        severity = incident.severity.to_string(),
        trigger = incident.trigger.to_string(),
        step = incident.current_step_index,
        total = incident.total_steps,
        elapsed = format_elapsed(incident.elapsed_secs),
        playbook = incident.playbook.name,
    )
}

pub fn incident_detail(incident: &Incident) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} {}{}{} ({})\n",
        incident.id,
        status_color(incident.status),
        incident.status,
        RESET,
        incident.severity
    ));
    let fields = [
        ("Detected", incident.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
        ("Trigger", incident.trigger.to_string()),
        ("Source", format!("{} ({})", incident.source_system, incident.source_address)),
        ("Target", incident.target_asset.clone()),
        ("Playbook", format!("{} [{}]", incident.playbook.name, incident.playbook.id)),
        ("Duration", format_elapsed(incident.elapsed_secs)),
        (
            "Analyst",
            incident
                .assigned_analyst
                .clone()
                .unwrap_or_else(|| "unassigned".into()),
        ),
    ];
    for (label, value) in fields {
        out.push_str(&format!("  {DIM}{label:<9}{RESET} {value}\n"));
    }

    out.push_str(&format!(
        "  {DIM}Steps{RESET}     {}/{}\n",
        incident.current_step_index, incident.total_steps
    ));
    for step in &incident.steps {
        out.push_str(&format!(
            "    {} {}. {} {DIM}({}, {}s){RESET}\n",
            step_marker(step.status),
            step.ordinal,
            step.name,
            step.action,
            step.timeout_secs
        ));
    }

    let actions: Vec<String> = OperatorAction::available_for(incident.status)
        .iter()
        .map(ToString::to_string)
        .collect();
    out.push_str(&format!("  {DIM}Actions{RESET}   {}", actions.join(", ")));
    out
}

pub fn playbook_line(playbook: &Playbook) -> String {
    let state = if playbook.enabled {
        "\x1b[32menabled \x1b[0m"
    } else {
        "\x1b[90mdisabled\x1b[0m"
    };
    let severities: Vec<String> = playbook.severities.iter().map(ToString::to_string).collect();
    format!(
        "{id:<8} {state} {name:<28} {trigger:<20} {steps} steps  {runs} runs  {avg} avg  {rate}% success  {DIM}[{sev}]{RESET}",
        id = playbook.id,
        name = playbook.name,
        trigger = playbook.trigger.to_string(),
        steps = playbook.steps.len(),
        runs = playbook.execution_count,
        avg = playbook.avg_duration,
        rate = playbook.success_rate,
        sev = severities.join(", "),
    )
}

pub fn metrics_panel(metrics: &DashboardMetrics) -> String {
    format!(
        "\x1b[36mRunning\x1b[0m {}  \x1b[32mCompleted\x1b[0m {}  \x1b[31mFailed\x1b[0m {}  \
         \x1b[33mAvg Time\x1b[0m {}m  \x1b[32mSuccess\x1b[0m {}%  \x1b[35mPlaybooks\x1b[0m {}/{}",
        metrics.running,
        metrics.completed,
        metrics.failed,
        metrics.avg_duration_minutes,
        metrics.success_rate_percent,
        metrics.active_playbooks,
        metrics.total_playbooks,
    )
}

/// One-line description of an event; `None` for events not worth echoing.
pub fn event_line(event: &ConsoleEvent) -> Option<String> {
    let line = match event {
        ConsoleEvent::IncidentInjected {
            incident_id,
            trigger,
            severity,
            playbook_id,
        } => format!(
            "{}[new]{} {incident_id} {trigger} ({severity}) -> {playbook_id}",
            severity_color(*severity),
            RESET
        ),
        ConsoleEvent::IncidentResolved {
            incident_id,
            status,
        } => format!(
            "{}[{status}]{} {incident_id}",
            status_color(*status),
            RESET
        ),
        ConsoleEvent::ActionApplied {
            incident_id,
            action,
            outcome,
        } => format!("{DIM}[action]{RESET} {action} {incident_id}: {outcome}"),
        ConsoleEvent::Escalated {
            incident_id,
            status,
        } => format!("\x1b[33m[escalated]\x1b[0m {incident_id} ({status}) escalated to on-call"),
        ConsoleEvent::PlaybookToggled {
            playbook_id,
            enabled,
        } => format!(
            "{DIM}[playbook]{RESET} {playbook_id} {}",
            if *enabled { "enabled" } else { "disabled" }
        ),
        ConsoleEvent::LiveModeChanged { live } => {
            format!("{DIM}[live]{RESET} {}", if *live { "on" } else { "paused" })
        }
        ConsoleEvent::Ticked { .. } => return None,
    };
    Some(line)
}

/// Strip ANSI escape sequences.
#[cfg(test)]
fn plain(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for c in chars.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
