//! Incident data model — severities, statuses, step instances and the
//! invariants that tie an incident's status to its steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::playbook::StepTemplate;

/// Incident severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::Critical, Severity::High, Severity::Medium];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
        }
    }
}

/// Detection category that selects a playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerType {
    BruteForce,
    MalwareDetected,
    DataExfiltration,
    #[serde(rename = "C2_COMMUNICATION")]
    C2Communication,
    PhishingDetected,
    PrivilegeEscalation,
}

impl TriggerType {
    /// Triggers the factory draws from. Phishing has a playbook but is never
    /// synthesized.
    pub const SIMULATED: [TriggerType; 5] = [
        TriggerType::BruteForce,
        TriggerType::MalwareDetected,
        TriggerType::DataExfiltration,
        TriggerType::C2Communication,
        TriggerType::PrivilegeEscalation,
    ];
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerType::BruteForce => write!(f, "BRUTE_FORCE"),
            TriggerType::MalwareDetected => write!(f, "MALWARE_DETECTED"),
            TriggerType::DataExfiltration => write!(f, "DATA_EXFILTRATION"),
            TriggerType::C2Communication => write!(f, "C2_COMMUNICATION"),
            TriggerType::PhishingDetected => write!(f, "PHISHING_DETECTED"),
            TriggerType::PrivilegeEscalation => write!(f, "PRIVILEGE_ESCALATION"),
        }
    }
}

/// Runtime status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Overall status of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Paused,
}

impl IncidentStatus {
    pub const ALL: [IncidentStatus; 5] = [
        IncidentStatus::Running,
        IncidentStatus::Completed,
        IncidentStatus::Failed,
        IncidentStatus::Pending,
        IncidentStatus::Paused,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, IncidentStatus::Completed | IncidentStatus::Failed)
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Pending => write!(f, "pending"),
            IncidentStatus::Running => write!(f, "running"),
            IncidentStatus::Completed => write!(f, "completed"),
            IncidentStatus::Failed => write!(f, "failed"),
            IncidentStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown incident status '{0}'")]
pub struct ParseStatusError(pub String);

impl FromStr for IncidentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(IncidentStatus::Pending),
            "running" => Ok(IncidentStatus::Running),
            "completed" => Ok(IncidentStatus::Completed),
            "failed" => Ok(IncidentStatus::Failed),
            "paused" => Ok(IncidentStatus::Paused),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Status filter for incident listings: everything, or one exact status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(IncidentStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: IncidentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

/// A step owned by one incident, copied from a playbook template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInstance {
    /// 1-based position within the playbook.
    pub ordinal: u32,
    pub name: String,
    /// Identifier of the remediation action (e.g. `firewall_block`).
    pub action: String,
    pub timeout_secs: u64,
    pub status: StepStatus,
}

impl StepInstance {
    pub fn from_template(template: &StepTemplate) -> Self {
        Self {
            ordinal: template.ordinal,
            name: template.name.clone(),
            action: template.action.clone(),
            timeout_secs: template.timeout_secs,
            status: StepStatus::Pending,
        }
    }
}

/// Snapshot of the playbook an incident was created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookRef {
    pub id: String,
    pub name: String,
}

/// One instantiation of a playbook against a detected event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    /// Unique id, e.g. `INC-001042`.
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub trigger: TriggerType,
    pub severity: Severity,
    pub status: IncidentStatus,
    pub playbook: PlaybookRef,
    /// Detection system that raised the incident.
    pub source_system: String,
    pub source_address: Ipv4Addr,
    pub target_asset: String,
    pub steps: Vec<StepInstance>,
    pub current_step_index: usize,
    pub total_steps: usize,
    pub elapsed_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_analyst: Option<String>,
}

impl Incident {
    /// Index of the running step, if any.
    pub fn running_step(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.status == StepStatus::Running)
    }

    pub fn count_steps(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn has_failed_step(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    pub fn all_steps_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// Completed steps plus one when a step is in flight.
    pub fn derived_step_index(&self) -> usize {
        let running = usize::from(self.running_step().is_some());
        self.count_steps(StepStatus::Completed) + running
    }

    pub fn refresh_step_index(&mut self) {
        self.current_step_index = self.derived_step_index();
    }

    /// Checks the status/step invariants, returning every violation found.
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        if self.steps.len() != self.total_steps {
            violations.push(InvariantViolation::StepCountMismatch {
                steps: self.steps.len(),
                total: self.total_steps,
            });
        }

        let running = self.count_steps(StepStatus::Running);
        if running > 1 {
            violations.push(InvariantViolation::MultipleRunningSteps { count: running });
        }

        let all_completed = self.all_steps_completed();
        if (self.status == IncidentStatus::Completed) != all_completed {
            violations.push(InvariantViolation::CompletionMismatch {
                status: self.status,
                all_completed,
            });
        }

        let any_failed = self.has_failed_step();
        if (self.status == IncidentStatus::Failed) != any_failed {
            violations.push(InvariantViolation::FailureMismatch {
                status: self.status,
                any_failed,
            });
        }

        let expected = self.derived_step_index();
        if self.current_step_index != expected {
            violations.push(InvariantViolation::StepIndexMismatch {
                expected,
                actual: self.current_step_index,
            });
        }

        violations
    }

    /// [`Incident::invariant_violations`] plus the ordering rule that holds
    /// under strict generation: every step before the running one is completed.
    pub fn strict_invariant_violations(&self) -> Vec<InvariantViolation> {
        let mut violations = self.invariant_violations();
        if let Some(index) = self.running_step() {
            if let Some(blocking) = self.steps[..index]
                .iter()
                .position(|s| s.status != StepStatus::Completed)
            {
                violations.push(InvariantViolation::RunningStepOutOfOrder {
                    running: index,
                    blocking,
                });
            }
        }
        violations
    }
}

/// A broken incident invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("{steps} steps but total_steps is {total}")]
    StepCountMismatch { steps: usize, total: usize },

    #[error("{count} steps are running at once")]
    MultipleRunningSteps { count: usize },

    #[error("status {status} disagrees with all-steps-completed = {all_completed}")]
    CompletionMismatch {
        status: IncidentStatus,
        all_completed: bool,
    },

    #[error("status {status} disagrees with any-step-failed = {any_failed}")]
    FailureMismatch {
        status: IncidentStatus,
        any_failed: bool,
    },

    #[error("current step index is {actual}, expected {expected}")]
    StepIndexMismatch { expected: usize, actual: usize },

    #[error("step {running} is running but step {blocking} before it is not completed")]
    RunningStepOutOfOrder { running: usize, blocking: usize },
}
