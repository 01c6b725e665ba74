//! Operator actions on a single incident.
//!
//! Actions never fail loudly. An unknown incident id or an action that does
//! not apply to the incident's current status comes back as
//! [`ActionOutcome::Ignored`] and leaves the store untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::incident::{Incident, IncidentStatus, StepStatus};
use crate::store::IncidentStore;

/// Default number of action records kept in the audit history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// An operator-initiated transition on a single incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatorAction {
    Pause,
    Resume,
    /// Fails the incident and also marks its in-flight step failed, so the
    /// steps change as well as the status.
    Abort,
    Retry,
    Escalate,
}

impl OperatorAction {
    pub const ALL: [OperatorAction; 5] = [
        OperatorAction::Pause,
        OperatorAction::Resume,
        OperatorAction::Abort,
        OperatorAction::Retry,
        OperatorAction::Escalate,
    ];

    /// Whether the action changes (or, for escalate, acts on) an incident in
    /// `status`.
    pub fn applies_to(self, status: IncidentStatus) -> bool {
        match self {
            OperatorAction::Pause => status == IncidentStatus::Running,
            OperatorAction::Resume => status == IncidentStatus::Paused,
            OperatorAction::Abort => {
                matches!(status, IncidentStatus::Running | IncidentStatus::Paused)
            }
            OperatorAction::Retry => status == IncidentStatus::Failed,
            OperatorAction::Escalate => true,
        }
    }

    /// Actions the console offers for an incident in `status`.
    pub fn available_for(status: IncidentStatus) -> Vec<OperatorAction> {
        Self::ALL
            .into_iter()
            .filter(|action| action.applies_to(status))
            .collect()
    }
}

impl std::fmt::Display for OperatorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorAction::Pause => write!(f, "pause"),
            OperatorAction::Resume => write!(f, "resume"),
            OperatorAction::Abort => write!(f, "abort"),
            OperatorAction::Retry => write!(f, "retry"),
            OperatorAction::Escalate => write!(f, "escalate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}' (expected pause, resume, abort, retry or escalate)")]
pub struct ParseActionError(pub String);

impl FromStr for OperatorAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pause" => Ok(OperatorAction::Pause),
            "resume" => Ok(OperatorAction::Resume),
            "abort" => Ok(OperatorAction::Abort),
            "retry" => Ok(OperatorAction::Retry),
            "escalate" => Ok(OperatorAction::Escalate),
            _ => Err(ParseActionError(s.to_string())),
        }
    }
}

/// Why an action was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IgnoreReason {
    IncidentNotFound,
    InvalidState {
        action: OperatorAction,
        status: IncidentStatus,
    },
}

impl std::fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IgnoreReason::IncidentNotFound => write!(f, "incident not found"),
            IgnoreReason::InvalidState { action, status } => {
                write!(f, "cannot {action} an incident that is {status}")
            }
        }
    }
}

/// Result of dispatching an operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The incident moved between statuses.
    Applied {
        from: IncidentStatus,
        to: IncidentStatus,
    },
    /// Escalation was raised; the incident itself is unchanged.
    Escalated,
    /// Nothing happened.
    Ignored { reason: IgnoreReason },
}

impl ActionOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, ActionOutcome::Ignored { .. })
    }
}

impl std::fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionOutcome::Applied { from, to } => write!(f, "{from} -> {to}"),
            ActionOutcome::Escalated => write!(f, "escalated"),
            ActionOutcome::Ignored { reason } => write!(f, "ignored: {reason}"),
        }
    }
}

/// Compute the result of `action` on `incident` without touching any store.
///
/// Abort fails the in-flight step (the running one, else the first pending
/// one) so a failed incident always carries a failed step. Retry resets every
/// step to pending; the lifecycle engine starts the first one on its next
/// advancing tick.
pub fn apply(action: OperatorAction, incident: &Incident) -> (Incident, ActionOutcome) {
    let from = incident.status;
    if !action.applies_to(from) {
        return (
            incident.clone(),
            ActionOutcome::Ignored {
                reason: IgnoreReason::InvalidState { action, status: from },
            },
        );
    }

    let mut next = incident.clone();
    match action {
        OperatorAction::Pause => next.status = IncidentStatus::Paused,
        OperatorAction::Resume => next.status = IncidentStatus::Running,
        OperatorAction::Abort => {
            let in_flight = next
                .running_step()
                .or_else(|| next.steps.iter().position(|s| s.status == StepStatus::Pending))
                .or_else(|| next.steps.len().checked_sub(1));
            if let Some(idx) = in_flight {
                next.steps[idx].status = StepStatus::Failed;
            }
            next.status = IncidentStatus::Failed;
        }
        OperatorAction::Retry => {
            for step in &mut next.steps {
                step.status = StepStatus::Pending;
            }
            next.status = IncidentStatus::Running;
        }
        OperatorAction::Escalate => return (next, ActionOutcome::Escalated),
    }
    next.refresh_step_index();

    let to = next.status;
    (next, ActionOutcome::Applied { from, to })
}

/// One entry in the action audit history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub incident_id: String,
    pub action: OperatorAction,
    pub outcome: ActionOutcome,
    pub at: DateTime<Utc>,
}

/// Applies operator actions to a store and keeps a bounded audit history.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    history: VecDeque<ActionRecord>,
    capacity: usize,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionDispatcher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Apply `action` to the incident with `incident_id` as one whole-record
    /// replacement, and record the attempt.
    pub fn dispatch(
        &mut self,
        store: &mut IncidentStore,
        action: OperatorAction,
        incident_id: &str,
        now: DateTime<Utc>,
    ) -> ActionOutcome {
        let outcome = store
            .replace_where(incident_id, |current| apply(action, current))
            .unwrap_or(ActionOutcome::Ignored {
                reason: IgnoreReason::IncidentNotFound,
            });

        match &outcome {
            ActionOutcome::Ignored { reason } => {
                warn!(incident = incident_id, %action, %reason, "Action ignored");
            }
            _ => debug!(incident = incident_id, %action, %outcome, "Action applied"),
        }

        self.record(ActionRecord {
            id: Uuid::new_v4(),
            incident_id: incident_id.to_string(),
            action,
            outcome,
            at: now,
        });
        outcome
    }

    /// Recorded actions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ActionRecord> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn record(&mut self, record: ActionRecord) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::StepStatus::*;
    use crate::incident::tests::incident_with_steps;
    use pretty_assertions::assert_eq;

    fn statuses(incident: &Incident) -> Vec<StepStatus> {
        incident.steps.iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_parse_and_display() {
        for action in OperatorAction::ALL {
            assert_eq!(action.to_string().parse::<OperatorAction>(), Ok(action));
        }
        assert_eq!(" Retry ".parse::<OperatorAction>(), Ok(OperatorAction::Retry));
        assert!("delete".parse::<OperatorAction>().is_err());
    }

    #[test]
    fn test_available_for() {
        use OperatorAction::*;
        assert_eq!(
            OperatorAction::available_for(IncidentStatus::Running),
            vec![Pause, Abort, Escalate]
        );
        assert_eq!(
            OperatorAction::available_for(IncidentStatus::Paused),
            vec![Resume, Abort, Escalate]
        );
        assert_eq!(
            OperatorAction::available_for(IncidentStatus::Failed),
            vec![Retry, Escalate]
        );
        assert_eq!(OperatorAction::available_for(IncidentStatus::Completed), vec![Escalate]);
        assert_eq!(OperatorAction::available_for(IncidentStatus::Pending), vec![Escalate]);
    }

    #[test]
    fn test_retry_resets_all_steps() {
        let inc = incident_with_steps("INC-1", IncidentStatus::Failed, &[Completed, Failed, Pending]);
        let (next, outcome) = apply(OperatorAction::Retry, &inc);
        assert_eq!(
            outcome,
            ActionOutcome::Applied {
                from: IncidentStatus::Failed,
                to: IncidentStatus::Running
            }
        );
        assert_eq!(next.status, IncidentStatus::Running);
        assert_eq!(statuses(&next), vec![Pending, Pending, Pending]);
        assert_eq!(next.current_step_index, 0);
        assert_eq!(next.elapsed_secs, inc.elapsed_secs);
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let inc = incident_with_steps("INC-1", IncidentStatus::Running, &[Completed, Running, Pending]);
        let (paused, _) = apply(OperatorAction::Pause, &inc);
        assert_eq!(paused.status, IncidentStatus::Paused);
        assert_eq!(paused.steps, inc.steps);

        let (resumed, outcome) = apply(OperatorAction::Resume, &paused);
        assert_eq!(
            outcome,
            ActionOutcome::Applied {
                from: IncidentStatus::Paused,
                to: IncidentStatus::Running
            }
        );
        assert_eq!(resumed, inc);
    }

    #[test]
    fn test_abort_fails_running_step() {
        let inc = incident_with_steps("INC-1", IncidentStatus::Running, &[Completed, Running, Pending]);
        let (next, _) = apply(OperatorAction::Abort, &inc);
        assert_eq!(next.status, IncidentStatus::Failed);
        assert_eq!(statuses(&next), vec![Completed, Failed, Pending]);
        assert_eq!(next.current_step_index, 1);
        assert!(next.invariant_violations().is_empty());
    }

    #[test]
    fn test_abort_paused_without_running_step_fails_first_pending() {
        let inc = incident_with_steps("INC-1", IncidentStatus::Paused, &[Pending, Pending]);
        let (next, _) = apply(OperatorAction::Abort, &inc);
        assert_eq!(next.status, IncidentStatus::Failed);
        assert_eq!(statuses(&next), vec![Failed, Pending]);
        assert!(next.invariant_violations().is_empty());
    }

    #[test]
    fn test_invalid_pairings_are_ignored() {
        let cases = [
            (OperatorAction::Pause, IncidentStatus::Paused),
            (OperatorAction::Resume, IncidentStatus::Running),
            (OperatorAction::Abort, IncidentStatus::Completed),
            (OperatorAction::Retry, IncidentStatus::Running),
            (OperatorAction::Pause, IncidentStatus::Pending),
        ];
        for (action, status) in cases {
            let inc = incident_with_steps("INC-1", status, &[Pending]);
            let (next, outcome) = apply(action, &inc);
            assert_eq!(next, inc);
            assert_eq!(
                outcome,
                ActionOutcome::Ignored {
                    reason: IgnoreReason::InvalidState { action, status }
                }
            );
        }
    }

    #[test]
    fn test_escalate_leaves_incident_unchanged() {
        for status in IncidentStatus::ALL {
            let inc = incident_with_steps("INC-1", status, &[Pending]);
            let (next, outcome) = apply(OperatorAction::Escalate, &inc);
            assert_eq!(outcome, ActionOutcome::Escalated);
            assert_eq!(next, inc);
        }
    }

    #[test]
    fn test_dispatch_unknown_incident() {
        let mut store = IncidentStore::new(10);
        let mut dispatcher = ActionDispatcher::new();
        let outcome = dispatcher.dispatch(&mut store, OperatorAction::Pause, "INC-404", Utc::now());
        assert_eq!(
            outcome,
            ActionOutcome::Ignored {
                reason: IgnoreReason::IncidentNotFound
            }
        );
        assert_eq!(dispatcher.history_len(), 1);
    }

    #[test]
    fn test_dispatch_updates_store_and_history() {
        let mut store = IncidentStore::new(10);
        store.insert_front(incident_with_steps("INC-1", IncidentStatus::Running, &[Running, Pending]));
        let mut dispatcher = ActionDispatcher::new();

        let outcome = dispatcher.dispatch(&mut store, OperatorAction::Pause, "INC-1", Utc::now());
        assert!(!outcome.is_ignored());
        assert_eq!(store.get("INC-1").unwrap().status, IncidentStatus::Paused);

        let record = dispatcher.history().next().unwrap();
        assert_eq!(record.incident_id, "INC-1");
        assert_eq!(record.action, OperatorAction::Pause);
        assert_eq!(record.outcome, outcome);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut store = IncidentStore::new(10);
        let mut dispatcher = ActionDispatcher::with_capacity(3);
        for n in 0..5 {
            dispatcher.dispatch(&mut store, OperatorAction::Escalate, &format!("INC-{n}"), Utc::now());
        }
        let ids: Vec<&str> = dispatcher.history().map(|r| r.incident_id.as_str()).collect();
        assert_eq!(ids, vec!["INC-2", "INC-3", "INC-4"]);
    }
}
