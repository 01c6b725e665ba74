//! Advances running incidents by one step transition per tick.
//!
//! A tick reads the store as a snapshot, computes every incident's next state
//! independently, and commits the result (plus at most one injected incident)
//! as a single replacement.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::SimulationConfig;
use crate::incident::{Incident, IncidentStatus, StepStatus};
use crate::store::IncidentStore;

/// The single step transition applied to an incident during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepTransition {
    /// The running step finished.
    Completed { ordinal: u32 },
    /// The running step failed.
    Failed { ordinal: u32 },
    /// A stalled incident had its first pending step started.
    Started { ordinal: u32 },
}

/// What one tick changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Incidents that were running when the tick began.
    pub running: usize,
    /// Incidents whose steps moved this tick.
    pub advanced: Vec<String>,
    /// Incidents that finished every step this tick.
    pub completed: Vec<String>,
    /// Incidents that failed this tick.
    pub failed: Vec<String>,
    /// Incident injected at the end of the tick.
    pub injected: Option<String>,
}

/// Probabilistic step driver.
#[derive(Debug, Clone)]
pub struct LifecycleEngine {
    tick_secs: u64,
    advance_probability: f64,
    step_success_probability: f64,
    injection_probability: f64,
}

impl LifecycleEngine {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            tick_secs: config.tick_secs,
            advance_probability: config.advance_probability.clamp(0.0, 1.0),
            step_success_probability: config.step_success_probability.clamp(0.0, 1.0),
            injection_probability: config.injection_probability.clamp(0.0, 1.0),
        }
    }

    pub fn tick_secs(&self) -> u64 {
        self.tick_secs
    }

    /// Compute an incident's state after one tick.
    ///
    /// Only running incidents change. Each gains one tick of elapsed time;
    /// with `advance_probability` its running step resolves (completing and
    /// handing off to the next step, or failing). A running incident with no
    /// running step starts its first pending step instead; this is how a
    /// retried incident picks up again. With nothing to start, the steps are
    /// left alone.
    pub fn advance<R: Rng>(&self, incident: &Incident, rng: &mut R) -> (Incident, Option<StepTransition>) {
        let mut next = incident.clone();
        if incident.status != IncidentStatus::Running {
            return (next, None);
        }
        next.elapsed_secs = next.elapsed_secs.saturating_add(self.tick_secs);

        if !rng.gen_bool(self.advance_probability) {
            return (next, None);
        }

        let transition = match next.running_step() {
            Some(idx) => {
                let ordinal = next.steps[idx].ordinal;
                if rng.gen_bool(self.step_success_probability) {
                    next.steps[idx].status = StepStatus::Completed;
                    if let Some(following) = next.steps.get_mut(idx + 1) {
                        if following.status == StepStatus::Pending {
                            following.status = StepStatus::Running;
                        }
                    }
                    StepTransition::Completed { ordinal }
                } else {
                    next.steps[idx].status = StepStatus::Failed;
                    StepTransition::Failed { ordinal }
                }
            }
            None => {
                let pending = next
                    .steps
                    .iter()
                    .position(|s| s.status == StepStatus::Pending);
                match pending {
                    Some(idx) if !next.has_failed_step() => {
                        next.steps[idx].status = StepStatus::Running;
                        StepTransition::Started {
                            ordinal: next.steps[idx].ordinal,
                        }
                    }
                    _ => return (next, None),
                }
            }
        };

        next.status = if next.has_failed_step() {
            IncidentStatus::Failed
        } else if next.all_steps_completed() {
            IncidentStatus::Completed
        } else {
            IncidentStatus::Running
        };
        next.refresh_step_index();

        debug!(
            incident = %next.id,
            ?transition,
            status = %next.status,
            step = next.current_step_index,
            total = next.total_steps,
            "Incident advanced"
        );
        (next, Some(transition))
    }

    /// Run one tick over `store`. `inject` builds the new incident when the
    /// injection draw succeeds.
    pub fn tick<R: Rng>(
        &self,
        store: &mut IncidentStore,
        rng: &mut R,
        inject: impl FnOnce(&mut R) -> Incident,
    ) -> TickReport {
        let mut report = TickReport::default();

        let snapshot = store.all();
        let mut next = Vec::with_capacity(snapshot.len() + 1);
        for incident in snapshot {
            if incident.status == IncidentStatus::Running {
                report.running += 1;
            }
            let (updated, transition) = self.advance(incident, rng);
            if transition.is_some() {
                report.advanced.push(updated.id.clone());
                match updated.status {
                    IncidentStatus::Completed => report.completed.push(updated.id.clone()),
                    IncidentStatus::Failed => report.failed.push(updated.id.clone()),
                    _ => {}
                }
            }
            next.push(updated);
        }

        let injected = rng
            .gen_bool(self.injection_probability)
            .then(|| inject(rng));

        store.replace_all(next);
        if let Some(incident) = injected {
            let id = incident.id.clone();
            if store.insert_front(incident) {
                report.injected = Some(id);
            }
        }

        trace!(
            running = report.running,
            advanced = report.advanced.len(),
            completed = report.completed.len(),
            failed = report.failed.len(),
            injected = report.injected.is_some(),
            "Tick applied"
        );
        report
    }
}
