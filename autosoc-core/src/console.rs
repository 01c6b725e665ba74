//! The console controller — one owner for the catalog, the incident store and
//! the random source, shared by the operator front-end and the live ticker.
//!
//! Every command takes the state lock once, so a tick and an operator action
//! never interleave on the same incident and readers only ever see whole
//! records.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::actions::{ActionDispatcher, ActionOutcome, ActionRecord, OperatorAction};
use crate::config::ConsoleConfig;
use crate::engine::{LifecycleEngine, TickReport};
use crate::error::{ConfigError, Result};
use crate::factory::{IncidentFactory, Synthesis};
use crate::incident::{Incident, IncidentStatus, Severity, StatusFilter, TriggerType};
use crate::live::LiveTicker;
use crate::metrics::DashboardMetrics;
use crate::playbook::{Playbook, PlaybookCatalog};
use crate::store::IncidentStore;

const EVENT_CAPACITY: usize = 256;

/// Notifications published to console subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConsoleEvent {
    IncidentInjected {
        incident_id: String,
        trigger: TriggerType,
        severity: Severity,
        playbook_id: String,
    },
    /// An incident reached `completed` or `failed` through the lifecycle engine.
    IncidentResolved {
        incident_id: String,
        status: IncidentStatus,
    },
    ActionApplied {
        incident_id: String,
        action: OperatorAction,
        outcome: ActionOutcome,
    },
    /// An operator escalated an incident; this is the external notification.
    Escalated {
        incident_id: String,
        status: IncidentStatus,
    },
    PlaybookToggled {
        playbook_id: String,
        enabled: bool,
    },
    LiveModeChanged {
        live: bool,
    },
    Ticked {
        report: TickReport,
    },
}

struct ConsoleState {
    catalog: PlaybookCatalog,
    store: IncidentStore,
    factory: IncidentFactory,
    engine: LifecycleEngine,
    dispatcher: ActionDispatcher,
    rng: StdRng,
    next_number: u64,
    live: bool,
}

struct ConsoleCore {
    config: ConsoleConfig,
    state: Mutex<ConsoleState>,
    ticker: Mutex<Option<LiveTicker>>,
    events: broadcast::Sender<ConsoleEvent>,
}

impl ConsoleCore {
    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ticker(&self) -> MutexGuard<'_, Option<LiveTicker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, events: Vec<ConsoleEvent>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.events.send(event);
        }
    }

    /// One lifecycle tick. With `only_if_live`, a tick racing a stop is
    /// dropped whole.
    fn tick(&self, only_if_live: bool) -> Option<TickReport> {
        let mut events = Vec::new();
        let report = {
            let mut guard = self.lock();
            if only_if_live && !guard.live {
                return None;
            }
            let ConsoleState {
                catalog,
                store,
                factory,
                engine,
                rng,
                next_number,
                ..
            } = &mut *guard;

            let now = Utc::now();
            let report = engine.tick(store, rng, |rng| {
                let number = *next_number;
                *next_number = next_number.saturating_add(1);
                factory.create_incident(number, catalog, Synthesis::Live, now, rng)
            });

            if let Some(incident) = report.injected.as_deref().and_then(|id| store.get(id)) {
                info!(
                    incident = %incident.id,
                    trigger = %incident.trigger,
                    severity = %incident.severity,
                    playbook = %incident.playbook.id,
                    "Incident injected"
                );
                events.push(ConsoleEvent::IncidentInjected {
                    incident_id: incident.id.clone(),
                    trigger: incident.trigger,
                    severity: incident.severity,
                    playbook_id: incident.playbook.id.clone(),
                });
            }
            for (ids, status) in [
                (&report.completed, IncidentStatus::Completed),
                (&report.failed, IncidentStatus::Failed),
            ] {
                events.extend(ids.iter().map(|id| ConsoleEvent::IncidentResolved {
                    incident_id: id.clone(),
                    status,
                }));
            }
            report
        };
        events.push(ConsoleEvent::Ticked {
            report: report.clone(),
        });
        self.publish(events);
        Some(report)
    }
}

impl Drop for ConsoleCore {
    fn drop(&mut self) {
        let slot = self.ticker.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(ticker) = slot.take() {
            ticker.stop();
        }
    }
}

/// Shared handle to the incident response console. Clones share state.
#[derive(Clone)]
pub struct Console {
    core: Arc<ConsoleCore>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.lock();
        f.debug_struct("Console")
            .field("incidents", &state.store.len())
            .field("playbooks", &state.catalog.len())
            .field("live", &state.live)
            .finish()
    }
}

impl Console {
    /// Build a console from configuration, loading the configured catalog and
    /// seeding the store. Live mode starts off; see [`Console::set_live_mode`].
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        let catalog = config.catalog.load_catalog()?;
        Self::with_catalog(config, catalog)
    }

    /// Build a console around an explicit catalog.
    pub fn with_catalog(config: ConsoleConfig, catalog: PlaybookCatalog) -> Result<Self> {
        config.validate()?;
        let sim = &config.simulation;

        let mut rng = match sim.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let factory = IncidentFactory::new(config.factory.clone(), sim.strict_generation);
        let engine = LifecycleEngine::new(sim);

        let now = Utc::now();
        let numbers = sim
            .first_seed_numbers()
            .ok_or(ConfigError::IncidentNumberOverflow {
                first: sim.first_incident_number,
                seeds: sim.seed_incidents,
            })?;
        let next_number = numbers.end;
        let seeds: Vec<Incident> = numbers
            .map(|number| factory.create_incident(number, &catalog, Synthesis::Seeded, now, &mut rng))
            .collect();
        let store = IncidentStore::seeded(seeds, sim.retention);

        info!(
            incidents = store.len(),
            playbooks = catalog.len(),
            seeded_rng = sim.rng_seed.is_some(),
            "Console initialized"
        );

        let state = ConsoleState {
            catalog,
            store,
            factory,
            engine,
            dispatcher: ActionDispatcher::new(),
            rng,
            next_number,
            live: false,
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            core: Arc::new(ConsoleCore {
                config,
                state: Mutex::new(state),
                ticker: Mutex::new(None),
                events,
            }),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.core.config
    }

    /// Incidents in store order, optionally restricted to one status.
    pub fn list_incidents(&self, filter: StatusFilter) -> Vec<Incident> {
        self.core
            .lock()
            .store
            .all()
            .iter()
            .filter(|incident| filter.matches(incident.status))
            .cloned()
            .collect()
    }

    pub fn incident(&self, id: &str) -> Option<Incident> {
        self.core.lock().store.get(id).cloned()
    }

    pub fn list_playbooks(&self) -> Vec<Playbook> {
        self.core.lock().catalog.all().to_vec()
    }

    pub fn metrics(&self) -> DashboardMetrics {
        let state = self.core.lock();
        DashboardMetrics::compute(state.store.all(), &state.catalog)
    }

    /// Flip a playbook's `enabled` flag. Returns the new value, or `None` for
    /// an unknown id.
    pub fn toggle_playbook(&self, id: &str) -> Option<bool> {
        let enabled = self.core.lock().catalog.toggle(id);
        match enabled {
            Some(enabled) => {
                debug!(playbook = id, enabled, "Playbook toggled");
                self.core.publish(vec![ConsoleEvent::PlaybookToggled {
                    playbook_id: id.to_string(),
                    enabled,
                }]);
            }
            None => debug!(playbook = id, "Toggle ignored for unknown playbook"),
        }
        enabled
    }

    /// Apply an operator action to one incident.
    pub fn apply_action(&self, action: OperatorAction, incident_id: &str) -> ActionOutcome {
        let (outcome, status) = {
            let mut guard = self.core.lock();
            let state = &mut *guard;
            let outcome = state
                .dispatcher
                .dispatch(&mut state.store, action, incident_id, Utc::now());
            let status = state.store.get(incident_id).map(|i| i.status);
            (outcome, status)
        };

        let mut events = Vec::new();
        if !outcome.is_ignored() {
            events.push(ConsoleEvent::ActionApplied {
                incident_id: incident_id.to_string(),
                action,
                outcome,
            });
        }
        if let (ActionOutcome::Escalated, Some(status)) = (outcome, status) {
            info!(incident = incident_id, %status, "Incident escalated");
            events.push(ConsoleEvent::Escalated {
                incident_id: incident_id.to_string(),
                status,
            });
        }
        self.core.publish(events);
        outcome
    }

    /// Start or stop the live ticker. Enabling requires a tokio runtime.
    /// Setting the current mode again is a no-op.
    pub fn set_live_mode(&self, live: bool) -> Result<()> {
        let mut slot = self.core.ticker();
        if live == slot.is_some() {
            return Ok(());
        }

        if live {
            let weak: Weak<ConsoleCore> = Arc::downgrade(&self.core);
            let ticker = LiveTicker::spawn(self.core.config.simulation.tick_period(), move || {
                match weak.upgrade() {
                    Some(core) => {
                        core.tick(true);
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            })?;
            self.core.lock().live = true;
            *slot = Some(ticker);
        } else {
            self.core.lock().live = false;
            if let Some(ticker) = slot.take() {
                ticker.stop();
            }
        }
        drop(slot);

        info!(live, "Live mode changed");
        self.core.publish(vec![ConsoleEvent::LiveModeChanged { live }]);
        Ok(())
    }

    pub fn is_live(&self) -> bool {
        self.core.ticker().is_some()
    }

    /// Run one lifecycle tick now, independent of live mode.
    pub fn tick(&self) -> TickReport {
        self.core.tick(false).unwrap_or_default()
    }

    /// Synthesize one running incident and put it at the front of the store.
    pub fn inject_incident(&self) -> Option<Incident> {
        let incident = {
            let mut guard = self.core.lock();
            let state = &mut *guard;
            let number = state.next_number;
            state.next_number = state.next_number.saturating_add(1);
            let incident = state.factory.create_incident(
                number,
                &state.catalog,
                Synthesis::Live,
                Utc::now(),
                &mut state.rng,
            );
            if !state.store.insert_front(incident.clone()) {
                return None;
            }
            incident
        };
        info!(incident = %incident.id, trigger = %incident.trigger, "Incident injected");
        self.core.publish(vec![ConsoleEvent::IncidentInjected {
            incident_id: incident.id.clone(),
            trigger: incident.trigger,
            severity: incident.severity,
            playbook_id: incident.playbook.id.clone(),
        }]);
        Some(incident)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.core.events.subscribe()
    }

    /// Dispatched operator actions, oldest first.
    pub fn action_history(&self) -> Vec<ActionRecord> {
        self.core.lock().dispatcher.history().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::IgnoreReason;

    fn config(seed_incidents: usize) -> ConsoleConfig {
        let mut config = ConsoleConfig::default();
        config.simulation.seed_incidents = seed_incidents;
        config.simulation.rng_seed = Some(42);
        config
    }

    #[test]
    fn test_seeds_incidents_newest_first() {
        let console = Console::new(config(30)).unwrap();
        let incidents = console.list_incidents(StatusFilter::All);
        assert_eq!(incidents.len(), 30);
        assert!(incidents.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert!(incidents.iter().all(|i| i.invariant_violations().is_empty()));
        assert!(!console.is_live());
    }

    #[test]
    fn test_same_seed_same_incidents() {
        let a = Console::new(config(10)).unwrap().list_incidents(StatusFilter::All);
        let b = Console::new(config(10)).unwrap().list_incidents(StatusFilter::All);
        let strip = |v: Vec<Incident>| -> Vec<(String, IncidentStatus, u64)> {
            v.into_iter().map(|i| (i.id, i.status, i.elapsed_secs)).collect()
        };
        assert_eq!(strip(a), strip(b));
    }

    #[test]
    fn test_status_filter() {
        let console = Console::new(config(40)).unwrap();
        let failed = console.list_incidents(StatusFilter::Only(IncidentStatus::Failed));
        assert!(failed.iter().all(|i| i.status == IncidentStatus::Failed));
        assert_eq!(failed.len(), console.metrics().failed);
    }

    #[test]
    fn test_toggle_playbook_publishes() {
        let console = Console::new(config(0)).unwrap();
        let mut events = console.subscribe();
        assert_eq!(console.toggle_playbook("pb-005"), Some(true));
        assert_eq!(console.metrics().active_playbooks, 6);
        assert_eq!(
            events.try_recv().unwrap(),
            ConsoleEvent::PlaybookToggled {
                playbook_id: "pb-005".into(),
                enabled: true
            }
        );
        assert_eq!(console.toggle_playbook("pb-999"), None);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_unknown_incident_action_is_ignored() {
        let console = Console::new(config(0)).unwrap();
        let outcome = console.apply_action(OperatorAction::Abort, "INC-404");
        assert_eq!(
            outcome,
            ActionOutcome::Ignored {
                reason: IgnoreReason::IncidentNotFound
            }
        );
        assert_eq!(console.action_history().len(), 1);
    }

    #[test]
    fn test_escalate_publishes_notification() {
        let console = Console::new(config(0)).unwrap();
        let incident = console.inject_incident().unwrap();
        let mut events = console.subscribe();

        assert_eq!(
            console.apply_action(OperatorAction::Escalate, &incident.id),
            ActionOutcome::Escalated
        );
        assert!(matches!(events.try_recv().unwrap(), ConsoleEvent::ActionApplied { .. }));
        assert_eq!(
            events.try_recv().unwrap(),
            ConsoleEvent::Escalated {
                incident_id: incident.id.clone(),
                status: IncidentStatus::Running
            }
        );
        assert_eq!(console.incident(&incident.id).unwrap(), incident);
    }

    #[test]
    fn test_injected_ids_continue_after_seeds() {
        let console = Console::new(config(5)).unwrap();
        let incident = console.inject_incident().unwrap();
        assert_eq!(incident.id, "INC-001005");
        assert_eq!(console.list_incidents(StatusFilter::All)[0].id, "INC-001005");
    }

    #[test]
    fn test_live_mode_requires_runtime() {
        let console = Console::new(config(0)).unwrap();
        assert!(matches!(
            console.set_live_mode(true),
            Err(crate::error::AutosocError::NoRuntime)
        ));
        assert!(!console.is_live());
        assert!(console.set_live_mode(false).is_ok());
    }

    #[test]
    fn test_manual_tick_reports() {
        let mut config = config(0);
        config.simulation.injection_probability = 1.0;
        let console = Console::new(config).unwrap();
        let mut events = console.subscribe();

        let report = console.tick();
        assert_eq!(report.injected.as_deref(), Some("INC-001000"));
        assert!(matches!(
            events.try_recv().unwrap(),
            ConsoleEvent::IncidentInjected { .. }
        ));
        assert!(matches!(events.try_recv().unwrap(), ConsoleEvent::Ticked { .. }));
    }

    #[test]
    fn test_events_serialize_tagged() {
        let event = ConsoleEvent::IncidentResolved {
            incident_id: "INC-001000".into(),
            status: IncidentStatus::Failed,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "event": "incident_resolved",
                "incident_id": "INC-001000",
                "status": "failed"
            })
        );
    }

    #[test]
    fn test_overflowing_incident_numbers_rejected() {
        let mut config = config(30);
        config.simulation.first_incident_number = u64::MAX - 5;
        assert!(matches!(
            Console::new(config),
            Err(crate::error::AutosocError::Config(ConfigError::IncidentNumberOverflow { .. }))
        ));
    }

    #[test]
    fn test_injection_at_last_number_does_not_overflow() {
        let mut config = config(1);
        config.simulation.first_incident_number = u64::MAX - 1;
        let console = Console::new(config).unwrap();
        let first = console.inject_incident().unwrap();
        assert_eq!(first.id, format!("INC-{}", u64::MAX));
        // The counter is exhausted; the repeated id is rejected by the store.
        assert!(console.inject_incident().is_none());
        assert_eq!(console.list_incidents(StatusFilter::All).len(), 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = config(0);
        config.simulation.retention = 0;
        assert!(Console::new(config).is_err());
    }
}
