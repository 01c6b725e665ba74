//! Incident factory — synthesizes plausible incidents from the playbook catalog.
//!
//! Seeded incidents get a random status with step states derived from it.
//! Live incidents always arrive running on their first step.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use std::net::Ipv4Addr;

use crate::config::FactoryConfig;
use crate::incident::{
    Incident, IncidentStatus, PlaybookRef, Severity, StepInstance, StepStatus, TriggerType,
};
use crate::playbook::PlaybookCatalog;

const DAY_MS: i64 = 86_400_000;

/// How an incident's status is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Synthesis {
    /// Random status, created at a random point in the last 24 hours.
    Seeded,
    /// Running on step one, created now.
    Live,
}

/// Format an incident number as an id, e.g. `INC-001042`.
pub fn incident_id(number: u64) -> String {
    format!("INC-{number:06}")
}

/// Builds synthetic incidents.
#[derive(Debug, Clone)]
pub struct IncidentFactory {
    config: FactoryConfig,
    strict: bool,
}

impl IncidentFactory {
    /// `strict` places a synthesized running step right after the completed
    /// prefix instead of at an independently drawn index.
    pub fn new(config: FactoryConfig, strict: bool) -> Self {
        Self { config, strict }
    }

    pub fn create_incident<R: Rng>(
        &self,
        number: u64,
        catalog: &PlaybookCatalog,
        mode: Synthesis,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Incident {
        let trigger = *TriggerType::SIMULATED
            .choose(rng)
            .unwrap_or(&TriggerType::BruteForce);
        let playbook = catalog.find_by_trigger(trigger);

        let (status, created_at) = match mode {
            Synthesis::Seeded => (
                *IncidentStatus::ALL
                    .choose(rng)
                    .unwrap_or(&IncidentStatus::Pending),
                now - Duration::milliseconds(rng.gen_range(0..DAY_MS)),
            ),
            Synthesis::Live => (IncidentStatus::Running, now),
        };

        let mut steps: Vec<StepInstance> =
            playbook.steps.iter().map(StepInstance::from_template).collect();
        match mode {
            Synthesis::Seeded => self.synthesize_steps(status, &mut steps, rng),
            Synthesis::Live => {
                if let Some(first) = steps.first_mut() {
                    first.status = StepStatus::Running;
                }
            }
        }

        let assigned_analyst = if status == IncidentStatus::Pending {
            None
        } else {
            self.config.analysts.choose(rng).cloned()
        };

        let mut incident = Incident {
            id: incident_id(number),
            created_at,
            trigger,
            severity: *Severity::ALL.choose(rng).unwrap_or(&Severity::Medium),
            status,
            playbook: PlaybookRef {
                id: playbook.id.clone(),
                name: playbook.name.clone(),
            },
            source_system: self
                .config
                .source_systems
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| "unknown".into()),
            source_address: Ipv4Addr::new(
                rng.gen_range(50..250),
                rng.gen_range(0..255),
                rng.gen_range(0..255),
                rng.gen_range(0..255),
            ),
            target_asset: format!("WORKSTATION-{}", rng.gen_range(100..600)),
            total_steps: steps.len(),
            steps,
            current_step_index: 0,
            elapsed_secs: rng.gen_range(60..960),
            assigned_analyst,
        };
        incident.refresh_step_index();
        incident
    }

    fn synthesize_steps<R: Rng>(&self, status: IncidentStatus, steps: &mut [StepInstance], rng: &mut R) {
        let len = steps.len();
        if len == 0 {
            return;
        }
        match status {
            IncidentStatus::Completed => {
                for step in steps.iter_mut() {
                    step.status = StepStatus::Completed;
                }
            }
            // A failed step may precede unresolved pending steps.
            IncidentStatus::Failed => {
                steps[rng.gen_range(0..len)].status = StepStatus::Failed;
            }
            IncidentStatus::Running => {
                let completed = rng.gen_range(0..len);
                let running = if self.strict {
                    completed
                } else {
                    rng.gen_range(0..len)
                };
                for (i, step) in steps.iter_mut().enumerate() {
                    if i < completed {
                        step.status = StepStatus::Completed;
                    } else if i == running {
                        step.status = StepStatus::Running;
                    }
                }
            }
            IncidentStatus::Pending | IncidentStatus::Paused => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn factory(strict: bool) -> IncidentFactory {
        IncidentFactory::new(FactoryConfig::default(), strict)
    }

    fn seeded_batch(strict: bool, count: u64, seed: u64) -> Vec<Incident> {
        let catalog = PlaybookCatalog::with_defaults();
        let factory = factory(strict);
        let mut rng = StdRng::seed_from_u64(seed);
        let now = Utc::now();
        (0..count)
            .map(|n| factory.create_incident(1000 + n, &catalog, Synthesis::Seeded, now, &mut rng))
            .collect()
    }

    #[test]
    fn test_incident_id_format() {
        assert_eq!(incident_id(1000), "INC-001000");
        assert_eq!(incident_id(7), "INC-000007");
        assert_eq!(incident_id(12_345_678), "INC-12345678");
    }

    #[test]
    fn test_seeded_incidents_satisfy_invariants() {
        for incident in seeded_batch(false, 300, 11) {
            assert!(
                incident.invariant_violations().is_empty(),
                "{}: {:?}",
                incident.id,
                incident.invariant_violations()
            );
        }
    }

    #[test]
    fn test_status_specific_steps() {
        for incident in seeded_batch(false, 300, 3) {
            match incident.status {
                IncidentStatus::Completed => {
                    assert!(incident.all_steps_completed());
                    assert_eq!(incident.current_step_index, incident.total_steps);
                }
                IncidentStatus::Failed => {
                    assert_eq!(incident.count_steps(StepStatus::Failed), 1);
                }
                IncidentStatus::Pending | IncidentStatus::Paused => {
                    assert_eq!(incident.count_steps(StepStatus::Pending), incident.total_steps);
                    assert_eq!(incident.current_step_index, 0);
                }
                IncidentStatus::Running => {
                    assert!(incident.count_steps(StepStatus::Running) <= 1);
                    assert!(!incident.all_steps_completed());
                }
            }
        }
    }

    #[test]
    fn test_strict_running_step_follows_completed_prefix() {
        for incident in seeded_batch(true, 300, 5) {
            if incident.status != IncidentStatus::Running {
                continue;
            }
            let running = incident.running_step().expect("strict running step");
            assert_eq!(running, incident.count_steps(StepStatus::Completed));
            assert!(incident.strict_invariant_violations().is_empty());
        }
    }

    #[test]
    fn test_analyst_only_when_not_pending() {
        for incident in seeded_batch(false, 200, 9) {
            assert_eq!(
                incident.assigned_analyst.is_none(),
                incident.status == IncidentStatus::Pending
            );
        }
    }

    #[test]
    fn test_synthetic_attribute_ranges() {
        let now = Utc::now();
        for incident in seeded_batch(false, 200, 21) {
            let octets = incident.source_address.octets();
            assert!((50..250).contains(&octets[0]));
            assert!(octets[1..].iter().all(|o| *o < 255));
            let asset: u32 = incident
                .target_asset
                .strip_prefix("WORKSTATION-")
                .and_then(|n| n.parse().ok())
                .unwrap();
            assert!((100..600).contains(&asset));
            assert!((60..960).contains(&incident.elapsed_secs));
            assert!(incident.created_at <= now);
            assert!(now - incident.created_at < Duration::days(1));
            assert_ne!(incident.trigger, TriggerType::PhishingDetected);
        }
    }

    #[test]
    fn test_playbook_resolved_from_trigger() {
        let catalog = PlaybookCatalog::with_defaults();
        for incident in seeded_batch(false, 100, 1) {
            let playbook = catalog.get(&incident.playbook.id).unwrap();
            assert_eq!(playbook.trigger, incident.trigger);
            assert_eq!(playbook.name, incident.playbook.name);
            assert_eq!(incident.total_steps, playbook.steps.len());
        }
    }

    #[test]
    fn test_live_incident_starts_on_first_step() {
        let catalog = PlaybookCatalog::with_defaults();
        let mut rng = StdRng::seed_from_u64(99);
        let now = Utc::now();
        for n in 0..50 {
            let incident =
                factory(false).create_incident(n, &catalog, Synthesis::Live, now, &mut rng);
            assert_eq!(incident.status, IncidentStatus::Running);
            assert_eq!(incident.steps[0].status, StepStatus::Running);
            assert_eq!(incident.count_steps(StepStatus::Pending), incident.total_steps - 1);
            assert_eq!(incident.current_step_index, 1);
            assert_eq!(incident.created_at, now);
            assert!(incident.assigned_analyst.is_some());
        }
    }

    #[test]
    fn test_steps_are_independent_copies() {
        let catalog = PlaybookCatalog::with_defaults();
        let mut rng = StdRng::seed_from_u64(4);
        let now = Utc::now();
        let mut a = factory(false).create_incident(1, &catalog, Synthesis::Live, now, &mut rng);
        let b = factory(false).create_incident(2, &catalog, Synthesis::Live, now, &mut rng);
        a.steps[0].name = "mutated".into();
        assert_ne!(b.steps[0].name, "mutated");
        assert!(catalog.all().iter().all(|p| p.steps[0].name != "mutated"));
    }
}
