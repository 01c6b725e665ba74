//! Property-based tests for the incident lifecycle using proptest.

use std::collections::HashSet;

use proptest::prelude::*;

use autosoc_core::{
    Console, ConsoleConfig, DashboardMetrics, IncidentStatus, OperatorAction, PlaybookCatalog,
    StatusFilter, StepStatus,
};

#[derive(Debug, Clone)]
enum Op {
    Tick,
    Inject,
    Act { action: usize, pick: usize },
    Toggle { pick: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Tick),
        1 => Just(Op::Inject),
        4 => (0usize..OperatorAction::ALL.len(), any::<usize>())
            .prop_map(|(action, pick)| Op::Act { action, pick }),
        1 => any::<usize>().prop_map(|pick| Op::Toggle { pick }),
    ]
}

fn console(seed: u64, seeds: usize, advance: f64, success: f64, strict: bool, retention: usize) -> Console {
    let mut config = ConsoleConfig::default();
    config.simulation.rng_seed = Some(seed);
    config.simulation.seed_incidents = seeds;
    config.simulation.advance_probability = advance;
    config.simulation.step_success_probability = success;
    config.simulation.strict_generation = strict;
    config.simulation.retention = retention;
    Console::new(config).unwrap()
}

/// Apply `ops` in order, calling `check` on the initial state and after every op.
fn run<F>(console: &Console, ops: &[Op], mut check: F) -> Result<(), TestCaseError>
where
    F: FnMut(&Console) -> Result<(), TestCaseError>,
{
    check(console)?;
    for op in ops {
        match op {
            Op::Tick => {
                console.tick();
            }
            Op::Inject => {
                console.inject_incident();
            }
            Op::Act { action, pick } => {
                let incidents = console.list_incidents(StatusFilter::All);
                if incidents.is_empty() {
                    continue;
                }
                let id = &incidents[pick % incidents.len()].id;
                console.apply_action(OperatorAction::ALL[*action], id);
            }
            Op::Toggle { pick } => {
                let playbooks = console.list_playbooks();
                console.toggle_playbook(&playbooks[pick % playbooks.len()].id);
            }
        }
        check(console)?;
    }
    Ok(())
}

fn no_check(_: &Console) -> Result<(), TestCaseError> {
    Ok(())
}

fn check_strict(console: &Console) -> Result<(), TestCaseError> {
    for incident in console.list_incidents(StatusFilter::All) {
        let violations = incident.strict_invariant_violations();
        prop_assert!(violations.is_empty(), "{}: {:?}", incident.id, violations);
    }
    Ok(())
}

fn check_loose(console: &Console) -> Result<(), TestCaseError> {
    for incident in console.list_incidents(StatusFilter::All) {
        prop_assert_eq!(incident.steps.len(), incident.total_steps);
        prop_assert!(incident.count_steps(StepStatus::Running) <= 1);
        prop_assert_eq!(
            incident.status == IncidentStatus::Completed,
            incident.all_steps_completed()
        );
        prop_assert_eq!(
            incident.status == IncidentStatus::Failed,
            incident.has_failed_step()
        );
        prop_assert_eq!(incident.current_step_index, incident.derived_step_index());
    }
    Ok(())
}

// --- Invariants after arbitrary sequences ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn strict_incidents_always_consistent(
        seed in any::<u64>(),
        seeds in 0usize..40,
        advance in 0.0f64..=1.0,
        success in 0.0f64..=1.0,
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        let console = console(seed, seeds, advance, success, true, 100);
        run(&console, &ops, check_strict)?;
    }

    #[test]
    fn loose_incidents_keep_status_invariants(
        seed in any::<u64>(),
        seeds in 0usize..40,
        ops in prop::collection::vec(op_strategy(), 0..80),
    ) {
        let console = console(seed, seeds, 0.5, 0.8, false, 100);
        run(&console, &ops, check_loose)?;
    }

    #[test]
    fn store_ids_unique_and_bounded(
        seed in any::<u64>(),
        retention in 1usize..30,
        ops in prop::collection::vec(op_strategy(), 0..120),
    ) {
        let console = console(seed, 20, 0.3, 0.9, false, retention);
        run(&console, &ops, |console| {
            let incidents = console.list_incidents(StatusFilter::All);
            prop_assert!(incidents.len() <= retention);
            let ids: HashSet<&str> = incidents.iter().map(|i| i.id.as_str()).collect();
            prop_assert_eq!(ids.len(), incidents.len());
            Ok(())
        })?;
    }

    #[test]
    fn metrics_partition_the_store(
        seed in any::<u64>(),
        seeds in 0usize..60,
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let console = console(seed, seeds, 0.3, 0.9, false, 100);
        run(&console, &ops, no_check)?;

        let metrics = console.metrics();
        prop_assert_eq!(
            metrics.running + metrics.completed + metrics.failed + metrics.pending + metrics.paused,
            metrics.total
        );
        prop_assert!(metrics.success_rate_percent <= 100);
        prop_assert!(metrics.active_playbooks <= metrics.total_playbooks);
    }

    #[test]
    fn invalid_actions_leave_incident_untouched(
        seed in any::<u64>(),
        action in 0usize..OperatorAction::ALL.len(),
    ) {
        let console = console(seed, 30, 0.3, 0.9, false, 100);
        let action = OperatorAction::ALL[action];
        for incident in console.list_incidents(StatusFilter::All) {
            if action.applies_to(incident.status) {
                continue;
            }
            let outcome = console.apply_action(action, &incident.id);
            prop_assert!(outcome.is_ignored());
            prop_assert_eq!(console.incident(&incident.id).unwrap(), incident);
        }
    }

    #[test]
    fn metrics_are_pure(seed in any::<u64>(), seeds in 0usize..50) {
        let console = console(seed, seeds, 0.3, 0.9, false, 100);
        let incidents = console.list_incidents(StatusFilter::All);
        let catalog = PlaybookCatalog::with_defaults();
        prop_assert_eq!(console.metrics(), DashboardMetrics::compute(&incidents, &catalog));
        prop_assert_eq!(console.metrics(), console.metrics());
    }
}
