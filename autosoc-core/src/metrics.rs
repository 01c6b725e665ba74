//! Dashboard metrics, recomputed from the incident set on every read.

use serde::Serialize;

use crate::incident::{Incident, IncidentStatus};
use crate::playbook::PlaybookCatalog;

/// Aggregate counters shown on the console dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub paused: usize,
    /// Mean elapsed time across all incidents, in whole minutes.
    pub avg_duration_minutes: u64,
    /// `completed / (completed + failed)` as a rounded percentage; 0 when
    /// nothing has resolved yet.
    pub success_rate_percent: u32,
    pub active_playbooks: usize,
    pub total_playbooks: usize,
}

impl DashboardMetrics {
    pub fn compute(incidents: &[Incident], catalog: &PlaybookCatalog) -> Self {
        let mut metrics = Self {
            total: incidents.len(),
            active_playbooks: catalog.enabled_count(),
            total_playbooks: catalog.len(),
            ..Self::default()
        };

        let mut elapsed_total: u64 = 0;
        for incident in incidents {
            elapsed_total += incident.elapsed_secs;
            match incident.status {
                IncidentStatus::Running => metrics.running += 1,
                IncidentStatus::Completed => metrics.completed += 1,
                IncidentStatus::Failed => metrics.failed += 1,
                IncidentStatus::Pending => metrics.pending += 1,
                IncidentStatus::Paused => metrics.paused += 1,
            }
        }

        if !incidents.is_empty() {
            let mean_minutes = elapsed_total as f64 / incidents.len() as f64 / 60.0;
            metrics.avg_duration_minutes = mean_minutes.round() as u64;
        }

        let resolved = metrics.completed + metrics.failed;
        if resolved > 0 {
            let rate = metrics.completed as f64 / resolved as f64 * 100.0;
            metrics.success_rate_percent = rate.round() as u32;
        }

        metrics
    }
}

impl std::fmt::Display for DashboardMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "running {} | completed {} | failed {} | avg {}m | success {}% | playbooks {}/{}",
            self.running,
            self.completed,
            self.failed,
            self.avg_duration_minutes,
            self.success_rate_percent,
            self.active_playbooks,
            self.total_playbooks,
        )
    }
}
