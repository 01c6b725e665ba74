//! Ordered, bounded incident collection.
//!
//! Every mutation replaces whole records; callers never see a half-updated
//! incident.

use tracing::{debug, warn};

use crate::incident::Incident;

/// Ordered incident collection, newest first, capped at `retention` entries.
#[derive(Debug, Clone)]
pub struct IncidentStore {
    incidents: Vec<Incident>,
    retention: usize,
}

impl IncidentStore {
    pub fn new(retention: usize) -> Self {
        Self {
            incidents: Vec::new(),
            retention: retention.max(1),
        }
    }

    /// Build a store from seed incidents, newest `created_at` first.
    /// Duplicate ids keep their first occurrence.
    pub fn seeded(mut incidents: Vec<Incident>, retention: usize) -> Self {
        incidents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut store = Self::new(retention);
        for incident in incidents {
            if store.contains(&incident.id) {
                warn!(incident = %incident.id, "Dropping duplicate seed incident");
                continue;
            }
            store.incidents.push(incident);
        }
        store.enforce_retention();
        store
    }

    /// Prepend an incident, evicting the oldest beyond the retention cap.
    /// Returns false (and leaves the store untouched) if the id is taken.
    pub fn insert_front(&mut self, incident: Incident) -> bool {
        if self.contains(&incident.id) {
            warn!(incident = %incident.id, "Rejected duplicate incident id");
            return false;
        }
        self.incidents.insert(0, incident);
        self.enforce_retention();
        true
    }

    /// Replace the incident with `id` by `update(&current)`.
    /// Returns the updater's side value, or `None` if no incident matches.
    pub fn replace_where<T>(
        &mut self,
        id: &str,
        update: impl FnOnce(&Incident) -> (Incident, T),
    ) -> Option<T> {
        let slot = self.incidents.iter_mut().find(|i| i.id == id)?;
        let (mut replacement, out) = update(slot);
        // Identity is not the updater's to change.
        replacement.id = slot.id.clone();
        *slot = replacement;
        Some(out)
    }

    /// Swap in a whole new incident sequence (one committed tick).
    pub(crate) fn replace_all(&mut self, incidents: Vec<Incident>) {
        self.incidents = incidents;
        self.enforce_retention();
    }

    /// Read-only view of every incident, in store order.
    pub fn all(&self) -> &[Incident] {
        &self.incidents
    }

    pub fn get(&self, id: &str) -> Option<&Incident> {
        self.incidents.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.incidents.iter().any(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.incidents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    fn enforce_retention(&mut self) {
        if self.incidents.len() > self.retention {
            let evicted = self.incidents.len() - self.retention;
            self.incidents.truncate(self.retention);
            debug!(evicted, retention = self.retention, "Evicted oldest incidents");
        }
    }
}
