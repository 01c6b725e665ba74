//! Incident response playbooks — ordered remediation templates per trigger.
//!
//! The catalog is fixed after construction except for each playbook's
//! `enabled` flag, which operators toggle. Catalogs can be built in code,
//! taken from the built-in defaults, or loaded from YAML.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use crate::error::CatalogError;
use crate::incident::{Severity, TriggerType};

/// An incident response playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    /// Playbook identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Playbook description.
    pub description: String,
    /// Detection category this playbook responds to.
    pub trigger: TriggerType,
    /// Severities this playbook is meant for.
    pub severities: BTreeSet<Severity>,
    /// Steps to execute, in order.
    pub steps: Vec<StepTemplate>,
    /// Whether this playbook is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Historical execution count.
    #[serde(default)]
    pub execution_count: u64,
    /// Historical average run time, preformatted (e.g. `2m 34s`).
    #[serde(default)]
    pub avg_duration: String,
    /// Historical success rate in percent.
    #[serde(default)]
    pub success_rate: f64,
}

fn default_true() -> bool {
    true
}

/// A step in a playbook. Templates carry no runtime status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepTemplate {
    /// 1-based position; assigned from list order when the catalog is built.
    #[serde(default)]
    pub ordinal: u32,
    /// Step name.
    pub name: String,
    /// Action identifier.
    pub action: String,
    /// Timeout in seconds.
    pub timeout_secs: u64,
}

impl StepTemplate {
    fn new(name: &str, action: &str, timeout_secs: u64) -> Self {
        Self {
            ordinal: 0,
            name: name.into(),
            action: action.into(),
            timeout_secs,
        }
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    playbooks: Vec<Playbook>,
}

/// Playbook catalog for storing and matching playbooks.
#[derive(Debug, Clone)]
pub struct PlaybookCatalog {
    playbooks: Vec<Playbook>,
}

impl PlaybookCatalog {
    /// Build a catalog, validating ids and steps and numbering step ordinals.
    pub fn new(mut playbooks: Vec<Playbook>) -> Result<Self, CatalogError> {
        if playbooks.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for playbook in &playbooks {
            if !seen.insert(playbook.id.clone()) {
                return Err(CatalogError::DuplicateId {
                    id: playbook.id.clone(),
                });
            }
            if playbook.steps.is_empty() {
                return Err(CatalogError::NoSteps {
                    id: playbook.id.clone(),
                });
            }
        }

        number_steps(&mut playbooks);
        Ok(Self { playbooks })
    }

    /// Parse a catalog from a YAML document with a top-level `playbooks` list.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_yaml::from_str(yaml)?;
        Self::new(file.playbooks)
    }

    /// Load a catalog from a YAML file.
    pub fn load_yaml(path: &Path) -> Result<Self, CatalogError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Create with the default incident response playbooks.
    pub fn with_defaults() -> Self {
        let mut playbooks = default_playbooks();
        number_steps(&mut playbooks);
        Self { playbooks }
    }

    /// Flip `enabled` for the matching playbook, returning the new state.
    /// Unknown ids are a no-op.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let playbook = self.playbooks.iter_mut().find(|p| p.id == id)?;
        playbook.enabled = !playbook.enabled;
        Some(playbook.enabled)
    }

    /// First playbook for `trigger`, falling back to the first entry.
    pub fn find_by_trigger(&self, trigger: TriggerType) -> &Playbook {
        self.playbooks
            .iter()
            .find(|p| p.trigger == trigger)
            .unwrap_or(&self.playbooks[0])
    }

    /// Get all playbooks.
    pub fn all(&self) -> &[Playbook] {
        &self.playbooks
    }

    /// Get playbook by ID.
    pub fn get(&self, id: &str) -> Option<&Playbook> {
        self.playbooks.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.playbooks.iter().filter(|p| p.enabled).count()
    }
}

impl Default for PlaybookCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn number_steps(playbooks: &mut [Playbook]) {
    for playbook in playbooks {
        for (i, step) in playbook.steps.iter_mut().enumerate() {
            step.ordinal = i as u32 + 1;
        }
    }
}

fn playbook(
    id: &str,
    name: &str,
    description: &str,
    trigger: TriggerType,
    severities: &[Severity],
    steps: Vec<StepTemplate>,
    (enabled, execution_count, avg_duration, success_rate): (bool, u64, &str, f64),
) -> Playbook {
    Playbook {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        trigger,
        severities: severities.iter().copied().collect(),
        steps,
        enabled,
        execution_count,
        avg_duration: avg_duration.into(),
        success_rate,
    }
}

fn default_playbooks() -> Vec<Playbook> {
    use Severity::*;
    let step = StepTemplate::new;

    vec![
        playbook(
            "pb-001",
            "Brute Force Response",
            "Automated response to brute force authentication attempts",
            TriggerType::BruteForce,
            &[High, Critical],
            vec![
                step("Block Source IP", "firewall_block", 30),
                step("Enrich with Threat Intel", "sentinelforge_lookup", 60),
                step("Capture Forensics", "collect_logs", 120),
                step("Notify SOC Team", "send_alert", 30),
                step("Create Ticket", "create_incident", 30),
            ],
            (true, 147, "2m 34s", 98.2),
        ),
        playbook(
            "pb-002",
            "Malware Containment",
            "Isolate infected endpoint and initiate remediation",
            TriggerType::MalwareDetected,
            &[Critical],
            vec![
                step("Isolate Endpoint", "edr_isolate", 15),
                step("Kill Malicious Process", "edr_kill_process", 30),
                step("Collect Memory Dump", "forensics_memdump", 300),
                step("Scan for IOCs", "ioc_scan", 180),
                step("Quarantine Files", "quarantine", 60),
                step("Escalate to Tier 2", "escalate", 30),
            ],
            (true, 23, "8m 12s", 95.7),
        ),
        playbook(
            "pb-003",
            "Data Exfiltration Response",
            "Respond to potential data exfiltration attempts",
            TriggerType::DataExfiltration,
            &[Critical],
            vec![
                step("Block Destination", "firewall_block_dest", 15),
                step("Terminate Connection", "kill_connection", 10),
                step("Capture Network Traffic", "pcap_capture", 60),
                step("Identify Data Scope", "dlp_scan", 300),
                step("Preserve Evidence", "evidence_collection", 120),
                step("Executive Notification", "exec_alert", 30),
                step("Legal Hold", "legal_hold", 60),
            ],
            (true, 8, "12m 45s", 100.0),
        ),
        playbook(
            "pb-004",
            "C2 Communication Block",
            "Detect and block command & control communications",
            TriggerType::C2Communication,
            &[Critical, High],
            vec![
                step("Block C2 Domain/IP", "dns_sinkhole", 15),
                step("Isolate Affected Host", "edr_isolate", 30),
                step("Hunt for Persistence", "persistence_scan", 180),
                step("Update Threat Intel", "sentinelforge_update", 30),
                step("Network-wide Scan", "network_ioc_scan", 600),
            ],
            (true, 34, "15m 22s", 97.1),
        ),
        playbook(
            "pb-005",
            "Phishing Response",
            "Handle reported phishing emails and compromised accounts",
            TriggerType::PhishingDetected,
            &[Medium, High],
            vec![
                step("Quarantine Email", "email_quarantine", 30),
                step("Extract IOCs", "email_ioc_extract", 60),
                step("Block Sender Domain", "email_block_domain", 30),
                step("Search Mailboxes", "email_search", 300),
                step("Reset Credentials", "password_reset", 60),
                step("User Notification", "user_notify", 30),
            ],
            (false, 89, "5m 18s", 99.1),
        ),
        playbook(
            "pb-006",
            "Privilege Escalation",
            "Respond to unauthorized privilege escalation attempts",
            TriggerType::PrivilegeEscalation,
            &[High, Critical],
            vec![
                step("Disable Account", "disable_account", 15),
                step("Revoke Sessions", "revoke_sessions", 30),
                step("Audit Access Logs", "access_audit", 180),
                step("Check for Lateral Movement", "lateral_scan", 300),
                step("Manager Notification", "manager_alert", 30),
            ],
            (true, 56, "6m 42s", 96.4),
        ),
    ]
}
