//! Configuration system for AutoSOC.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> environment. The user file lives at
//! `~/.config/autosoc/config.toml` (platform equivalent via `directories`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CatalogError, ConfigError};
use crate::playbook::PlaybookCatalog;

/// Top-level console configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Lifecycle simulation tuning.
    pub simulation: SimulationConfig,
    /// Playbook catalog source.
    pub catalog: CatalogConfig,
    /// Synthetic incident attributes.
    pub factory: FactoryConfig,
}

/// Tuning for the lifecycle engine and seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Seconds between live-mode ticks; also added to each running
    /// incident's elapsed time per tick.
    pub tick_secs: u64,
    /// Chance that a running incident advances on a given tick.
    pub advance_probability: f64,
    /// Chance that a resolved step completes rather than fails.
    pub step_success_probability: f64,
    /// Chance that a tick injects one new running incident.
    pub injection_probability: f64,
    /// Incidents synthesized at startup.
    pub seed_incidents: usize,
    /// Number of the first seeded incident (`INC-001000`).
    pub first_incident_number: u64,
    /// Maximum incidents kept; oldest are evicted first.
    pub retention: usize,
    /// Fixed RNG seed for reproducible sessions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
    /// Start with live mode enabled.
    pub start_live: bool,
    /// Place a synthesized running step directly after the completed prefix.
    pub strict_generation: bool,
}

/// Longest accepted tick period, one day.
pub const MAX_TICK_SECS: u64 = 86_400;

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_secs: 3,
            advance_probability: 0.3,
            step_success_probability: 0.9,
            injection_probability: 0.2,
            seed_incidents: 30,
            first_incident_number: 1000,
            retention: 100,
            rng_seed: None,
            start_live: true,
            strict_generation: false,
        }
    }
}

impl SimulationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    /// Numbers for the seeded incidents, or `None` if they overflow `u64`.
    pub fn first_seed_numbers(&self) -> Option<std::ops::Range<u64>> {
        let seeds = u64::try_from(self.seed_incidents).ok()?;
        let end = self.first_incident_number.checked_add(seeds)?;
        Some(self.first_incident_number..end)
    }
}

/// Where the playbook catalog comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// YAML catalog file; the built-in playbooks are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbooks_file: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn load_catalog(&self) -> Result<PlaybookCatalog, CatalogError> {
        match &self.playbooks_file {
            Some(path) => PlaybookCatalog::load_yaml(path),
            None => Ok(PlaybookCatalog::with_defaults()),
        }
    }
}

/// Pools the incident factory draws synthetic attributes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub source_systems: Vec<String>,
    pub analysts: Vec<String>,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            source_systems: vec![
                "NexusWatch".into(),
                "HoneyTrap-SSH".into(),
                "SentinelForge".into(),
                "EDR".into(),
                "Firewall".into(),
            ],
            analysts: vec![
                "Sarah Chen".into(),
                "Mike Rodriguez".into(),
                "Alex Kim".into(),
                "Jordan Lee".into(),
            ],
        }
    }
}

impl ConsoleConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        for (field, value) in [
            ("advance_probability", sim.advance_probability),
            ("step_success_probability", sim.step_success_probability),
            ("injection_probability", sim.injection_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidProbability { field, value });
            }
        }
        if sim.tick_secs == 0 {
            return Err(ConfigError::ZeroTickPeriod);
        }
        if sim.tick_secs > MAX_TICK_SECS {
            return Err(ConfigError::TickPeriodTooLong {
                secs: sim.tick_secs,
                max: MAX_TICK_SECS,
            });
        }
        if sim.first_seed_numbers().is_none() {
            return Err(ConfigError::IncidentNumberOverflow {
                first: sim.first_incident_number,
                seeds: sim.seed_incidents,
            });
        }
        if sim.retention == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.factory.source_systems.is_empty() {
            return Err(ConfigError::EmptyList {
                field: "source_systems",
            });
        }
        if self.factory.analysts.is_empty() {
            return Err(ConfigError::EmptyList { field: "analysts" });
        }
        Ok(())
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Path of the user-level config file, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "autosoc", "autosoc")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `AUTOSOC_`, nested with `__`)
/// 2. Explicit config file (`--config`)
/// 3. User config (`~/.config/autosoc/config.toml`)
/// 4. Built-in defaults
pub fn load_config(config_file: Option<&Path>) -> Result<ConsoleConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ConsoleConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    // AUTOSOC_SIMULATION__TICK_SECS, AUTOSOC_CATALOG__PLAYBOOKS_FILE, etc.
    figment = figment.merge(Env::prefixed("AUTOSOC_").split("__"));

    let config: ConsoleConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}
