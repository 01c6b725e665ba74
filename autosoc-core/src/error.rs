//! Error types for the AutoSOC core.
//!
//! Only setup can fail: loading configuration, validating a playbook catalog,
//! or enabling live mode without a runtime. Lookup misses and actions that do
//! not fit an incident's status are reported as values, not errors.

use std::path::PathBuf;

/// Top-level error type for the AutoSOC core library.
#[derive(Debug, thiserror::Error)]
pub enum AutosocError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Live mode requires a running tokio runtime")]
    NoRuntime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Probability '{field}' must be within [0, 1], got {value}")]
    InvalidProbability { field: &'static str, value: f64 },

    #[error("Tick period must be at least one second")]
    ZeroTickPeriod,

    #[error("Tick period of {secs}s exceeds the {max}s limit")]
    TickPeriodTooLong { secs: u64, max: u64 },

    #[error("Incident numbers overflow: first {first} plus {seeds} seeds")]
    IncidentNumberOverflow { first: u64, seeds: usize },

    #[error("Retention cap must be at least one incident")]
    ZeroRetention,

    #[error("Factory list '{field}' must not be empty")]
    EmptyList { field: &'static str },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Errors from building or loading a playbook catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Playbook catalog must contain at least one playbook")]
    Empty,

    #[error("Duplicate playbook id: {id}")]
    DuplicateId { id: String },

    #[error("Playbook '{id}' has no steps")]
    NoSteps { id: String },

    #[error("Failed to parse playbook catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to read playbook catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience result type for the core library.
pub type Result<T> = std::result::Result<T, AutosocError>;
