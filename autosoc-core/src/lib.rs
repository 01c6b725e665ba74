//! AutoSOC Core — the incident lifecycle state machine behind the AutoSOC
//! response console.
//!
//! - **Catalog:** response playbooks, each an ordered list of step templates
//! - **Factory:** synthetic incidents whose step states agree with their status
//! - **Store:** the bounded, newest-first incident collection
//! - **Engine:** the per-tick update that advances running incidents
//! - **Actions:** pause, resume, abort, retry and escalate
//! - **Console:** the shared controller, its event stream and live mode

pub mod actions;
pub mod config;
pub mod console;
pub mod engine;
pub mod error;
pub mod factory;
pub mod incident;
pub mod live;
pub mod metrics;
pub mod playbook;
pub mod store;

// Re-exports for convenience
pub use actions::{ActionOutcome, ActionRecord, IgnoreReason, OperatorAction};
pub use config::{ConsoleConfig, load_config};
pub use console::{Console, ConsoleEvent};
pub use engine::{LifecycleEngine, StepTransition, TickReport};
pub use error::{AutosocError, CatalogError, ConfigError, Result};
pub use incident::{
    Incident, IncidentStatus, InvariantViolation, Severity, StatusFilter, StepInstance,
    StepStatus, TriggerType,
};
pub use metrics::DashboardMetrics;
pub use playbook::{Playbook, PlaybookCatalog, StepTemplate};
