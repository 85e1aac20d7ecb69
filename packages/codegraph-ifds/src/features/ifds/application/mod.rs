//! Application layer: the unit manager and everything run-scoped

pub mod discovery;
pub mod manager;
pub mod report;
pub mod run_context;
mod trace_restore;

pub use discovery::{discover_units, UnitDiscovery};
pub use manager::{
    IfdsUnitManager, ManagerOptions, RunOutcome, RunOutcomeOf, VulnerabilityOf,
};
pub use report::{AnalysisReport, VulnerabilityReport};
pub use run_context::RunContext;
