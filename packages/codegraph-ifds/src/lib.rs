/*
 * Codegraph IFDS - compositional interprocedural dataflow engine
 *
 * Feature-First Hexagonal Architecture:
 * - features/ifds/      : Tabulation engine (domain, ports, infrastructure, application)
 * - features/analyzers/ : Null-dereference, taint, their backward passes, unused values
 * - program/            : Reference program model implementing the graph ports
 * - config/             : IfdsConfig, presets, YAML loading
 *
 * The program is split into units; every unit gets its own runner task and
 * units exchange summaries through shared pub/sub storages.
 */

#![allow(clippy::type_complexity)] // Vertex/Edge generics over graph associated types
#![allow(clippy::new_without_default)] // Builders take required arguments

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration system
pub mod config;

/// Error types
pub mod errors;

/// Engine and analyzers
pub mod features;

/// Reference program model
pub mod program;

// ═══════════════════════════════════════════════════════════════════════════
// Re-exports for Public API
// ═══════════════════════════════════════════════════════════════════════════

pub use config::{ConfigError, IfdsConfig, Preset, TaintRulesConfig};
pub use errors::{IfdsError, Result};
pub use features::analyzers::{
    new_alias_runner, new_npe_runner, new_taint_runner, new_taint_runner_from_config,
    new_unused_variable_runner, TaintFact, TaintMark, UnusedFact,
};
pub use features::ifds::{
    ApplicationGraph, DomainFact, IfdsUnitManager, ManagerOptions, RunOutcome, TraceGraph,
    UnitResolver, VulnerabilityInstance,
};
pub use program::{Inst, MethodId, Operand, ProgramBuilder, ProgramGraph, ProgramView, StmtId};
