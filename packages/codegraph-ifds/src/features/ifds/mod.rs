//! Compositional IFDS engine
//!
//! Hexagonal layout:
//! - `domain`: vertices, edges, reasons, summary facts, trace graphs
//! - `ports`: application graph, unit resolver, flow functions, analyzers
//! - `infrastructure`: storages, runners, controller
//! - `application`: the unit manager

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use application::{IfdsUnitManager, ManagerOptions, RunOutcome};
pub use domain::{
    DomainFact, Edge, IfdsNode, Reason, SummaryFact, TraceGraph, Vertex, VulnerabilityInstance,
    VulnerabilityLocation,
};
pub use ports::{Analyzer, AnalyzerEvent, AnalyzerFactory, ApplicationGraph, FlowFunctions, UnitResolver};
