//! Domain types of the tabulation engine

pub mod summary;
pub mod trace_graph;
pub mod vertex;

pub use summary::{
    CrossUnitCallFact, MethodKeyed, SummaryEdgeFact, SummaryFact, TraceGraphFact,
    VulnerabilityInstance, VulnerabilityLocation,
};
pub use trace_graph::TraceGraph;
pub use vertex::{DomainFact, Edge, IfdsNode, Reason, Vertex};
