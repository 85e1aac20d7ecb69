//! Pluggable analyzer contract
//!
//! One analyzer per bug class. The analyzer supplies flow functions and
//! reacts to every new path edge; the runner turns the returned events into
//! uploads and cross-runner messages.

use super::application_graph::{ApplicationGraph, EdgeOf, VertexOf};
use super::flow::FlowFunctions;
use crate::features::ifds::domain::{DomainFact, Edge, VulnerabilityLocation, Vertex};
use std::sync::Arc;

/// Reaction of an analyzer to a new path edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerEvent<M, S, F> {
    /// Start → exit summary; the target must be an exit point
    NewSummaryEdge(Edge<M, S, F>),

    NewVulnerability(VulnerabilityLocation<M, S, F>),

    /// Work for the runner owning `edge.from.method`
    ///
    /// With a caller the edge is recorded as a cross-unit call, without one
    /// it is an external seed.
    EdgeForOtherRunner {
        edge: Edge<M, S, F>,
        caller: Option<Vertex<M, S, F>>,
    },
}

pub type EventOf<G, F> =
    AnalyzerEvent<<G as ApplicationGraph>::Method, <G as ApplicationGraph>::Statement, F>;

pub trait Analyzer<G: ApplicationGraph>: Send + Sync + 'static {
    type Fact: DomainFact;
    type Flow: FlowFunctions<G, Self::Fact>;

    fn flow_functions(&self) -> &Self::Flow;

    fn handle_new_edge(&self, edge: &EdgeOf<G, Self::Fact>) -> Vec<EventOf<G, Self::Fact>>;

    fn handle_cross_unit_call(
        &self,
        caller: &VertexOf<G, Self::Fact>,
        callee: &VertexOf<G, Self::Fact>,
    ) -> Vec<EventOf<G, Self::Fact>>;

    /// Called once when the runner stops
    fn handle_unit_finished(&self) -> Vec<EventOf<G, Self::Fact>> {
        Vec::new()
    }
}

/// Builds one analyzer per runner
pub trait AnalyzerFactory<G: ApplicationGraph>: Send + Sync + 'static {
    type Analyzer: Analyzer<G>;

    fn new_analyzer(&self, graph: Arc<G>) -> Self::Analyzer;
}
