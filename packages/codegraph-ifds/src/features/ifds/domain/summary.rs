//! Summary facts exchanged between units through the summary storages

use super::trace_graph::TraceGraph;
use super::vertex::{DomainFact, Edge, IfdsNode, Vertex};

/// Fact keyed by the method it describes
pub trait MethodKeyed<M> {
    fn method(&self) -> &M;
}

/// Start → exit summary of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryEdgeFact<M, S, F> {
    pub edge: Edge<M, S, F>,
}

/// Local witness graph toward a sink or a cross-unit caller vertex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceGraphFact<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    pub graph: TraceGraph<M, S, F>,
}

/// A call whose callee lives in another unit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrossUnitCallFact<M, S, F> {
    pub caller: Vertex<M, S, F>,
    pub callee: Vertex<M, S, F>,
}

/// Where an analyzer found a defect
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VulnerabilityLocation<M, S, F> {
    pub rule: String,
    pub message: String,
    pub sink: Vertex<M, S, F>,
}

impl<M, S, F> VulnerabilityLocation<M, S, F> {
    pub fn new(rule: impl Into<String>, message: impl Into<String>, sink: Vertex<M, S, F>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            sink,
        }
    }
}

impl<M, S, F> MethodKeyed<M> for SummaryEdgeFact<M, S, F> {
    fn method(&self) -> &M {
        self.edge.method()
    }
}

impl<M, S, F> MethodKeyed<M> for TraceGraphFact<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    fn method(&self) -> &M {
        &self.graph.sink.method
    }
}

impl<M, S, F> MethodKeyed<M> for CrossUnitCallFact<M, S, F> {
    fn method(&self) -> &M {
        &self.caller.method
    }
}

impl<M, S, F> MethodKeyed<M> for VulnerabilityLocation<M, S, F> {
    fn method(&self) -> &M {
        &self.sink.method
    }
}

/// Everything a runner uploads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryFact<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    SummaryEdge(SummaryEdgeFact<M, S, F>),
    TraceGraph(TraceGraphFact<M, S, F>),
    CrossUnitCall(CrossUnitCallFact<M, S, F>),
    Vulnerability(VulnerabilityLocation<M, S, F>),
}

impl<M, S, F> MethodKeyed<M> for SummaryFact<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    fn method(&self) -> &M {
        match self {
            SummaryFact::SummaryEdge(fact) => fact.method(),
            SummaryFact::TraceGraph(fact) => fact.method(),
            SummaryFact::CrossUnitCall(fact) => fact.method(),
            SummaryFact::Vulnerability(fact) => fact.method(),
        }
    }
}

/// Vulnerability with its reconstructed trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VulnerabilityInstance<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    pub rule: String,
    pub message: String,
    pub trace_graph: TraceGraph<M, S, F>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Zero;

    impl DomainFact for Zero {
        fn is_zero(&self) -> bool {
            true
        }

        fn zero() -> Self {
            Zero
        }
    }

    #[test]
    fn test_fact_keys() {
        let a0 = Vertex::new("a", 0usize, Zero);
        let b0 = Vertex::new("b", 0usize, Zero);

        let call = SummaryFact::CrossUnitCall(CrossUnitCallFact {
            caller: a0.clone(),
            callee: b0.clone(),
        });
        assert_eq!(call.method(), &"a");

        let vuln = SummaryFact::Vulnerability(VulnerabilityLocation::new("NPE", "msg", b0.clone()));
        assert_eq!(vuln.method(), &"b");

        let trace = SummaryFact::TraceGraph(TraceGraphFact {
            graph: TraceGraph::by_sink(b0.clone()),
        });
        assert_eq!(trace.method(), &"b");

        let summary = SummaryFact::SummaryEdge(SummaryEdgeFact {
            edge: Edge::new(b0, Vertex::new("b", 4usize, Zero)),
        });
        assert_eq!(summary.method(), &"b");
    }
}
