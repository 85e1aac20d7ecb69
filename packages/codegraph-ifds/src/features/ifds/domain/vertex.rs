/*
 * Exploded supergraph vocabulary
 *
 * Vertex = (method, statement, fact), Edge = (start vertex, current vertex).
 * An edge is both the solver work item and the wire format used when one
 * unit injects work into another.
 *
 * Reason records why a path edge exists; the runner walks reasons backwards
 * to build local witness traces.
 */

use std::fmt::Debug;
use std::hash::Hash;

/// Bounds required of methods, statements and unit keys
///
/// Identifiers cross task boundaries and key hash maps, nothing more.
pub trait IfdsNode: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> IfdsNode for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Dataflow fact (abstract domain element)
///
/// Example:
///   - Taint analysis: Tainted { path: "x.f", mark: "UNTRUSTED" }
///   - Null pointer: Tainted { path: "p", mark: NULLNESS }
///   - Unused values: Unused { variable: "x", definition: "m#3" }
pub trait DomainFact: IfdsNode {
    /// Check if this is the special ZERO fact (holds everywhere)
    fn is_zero(&self) -> bool;

    /// Create the ZERO fact
    fn zero() -> Self;
}

/// Node in the exploded supergraph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vertex<M, S, F> {
    pub method: M,
    pub statement: S,
    pub fact: F,
}

impl<M, S, F> Vertex<M, S, F> {
    pub fn new(method: M, statement: S, fact: F) -> Self {
        Self {
            method,
            statement,
            fact,
        }
    }
}

/// Path edge: start vertex of the method → current vertex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge<M, S, F> {
    pub from: Vertex<M, S, F>,
    pub to: Vertex<M, S, F>,
}

impl<M, S, F> Edge<M, S, F> {
    pub fn new(from: Vertex<M, S, F>, to: Vertex<M, S, F>) -> Self {
        Self { from, to }
    }

    /// The method both endpoints belong to
    pub fn method(&self) -> &M {
        &self.from.method
    }
}

impl<M: Clone, S: Clone, F: Clone> Edge<M, S, F> {
    /// Start edge `v → v`
    pub fn self_loop(vertex: Vertex<M, S, F>) -> Self {
        Self {
            from: vertex.clone(),
            to: vertex,
        }
    }
}

impl<M: PartialEq, S: PartialEq, F: PartialEq> Edge<M, S, F> {
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

/// Why a path edge was recorded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reason<M, S, F> {
    /// Seeded at a start method entry
    Initial,

    /// Injected by another runner without a known caller
    External,

    /// Injected for a call made from another unit
    CrossUnitCall { caller: Vertex<M, S, F> },

    /// Normal or call-to-return flow from the predecessor edge
    Sequent(Edge<M, S, F>),

    /// Start edge of a callee reached from the caller edge
    CallToStart(Edge<M, S, F>),

    /// Return-site edge produced by applying `summary` at the call edge `edge`
    ThroughSummary {
        edge: Edge<M, S, F>,
        summary: Edge<M, S, F>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Fact {
        Zero,
        Var(&'static str),
    }

    impl DomainFact for Fact {
        fn is_zero(&self) -> bool {
            matches!(self, Fact::Zero)
        }

        fn zero() -> Self {
            Fact::Zero
        }
    }

    #[test]
    fn test_vertex_structural_equality() {
        let a = Vertex::new("m", 0usize, Fact::Var("x"));
        let b = Vertex::new("m", 0usize, Fact::Var("x"));
        assert_eq!(a, b);
        assert_ne!(a, Vertex::new("m", 0usize, Fact::zero()));
        assert!(Fact::zero().is_zero());
    }

    #[test]
    fn test_self_loop() {
        let start = Vertex::new("m", 0usize, Fact::Zero);
        let edge = Edge::self_loop(start.clone());
        assert!(edge.is_self_loop());
        assert_eq!(edge.method(), &"m");

        let edge = Edge::new(start, Vertex::new("m", 1usize, Fact::Zero));
        assert!(!edge.is_self_loop());
    }
}
