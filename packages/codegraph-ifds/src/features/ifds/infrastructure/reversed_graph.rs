//! Backward view of an application graph

use crate::features::ifds::ports::ApplicationGraph;
use std::sync::Arc;

/// Swaps successors/predecessors and entry/exit points
pub struct ReversedGraph<G> {
    inner: Arc<G>,
}

impl<G> ReversedGraph<G> {
    pub fn new(inner: Arc<G>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: ApplicationGraph> ApplicationGraph for ReversedGraph<G> {
    type Method = G::Method;
    type Statement = G::Statement;

    fn successors(&self, statement: &Self::Statement) -> Vec<Self::Statement> {
        self.inner.predecessors(statement)
    }

    fn predecessors(&self, statement: &Self::Statement) -> Vec<Self::Statement> {
        self.inner.successors(statement)
    }

    fn callees(&self, statement: &Self::Statement) -> Vec<Self::Method> {
        self.inner.callees(statement)
    }

    fn callers(&self, method: &Self::Method) -> Vec<Self::Statement> {
        self.inner.callers(method)
    }

    fn entry_points(&self, method: &Self::Method) -> Vec<Self::Statement> {
        self.inner.exit_points(method)
    }

    fn exit_points(&self, method: &Self::Method) -> Vec<Self::Statement> {
        self.inner.entry_points(method)
    }

    fn method_of(&self, statement: &Self::Statement) -> Self::Method {
        self.inner.method_of(statement)
    }

    fn statements(&self, method: &Self::Method) -> Vec<Self::Statement> {
        self.inner.statements(method)
    }

    fn is_call(&self, statement: &Self::Statement) -> bool {
        self.inner.is_call(statement)
    }
}
