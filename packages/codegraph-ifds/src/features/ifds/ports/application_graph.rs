//! Program view consumed by the engine

use crate::features::ifds::domain::{Edge, IfdsNode, Reason, Vertex};

/// Interprocedural control-flow graph
///
/// Read-only and shared by every runner of a run. Unresolvable call targets
/// simply have no callees.
pub trait ApplicationGraph: Send + Sync + 'static {
    type Method: IfdsNode;
    type Statement: IfdsNode;

    fn successors(&self, statement: &Self::Statement) -> Vec<Self::Statement>;

    fn predecessors(&self, statement: &Self::Statement) -> Vec<Self::Statement>;

    /// Statically resolvable callees of a call statement
    fn callees(&self, statement: &Self::Statement) -> Vec<Self::Method>;

    /// Call statements targeting `method`
    fn callers(&self, method: &Self::Method) -> Vec<Self::Statement>;

    fn entry_points(&self, method: &Self::Method) -> Vec<Self::Statement>;

    fn exit_points(&self, method: &Self::Method) -> Vec<Self::Statement>;

    fn method_of(&self, statement: &Self::Statement) -> Self::Method;

    /// All statements of `method`, used by unit discovery
    fn statements(&self, method: &Self::Method) -> Vec<Self::Statement>;

    /// Whether the statement is a call site, resolved or not
    fn is_call(&self, statement: &Self::Statement) -> bool {
        !self.callees(statement).is_empty()
    }

    fn is_exit_point(&self, statement: &Self::Statement) -> bool {
        let method = self.method_of(statement);
        self.exit_points(&method).contains(statement)
    }
}

/// Partitions methods into analysis units
pub trait UnitResolver<M>: Send + Sync + 'static {
    type Unit: IfdsNode;

    fn resolve(&self, method: &M) -> Self::Unit;
}

pub type VertexOf<G, F> =
    Vertex<<G as ApplicationGraph>::Method, <G as ApplicationGraph>::Statement, F>;

pub type EdgeOf<G, F> = Edge<<G as ApplicationGraph>::Method, <G as ApplicationGraph>::Statement, F>;

pub type ReasonOf<G, F> =
    Reason<<G as ApplicationGraph>::Method, <G as ApplicationGraph>::Statement, F>;
