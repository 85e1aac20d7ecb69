//! Flow functions: D → 2^D
//!
//! Each factory method returns the transfer function of one supergraph edge
//! kind; the runner applies it to every fact reaching the edge.

use super::application_graph::ApplicationGraph;
use crate::features::ifds::domain::DomainFact;

/// Flow function: maps one fact to the facts that hold after the edge
///
/// Example (taint propagation):
///   Statement: x = y
///   Input fact: Tainted(y)
///   Output facts: [Tainted(x), Tainted(y)]
pub trait FlowFunction<F> {
    fn compute(&self, input: &F) -> Vec<F>;
}

impl<F, T> FlowFunction<F> for T
where
    T: Fn(&F) -> Vec<F>,
{
    fn compute(&self, input: &F) -> Vec<F> {
        self(input)
    }
}

/// Identity flow function: f(d) = {d}
pub struct IdentityFlowFunction;

impl<F: Clone> FlowFunction<F> for IdentityFlowFunction {
    fn compute(&self, input: &F) -> Vec<F> {
        vec![input.clone()]
    }
}

/// Kill flow function: f(d) = ∅
pub struct KillFlowFunction;

impl<F> FlowFunction<F> for KillFlowFunction {
    fn compute(&self, _input: &F) -> Vec<F> {
        Vec::new()
    }
}

pub type BoxedFlowFunction<'a, F> = Box<dyn FlowFunction<F> + 'a>;

/// Flow function space of one analysis
pub trait FlowFunctions<G, F>: Send + Sync
where
    G: ApplicationGraph,
    F: DomainFact,
{
    /// Facts seeded at the entry of a start method; Zero is always added
    fn obtain_possible_start_facts(&self, method: &G::Method) -> Vec<F>;

    /// Intra-procedural edge `current → next`
    fn normal_flow<'a>(
        &'a self,
        current: &'a G::Statement,
        next: &'a G::Statement,
    ) -> BoxedFlowFunction<'a, F>;

    /// Call site → return site, bypassing the callee
    fn call_to_return_flow<'a>(
        &'a self,
        call: &'a G::Statement,
        return_site: &'a G::Statement,
    ) -> BoxedFlowFunction<'a, F>;

    /// Call site → callee entry
    fn call_to_start_flow<'a>(
        &'a self,
        call: &'a G::Statement,
        callee_start: &'a G::Statement,
    ) -> BoxedFlowFunction<'a, F>;

    /// Callee exit → return site of `call`
    fn exit_to_return_flow<'a>(
        &'a self,
        call: &'a G::Statement,
        return_site: &'a G::Statement,
        exit: &'a G::Statement,
    ) -> BoxedFlowFunction<'a, F>;
}
