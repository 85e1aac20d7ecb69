//! Cross-unit trace reconstruction
//!
//! Runners only see their own unit, so their witness graphs stop at unit
//! entries. After the run the caller-side graphs of every cross-unit call are
//! spliced in front until nothing changes.

use crate::features::ifds::domain::{
    CrossUnitCallFact, DomainFact, IfdsNode, TraceGraph, Vertex,
};
use crate::features::ifds::infrastructure::SummaryStorages;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

pub(crate) struct TraceRestorer<'a, M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    storages: &'a SummaryStorages<M, S, F>,
    /// callee method → cross-unit calls into it
    calls_into: FxHashMap<M, Vec<CrossUnitCallFact<M, S, F>>>,
}

impl<'a, M, S, F> TraceRestorer<'a, M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    pub(crate) fn new<'m>(
        storages: &'a SummaryStorages<M, S, F>,
        methods: impl IntoIterator<Item = &'m M>,
    ) -> Self
    where
        M: 'm,
    {
        let mut calls_into: FxHashMap<M, Vec<CrossUnitCallFact<M, S, F>>> = FxHashMap::default();
        for method in methods {
            for call in storages.cross_unit_calls.get_current_facts(method) {
                calls_into
                    .entry(call.callee.method.clone())
                    .or_default()
                    .push(call);
            }
        }
        Self {
            storages,
            calls_into,
        }
    }

    /// Union of the stored graphs for `sink`, or the single-vertex graph
    pub(crate) fn trace_graph_of(&self, sink: &Vertex<M, S, F>) -> TraceGraph<M, S, F> {
        let mut merged: Option<TraceGraph<M, S, F>> = None;
        for fact in self.storages.trace_graphs.get_current_facts(&sink.method) {
            if fact.graph.sink != *sink {
                continue;
            }
            match merged.as_mut() {
                Some(graph) => graph.merge(&fact.graph),
                None => merged = Some(fact.graph),
            }
        }
        merged.unwrap_or_else(|| TraceGraph::by_sink(sink.clone()))
    }

    /// Close `graph` over cross-unit calls
    pub(crate) fn extend(&self, graph: TraceGraph<M, S, F>) -> TraceGraph<M, S, F> {
        let mut result = graph;
        let mut applied: FxHashSet<CrossUnitCallFact<M, S, F>> = FxHashSet::default();

        loop {
            let mut changed = false;
            for method in result.methods() {
                let Some(calls) = self.calls_into.get(&method) else {
                    continue;
                };
                for call in calls {
                    if !result.sources.contains(&call.callee) || !applied.insert(call.clone()) {
                        continue;
                    }
                    trace!(caller = ?call.caller, callee = ?call.callee, "splicing caller trace");
                    let up = self.trace_graph_of(&call.caller);
                    let entries: FxHashSet<Vertex<M, S, F>> = std::iter::once(call.callee.clone()).collect();
                    result = result.merge_with_up_graph(&up, &entries);
                    changed = true;
                }
            }
            if !changed {
                return result;
            }
        }
    }
}
