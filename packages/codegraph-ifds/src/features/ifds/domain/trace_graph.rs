//! Witness graphs for vulnerabilities
//!
//! A trace graph is a DAG-ish witness toward `sink`: `edges` maps a vertex to
//! its successors on the way to the sink, `sources` are the vertices the
//! witness starts from. Graphs built inside one unit stop at the unit
//! boundary; `unresolved_cross_unit_calls` keeps the caller vertices whose
//! side of the trace lives in another unit.

use super::vertex::{DomainFact, IfdsNode, Vertex};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceGraph<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    pub sink: Vertex<M, S, F>,
    pub sources: FxHashSet<Vertex<M, S, F>>,
    pub edges: FxHashMap<Vertex<M, S, F>, FxHashSet<Vertex<M, S, F>>>,
    /// caller vertex → callee start vertices that still need the caller side
    pub unresolved_cross_unit_calls: FxHashMap<Vertex<M, S, F>, FxHashSet<Vertex<M, S, F>>>,
}

impl<M, S, F> TraceGraph<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    /// Empty graph toward `sink`; no sources yet
    pub fn new(sink: Vertex<M, S, F>) -> Self {
        Self {
            sink,
            sources: FxHashSet::default(),
            edges: FxHashMap::default(),
            unresolved_cross_unit_calls: FxHashMap::default(),
        }
    }

    /// Single-vertex graph whose only source is the sink itself
    pub fn by_sink(sink: Vertex<M, S, F>) -> Self {
        let mut graph = Self::new(sink.clone());
        graph.sources.insert(sink);
        graph
    }

    pub fn add_edge(&mut self, from: &Vertex<M, S, F>, to: &Vertex<M, S, F>) {
        if from != to {
            self.edges.entry(from.clone()).or_default().insert(to.clone());
        }
    }

    pub fn add_source(&mut self, source: &Vertex<M, S, F>) {
        self.sources.insert(source.clone());
    }

    pub fn add_unresolved_call(&mut self, caller: &Vertex<M, S, F>, callee_start: &Vertex<M, S, F>) {
        self.unresolved_cross_unit_calls
            .entry(caller.clone())
            .or_default()
            .insert(callee_start.clone());
    }

    /// Union with another graph for the same sink
    pub fn merge(&mut self, other: &Self) {
        self.sources.extend(other.sources.iter().cloned());
        union_into(&mut self.edges, &other.edges);
        union_into(&mut self.unresolved_cross_unit_calls, &other.unresolved_cross_unit_calls);
    }

    /// Splice the caller-side graph `up` in front of this graph
    ///
    /// Only entry points that are currently sources get connected to
    /// `up.sink`; if there are none the graph is returned unchanged.
    pub fn merge_with_up_graph(&self, up: &Self, entry_points: &FxHashSet<Vertex<M, S, F>>) -> Self {
        let valid: Vec<&Vertex<M, S, F>> = entry_points
            .iter()
            .filter(|entry| self.sources.contains(*entry))
            .collect();
        if valid.is_empty() {
            return self.clone();
        }

        let mut result = self.clone();
        for entry in &valid {
            result.sources.remove(*entry);
        }
        result.sources.extend(up.sources.iter().cloned());
        union_into(&mut result.edges, &up.edges);
        for entry in valid {
            result.add_edge(&up.sink, entry);
        }

        if let Some(pending) = result.unresolved_cross_unit_calls.get_mut(&up.sink) {
            pending.retain(|callee| !entry_points.contains(callee));
            if pending.is_empty() {
                result.unresolved_cross_unit_calls.remove(&up.sink);
            }
        }
        union_into(&mut result.unresolved_cross_unit_calls, &up.unresolved_cross_unit_calls);
        result
    }

    /// Every vertex mentioned by the graph
    pub fn vertices(&self) -> FxHashSet<&Vertex<M, S, F>> {
        let mut vertices: FxHashSet<&Vertex<M, S, F>> = FxHashSet::default();
        vertices.insert(&self.sink);
        vertices.extend(self.sources.iter());
        for (from, tos) in &self.edges {
            vertices.insert(from);
            vertices.extend(tos.iter());
        }
        vertices
    }

    /// Methods touched by the graph
    pub fn methods(&self) -> FxHashSet<M> {
        self.vertices().into_iter().map(|v| v.method.clone()).collect()
    }
}

fn union_into<K, V>(target: &mut FxHashMap<K, FxHashSet<V>>, other: &FxHashMap<K, FxHashSet<V>>)
where
    K: Clone + Eq + std::hash::Hash,
    V: Clone + Eq + std::hash::Hash,
{
    for (key, values) in other {
        target
            .entry(key.clone())
            .or_default()
            .extend(values.iter().cloned());
    }
}
