//! Unit discovery
//!
//! Depth-first closure over the call graph from the start methods. A method
//! is recorded for its unit the first time it is reached, which also prunes
//! revisits on recursive call graphs.

use crate::features::ifds::domain::IfdsNode;
use crate::features::ifds::ports::{ApplicationGraph, UnitResolver};
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;
use tracing::{debug, warn};

/// Units in discovery order with their methods in visiting order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitDiscovery<U, M>
where
    U: IfdsNode,
    M: IfdsNode,
{
    units: Vec<U>,
    methods: FxHashMap<U, Vec<M>>,
    complete: bool,
}

impl<U, M> UnitDiscovery<U, M>
where
    U: IfdsNode,
    M: IfdsNode,
{
    pub fn units(&self) -> &[U] {
        &self.units
    }

    pub fn methods_of(&self, unit: &U) -> &[M] {
        self.methods.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_methods(&self) -> impl Iterator<Item = &M> + '_ {
        self.units.iter().flat_map(move |unit| self.methods_of(unit).iter())
    }

    pub fn method_count(&self) -> usize {
        self.methods.values().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// False when the deadline cut discovery short
    pub fn is_complete(&self) -> bool {
        self.complete
    }
}

pub fn discover_units<G, R>(
    graph: &G,
    resolver: &R,
    start_methods: &[G::Method],
    deadline: Option<Instant>,
) -> UnitDiscovery<R::Unit, G::Method>
where
    G: ApplicationGraph,
    R: UnitResolver<G::Method>,
{
    let mut discovery = UnitDiscovery {
        units: Vec::new(),
        methods: FxHashMap::default(),
        complete: true,
    };
    let mut found: FxHashSet<G::Method> = FxHashSet::default();
    let mut stack: Vec<G::Method> = start_methods.iter().rev().cloned().collect();

    while let Some(method) = stack.pop() {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            warn!(found = found.len(), "deadline reached during unit discovery");
            discovery.complete = false;
            break;
        }
        if !found.insert(method.clone()) {
            continue;
        }

        let unit = resolver.resolve(&method);
        let methods = discovery.methods.entry(unit.clone()).or_insert_with(|| {
            discovery.units.push(unit.clone());
            Vec::new()
        });
        methods.push(method.clone());

        let callees: Vec<G::Method> = graph
            .statements(&method)
            .iter()
            .flat_map(|statement| graph.callees(statement))
            .filter(|callee| !found.contains(callee))
            .collect();
        stack.extend(callees.into_iter().rev());
    }

    debug!(
        units = discovery.units.len(),
        methods = found.len(),
        "unit discovery finished"
    );
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ifds::infrastructure::{MethodUnitResolver, SingletonUnit, SingletonUnitResolver};
    use crate::program::{Inst, MethodId, ProgramBuilder};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn program() -> crate::program::ProgramGraph {
        ProgramBuilder::new()
            .method("app.Main.main", &[], vec![Inst::call(None, "app.Main.a", vec![]), Inst::call(None, "app.Main.b", vec![])])
            .method("app.Main.a", &[], vec![Inst::call(None, "app.Main.c", vec![]), Inst::call(None, "app.Main.a", vec![])])
            .method("app.Main.b", &[], vec![Inst::call(None, "app.Main.c", vec![]), Inst::call(None, "lib.print", vec![])])
            .method("app.Main.c", &[], vec![Inst::call(None, "app.Main.a", vec![])])
            .method("app.Main.unused", &[], vec![])
            .build()
            .unwrap()
    }

    #[test]
    fn test_preorder_on_recursive_graph() {
        let graph = program();
        let start = [MethodId::new("app.Main.main")];
        let discovery = discover_units(&graph, &MethodUnitResolver, &start, None);

        let order: Vec<&str> = discovery.units().iter().map(MethodId::name).collect();
        assert_eq!(order, vec!["app.Main.main", "app.Main.a", "app.Main.c", "app.Main.b"]);
        assert!(discovery.is_complete());
    }

    #[test]
    fn test_single_unit_collects_all_reachable() {
        let graph = program();
        let start = [MethodId::new("app.Main.main")];
        let discovery = discover_units(&graph, &SingletonUnitResolver, &start, None);
        assert_eq!(discovery.units(), &[SingletonUnit]);
        assert_eq!(discovery.method_count(), 4);
        assert!(discovery.all_methods().all(|m| m.name() != "app.Main.unused"));
    }

    #[test]
    fn test_expired_deadline_stops_discovery() {
        let graph = program();
        let start = [MethodId::new("app.Main.main")];
        let past = Instant::now() - Duration::from_millis(1);
        let discovery = discover_units(&graph, &MethodUnitResolver, &start, Some(past));
        assert!(discovery.is_empty());
        assert!(!discovery.is_complete());
    }
}
