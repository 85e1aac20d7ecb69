//! Unused-value analysis
//!
//! `Unused { variable, definition }` travels from an assignment until the
//! variable is read or redefined. Definitions that were reached but never
//! read are reported when the unit finishes.

use super::seed_callee_unit;
use crate::features::ifds::domain::{DomainFact, Vertex, VulnerabilityLocation};
use crate::features::ifds::ports::{
    Analyzer, AnalyzerEvent, AnalyzerFactory, BoxedFlowFunction, EdgeOf, EventOf, FlowFunctions,
    VertexOf,
};
use crate::program::{Inst, MethodId, ProgramView, StmtId};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::sync::Arc;

pub const UNUSED_RULE: &str = "UNUSED";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnusedFact {
    Zero,
    Unused { variable: String, definition: StmtId },
}

impl DomainFact for UnusedFact {
    fn is_zero(&self) -> bool {
        matches!(self, UnusedFact::Zero)
    }

    fn zero() -> Self {
        UnusedFact::Zero
    }
}

impl fmt::Display for UnusedFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnusedFact::Zero => f.write_str("0"),
            UnusedFact::Unused { variable, definition } => write!(f, "unused({variable}@{definition})"),
        }
    }
}

/// Gen on definition, kill on use or redefinition
fn step(inst: Option<&Inst>, at: &StmtId, fact: &UnusedFact) -> Vec<UnusedFact> {
    match fact {
        UnusedFact::Zero => {
            let mut out = vec![UnusedFact::Zero];
            if let Some(variable) = inst.and_then(Inst::defined_local) {
                out.push(UnusedFact::Unused {
                    variable: variable.to_string(),
                    definition: at.clone(),
                });
            }
            out
        }
        UnusedFact::Unused { variable, .. } => {
            let touched = inst.is_some_and(|inst| {
                inst.defined_local() == Some(variable.as_str()) || inst.used_locals().contains(&variable.as_str())
            });
            if touched {
                Vec::new()
            } else {
                vec![fact.clone()]
            }
        }
    }
}

/// Only Zero crosses method boundaries
fn zero_only(fact: &UnusedFact) -> Vec<UnusedFact> {
    if fact.is_zero() {
        vec![UnusedFact::Zero]
    } else {
        Vec::new()
    }
}

pub struct UnusedFlowFunctions<G> {
    graph: Arc<G>,
}

impl<G: ProgramView> FlowFunctions<G, UnusedFact> for UnusedFlowFunctions<G> {
    fn obtain_possible_start_facts(&self, _method: &MethodId) -> Vec<UnusedFact> {
        vec![UnusedFact::Zero]
    }

    fn normal_flow<'a>(&'a self, current: &'a StmtId, _next: &'a StmtId) -> BoxedFlowFunction<'a, UnusedFact> {
        let inst = self.graph.inst(current);
        Box::new(move |fact: &UnusedFact| step(inst, current, fact))
    }

    fn call_to_return_flow<'a>(&'a self, call: &'a StmtId, _return_site: &'a StmtId) -> BoxedFlowFunction<'a, UnusedFact> {
        let inst = self.graph.inst(call);
        Box::new(move |fact: &UnusedFact| step(inst, call, fact))
    }

    fn call_to_start_flow<'a>(&'a self, _call: &'a StmtId, _callee_start: &'a StmtId) -> BoxedFlowFunction<'a, UnusedFact> {
        Box::new(zero_only)
    }

    fn exit_to_return_flow<'a>(
        &'a self,
        _call: &'a StmtId,
        _return_site: &'a StmtId,
        _exit: &'a StmtId,
    ) -> BoxedFlowFunction<'a, UnusedFact> {
        Box::new(zero_only)
    }
}

pub struct UnusedVariableAnalyzer<G> {
    graph: Arc<G>,
    flow: UnusedFlowFunctions<G>,
    /// definition → (variable, method)
    reached: Mutex<FxHashMap<StmtId, (String, MethodId)>>,
    used: Mutex<FxHashSet<StmtId>>,
}

impl<G: ProgramView> Analyzer<G> for UnusedVariableAnalyzer<G> {
    type Fact = UnusedFact;
    type Flow = UnusedFlowFunctions<G>;

    fn flow_functions(&self) -> &Self::Flow {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &EdgeOf<G, UnusedFact>) -> Vec<EventOf<G, UnusedFact>> {
        let vertex = &edge.to;
        let mut events = Vec::new();
        if self.graph.is_exit_point(&vertex.statement) {
            events.push(AnalyzerEvent::NewSummaryEdge(edge.clone()));
        }

        if let UnusedFact::Unused { variable, definition } = &vertex.fact {
            self.reached
                .lock()
                .entry(definition.clone())
                .or_insert_with(|| (variable.clone(), vertex.method.clone()));
            let is_use = self
                .graph
                .inst(&vertex.statement)
                .is_some_and(|inst| inst.used_locals().contains(&variable.as_str()));
            if is_use {
                self.used.lock().insert(definition.clone());
            }
        }
        events
    }

    fn handle_cross_unit_call(
        &self,
        caller: &VertexOf<G, UnusedFact>,
        callee: &VertexOf<G, UnusedFact>,
    ) -> Vec<EventOf<G, UnusedFact>> {
        seed_callee_unit(caller, callee)
    }

    fn handle_unit_finished(&self) -> Vec<EventOf<G, UnusedFact>> {
        let used = self.used.lock();
        let reached = self.reached.lock();
        let mut unused: Vec<(&StmtId, &(String, MethodId))> = reached
            .iter()
            .filter(|(definition, _)| !used.contains(*definition))
            .collect();
        unused.sort();

        unused
            .into_iter()
            .map(|(definition, (variable, method))| {
                AnalyzerEvent::NewVulnerability(VulnerabilityLocation::new(
                    UNUSED_RULE,
                    format!("value assigned to {variable} is never used"),
                    Vertex::new(method.clone(), definition.clone(), UnusedFact::Zero),
                ))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnusedVariableAnalyzerFactory;

impl<G: ProgramView> AnalyzerFactory<G> for UnusedVariableAnalyzerFactory {
    type Analyzer = UnusedVariableAnalyzer<G>;

    fn new_analyzer(&self, graph: Arc<G>) -> UnusedVariableAnalyzer<G> {
        UnusedVariableAnalyzer {
            flow: UnusedFlowFunctions { graph: graph.clone() },
            graph,
            reached: Mutex::new(FxHashMap::default()),
            used: Mutex::new(FxHashSet::default()),
        }
    }
}
