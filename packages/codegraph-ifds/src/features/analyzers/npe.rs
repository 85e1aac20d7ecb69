/*
 * Null-dereference analysis
 *
 * Facts are access paths carrying TaintMark::NULLNESS.
 *
 * Gen:  x = null, x.f = null, null passed as argument, `return null`,
 *       the null branch of a null check
 * Kill: redefinition, the non-null branch of a null check
 * Sink: field access or receiver call on a possibly-null local
 */

use super::rules::TaintRuleEvaluator;
use super::taint_fact::{AccessPath, TaintFact, TaintMark};
use super::transfer::{self, Actual};
use super::seed_callee_unit;
use crate::features::ifds::domain::{DomainFact, VulnerabilityLocation};
use crate::features::ifds::ports::{
    Analyzer, AnalyzerEvent, AnalyzerFactory, BoxedFlowFunction, EdgeOf, EventOf, FlowFunctions,
    KillFlowFunction, VertexOf,
};
use crate::program::{Condition, Inst, MethodId, Operand, Place, ProgramView, Rvalue, StmtId};
use std::sync::Arc;

pub const NPE_RULE: &str = "NPE";

pub struct NpeFlowFunctions<G> {
    graph: Arc<G>,
    max_path_length: usize,
}

/// Facts created from Zero by `x = null` / `x.f = null`
fn null_assignment(inst: Option<&Inst>, max_len: usize) -> Option<TaintFact> {
    let Some(Inst::Assign {
        place,
        value: Rvalue::Use(Operand::Null),
    }) = inst
    else {
        return None;
    };
    let path = match place {
        Place::Local(local) => AccessPath::local(local.as_str()),
        Place::Field { base, field } => AccessPath::new(base.as_str(), vec![field.clone()], max_len),
    };
    Some(TaintFact::tainted(path, TaintMark::NULLNESS))
}

/// Null checks: gen on the null branch, kill on the other one
fn branch_flow(condition: &Condition, then_target: usize, else_target: usize, next: usize, fact: &TaintFact) -> Vec<TaintFact> {
    let (local, null_target) = match condition {
        Condition::IsNull(local) => (local, then_target),
        Condition::NotNull(local) => (local, else_target),
        Condition::Opaque(_) => return vec![fact.clone()],
    };
    if then_target == else_target {
        return vec![fact.clone()];
    }

    let on_null_branch = next == null_target;
    match fact {
        TaintFact::Zero if on_null_branch => {
            vec![TaintFact::Zero, TaintFact::local(local.as_str(), TaintMark::NULLNESS)]
        }
        TaintFact::Tainted { path, .. } if !on_null_branch && path.is_local(local) => Vec::new(),
        _ => vec![fact.clone()],
    }
}

impl<G: ProgramView> FlowFunctions<G, TaintFact> for NpeFlowFunctions<G> {
    fn obtain_possible_start_facts(&self, _method: &MethodId) -> Vec<TaintFact> {
        vec![TaintFact::Zero]
    }

    fn normal_flow<'a>(&'a self, current: &'a StmtId, next: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        let inst = self.graph.inst(current);
        let max_len = self.max_path_length;
        Box::new(move |fact: &TaintFact| {
            if let Some(Inst::If {
                condition,
                then_target,
                else_target,
            }) = inst
            {
                return branch_flow(condition, *then_target, *else_target, next.index, fact);
            }
            let mut out = transfer::forward(inst, fact, max_len);
            if fact.is_zero() {
                out.extend(null_assignment(inst, max_len));
            }
            out
        })
    }

    fn call_to_return_flow<'a>(&'a self, call: &'a StmtId, _return_site: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        let result = self.graph.inst(call).and_then(Inst::result_local);
        Box::new(move |fact: &TaintFact| match fact.path() {
            Some(path) if result.is_some_and(|result| path.starts_with_local(result)) => Vec::new(),
            _ => vec![fact.clone()],
        })
    }

    fn call_to_start_flow<'a>(&'a self, call: &'a StmtId, callee_start: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        let Some(call_expr) = self.graph.inst(call).and_then(Inst::call_expr) else {
            return Box::new(KillFlowFunction);
        };
        let params = self.graph.parameters(&callee_start.method);
        Box::new(move |fact: &TaintFact| {
            let mut out = transfer::to_callee(call_expr, params, fact);
            if fact.is_zero() {
                for (actual, formal) in transfer::bind_arguments(call_expr, params) {
                    if actual == Actual::Null {
                        out.push(TaintFact::local(formal, TaintMark::NULLNESS));
                    }
                }
            }
            out
        })
    }

    fn exit_to_return_flow<'a>(
        &'a self,
        call: &'a StmtId,
        _return_site: &'a StmtId,
        exit: &'a StmtId,
    ) -> BoxedFlowFunction<'a, TaintFact> {
        let call_inst = self.graph.inst(call);
        let Some(call_expr) = call_inst.and_then(Inst::call_expr) else {
            return Box::new(KillFlowFunction);
        };
        let result = call_inst.and_then(Inst::result_local);
        let params = self.graph.parameters(&exit.method);
        let exit_inst = self.graph.inst(exit);
        let returns_null = matches!(exit_inst, Some(Inst::Return(Some(Operand::Null))));
        Box::new(move |fact: &TaintFact| {
            let mut out = transfer::to_caller(call_expr, result, params, exit_inst, fact);
            if let (true, true, Some(result)) = (fact.is_zero(), returns_null, result) {
                out.push(TaintFact::local(result, TaintMark::NULLNESS));
            }
            out
        })
    }
}

pub struct NpeAnalyzer<G> {
    graph: Arc<G>,
    flow: NpeFlowFunctions<G>,
    rules: Option<Arc<dyn TaintRuleEvaluator>>,
}

impl<G: ProgramView> Analyzer<G> for NpeAnalyzer<G> {
    type Fact = TaintFact;
    type Flow = NpeFlowFunctions<G>;

    fn flow_functions(&self) -> &Self::Flow {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &EdgeOf<G, TaintFact>) -> Vec<EventOf<G, TaintFact>> {
        let mut events = Vec::new();
        let vertex = &edge.to;
        if self.graph.is_exit_point(&vertex.statement) {
            events.push(AnalyzerEvent::NewSummaryEdge(edge.clone()));
        }

        let TaintFact::Tainted { path, mark } = &vertex.fact else {
            return events;
        };
        if *mark != TaintMark::NULLNESS {
            return events;
        }
        let Some(inst) = self.graph.inst(&vertex.statement) else {
            return events;
        };

        if path.fields.is_empty() && inst.dereferenced_locals().contains(&path.local.as_str()) {
            events.push(AnalyzerEvent::NewVulnerability(VulnerabilityLocation::new(
                NPE_RULE,
                format!("{path} may be null when dereferenced"),
                vertex.clone(),
            )));
        }
        if let (Some(rules), Some(call)) = (&self.rules, inst.call_expr()) {
            if call.uses_local(&path.local) {
                if let Some(sink) = rules.sink(&call.callee, mark) {
                    events.push(AnalyzerEvent::NewVulnerability(VulnerabilityLocation::new(
                        sink.rule,
                        sink.message,
                        vertex.clone(),
                    )));
                }
            }
        }
        events
    }

    fn handle_cross_unit_call(
        &self,
        caller: &VertexOf<G, TaintFact>,
        callee: &VertexOf<G, TaintFact>,
    ) -> Vec<EventOf<G, TaintFact>> {
        seed_callee_unit(caller, callee)
    }
}

pub struct NpeAnalyzerFactory {
    max_path_length: usize,
    rules: Option<Arc<dyn TaintRuleEvaluator>>,
}

impl NpeAnalyzerFactory {
    pub fn new(max_path_length: usize) -> Self {
        Self {
            max_path_length,
            rules: None,
        }
    }

    /// Also report nullness reaching sinks of `rules`
    pub fn with_rules(mut self, rules: Arc<dyn TaintRuleEvaluator>) -> Self {
        self.rules = Some(rules);
        self
    }
}

impl<G: ProgramView> AnalyzerFactory<G> for NpeAnalyzerFactory {
    type Analyzer = NpeAnalyzer<G>;

    fn new_analyzer(&self, graph: Arc<G>) -> NpeAnalyzer<G> {
        NpeAnalyzer {
            flow: NpeFlowFunctions {
                graph: graph.clone(),
                max_path_length: self.max_path_length,
            },
            graph,
            rules: self.rules.clone(),
        }
    }
}
