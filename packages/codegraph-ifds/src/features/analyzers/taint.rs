//! Forward taint analysis
//!
//! Calls to sources taint their result. Sanitizers clear the marks they
//! handle from their arguments. Library calls (no body in the program)
//! pass argument taint on to the result. A tainted receiver or argument of
//! a sink call is a vulnerability.

use super::rules::TaintRuleEvaluator;
use super::seed_callee_unit;
use super::taint_fact::TaintFact;
use super::transfer;
use crate::features::ifds::domain::VulnerabilityLocation;
use crate::features::ifds::ports::{
    Analyzer, AnalyzerEvent, AnalyzerFactory, BoxedFlowFunction, EdgeOf, EventOf, FlowFunctions,
    KillFlowFunction, VertexOf,
};
use crate::program::{Inst, MethodId, ProgramView, StmtId};
use std::sync::Arc;

pub struct TaintFlowFunctions<G> {
    graph: Arc<G>,
    rules: Arc<dyn TaintRuleEvaluator>,
    max_path_length: usize,
}

impl<G: ProgramView> FlowFunctions<G, TaintFact> for TaintFlowFunctions<G> {
    fn obtain_possible_start_facts(&self, _method: &MethodId) -> Vec<TaintFact> {
        vec![TaintFact::Zero]
    }

    fn normal_flow<'a>(&'a self, current: &'a StmtId, _next: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        let inst = self.graph.inst(current);
        let max_len = self.max_path_length;
        Box::new(move |fact: &TaintFact| transfer::forward(inst, fact, max_len))
    }

    fn call_to_return_flow<'a>(&'a self, call: &'a StmtId, _return_site: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        let inst = self.graph.inst(call);
        let Some(call_expr) = inst.and_then(Inst::call_expr) else {
            return Box::new(KillFlowFunction);
        };
        let result = inst.and_then(Inst::result_local);
        let is_library = self.graph.callees(call).is_empty();
        let rules = &*self.rules;

        Box::new(move |fact: &TaintFact| {
            let TaintFact::Tainted { path, mark } = fact else {
                let mut out = vec![TaintFact::Zero];
                if let Some(result) = result {
                    out.extend(
                        rules
                            .source_marks(&call_expr.callee)
                            .into_iter()
                            .map(|mark| TaintFact::local(result, mark)),
                    );
                }
                return out;
            };

            let passed = call_expr.uses_local(&path.local);
            let sanitized = passed && rules.sanitizes(&call_expr.callee, mark);
            let mut out = Vec::new();
            if !sanitized && result != Some(path.local.as_str()) {
                out.push(fact.clone());
            }
            if let (true, false, true, Some(result)) = (passed, sanitized, is_library, result) {
                out.push(TaintFact::local(result, mark.clone()));
            }
            out
        })
    }

    fn call_to_start_flow<'a>(&'a self, call: &'a StmtId, callee_start: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        let Some(call_expr) = self.graph.inst(call).and_then(Inst::call_expr) else {
            return Box::new(KillFlowFunction);
        };
        let params = self.graph.parameters(&callee_start.method);
        Box::new(move |fact: &TaintFact| transfer::to_callee(call_expr, params, fact))
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
        Box::new(move |fact: &TaintFact| transfer::to_caller(call_expr, result, params, exit_inst, fact))
    }
}

pub struct TaintAnalyzer<G> {
    graph: Arc<G>,
    flow: TaintFlowFunctions<G>,
    rules: Arc<dyn TaintRuleEvaluator>,
}

impl<G: ProgramView> Analyzer<G> for TaintAnalyzer<G> {
    type Fact = TaintFact;
    type Flow = TaintFlowFunctions<G>;

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
        let Some(call) = self.graph.inst(&vertex.statement).and_then(Inst::call_expr) else {
            return events;
        };
        if call.uses_local(&path.local) {
            if let Some(sink) = self.rules.sink(&call.callee, mark) {
                events.push(AnalyzerEvent::NewVulnerability(VulnerabilityLocation::new(
                    sink.rule,
                    sink.message,
                    vertex.clone(),
                )));
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

pub struct TaintAnalyzerFactory {
    rules: Arc<dyn TaintRuleEvaluator>,
    max_path_length: usize,
}

impl TaintAnalyzerFactory {
    pub fn new(rules: Arc<dyn TaintRuleEvaluator>, max_path_length: usize) -> Self {
        Self {
            rules,
            max_path_length,
        }
    }
}

impl<G: ProgramView> AnalyzerFactory<G> for TaintAnalyzerFactory {
    type Analyzer = TaintAnalyzer<G>;

    fn new_analyzer(&self, graph: Arc<G>) -> TaintAnalyzer<G> {
        TaintAnalyzer {
            flow: TaintFlowFunctions {
                graph: graph.clone(),
                rules: self.rules.clone(),
                max_path_length: self.max_path_length,
            },
            graph,
            rules: self.rules.clone(),
        }
    }
}
