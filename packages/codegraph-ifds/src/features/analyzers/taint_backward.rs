/*
 * Backward taint analysis
 *
 * Runs on the reversed graph. A vertex (s, fact) means the value of `fact`
 * right after `s` (in program order) reaches a sink. Sinks seed facts for
 * their arguments; assignments map facts back to their right-hand sides.
 *
 * When a fact on a parameter survives to the method start, the analyzer
 * hands the start vertex to the forward runner of the same unit, which then
 * treats the parameter as tainted.
 */

use super::rules::TaintRuleEvaluator;
use super::taint_fact::TaintFact;
use super::transfer;
use crate::features::ifds::domain::{Edge, Vertex};
use crate::features::ifds::ports::{
    Analyzer, AnalyzerEvent, AnalyzerFactory, BoxedFlowFunction, EdgeOf, EventOf, FlowFunctions,
    KillFlowFunction, VertexOf,
};
use crate::program::{CallExpr, Inst, MethodId, ProgramView, StmtId};
use std::sync::Arc;

pub struct TaintBackwardFlowFunctions<G> {
    graph: Arc<G>,
    rules: Arc<dyn TaintRuleEvaluator>,
    max_path_length: usize,
}

impl<G: ProgramView> TaintBackwardFlowFunctions<G> {
    /// Facts needed before the call, given `fact` needed after it
    fn before_call(&self, call: &CallExpr, result: Option<&str>, is_library: bool, fact: &TaintFact) -> Vec<TaintFact> {
        let actuals = call
            .receiver
            .as_deref()
            .into_iter()
            .chain(call.arg_locals().map(|(_, local)| local));

        let TaintFact::Tainted { path, mark } = fact else {
            let mut out = vec![TaintFact::Zero];
            let marks = self.rules.sink_marks(&call.callee);
            for local in actuals {
                out.extend(marks.iter().map(|mark| TaintFact::local(local, mark.clone())));
            }
            return out;
        };

        if result != Some(path.local.as_str()) {
            return vec![fact.clone()];
        }
        if !is_library || self.rules.sanitizes(&call.callee, mark) {
            return Vec::new();
        }
        actuals.map(|local| TaintFact::local(local, mark.clone())).collect()
    }

    /// Backward transfer of the instruction at `statement`
    fn before(&self, statement: &StmtId, fact: &TaintFact) -> Vec<TaintFact> {
        let inst = self.graph.inst(statement);
        match inst.and_then(Inst::call_expr) {
            Some(call) => {
                let result = inst.and_then(Inst::result_local);
                let is_library = self.graph.callees(statement).is_empty();
                self.before_call(call, result, is_library, fact)
            }
            None => transfer::backward(inst, fact, self.max_path_length),
        }
    }
}

impl<G: ProgramView> FlowFunctions<G, TaintFact> for TaintBackwardFlowFunctions<G> {
    fn obtain_possible_start_facts(&self, _method: &MethodId) -> Vec<TaintFact> {
        vec![TaintFact::Zero]
    }

    fn normal_flow<'a>(&'a self, current: &'a StmtId, _next: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(move |fact: &TaintFact| self.before(current, fact))
    }

    fn call_to_return_flow<'a>(&'a self, call: &'a StmtId, _return_site: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(move |fact: &TaintFact| self.before(call, fact))
    }

    // Callees are not entered backwards
    fn call_to_start_flow<'a>(&'a self, _call: &'a StmtId, _callee_start: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(KillFlowFunction)
    }

    fn exit_to_return_flow<'a>(
        &'a self,
        _call: &'a StmtId,
        _return_site: &'a StmtId,
        _exit: &'a StmtId,
    ) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(KillFlowFunction)
    }
}

pub struct TaintBackwardAnalyzer<G> {
    graph: Arc<G>,
    flow: TaintBackwardFlowFunctions<G>,
}

impl<G: ProgramView> Analyzer<G> for TaintBackwardAnalyzer<G> {
    type Fact = TaintFact;
    type Flow = TaintBackwardFlowFunctions<G>;

    fn flow_functions(&self) -> &Self::Flow {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &EdgeOf<G, TaintFact>) -> Vec<EventOf<G, TaintFact>> {
        let vertex = &edge.to;
        // Exits of the reversed graph are the method starts
        if !self.graph.is_exit_point(&vertex.statement) {
            return Vec::new();
        }

        let params = self.graph.parameters(&vertex.method);
        self.flow
            .before(&vertex.statement, &vertex.fact)
            .into_iter()
            .filter(|fact| fact.path().is_some_and(|path| params.contains(&path.local)))
            .map(|fact| {
                let start = Vertex::new(vertex.method.clone(), vertex.statement.clone(), fact);
                AnalyzerEvent::EdgeForOtherRunner {
                    edge: Edge::self_loop(start),
                    caller: None,
                }
            })
            .collect()
    }

    fn handle_cross_unit_call(
        &self,
        _caller: &VertexOf<G, TaintFact>,
        _callee: &VertexOf<G, TaintFact>,
    ) -> Vec<EventOf<G, TaintFact>> {
        Vec::new()
    }
}

pub struct TaintBackwardAnalyzerFactory {
    rules: Arc<dyn TaintRuleEvaluator>,
    max_path_length: usize,
}

impl TaintBackwardAnalyzerFactory {
    pub fn new(rules: Arc<dyn TaintRuleEvaluator>, max_path_length: usize) -> Self {
        Self {
            rules,
            max_path_length,
        }
    }
}

impl<G: ProgramView> AnalyzerFactory<G> for TaintBackwardAnalyzerFactory {
    type Analyzer = TaintBackwardAnalyzer<G>;

    fn new_analyzer(&self, graph: Arc<G>) -> TaintBackwardAnalyzer<G> {
        TaintBackwardAnalyzer {
            flow: TaintBackwardFlowFunctions {
                graph: graph.clone(),
                rules: self.rules.clone(),
                max_path_length: self.max_path_length,
            },
            graph,
        }
    }
}
