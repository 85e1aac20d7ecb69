/*
 * Backward nullness precalculation
 *
 * Runs on the reversed graph next to the forward NPE analyzer. A null check
 * on a local is taken as evidence that the code expects the local may be
 * null; the fact is carried back to the method start through copies and
 * field reads. A fact that reaches the start on a parameter becomes a
 * NULLNESS seed for the forward runner of the same unit, which then reports
 * dereferences of that parameter the check does not guard.
 */

use super::taint_fact::{TaintFact, TaintMark};
use super::transfer;
use crate::features::ifds::domain::vertex::DomainFact;
use crate::features::ifds::domain::{Edge, Vertex};
use crate::features::ifds::ports::{
    Analyzer, AnalyzerEvent, AnalyzerFactory, BoxedFlowFunction, EdgeOf, EventOf, FlowFunctions,
    KillFlowFunction, VertexOf,
};
use crate::program::{Condition, Inst, MethodId, ProgramView, StmtId};
use std::sync::Arc;

pub struct NpePrecalcFlowFunctions<G> {
    graph: Arc<G>,
    max_path_length: usize,
}

impl<G: ProgramView> NpePrecalcFlowFunctions<G> {
    /// Backward transfer of the instruction at `statement`
    fn before(&self, statement: &StmtId, fact: &TaintFact) -> Vec<TaintFact> {
        let inst = self.graph.inst(statement);
        match inst {
            Some(Inst::If {
                condition: Condition::IsNull(local) | Condition::NotNull(local),
                ..
            }) if fact.is_zero() => {
                vec![TaintFact::Zero, TaintFact::local(local.as_str(), TaintMark::NULLNESS)]
            }
            Some(call) if call.call_expr().is_some() => {
                // The call defines its result; anything else passes
                let result = call.result_local();
                match fact.path() {
                    Some(path) if result.is_some_and(|result| path.starts_with_local(result)) => Vec::new(),
                    _ => vec![fact.clone()],
                }
            }
            _ => transfer::backward(inst, fact, self.max_path_length),
        }
    }
}

impl<G: ProgramView> FlowFunctions<G, TaintFact> for NpePrecalcFlowFunctions<G> {
    fn obtain_possible_start_facts(&self, _method: &MethodId) -> Vec<TaintFact> {
        vec![TaintFact::Zero]
    }

    fn normal_flow<'a>(&'a self, current: &'a StmtId, _next: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(move |fact: &TaintFact| self.before(current, fact))
    }

    fn call_to_return_flow<'a>(&'a self, call: &'a StmtId, _return_site: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(move |fact: &TaintFact| self.before(call, fact))
    }

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

pub struct NpePrecalcBackwardAnalyzer<G> {
    graph: Arc<G>,
    flow: NpePrecalcFlowFunctions<G>,
}

impl<G: ProgramView> Analyzer<G> for NpePrecalcBackwardAnalyzer<G> {
    type Fact = TaintFact;
    type Flow = NpePrecalcFlowFunctions<G>;

    fn flow_functions(&self) -> &Self::Flow {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &EdgeOf<G, TaintFact>) -> Vec<EventOf<G, TaintFact>> {
        let vertex = &edge.to;
        if !self.graph.is_exit_point(&vertex.statement) {
            return Vec::new();
        }

        let params = self.graph.parameters(&vertex.method);
        self.flow
            .before(&vertex.statement, &vertex.fact)
            .into_iter()
            .filter(|fact| {
                fact.path()
                    .is_some_and(|path| path.fields.is_empty() && params.contains(&path.local))
            })
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

pub struct NpePrecalcBackwardAnalyzerFactory {
    max_path_length: usize,
}

impl NpePrecalcBackwardAnalyzerFactory {
    pub fn new(max_path_length: usize) -> Self {
        Self { max_path_length }
    }
}

impl<G: ProgramView> AnalyzerFactory<G> for NpePrecalcBackwardAnalyzerFactory {
    type Analyzer = NpePrecalcBackwardAnalyzer<G>;

    fn new_analyzer(&self, graph: Arc<G>) -> NpePrecalcBackwardAnalyzer<G> {
        NpePrecalcBackwardAnalyzer {
            flow: NpePrecalcFlowFunctions {
                graph: graph.clone(),
                max_path_length: self.max_path_length,
            },
            graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ifds::infrastructure::ReversedGraph;
    use crate::features::ifds::ports::FlowFunction;
    use crate::program::{ProgramBuilder, ProgramGraph};
    use pretty_assertions::assert_eq;

    fn stmt(index: usize) -> StmtId {
        StmtId::new(MethodId::new("app.A.m"), index)
    }

    fn analyzer() -> NpePrecalcBackwardAnalyzer<ReversedGraph<ProgramGraph>> {
        let graph = ProgramBuilder::new()
            .method(
                "app.A.m",
                &["p"],
                vec![
                    Inst::copy("q", "p"),
                    Inst::null("x"),
                    Inst::if_null("q", 3, 3),
                    Inst::if_not_null("x", 4, 4),
                    Inst::ret_void(),
                ],
            )
            .build()
            .unwrap();
        let reversed = Arc::new(ReversedGraph::new(Arc::new(graph)));
        AnalyzerFactory::<ReversedGraph<ProgramGraph>>::new_analyzer(&NpePrecalcBackwardAnalyzerFactory::new(5), reversed)
    }

    #[test]
    fn test_null_check_seeds_checked_local() {
        let analyzer = analyzer();
        let flow = analyzer.flow_functions();
        assert_eq!(
            flow.normal_flow(&stmt(2), &stmt(1)).compute(&TaintFact::Zero),
            vec![TaintFact::Zero, TaintFact::local("q", TaintMark::NULLNESS)]
        );
        // null checks pass non-zero facts through
        let q_null = TaintFact::local("q", TaintMark::NULLNESS);
        assert_eq!(flow.normal_flow(&stmt(2), &stmt(1)).compute(&q_null), vec![q_null]);
    }

    #[test]
    fn test_definition_kills_fact() {
        let analyzer = analyzer();
        let flow = analyzer.flow_functions();
        let x_null = TaintFact::local("x", TaintMark::NULLNESS);
        assert!(flow.normal_flow(&stmt(1), &stmt(0)).compute(&x_null).is_empty());
    }

    #[test]
    fn test_checked_parameter_is_handed_to_forward_runner() {
        let analyzer = analyzer();
        let method = MethodId::new("app.A.m");
        let start = Vertex::new(method.clone(), stmt(4), TaintFact::Zero);
        let at_entry = Vertex::new(method.clone(), stmt(0), TaintFact::local("q", TaintMark::NULLNESS));

        let events = analyzer.handle_new_edge(&Edge::new(start.clone(), at_entry));
        let expected = Vertex::new(method.clone(), stmt(0), TaintFact::local("p", TaintMark::NULLNESS));
        assert_eq!(
            events,
            vec![AnalyzerEvent::EdgeForOtherRunner {
                edge: Edge::self_loop(expected),
                caller: None,
            }]
        );

        // locals that are not parameters stay in the backward pass
        let local_only = Vertex::new(method, stmt(0), TaintFact::local("z", TaintMark::NULLNESS));
        assert!(analyzer.handle_new_edge(&Edge::new(start, local_only)).is_empty());
    }
}
