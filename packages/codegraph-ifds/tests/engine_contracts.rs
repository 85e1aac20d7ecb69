//! Routing and contract checks enforced by the engine

mod common;

use codegraph_ifds::features::analyzers::{TaintFact, NPE_RULE};
use codegraph_ifds::features::ifds::infrastructure::{
    BaseRunnerFactory, ClassUnitResolver, MethodUnitResolver, RunnerOptions, SingletonUnitResolver,
};
use codegraph_ifds::features::ifds::ports::{
    BoxedFlowFunction, EdgeOf, EventOf, FlowFunctions, IdentityFlowFunction, VertexOf,
};
use codegraph_ifds::features::ifds::{Analyzer, AnalyzerEvent, AnalyzerFactory, Edge, IfdsUnitManager, Vertex};
use codegraph_ifds::program::{Inst, MethodId, ProgramBuilder, ProgramGraph, StmtId};
use codegraph_ifds::IfdsError;
use common::*;
use std::sync::Arc;
use std::time::Duration;

struct PassThrough;

impl FlowFunctions<ProgramGraph, TaintFact> for PassThrough {
    fn obtain_possible_start_facts(&self, _method: &MethodId) -> Vec<TaintFact> {
        vec![TaintFact::Zero]
    }

    fn normal_flow<'a>(&'a self, _current: &'a StmtId, _next: &'a StmtId) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(IdentityFlowFunction)
    }

    fn call_to_return_flow<'a>(
        &'a self,
        _call: &'a StmtId,
        _return_site: &'a StmtId,
    ) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(IdentityFlowFunction)
    }

    fn call_to_start_flow<'a>(
        &'a self,
        _call: &'a StmtId,
        _callee_start: &'a StmtId,
    ) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(IdentityFlowFunction)
    }

    fn exit_to_return_flow<'a>(
        &'a self,
        _call: &'a StmtId,
        _return_site: &'a StmtId,
        _exit: &'a StmtId,
    ) -> BoxedFlowFunction<'a, TaintFact> {
        Box::new(IdentityFlowFunction)
    }
}

#[derive(Clone, Copy)]
enum Misbehavior {
    EdgeToUndiscoveredUnit,
    EdgeToOwnUnit,
    SummaryAtNonExit,
}

struct Misbehaving {
    flow: PassThrough,
    mode: Misbehavior,
}

impl Analyzer<ProgramGraph> for Misbehaving {
    type Fact = TaintFact;
    type Flow = PassThrough;

    fn flow_functions(&self) -> &PassThrough {
        &self.flow
    }

    fn handle_new_edge(&self, edge: &EdgeOf<ProgramGraph, TaintFact>) -> Vec<EventOf<ProgramGraph, TaintFact>> {
        if !edge.is_self_loop() {
            return Vec::new();
        }
        match self.mode {
            Misbehavior::EdgeToUndiscoveredUnit => {
                let ghost = method("app.Ghost.run");
                let start = Vertex::new(ghost.clone(), StmtId::new(ghost, 0), TaintFact::Zero);
                vec![AnalyzerEvent::EdgeForOtherRunner {
                    edge: Edge::self_loop(start),
                    caller: None,
                }]
            }
            Misbehavior::EdgeToOwnUnit => vec![AnalyzerEvent::EdgeForOtherRunner {
                edge: edge.clone(),
                caller: None,
            }],
            Misbehavior::SummaryAtNonExit => vec![AnalyzerEvent::NewSummaryEdge(edge.clone())],
        }
    }

    fn handle_cross_unit_call(
        &self,
        _caller: &VertexOf<ProgramGraph, TaintFact>,
        _callee: &VertexOf<ProgramGraph, TaintFact>,
    ) -> Vec<EventOf<ProgramGraph, TaintFact>> {
        Vec::new()
    }
}

struct MisbehavingFactory(Misbehavior);

impl AnalyzerFactory<ProgramGraph> for MisbehavingFactory {
    type Analyzer = Misbehaving;

    fn new_analyzer(&self, _graph: Arc<ProgramGraph>) -> Misbehaving {
        Misbehaving {
            flow: PassThrough,
            mode: self.0,
        }
    }
}

fn manager(mode: Misbehavior) -> IfdsUnitManager<ProgramGraph, ClassUnitResolver, TaintFact> {
    let graph = ProgramBuilder::new()
        .method("app.Main.main", &[], vec![Inst::Nop, Inst::Nop])
        .build()
        .expect("valid program");
    IfdsUnitManager::new(
        Arc::new(graph),
        Arc::new(ClassUnitResolver),
        Arc::new(BaseRunnerFactory::new(MisbehavingFactory(mode), RunnerOptions::default())),
        test_options(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_edge_for_undiscovered_unit_is_dropped() {
    init_tracing();
    let outcome = manager(Misbehavior::EdgeToUndiscoveredUnit)
        .run(&[method("app.Main.main")], Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(outcome.dropped_edges, 1);
    assert!(!outcome.timed_out);
    assert!(outcome.vulnerabilities.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_edge_routed_to_own_unit_fails_run() {
    init_tracing();
    let result = manager(Misbehavior::EdgeToOwnUnit)
        .run(&[method("app.Main.main")], Duration::from_secs(10))
        .await;

    assert!(matches!(result, Err(IfdsError::ContractViolation(_))), "got {:?}", result.as_ref().err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_summary_edge_at_non_exit_fails_run() {
    init_tracing();
    let result = manager(Misbehavior::SummaryAtNonExit)
        .run(&[method("app.Main.main")], Duration::from_secs(10))
        .await;

    assert!(matches!(result, Err(IfdsError::ContractViolation(_))), "got {:?}", result.as_ref().err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_call_reuses_callee_summary() {
    init_tracing();
    let outcome = npe_manager(fixture_repeated_call(), SingletonUnitResolver)
        .run(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    // make() is summarized while the copy between the calls is processed
    let reuses: usize = outcome.runner_stats.iter().map(|stats| stats.summary_reuses).sum();
    assert_eq!(reuses, 1);
    assert_single_finding(&outcome.vulnerabilities, NPE_RULE, &stmt("app.Main.main", 3));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dependency_report_of_finished_run() {
    init_tracing();
    let outcome = npe_manager(fixture_repeated_call(), MethodUnitResolver)
        .run(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(outcome.units, 2);
    assert!(!outcome.timed_out);
    let report = outcome.dependencies.expect("dependency report");
    assert!(report.quiescent);
    assert!(!report.has_cycles);
    assert!(report
        .dependencies()
        .contains(&(method("app.Main.main"), method("app.Main.make"))));
    assert!(!report
        .dependencies()
        .contains(&(method("app.Main.make"), method("app.Main.main"))));
    assert_single_finding(&outcome.vulnerabilities, NPE_RULE, &stmt("app.Main.main", 3));
}
