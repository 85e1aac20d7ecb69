//! End-to-end null-dereference scenarios

mod common;

use codegraph_ifds::features::analyzers::{TaintFact, TaintMark, NPE_RULE};
use codegraph_ifds::features::ifds::infrastructure::{
    BidiMode, ClassUnitResolver, MethodUnitResolver, SingletonUnitResolver, WorklistOrder,
};
use codegraph_ifds::IfdsConfig;
use common::*;
use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_null_dereference_in_single_method() {
    init_tracing();
    let manager = npe_manager(fixture_null_dereference(), SingletonUnitResolver);

    let vulnerabilities = manager
        .analyze(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(vulnerabilities.len(), 1);
    let vulnerability = &vulnerabilities[0];
    assert_eq!(vulnerability.rule, NPE_RULE);
    assert_eq!(vulnerability.trace_graph.sink.statement, stmt("app.Main.main", 1));
    assert!(vulnerability
        .trace_graph
        .sources
        .iter()
        .any(|source| source.fact == TaintFact::Zero));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_null_check_guards_dereference() {
    init_tracing();
    let manager = npe_manager(fixture_guarded_dereference(), MethodUnitResolver);

    let vulnerabilities = manager
        .analyze(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert!(vulnerabilities.is_empty(), "unexpected: {vulnerabilities:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_null_argument_dereferenced_in_other_unit() {
    init_tracing();
    let manager = npe_manager(fixture_cross_unit_null(), ClassUnitResolver);

    let outcome = manager
        .run(&[method("app.a.Caller.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(outcome.units, 2);
    assert!(!outcome.timed_out);
    assert_single_finding(&outcome.vulnerabilities, NPE_RULE, &stmt("app.b.Callee.use_it", 0));
    assert_trace_visits(
        &outcome.vulnerabilities[0],
        &[method("app.a.Caller.main"), method("app.b.Callee.use_it")],
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_findings_under_every_partitioning() {
    init_tracing();
    let start = [method("app.a.Caller.main")];
    let timeout = Duration::from_secs(30);

    let singleton = npe_manager(fixture_cross_unit_null(), SingletonUnitResolver)
        .analyze(&start, timeout)
        .await
        .unwrap();
    let per_method = npe_manager(fixture_cross_unit_null(), MethodUnitResolver)
        .analyze(&start, timeout)
        .await
        .unwrap();

    let sinks = |found: &[codegraph_ifds::features::ifds::VulnerabilityInstance<codegraph_ifds::program::MethodId, codegraph_ifds::program::StmtId, TaintFact>]| {
        let mut sinks: Vec<_> = found.iter().map(|v| v.trace_graph.sink.statement.clone()).collect();
        sinks.sort();
        sinks
    };
    assert_eq!(sinks(&singleton), sinks(&per_method));
    assert_eq!(singleton.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_timeout_returns_partial_results() {
    init_tracing();
    let manager = npe_manager(fixture_call_chain(300, 40), MethodUnitResolver);

    let started = Instant::now();
    let outcome = manager
        .run(&[method("app.C0.m")], Duration::from_millis(1))
        .await;

    assert!(outcome.is_ok());
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn test_analyze_blocking_outside_runtime() {
    init_tracing();
    let manager = npe_manager(fixture_null_dereference(), MethodUnitResolver);

    let vulnerabilities = manager
        .analyze_blocking(&[method("app.Main.main")], Duration::from_secs(30))
        .unwrap();

    assert_eq!(vulnerabilities.len(), 1);
}

#[tokio::test]
async fn test_unknown_start_method_yields_nothing() {
    let manager = npe_manager(fixture_null_dereference(), MethodUnitResolver);

    let outcome = manager
        .run(&[method("app.Missing.main")], Duration::from_secs(5))
        .await
        .unwrap();

    assert!(!outcome.timed_out);
    assert!(outcome.vulnerabilities.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unbounded_timeout_runs_to_completion() {
    init_tracing();
    let outcome = npe_manager(fixture_null_dereference(), SingletonUnitResolver)
        .run(&[method("app.Main.main")], Duration::MAX)
        .await
        .unwrap();

    assert!(!outcome.timed_out);
    assert_single_finding(&outcome.vulnerabilities, NPE_RULE, &stmt("app.Main.main", 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_findings_under_both_worklist_orders() {
    init_tracing();
    let timeout = Duration::from_secs(30);
    for order in [WorklistOrder::Fifo, WorklistOrder::Lifo] {
        let config = IfdsConfig::default().worklist_order(order);

        let direct = npe_manager_with(fixture_null_dereference(), SingletonUnitResolver, &config)
            .analyze(&[method("app.Main.main")], timeout)
            .await
            .unwrap();
        assert_single_finding(&direct, NPE_RULE, &stmt("app.Main.main", 1));

        let guarded = npe_manager_with(fixture_guarded_dereference(), MethodUnitResolver, &config)
            .analyze(&[method("app.Main.main")], timeout)
            .await
            .unwrap();
        assert!(guarded.is_empty(), "{order:?}: unexpected {guarded:?}");

        let cross_unit = npe_manager_with(fixture_cross_unit_null(), ClassUnitResolver, &config)
            .analyze(&[method("app.a.Caller.main")], timeout)
            .await
            .unwrap();
        assert_single_finding(&cross_unit, NPE_RULE, &stmt("app.b.Callee.use_it", 0));

        let repeated = npe_manager_with(fixture_repeated_call(), SingletonUnitResolver, &config)
            .analyze(&[method("app.Main.main")], timeout)
            .await
            .unwrap();
        assert_single_finding(&repeated, NPE_RULE, &stmt("app.Main.main", 3));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_null_checked_parameter_needs_backward_pass() {
    init_tracing();
    let start = [method("app.Svc.handle")];
    let timeout = Duration::from_secs(30);

    let forward_only = npe_manager(fixture_inconsistent_null_check(), MethodUnitResolver)
        .analyze(&start, timeout)
        .await
        .unwrap();
    assert!(forward_only.is_empty(), "unexpected: {forward_only:?}");

    for mode in [BidiMode::Parallel, BidiMode::Sequential] {
        let config = IfdsConfig::default().bidi_mode(mode);
        let found = npe_manager_with(fixture_inconsistent_null_check(), MethodUnitResolver, &config)
            .analyze(&start, timeout)
            .await
            .unwrap();

        // only the read before the check is unguarded
        assert_single_finding(&found, NPE_RULE, &stmt("app.Svc.handle", 0));
        assert_eq!(found[0].trace_graph.sink.fact, TaintFact::local("p", TaintMark::NULLNESS));
    }
}
