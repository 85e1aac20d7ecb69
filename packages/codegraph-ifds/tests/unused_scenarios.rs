//! End-to-end unused-value scenario

mod common;

use codegraph_ifds::features::analyzers::{UnusedFact, UNUSED_RULE};
use codegraph_ifds::features::ifds::infrastructure::MethodUnitResolver;
use common::*;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reports_value_never_read() {
    init_tracing();
    let manager = unused_manager(fixture_unused_value(), MethodUnitResolver);

    let vulnerabilities = manager
        .analyze(&[method("app.Main.main")], Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(vulnerabilities.len(), 1);
    let finding = &vulnerabilities[0];
    assert_eq!(finding.rule, UNUSED_RULE);
    assert_eq!(finding.message, "value assigned to x is never used");
    assert_eq!(finding.trace_graph.sink.statement, stmt("app.Main.main", 0));
    assert_eq!(finding.trace_graph.sink.fact, UnusedFact::Zero);
    // The sink is its own source and the trace has no edges
    assert!(finding.trace_graph.edges.is_empty());
    assert_eq!(finding.trace_graph.sources.len(), 1);
    assert!(finding.trace_graph.sources.contains(&finding.trace_graph.sink));
}
