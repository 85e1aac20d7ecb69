//! Custom assertions over analysis findings

use codegraph_ifds::features::ifds::{DomainFact, VulnerabilityInstance};
use codegraph_ifds::program::{MethodId, StmtId};

/// Assert exactly one finding with `rule` at `sink`
pub fn assert_single_finding<F: DomainFact>(
    found: &[VulnerabilityInstance<MethodId, StmtId, F>],
    rule: &str,
    sink: &StmtId,
) {
    assert_eq!(
        found.len(),
        1,
        "Expected one finding, got {}: {:?}",
        found.len(),
        found.iter().map(|v| (&v.rule, &v.trace_graph.sink.statement)).collect::<Vec<_>>()
    );
    assert_eq!(found[0].rule, rule, "Unexpected rule: {}", found[0].message);
    assert_eq!(&found[0].trace_graph.sink.statement, sink);
}

/// Assert the witness of `finding` passes through every method in `methods`
pub fn assert_trace_visits<F: DomainFact>(
    finding: &VulnerabilityInstance<MethodId, StmtId, F>,
    methods: &[MethodId],
) {
    let visited = finding.trace_graph.methods();
    for method in methods {
        assert!(
            visited.contains(method),
            "Trace does not visit {method}; visited {visited:?}"
        );
    }
}
