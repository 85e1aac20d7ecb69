//! JSON-friendly view of analysis results

use crate::features::ifds::domain::{DomainFact, IfdsNode, Vertex, VulnerabilityInstance};
use crate::features::ifds::infrastructure::RunnerStats;
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VulnerabilityReport {
    pub rule: String,
    pub message: String,
    pub sink: String,
    pub sources: Vec<String>,
    pub methods: Vec<String>,
    pub trace_vertices: usize,
}

/// Methods and statements print with their display names; facts stay debug-printed
fn describe<M, S, F>(vertex: &Vertex<M, S, F>) -> String
where
    M: IfdsNode + Display,
    S: IfdsNode + Display,
    F: DomainFact,
{
    format!("{} @ {}: {:?}", vertex.method, vertex.statement, vertex.fact)
}

impl<M, S, F> From<&VulnerabilityInstance<M, S, F>> for VulnerabilityReport
where
    M: IfdsNode + Display,
    S: IfdsNode + Display,
    F: DomainFact,
{
    fn from(instance: &VulnerabilityInstance<M, S, F>) -> Self {
        let graph = &instance.trace_graph;
        let mut sources: Vec<String> = graph.sources.iter().map(describe).collect();
        sources.sort();
        let mut methods: Vec<String> = graph.methods().iter().map(ToString::to_string).collect();
        methods.sort();

        Self {
            rule: instance.rule.clone(),
            message: instance.message.clone(),
            sink: describe(&graph.sink),
            sources,
            methods,
            trace_vertices: graph.vertices().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub vulnerabilities: Vec<VulnerabilityReport>,
    pub runners: Vec<RunnerStats>,
    pub dropped_edges: usize,
    pub timed_out: bool,
}

impl AnalysisReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ifds::domain::TraceGraph;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    enum Fact {
        Zero,
        Null,
    }

    impl DomainFact for Fact {
        fn is_zero(&self) -> bool {
            matches!(self, Fact::Zero)
        }

        fn zero() -> Self {
            Fact::Zero
        }
    }

    #[test]
    fn test_report_json() {
        let sink = Vertex::new("b", 1usize, Fact::Null);
        let source = Vertex::new("a", 0usize, Fact::Zero);
        let mut graph = TraceGraph::new(sink.clone());
        graph.add_edge(&source, &sink);
        graph.add_source(&source);

        let instance = VulnerabilityInstance {
            rule: "NPE".to_string(),
            message: "null dereference".to_string(),
            trace_graph: graph,
        };
        let report = AnalysisReport {
            vulnerabilities: vec![VulnerabilityReport::from(&instance)],
            runners: Vec::new(),
            dropped_edges: 0,
            timed_out: false,
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["vulnerabilities"][0]["rule"], "NPE");
        assert_eq!(json["vulnerabilities"][0]["methods"], serde_json::json!(["a", "b"]));
        assert_eq!(json["vulnerabilities"][0]["sink"], "b @ 1: Null");
        assert_eq!(json["vulnerabilities"][0]["sources"], serde_json::json!(["a @ 0: Zero"]));
        assert_eq!(json["vulnerabilities"][0]["trace_vertices"], 2);
    }
}
