//! Bundled analyzers over the reference program model

pub mod library;
pub mod npe;
pub mod npe_backward;
pub mod rules;
pub mod taint;
pub mod taint_backward;
pub mod taint_fact;
pub mod transfer;
pub mod unused;

pub use library::{
    new_alias_runner, new_npe_runner, new_taint_runner, new_taint_runner_from_config,
    new_unused_variable_runner,
};
pub use npe::{NpeAnalyzer, NpeAnalyzerFactory, NPE_RULE};
pub use npe_backward::{NpePrecalcBackwardAnalyzer, NpePrecalcBackwardAnalyzerFactory};
pub use rules::{PredicateTaintRules, SinkMatch, TaintRuleEvaluator, TaintRuleTable};
pub use taint::{TaintAnalyzer, TaintAnalyzerFactory};
pub use taint_backward::{TaintBackwardAnalyzer, TaintBackwardAnalyzerFactory};
pub use taint_fact::{AccessPath, TaintFact, TaintMark};
pub use unused::{UnusedFact, UnusedVariableAnalyzer, UnusedVariableAnalyzerFactory, UNUSED_RULE};

use crate::features::ifds::domain::{Edge, Vertex};
use crate::features::ifds::ports::AnalyzerEvent;

/// Seed the callee's unit with the callee start vertex
pub(crate) fn seed_callee_unit<M: Clone, S: Clone, F: Clone>(
    caller: &Vertex<M, S, F>,
    callee: &Vertex<M, S, F>,
) -> Vec<AnalyzerEvent<M, S, F>> {
    vec![AnalyzerEvent::EdgeForOtherRunner {
        edge: Edge::self_loop(callee.clone()),
        caller: Some(caller.clone()),
    }]
}
