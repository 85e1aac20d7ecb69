//! Manager and rule builders

use codegraph_ifds::features::analyzers::{
    new_alias_runner, new_npe_runner, new_taint_runner, new_unused_variable_runner,
    PredicateTaintRules, TaintFact, TaintMark, TaintRuleEvaluator, UnusedFact,
};
use codegraph_ifds::features::ifds::{IfdsUnitManager, ManagerOptions, UnitResolver};
use codegraph_ifds::program::{MethodId, ProgramGraph};
use codegraph_ifds::IfdsConfig;
use std::sync::Arc;
use std::time::Duration;

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn test_options() -> ManagerOptions {
    ManagerOptions {
        progress_interval: Duration::from_millis(50),
        shutdown_grace: Duration::from_millis(500),
    }
}

/// `lib.Http.param` → TAINT, `lib.Html.escape` sanitizes, `lib.Db.query` is a SQLI sink
pub fn web_predicates() -> PredicateTaintRules {
    PredicateTaintRules::new()
        .source(|callee| callee == "lib.Http.param", TaintMark::TAINT)
        .sanitizer(|callee| callee == "lib.Html.escape")
        .sink(|callee| callee == "lib.Db.query", "SQLI")
}

pub fn web_rules() -> Arc<dyn TaintRuleEvaluator> {
    Arc::new(web_predicates())
}

pub fn npe_manager<R>(graph: ProgramGraph, resolver: R) -> IfdsUnitManager<ProgramGraph, R, TaintFact>
where
    R: UnitResolver<MethodId>,
{
    npe_manager_with(graph, resolver, &IfdsConfig::default())
}

pub fn npe_manager_with<R>(
    graph: ProgramGraph,
    resolver: R,
    config: &IfdsConfig,
) -> IfdsUnitManager<ProgramGraph, R, TaintFact>
where
    R: UnitResolver<MethodId>,
{
    let factory = new_npe_runner::<ProgramGraph, R::Unit>(config).expect("npe runner");
    IfdsUnitManager::new(Arc::new(graph), Arc::new(resolver), factory, test_options())
}

pub fn alias_manager<R>(graph: ProgramGraph, resolver: R) -> IfdsUnitManager<ProgramGraph, R, TaintFact>
where
    R: UnitResolver<MethodId>,
{
    let factory = new_alias_runner::<ProgramGraph, R::Unit>(&IfdsConfig::default(), web_predicates());
    IfdsUnitManager::new(Arc::new(graph), Arc::new(resolver), factory, test_options())
}

pub fn taint_manager<R>(
    graph: ProgramGraph,
    resolver: R,
    config: &IfdsConfig,
) -> IfdsUnitManager<ProgramGraph, R, TaintFact>
where
    R: UnitResolver<MethodId>,
{
    let factory = new_taint_runner::<ProgramGraph, R::Unit>(config, web_rules());
    IfdsUnitManager::new(Arc::new(graph), Arc::new(resolver), factory, test_options())
}

pub fn unused_manager<R>(graph: ProgramGraph, resolver: R) -> IfdsUnitManager<ProgramGraph, R, UnusedFact>
where
    R: UnitResolver<MethodId>,
{
    let factory = new_unused_variable_runner::<ProgramGraph, R::Unit>(&IfdsConfig::default());
    IfdsUnitManager::new(Arc::new(graph), Arc::new(resolver), factory, test_options())
}
