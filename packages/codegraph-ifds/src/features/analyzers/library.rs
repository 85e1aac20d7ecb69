//! Ready-made runner factories for the bundled analyzers

use super::npe::NpeAnalyzerFactory;
use super::npe_backward::NpePrecalcBackwardAnalyzerFactory;
use super::rules::{PredicateTaintRules, TaintRuleEvaluator, TaintRuleTable};
use super::taint::TaintAnalyzerFactory;
use super::taint_backward::TaintBackwardAnalyzerFactory;
use super::taint_fact::TaintFact;
use super::unused::{UnusedFact, UnusedVariableAnalyzerFactory};
use crate::config::IfdsConfig;
use crate::errors::Result;
use crate::features::ifds::domain::IfdsNode;
use crate::features::ifds::infrastructure::{
    BaseRunnerFactory, BidiMode, BidiRunnerFactory, IfdsUnitRunnerFactory, RunnerOptions,
};
use crate::program::ProgramView;
use std::sync::Arc;

/// Null-dereference runners
///
/// Sink rules of `config.taint` that name the `NULLNESS` mark are checked
/// as well. With `config.bidi_mode` enabled, a backward pass seeds
/// parameters the method null-checks as possibly null.
pub fn new_npe_runner<G, U>(config: &IfdsConfig) -> Result<Arc<dyn IfdsUnitRunnerFactory<G, TaintFact, U>>>
where
    G: ProgramView,
    U: IfdsNode,
{
    let options = RunnerOptions::from(config);
    let mut analyzers = NpeAnalyzerFactory::new(config.max_path_length);
    if !config.taint.sinks.is_empty() {
        analyzers = analyzers.with_rules(Arc::new(TaintRuleTable::from_config(&config.taint)?));
    }
    let forward = BaseRunnerFactory::new(analyzers, options);
    let backward = || BaseRunnerFactory::new(NpePrecalcBackwardAnalyzerFactory::new(config.max_path_length), options);

    Ok(match config.bidi_mode {
        BidiMode::Disabled => Arc::new(forward),
        BidiMode::Parallel => Arc::new(BidiRunnerFactory::parallel(forward, backward())),
        BidiMode::Sequential => Arc::new(BidiRunnerFactory::sequential(forward, backward())),
    })
}

/// Taint runners, composed with a backward pass per `config.bidi_mode`
pub fn new_taint_runner<G, U>(
    config: &IfdsConfig,
    rules: Arc<dyn TaintRuleEvaluator>,
) -> Arc<dyn IfdsUnitRunnerFactory<G, TaintFact, U>>
where
    G: ProgramView,
    U: IfdsNode,
{
    let options = RunnerOptions::from(config);
    let forward = BaseRunnerFactory::new(
        TaintAnalyzerFactory::new(rules.clone(), config.max_path_length),
        options,
    );
    let backward = || {
        BaseRunnerFactory::new(
            TaintBackwardAnalyzerFactory::new(rules.clone(), config.max_path_length),
            options,
        )
    };

    match config.bidi_mode {
        BidiMode::Disabled => Arc::new(forward),
        BidiMode::Parallel => Arc::new(BidiRunnerFactory::parallel(forward, backward())),
        BidiMode::Sequential => Arc::new(BidiRunnerFactory::sequential(forward, backward())),
    }
}

/// Taint runners with rules compiled from `config.taint`
pub fn new_taint_runner_from_config<G, U>(config: &IfdsConfig) -> Result<Arc<dyn IfdsUnitRunnerFactory<G, TaintFact, U>>>
where
    G: ProgramView,
    U: IfdsNode,
{
    let rules = Arc::new(TaintRuleTable::from_config(&config.taint)?);
    Ok(new_taint_runner(config, rules))
}

/// Forward-only runners tracking values through locals and fields
///
/// `rules` say which calls generate a tracked value, which clear it and
/// which report it. `config.bidi_mode` is ignored.
pub fn new_alias_runner<G, U>(
    config: &IfdsConfig,
    rules: PredicateTaintRules,
) -> Arc<dyn IfdsUnitRunnerFactory<G, TaintFact, U>>
where
    G: ProgramView,
    U: IfdsNode,
{
    Arc::new(BaseRunnerFactory::new(
        TaintAnalyzerFactory::new(Arc::new(rules), config.max_path_length),
        RunnerOptions::from(config),
    ))
}

pub fn new_unused_variable_runner<G, U>(config: &IfdsConfig) -> Arc<dyn IfdsUnitRunnerFactory<G, UnusedFact, U>>
where
    G: ProgramView,
    U: IfdsNode,
{
    Arc::new(BaseRunnerFactory::new(
        UnusedVariableAnalyzerFactory,
        RunnerOptions::from(config),
    ))
}
