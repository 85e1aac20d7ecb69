//! Runner factories
//!
//! The manager only knows this trait; a factory decides whether a unit gets a
//! plain forward runner or a composed one.

use super::runner::{IfdsUnitRunner, RunnerLaunch, RunnerOptions, RunnerStats};
use crate::errors::Result;
use crate::features::ifds::domain::{DomainFact, IfdsNode};
use crate::features::ifds::ports::{Analyzer, AnalyzerFactory, ApplicationGraph};
use futures::future::BoxFuture;
use std::sync::Arc;

pub type RunnerTask = BoxFuture<'static, Result<RunnerStats>>;

pub trait IfdsUnitRunnerFactory<G, F, U>: Send + Sync
where
    G: ApplicationGraph,
    F: DomainFact,
    U: IfdsNode,
{
    fn new_runner(&self, graph: Arc<G>, launch: RunnerLaunch<G::Method, G::Statement, F, U>) -> RunnerTask;
}

/// One forward tabulation runner per unit
pub struct BaseRunnerFactory<AF> {
    analyzer_factory: AF,
    options: RunnerOptions,
}

impl<AF> BaseRunnerFactory<AF> {
    pub fn new(analyzer_factory: AF, options: RunnerOptions) -> Self {
        Self {
            analyzer_factory,
            options,
        }
    }
}

impl<G, AF, U> IfdsUnitRunnerFactory<G, <AF::Analyzer as Analyzer<G>>::Fact, U> for BaseRunnerFactory<AF>
where
    G: ApplicationGraph,
    AF: AnalyzerFactory<G>,
    U: IfdsNode,
{
    fn new_runner(
        &self,
        graph: Arc<G>,
        launch: RunnerLaunch<G::Method, G::Statement, <AF::Analyzer as Analyzer<G>>::Fact, U>,
    ) -> RunnerTask {
        let analyzer = self.analyzer_factory.new_analyzer(graph.clone());
        let runner = IfdsUnitRunner::new(graph, analyzer, launch, self.options);
        Box::pin(runner.run())
    }
}
