//! IFDS Unit Manager
//!
//! Drives one analysis run end to end.
//!
//! # Architecture
//! ```text
//! IfdsConfig
//!       ↓
//! IfdsUnitManager (discovery, launch, shutdown)
//!       ↓
//! one IfdsUnitRunner task per unit  ⇄  SummaryStorages
//!       ↓                                   ↓
//! DependencyController (quiescence)   TraceRestorer (post-run)
//! ```
//!
//! # Usage
//! ```rust,ignore
//! let manager = IfdsUnitManager::new(graph, resolver, factory, ManagerOptions::from(&config));
//! let vulnerabilities = manager.analyze(&start_methods, config.timeout()).await?;
//! ```

use super::discovery::{discover_units, UnitDiscovery};
use super::run_context::RunContext;
use super::trace_restore::TraceRestorer;
use crate::config::{IfdsConfig, UNLIMITED_TIMEOUT};
use crate::errors::{IfdsError, Result};
use crate::features::ifds::domain::{
    DomainFact, IfdsNode, VulnerabilityInstance, VulnerabilityLocation,
};
use crate::features::ifds::infrastructure::{
    ControllerEvent, DependencyController, DependencyReport, IfdsUnitRunnerFactory, RunnerInbox,
    RunnerLaunch, RunnerOptions, RunnerStats, SummaryStorages, WorkTracker,
};
use crate::features::ifds::ports::{ApplicationGraph, ManagerPortRef, UnitResolver};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Config Adapters
// ============================================================================

/// Manager settings derived from IfdsConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerOptions {
    pub progress_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from(&IfdsConfig::default())
    }
}

impl From<&IfdsConfig> for ManagerOptions {
    fn from(config: &IfdsConfig) -> Self {
        Self {
            progress_interval: config.progress_interval(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

impl From<&IfdsConfig> for RunnerOptions {
    fn from(config: &IfdsConfig) -> Self {
        Self {
            worklist_order: config.worklist_order,
            yield_every: config.yield_every,
        }
    }
}

// ============================================================================
// Run Outcome
// ============================================================================

/// Everything a run produced
#[derive(Debug)]
pub struct RunOutcome<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    pub vulnerabilities: Vec<VulnerabilityInstance<M, S, F>>,
    pub runner_stats: Vec<RunnerStats>,
    pub dependencies: Option<DependencyReport<U>>,
    /// Edges addressed to units without a runner
    pub dropped_edges: usize,
    pub timed_out: bool,
    pub units: usize,
}

impl<M, S, F, U> RunOutcome<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    fn empty() -> Self {
        Self {
            vulnerabilities: Vec::new(),
            runner_stats: Vec::new(),
            dependencies: None,
            dropped_edges: 0,
            timed_out: false,
            units: 0,
        }
    }
}

pub type RunOutcomeOf<G, F, R> = RunOutcome<
    <G as ApplicationGraph>::Method,
    <G as ApplicationGraph>::Statement,
    F,
    <R as UnitResolver<<G as ApplicationGraph>::Method>>::Unit,
>;

pub type VulnerabilityOf<G, F> =
    VulnerabilityInstance<<G as ApplicationGraph>::Method, <G as ApplicationGraph>::Statement, F>;

// ============================================================================
// Manager
// ============================================================================

pub struct IfdsUnitManager<G, R, F>
where
    G: ApplicationGraph,
    R: UnitResolver<G::Method>,
    F: DomainFact,
{
    graph: Arc<G>,
    resolver: Arc<R>,
    runner_factory: Arc<dyn IfdsUnitRunnerFactory<G, F, R::Unit>>,
    options: ManagerOptions,
}

impl<G, R, F> IfdsUnitManager<G, R, F>
where
    G: ApplicationGraph,
    R: UnitResolver<G::Method>,
    F: DomainFact,
{
    pub fn new(
        graph: Arc<G>,
        resolver: Arc<R>,
        runner_factory: Arc<dyn IfdsUnitRunnerFactory<G, F, R::Unit>>,
        options: ManagerOptions,
    ) -> Self {
        Self {
            graph,
            resolver,
            runner_factory,
            options,
        }
    }

    /// Reachable units and their methods
    pub fn discover(&self, start_methods: &[G::Method]) -> UnitDiscovery<R::Unit, G::Method> {
        discover_units(&*self.graph, &*self.resolver, start_methods, None)
    }

    /// Analyze from `start_methods`; a timeout truncates, it is not an error
    pub async fn analyze(
        &self,
        start_methods: &[G::Method],
        timeout: Duration,
    ) -> Result<Vec<VulnerabilityOf<G, F>>> {
        Ok(self.run(start_methods, timeout).await?.vulnerabilities)
    }

    /// `analyze` on a dedicated multi-threaded runtime
    pub fn analyze_blocking(
        &self,
        start_methods: &[G::Method],
        timeout: Duration,
    ) -> Result<Vec<VulnerabilityOf<G, F>>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(num_cpus::get().max(1))
            .enable_time()
            .build()
            .map_err(|err| IfdsError::runtime(format!("failed to build runtime: {err}")))?;
        runtime.block_on(self.analyze(start_methods, timeout))
    }

    /// Full run with statistics
    pub async fn run(
        &self,
        start_methods: &[G::Method],
        timeout: Duration,
    ) -> Result<RunOutcomeOf<G, F, R>> {
        let now = Instant::now();
        // Timeouts past the clock's range run without a deadline
        let deadline = now.checked_add(timeout).unwrap_or_else(|| now + UNLIMITED_TIMEOUT);

        info!("Searching for units to analyze...");
        let discovery = discover_units(
            &*self.graph,
            &*self.resolver,
            start_methods,
            Some(deadline.into_std()),
        );
        info!(
            units = discovery.len(),
            methods = discovery.method_count(),
            "Unit discovery finished"
        );
        if discovery.is_empty() {
            return Ok(RunOutcome::empty());
        }

        let tracker = Arc::new(WorkTracker::new());
        let stop = CancellationToken::new();
        let storages = Arc::new(SummaryStorages::new());
        let (controller_tx, controller_rx) = mpsc::unbounded_channel();

        let mut inboxes = FxHashMap::default();
        let mut launches = Vec::with_capacity(discovery.len());
        for unit in discovery.units() {
            let (inbox, receiver) = RunnerInbox::channel(tracker.clone(), stop.clone());
            inboxes.insert(unit.clone(), inbox.clone());
            launches.push((unit.clone(), inbox, receiver));
        }

        let resolver: Arc<dyn UnitResolver<G::Method, Unit = R::Unit>> = self.resolver.clone();
        let context = Arc::new(RunContext::new(
            resolver,
            storages.clone(),
            inboxes,
            controller_tx,
            stop.clone(),
        ));

        for unit in discovery.units() {
            context.notify_controller(ControllerEvent::NewRunner(unit.clone()))?;
        }
        let controller = DependencyController::new(controller_rx, tracker.clone(), stop.clone());
        let controller = tokio::spawn(controller.dispatch());

        let total = launches.len();
        let completed = Arc::new(AtomicUsize::new(0));
        let mut runners = JoinSet::new();
        for (unit, inbox, receiver) in launches {
            let manager: ManagerPortRef<G::Method, G::Statement, F, R::Unit> = context.clone();
            let launch = RunnerLaunch {
                start_methods: discovery.methods_of(&unit).to_vec(),
                unit,
                manager,
                inbox,
                receiver,
                tracker: tracker.clone(),
                stop: stop.clone(),
                start_gate: None,
            };
            let task = self.runner_factory.new_runner(self.graph.clone(), launch);
            let completed = completed.clone();
            runners.spawn(async move {
                let result = task.await;
                completed.fetch_add(1, Ordering::SeqCst);
                result
            });
        }
        info!(units = total, "Launched runners");

        let reporter = tokio::spawn(report_progress(
            completed.clone(),
            total,
            self.options.progress_interval,
            stop.clone(),
        ));

        let mut runner_stats = Vec::with_capacity(total);
        let joined = tokio::time::timeout_at(deadline, join_runners(&mut runners, &mut runner_stats)).await;
        let timed_out = joined.is_err();
        let joined = match joined {
            Ok(result) => result,
            Err(_) => {
                info!("Analysis deadline reached, stopping runners");
                stop.cancel();
                match tokio::time::timeout(
                    self.options.shutdown_grace,
                    join_runners(&mut runners, &mut runner_stats),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(remaining = runners.len(), "Aborting runners after grace period");
                        runners.abort_all();
                        join_runners(&mut runners, &mut runner_stats).await
                    }
                }
            }
        };

        stop.cancel();
        if let Err(err) = joined {
            runners.abort_all();
            reporter.abort();
            controller.abort();
            return Err(err);
        }
        if reporter.await.is_err() {
            debug!("progress reporter ended abnormally");
        }
        let dependencies = controller.await.ok();

        info!(
            completed = completed.load(Ordering::SeqCst),
            total,
            "All runners finished"
        );
        storages.close();

        let vulnerabilities = restore_vulnerabilities(&storages, &discovery, start_methods);
        Ok(RunOutcome {
            vulnerabilities,
            runner_stats,
            dependencies,
            dropped_edges: context.dropped_edges(),
            timed_out,
            units: total,
        })
    }
}

/// Join every runner; stops at the first error or panic
async fn join_runners(
    runners: &mut JoinSet<Result<RunnerStats>>,
    stats: &mut Vec<RunnerStats>,
) -> Result<()> {
    while let Some(joined) = runners.join_next().await {
        match joined {
            Ok(Ok(runner)) => stats.push(runner),
            Ok(Err(err)) => return Err(err),
            Err(err) if err.is_cancelled() => {}
            Err(err) => return Err(IfdsError::RunnerPanicked(err.to_string())),
        }
    }
    Ok(())
}

async fn report_progress(
    completed: Arc<AtomicUsize>,
    total: usize,
    interval: Duration,
    stop: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                info!(
                    "Current progress: {} / {} units completed",
                    completed.load(Ordering::SeqCst),
                    total
                );
            }
        }
    }
}

fn restore_vulnerabilities<M, S, F, U>(
    storages: &SummaryStorages<M, S, F>,
    discovery: &UnitDiscovery<U, M>,
    start_methods: &[M],
) -> Vec<VulnerabilityInstance<M, S, F>>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    let mut seen = FxHashSet::default();
    let mut locations: Vec<VulnerabilityLocation<M, S, F>> = Vec::new();
    for method in discovery.all_methods() {
        for location in storages.vulnerabilities.get_current_facts(method) {
            if seen.insert((location.rule.clone(), location.sink.clone())) {
                locations.push(location);
            }
        }
    }
    info!(found = locations.len(), "Restoring traces");

    let starts: FxHashSet<&M> = start_methods.iter().collect();
    let restorer = TraceRestorer::new(storages, discovery.all_methods());
    let vulnerabilities: Vec<VulnerabilityInstance<M, S, F>> = locations
        .into_iter()
        .map(|location| {
            let trace_graph = restorer.extend(restorer.trace_graph_of(&location.sink));
            VulnerabilityInstance {
                rule: location.rule,
                message: location.message,
                trace_graph,
            }
        })
        .filter(|instance| {
            instance
                .trace_graph
                .sources
                .iter()
                .any(|source| source.fact.is_zero() || starts.contains(&source.method))
        })
        .collect();

    info!(reported = vulnerabilities.len(), "Restoring traces done");
    vulnerabilities
}
