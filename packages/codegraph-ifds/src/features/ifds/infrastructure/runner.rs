/*
 * IFDS unit runner
 *
 * Tabulation algorithm (Reps, Horwitz, Sagiv, 1995) restricted to the
 * methods of one analysis unit. Calls into other units are answered by
 * summaries published in the shared storages; the runner subscribes to
 * them and receives them through its inbox.
 *
 * Algorithm:
 * 1. Seed start edges (entry, fact) → (entry, fact) for the start methods
 * 2. Pop path edges; apply normal / call / exit handling
 * 3. Record summary edges at exits and replay them at every known caller
 * 4. When the worklist drains, report idle and wait for injected work
 * 5. On stop, flush witness graphs for sinks and cross-unit callers
 */

use super::inbox::{InboxReceiver, RunnerInbox, RunnerMessage};
use super::work_tracker::WorkTracker;
use crate::errors::{IfdsError, Result};
use crate::features::ifds::domain::{
    CrossUnitCallFact, DomainFact, Edge, IfdsNode, Reason, SummaryFact, SummaryEdgeFact,
    TraceGraph, TraceGraphFact, Vertex,
};
use crate::features::ifds::ports::{
    Analyzer, AnalyzerEvent, ApplicationGraph, EdgeOf, EventOf, FlowFunctions, ManagerPortRef,
    ReasonOf, VertexOf,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Worklist discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorklistOrder {
    /// Breadth-first: oldest edge first
    #[default]
    Fifo,
    /// Depth-first: newest edge first
    Lifo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    pub worklist_order: WorklistOrder,
    pub yield_every: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            worklist_order: WorklistOrder::Fifo,
            yield_every: 1024,
        }
    }
}

/// Runner statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunnerStats {
    pub unit: String,
    pub iterations: usize,
    pub path_edges: usize,
    pub summary_edges: usize,
    pub summary_reuses: usize,
    pub cross_unit_calls: usize,
    pub injected_edges: usize,
    pub foreign_summaries: usize,
}

impl RunnerStats {
    /// Add the counters of a companion runner of the same unit
    pub fn absorb(&mut self, other: &RunnerStats) {
        self.iterations += other.iterations;
        self.path_edges += other.path_edges;
        self.summary_edges += other.summary_edges;
        self.summary_reuses += other.summary_reuses;
        self.cross_unit_calls += other.cross_unit_calls;
        self.injected_edges += other.injected_edges;
        self.foreign_summaries += other.foreign_summaries;
    }
}

/// Everything a runner needs from the run that launches it
pub struct RunnerLaunch<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    pub unit: U,
    pub start_methods: Vec<M>,
    pub manager: ManagerPortRef<M, S, F, U>,
    pub inbox: RunnerInbox<M, S, F>,
    pub receiver: InboxReceiver<M, S, F>,
    pub tracker: Arc<WorkTracker>,
    pub stop: CancellationToken,
    /// When set, the runner waits for it before seeding
    pub start_gate: Option<CancellationToken>,
}

struct TabulationState<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    path_edges: FxHashSet<Edge<M, S, F>>,
    reasons: FxHashMap<Edge<M, S, F>, FxHashSet<Reason<M, S, F>>>,
    edges_by_target: FxHashMap<Vertex<M, S, F>, Vec<Edge<M, S, F>>>,
    worklist: VecDeque<Edge<M, S, F>>,
    /// start vertex → exit vertices
    summary_edges: FxHashMap<Vertex<M, S, F>, FxHashSet<Vertex<M, S, F>>>,
    /// callee start vertex → caller path edges ending at the call
    callers_of_start: FxHashMap<Vertex<M, S, F>, FxHashSet<Edge<M, S, F>>>,
    subscribed_methods: FxHashSet<M>,
    cross_unit_calls: FxHashSet<(Vertex<M, S, F>, Vertex<M, S, F>)>,
    cross_unit_callers: FxHashSet<Vertex<M, S, F>>,
    sinks: FxHashSet<Vertex<M, S, F>>,
}

impl<M, S, F> TabulationState<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    fn new() -> Self {
        Self {
            path_edges: FxHashSet::default(),
            reasons: FxHashMap::default(),
            edges_by_target: FxHashMap::default(),
            worklist: VecDeque::new(),
            summary_edges: FxHashMap::default(),
            callers_of_start: FxHashMap::default(),
            subscribed_methods: FxHashSet::default(),
            cross_unit_calls: FxHashSet::default(),
            cross_unit_callers: FxHashSet::default(),
            sinks: FxHashSet::default(),
        }
    }
}

pub struct IfdsUnitRunner<G, A, U>
where
    G: ApplicationGraph,
    A: Analyzer<G>,
    U: IfdsNode,
{
    unit: U,
    graph: Arc<G>,
    analyzer: A,
    manager: ManagerPortRef<G::Method, G::Statement, A::Fact, U>,
    start_methods: Vec<G::Method>,
    inbox: RunnerInbox<G::Method, G::Statement, A::Fact>,
    receiver: InboxReceiver<G::Method, G::Statement, A::Fact>,
    tracker: Arc<WorkTracker>,
    stop: CancellationToken,
    start_gate: Option<CancellationToken>,
    options: RunnerOptions,
    state: TabulationState<G::Method, G::Statement, A::Fact>,
    stats: RunnerStats,
}

impl<G, A, U> IfdsUnitRunner<G, A, U>
where
    G: ApplicationGraph,
    A: Analyzer<G>,
    U: IfdsNode,
{
    /// Create a runner; it holds a work token from here until it goes idle
    pub fn new(
        graph: Arc<G>,
        analyzer: A,
        launch: RunnerLaunch<G::Method, G::Statement, A::Fact, U>,
        options: RunnerOptions,
    ) -> Self {
        launch.tracker.acquire();
        let stats = RunnerStats {
            unit: format!("{:?}", launch.unit),
            ..RunnerStats::default()
        };
        Self {
            unit: launch.unit,
            graph,
            analyzer,
            manager: launch.manager,
            start_methods: launch.start_methods,
            inbox: launch.inbox,
            receiver: launch.receiver,
            tracker: launch.tracker,
            stop: launch.stop,
            start_gate: launch.start_gate,
            options,
            state: TabulationState::new(),
            stats,
        }
    }

    /// Run until stopped, then flush trace graphs
    pub async fn run(mut self) -> Result<RunnerStats> {
        debug!(unit = ?self.unit, methods = self.start_methods.len(), "runner started");

        if let Some(gate) = self.start_gate.take() {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {}
                _ = gate.cancelled() => {}
            }
        }
        if !self.stop.is_cancelled() {
            self.tabulate().await?;
        }
        self.finish()
    }

    async fn tabulate(&mut self) -> Result<()> {
        self.seed()?;

        loop {
            while let Ok(message) = self.receiver.try_recv() {
                self.handle_message(message)?;
                self.tracker.release();
            }

            if self.stop.is_cancelled() {
                break;
            }

            if let Some(edge) = self.pop_edge() {
                self.stats.iterations += 1;
                self.process_edge(edge)?;
                if self.stats.iterations % self.options.yield_every.max(1) == 0 {
                    tokio::task::yield_now().await;
                }
                continue;
            }

            // Idle: give up our token and wait for injected work
            self.tracker.release();
            self.manager.update_queue_status(&self.unit, true)?;

            let next = tokio::select! {
                biased;
                _ = self.stop.cancelled() => None,
                message = self.receiver.recv() => message,
            };
            let Some(message) = next else {
                break;
            };

            // The message token becomes our busy token
            self.manager.update_queue_status(&self.unit, false)?;
            self.handle_message(message)?;
        }
        Ok(())
    }

    fn seed(&mut self) -> Result<()> {
        let zero = <A::Fact as DomainFact>::zero();
        for method in self.start_methods.clone() {
            let mut facts = self.analyzer.flow_functions().obtain_possible_start_facts(&method);
            if !facts.iter().any(DomainFact::is_zero) {
                facts.push(zero.clone());
            }
            for entry in self.graph.entry_points(&method) {
                for fact in &facts {
                    let vertex = Vertex::new(method.clone(), entry.clone(), fact.clone());
                    self.propagate(Edge::self_loop(vertex), Reason::Initial)?;
                }
            }
        }
        Ok(())
    }

    fn pop_edge(&mut self) -> Option<EdgeOf<G, A::Fact>> {
        match self.options.worklist_order {
            WorklistOrder::Fifo => self.state.worklist.pop_front(),
            WorklistOrder::Lifo => self.state.worklist.pop_back(),
        }
    }

    fn handle_message(&mut self, message: RunnerMessage<G::Method, G::Statement, A::Fact>) -> Result<()> {
        match message {
            RunnerMessage::Edge { edge, reason } => {
                self.stats.injected_edges += 1;
                trace!(unit = ?self.unit, ?edge, "injected edge");
                self.propagate(edge, reason)?;
            }
            RunnerMessage::Summary(edge) => {
                self.stats.foreign_summaries += 1;
                self.apply_summary(edge.from, edge.to)?;
            }
        }
        Ok(())
    }

    /// Record `edge`; returns false when it was already known
    fn propagate(&mut self, edge: EdgeOf<G, A::Fact>, reason: ReasonOf<G, A::Fact>) -> Result<bool> {
        self.state
            .reasons
            .entry(edge.clone())
            .or_default()
            .insert(reason);
        if !self.state.path_edges.insert(edge.clone()) {
            return Ok(false);
        }

        self.state
            .edges_by_target
            .entry(edge.to.clone())
            .or_default()
            .push(edge.clone());
        self.state.worklist.push_back(edge.clone());

        for event in self.analyzer.handle_new_edge(&edge) {
            self.handle_event(event)?;
        }
        Ok(true)
    }

    fn handle_event(&mut self, event: EventOf<G, A::Fact>) -> Result<()> {
        match event {
            AnalyzerEvent::NewSummaryEdge(edge) => {
                if !self.graph.exit_points(&edge.to.method).contains(&edge.to.statement) {
                    return Err(IfdsError::contract(format!(
                        "summary edge target {:?} is not an exit point",
                        edge.to
                    )));
                }
                self.manager
                    .upload_summary_fact(SummaryFact::SummaryEdge(SummaryEdgeFact { edge }))
            }
            AnalyzerEvent::NewVulnerability(location) => {
                trace!(unit = ?self.unit, rule = %location.rule, sink = ?location.sink, "new vulnerability");
                self.state.sinks.insert(location.sink.clone());
                self.manager
                    .upload_summary_fact(SummaryFact::Vulnerability(location))
            }
            AnalyzerEvent::EdgeForOtherRunner { edge, caller } => {
                let reason = match caller {
                    Some(caller) => Reason::CrossUnitCall { caller },
                    None => Reason::External,
                };
                self.manager.add_edge_for_other_runner(&self.unit, edge, reason)
            }
        }
    }

    fn process_edge(&mut self, edge: EdgeOf<G, A::Fact>) -> Result<()> {
        let current = edge.to.statement.clone();
        if self.graph.is_call(&current) {
            return self.process_call(edge);
        }

        if self.graph.exit_points(&edge.to.method).contains(&current) {
            self.apply_summary(edge.from.clone(), edge.to.clone())?;
        }

        for next in self.graph.successors(&current) {
            let facts = self
                .analyzer
                .flow_functions()
                .normal_flow(&current, &next)
                .compute(&edge.to.fact);
            for fact in facts {
                let to = Vertex::new(edge.to.method.clone(), next.clone(), fact);
                self.propagate(Edge::new(edge.from.clone(), to), Reason::Sequent(edge.clone()))?;
            }
        }
        Ok(())
    }

    fn process_call(&mut self, edge: EdgeOf<G, A::Fact>) -> Result<()> {
        let call = edge.to.statement.clone();
        let return_sites = self.graph.successors(&call);

        for return_site in &return_sites {
            let facts = self
                .analyzer
                .flow_functions()
                .call_to_return_flow(&call, return_site)
                .compute(&edge.to.fact);
            for fact in facts {
                let to = Vertex::new(edge.to.method.clone(), return_site.clone(), fact);
                self.propagate(Edge::new(edge.from.clone(), to), Reason::Sequent(edge.clone()))?;
            }
        }

        for callee in self.graph.callees(&call) {
            let callee_unit = self.manager.resolve_unit(&callee);
            for callee_start in self.graph.entry_points(&callee) {
                let facts = self
                    .analyzer
                    .flow_functions()
                    .call_to_start_flow(&call, &callee_start)
                    .compute(&edge.to.fact);
                for fact in facts {
                    let start = Vertex::new(callee.clone(), callee_start.clone(), fact);
                    if callee_unit == self.unit {
                        self.propagate(Edge::self_loop(start.clone()), Reason::CallToStart(edge.clone()))?;
                    } else {
                        self.cross_unit_call(&edge.to, &start)?;
                        self.subscribe_once(&callee)?;
                    }
                    self.register_caller(&edge, start)?;
                }
            }
        }
        Ok(())
    }

    /// Remember `caller_edge` for `start` and replay known summaries
    fn register_caller(&mut self, caller_edge: &EdgeOf<G, A::Fact>, start: VertexOf<G, A::Fact>) -> Result<()> {
        let is_new = self
            .state
            .callers_of_start
            .entry(start.clone())
            .or_default()
            .insert(caller_edge.clone());
        if !is_new {
            return Ok(());
        }

        let exits: Vec<VertexOf<G, A::Fact>> = self
            .state
            .summary_edges
            .get(&start)
            .map(|exits| exits.iter().cloned().collect())
            .unwrap_or_default();
        for exit in exits {
            self.stats.summary_reuses += 1;
            self.return_through_summary(caller_edge, &Edge::new(start.clone(), exit))?;
        }
        Ok(())
    }

    /// Record summary `start → exit` and apply it at every known caller
    fn apply_summary(&mut self, start: VertexOf<G, A::Fact>, exit: VertexOf<G, A::Fact>) -> Result<()> {
        let is_new = self
            .state
            .summary_edges
            .entry(start.clone())
            .or_default()
            .insert(exit.clone());
        if !is_new {
            return Ok(());
        }

        let callers: Vec<EdgeOf<G, A::Fact>> = self
            .state
            .callers_of_start
            .get(&start)
            .map(|callers| callers.iter().cloned().collect())
            .unwrap_or_default();
        let summary = Edge::new(start, exit);
        for caller_edge in callers {
            self.return_through_summary(&caller_edge, &summary)?;
        }
        Ok(())
    }

    fn return_through_summary(
        &mut self,
        caller_edge: &EdgeOf<G, A::Fact>,
        summary: &EdgeOf<G, A::Fact>,
    ) -> Result<()> {
        let call = caller_edge.to.statement.clone();
        let exit = summary.to.statement.clone();
        for return_site in self.graph.successors(&call) {
            let facts = self
                .analyzer
                .flow_functions()
                .exit_to_return_flow(&call, &return_site, &exit)
                .compute(&summary.to.fact);
            for fact in facts {
                let to = Vertex::new(caller_edge.to.method.clone(), return_site.clone(), fact);
                let reason = Reason::ThroughSummary {
                    edge: caller_edge.clone(),
                    summary: summary.clone(),
                };
                self.propagate(Edge::new(caller_edge.from.clone(), to), reason)?;
            }
        }
        Ok(())
    }

    fn cross_unit_call(&mut self, caller: &VertexOf<G, A::Fact>, callee: &VertexOf<G, A::Fact>) -> Result<()> {
        if !self
            .state
            .cross_unit_calls
            .insert((caller.clone(), callee.clone()))
        {
            return Ok(());
        }
        self.stats.cross_unit_calls += 1;
        self.state.cross_unit_callers.insert(caller.clone());

        self.manager
            .upload_summary_fact(SummaryFact::CrossUnitCall(CrossUnitCallFact {
                caller: caller.clone(),
                callee: callee.clone(),
            }))?;
        for event in self.analyzer.handle_cross_unit_call(caller, callee) {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn subscribe_once(&mut self, method: &G::Method) -> Result<()> {
        if !self.state.subscribed_methods.insert(method.clone()) {
            return Ok(());
        }
        debug!(unit = ?self.unit, ?method, "subscribing for summary edges");
        self.manager
            .subscribe_for_summary_edges_of(method, &self.unit, self.inbox.clone())
    }

    fn finish(mut self) -> Result<RunnerStats> {
        for event in self.analyzer.handle_unit_finished() {
            self.handle_event(event)?;
        }

        let mut targets: Vec<VertexOf<G, A::Fact>> = self.state.sinks.iter().cloned().collect();
        targets.extend(
            self.state
                .cross_unit_callers
                .iter()
                .filter(|caller| !self.state.sinks.contains(*caller))
                .cloned(),
        );
        for target in targets {
            let graph = self.build_trace_graph(&target);
            self.manager
                .upload_summary_fact(SummaryFact::TraceGraph(TraceGraphFact { graph }))?;
        }

        self.stats.path_edges = self.state.path_edges.len();
        self.stats.summary_edges = self.state.summary_edges.values().map(|exits| exits.len()).sum();
        debug!(
            unit = ?self.unit,
            iterations = self.stats.iterations,
            path_edges = self.stats.path_edges,
            summary_edges = self.stats.summary_edges,
            "runner finished"
        );
        Ok(self.stats)
    }

    /// Walk recorded reasons backwards from `sink`
    fn build_trace_graph(&self, sink: &VertexOf<G, A::Fact>) -> TraceGraph<G::Method, G::Statement, A::Fact> {
        let mut graph = TraceGraph::new(sink.clone());
        let mut visited = FxHashSet::default();
        let mut stack: Vec<(EdgeOf<G, A::Fact>, VertexOf<G, A::Fact>, bool)> = self
            .state
            .edges_by_target
            .get(sink)
            .map(|edges| edges.iter().map(|edge| (edge.clone(), sink.clone(), false)).collect())
            .unwrap_or_default();

        while let Some((edge, last, stop_at_start)) = stack.pop() {
            if !visited.insert((edge.clone(), last.clone(), stop_at_start)) {
                continue;
            }
            let vertex = &edge.to;

            if stop_at_start && edge.is_self_loop() {
                graph.add_edge(vertex, &last);
                continue;
            }
            if vertex.fact.is_zero() {
                graph.add_edge(vertex, &last);
                graph.add_source(vertex);
                continue;
            }

            let Some(reasons) = self.state.reasons.get(&edge) else {
                continue;
            };
            for reason in reasons {
                match reason {
                    Reason::Initial | Reason::External => {
                        graph.add_edge(vertex, &last);
                        graph.add_source(vertex);
                    }
                    Reason::CrossUnitCall { caller } => {
                        graph.add_edge(vertex, &last);
                        graph.add_source(vertex);
                        graph.add_unresolved_call(caller, vertex);
                    }
                    Reason::Sequent(predecessor) => {
                        if predecessor.to.fact == vertex.fact {
                            stack.push((predecessor.clone(), last.clone(), stop_at_start));
                        } else {
                            graph.add_edge(vertex, &last);
                            stack.push((predecessor.clone(), vertex.clone(), stop_at_start));
                        }
                    }
                    Reason::CallToStart(predecessor) => {
                        if !stop_at_start {
                            graph.add_edge(vertex, &last);
                            stack.push((predecessor.clone(), vertex.clone(), false));
                        }
                    }
                    Reason::ThroughSummary {
                        edge: predecessor,
                        summary,
                    } => {
                        graph.add_edge(vertex, &last);
                        stack.push((summary.clone(), vertex.clone(), true));
                        stack.push((predecessor.clone(), vertex.clone(), stop_at_start));
                    }
                }
            }
        }

        if graph.sources.is_empty() {
            graph.add_source(sink);
        }
        graph
    }
}
