//! Forward + backward runner pair for one unit
//!
//! The backward runner works on the reversed graph and hands the facts it
//! finds at method starts to the forward runner of the same unit. Both
//! report one combined queue status to the run: the unit is empty only when
//! both are.

use super::inbox::{RunnerInbox, RunnerMessage};
use super::reversed_graph::ReversedGraph;
use super::runner::RunnerLaunch;
use super::runner_factory::{IfdsUnitRunnerFactory, RunnerTask};
use crate::errors::Result;
use crate::features::ifds::domain::{DomainFact, Edge, IfdsNode, Reason, SummaryFact};
use crate::features::ifds::ports::{ApplicationGraph, ManagerPortRef, UnitManagerPort};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// How forward and backward runners are composed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidiMode {
    /// Forward runner only
    #[default]
    Disabled,
    /// Forward runner starts once the backward queue first drains
    Sequential,
    /// Both runners start together
    Parallel,
}

pub struct BidiRunnerFactory<FF, BF> {
    forward: FF,
    backward: BF,
    sequential: bool,
}

impl<FF, BF> BidiRunnerFactory<FF, BF> {
    pub fn parallel(forward: FF, backward: BF) -> Self {
        Self {
            forward,
            backward,
            sequential: false,
        }
    }

    pub fn sequential(forward: FF, backward: BF) -> Self {
        Self {
            forward,
            backward,
            sequential: true,
        }
    }
}

struct BidiLink<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    unit: U,
    main: ManagerPortRef<M, S, F, U>,
    forward_inbox: RunnerInbox<M, S, F>,
    backward_inbox: RunnerInbox<M, S, F>,
    forward_empty: AtomicBool,
    backward_empty: AtomicBool,
    forward_gate: Option<CancellationToken>,
}

impl<M, S, F, U> BidiLink<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    fn owns(&self, edge: &Edge<M, S, F>) -> bool {
        self.main.resolve_unit(&edge.from.method) == self.unit
    }
}

struct ForwardPort<M, S, F, U>(Arc<BidiLink<M, S, F, U>>)
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode;

struct BackwardPort<M, S, F, U>(Arc<BidiLink<M, S, F, U>>)
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode;

impl<M, S, F, U> UnitManagerPort<M, S, F, U> for ForwardPort<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    fn resolve_unit(&self, method: &M) -> U {
        self.0.main.resolve_unit(method)
    }

    fn subscribe_for_summary_edges_of(
        &self,
        method: &M,
        subscriber: &U,
        inbox: RunnerInbox<M, S, F>,
    ) -> Result<()> {
        self.0.main.subscribe_for_summary_edges_of(method, subscriber, inbox)
    }

    fn update_queue_status(&self, unit: &U, is_empty: bool) -> Result<()> {
        self.0.forward_empty.store(is_empty, Ordering::SeqCst);
        let both = is_empty && self.0.backward_empty.load(Ordering::SeqCst);
        self.0.main.update_queue_status(unit, both)
    }

    fn upload_summary_fact(&self, fact: SummaryFact<M, S, F>) -> Result<()> {
        self.0.main.upload_summary_fact(fact)
    }

    fn add_edge_for_other_runner(
        &self,
        sender: &U,
        edge: Edge<M, S, F>,
        reason: Reason<M, S, F>,
    ) -> Result<()> {
        if self.0.owns(&edge) {
            self.0.backward_inbox.send(RunnerMessage::Edge { edge, reason })
        } else {
            self.0.main.add_edge_for_other_runner(sender, edge, reason)
        }
    }
}

impl<M, S, F, U> UnitManagerPort<M, S, F, U> for BackwardPort<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    fn resolve_unit(&self, method: &M) -> U {
        self.0.main.resolve_unit(method)
    }

    // Backward summaries never leave the unit
    fn subscribe_for_summary_edges_of(
        &self,
        _method: &M,
        _subscriber: &U,
        _inbox: RunnerInbox<M, S, F>,
    ) -> Result<()> {
        Ok(())
    }

    fn update_queue_status(&self, unit: &U, is_empty: bool) -> Result<()> {
        self.0.backward_empty.store(is_empty, Ordering::SeqCst);
        if is_empty {
            if let Some(gate) = &self.0.forward_gate {
                gate.cancel();
            }
        }
        let both = is_empty && self.0.forward_empty.load(Ordering::SeqCst);
        self.0.main.update_queue_status(unit, both)
    }

    fn upload_summary_fact(&self, _fact: SummaryFact<M, S, F>) -> Result<()> {
        Ok(())
    }

    fn add_edge_for_other_runner(
        &self,
        _sender: &U,
        edge: Edge<M, S, F>,
        reason: Reason<M, S, F>,
    ) -> Result<()> {
        if self.0.owns(&edge) {
            self.0.forward_inbox.send(RunnerMessage::Edge { edge, reason })
        } else {
            trace!(?edge, "backward edge for another unit dropped");
            Ok(())
        }
    }
}

impl<G, F, U, FF, BF> IfdsUnitRunnerFactory<G, F, U> for BidiRunnerFactory<FF, BF>
where
    G: ApplicationGraph,
    F: DomainFact,
    U: IfdsNode,
    FF: IfdsUnitRunnerFactory<G, F, U>,
    BF: IfdsUnitRunnerFactory<ReversedGraph<G>, F, U>,
{
    fn new_runner(&self, graph: Arc<G>, launch: RunnerLaunch<G::Method, G::Statement, F, U>) -> RunnerTask {
        let RunnerLaunch {
            unit,
            start_methods,
            manager,
            inbox,
            receiver,
            tracker,
            stop,
            start_gate,
        } = launch;

        let (backward_inbox, backward_receiver) = RunnerInbox::channel(tracker.clone(), stop.clone());
        let forward_gate = if self.sequential {
            Some(CancellationToken::new())
        } else {
            start_gate.clone()
        };
        let link = Arc::new(BidiLink {
            unit: unit.clone(),
            main: manager,
            forward_inbox: inbox.clone(),
            backward_inbox: backward_inbox.clone(),
            forward_empty: AtomicBool::new(false),
            backward_empty: AtomicBool::new(false),
            forward_gate: forward_gate.clone(),
        });

        let forward = self.forward.new_runner(
            graph.clone(),
            RunnerLaunch {
                unit: unit.clone(),
                start_methods: start_methods.clone(),
                manager: Arc::new(ForwardPort(link.clone())),
                inbox,
                receiver,
                tracker: tracker.clone(),
                stop: stop.clone(),
                start_gate: forward_gate,
            },
        );
        let backward = self.backward.new_runner(
            Arc::new(ReversedGraph::new(graph)),
            RunnerLaunch {
                unit,
                start_methods,
                manager: Arc::new(BackwardPort(link)),
                inbox: backward_inbox,
                receiver: backward_receiver,
                tracker,
                stop,
                start_gate,
            },
        );

        Box::pin(async move {
            let (forward, backward) = futures::future::join(forward, backward).await;
            let mut stats = forward?;
            stats.absorb(&backward?);
            Ok(stats)
        })
    }
}
