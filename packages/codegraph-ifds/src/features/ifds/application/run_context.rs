//! Run-scoped state behind the manager port
//!
//! Built once per `analyze` call; the unit → inbox map is complete before
//! any runner starts and is never mutated afterwards.

use crate::errors::{IfdsError, Result};
use crate::features::ifds::domain::{DomainFact, Edge, IfdsNode, Reason, SummaryFact};
use crate::features::ifds::infrastructure::{ControllerEvent, RunnerInbox, RunnerMessage, SummaryStorages};
use crate::features::ifds::ports::{UnitManagerPort, UnitResolver};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct RunContext<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    resolver: Arc<dyn UnitResolver<M, Unit = U>>,
    storages: Arc<SummaryStorages<M, S, F>>,
    inboxes: FxHashMap<U, RunnerInbox<M, S, F>>,
    controller: mpsc::UnboundedSender<ControllerEvent<U>>,
    stop: CancellationToken,
    dropped_edges: AtomicUsize,
}

impl<M, S, F, U> RunContext<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    pub fn new(
        resolver: Arc<dyn UnitResolver<M, Unit = U>>,
        storages: Arc<SummaryStorages<M, S, F>>,
        inboxes: FxHashMap<U, RunnerInbox<M, S, F>>,
        controller: mpsc::UnboundedSender<ControllerEvent<U>>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            resolver,
            storages,
            inboxes,
            controller,
            stop,
            dropped_edges: AtomicUsize::new(0),
        }
    }

    /// Edges addressed to units without a runner
    pub fn dropped_edges(&self) -> usize {
        self.dropped_edges.load(Ordering::SeqCst)
    }

    pub fn notify_controller(&self, event: ControllerEvent<U>) -> Result<()> {
        if self.controller.send(event).is_err() && !self.stop.is_cancelled() {
            return Err(IfdsError::channel_closed(
                "dependency controller stopped before the run",
            ));
        }
        Ok(())
    }
}

impl<M, S, F, U> UnitManagerPort<M, S, F, U> for RunContext<M, S, F, U>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    fn resolve_unit(&self, method: &M) -> U {
        self.resolver.resolve(method)
    }

    fn subscribe_for_summary_edges_of(
        &self,
        method: &M,
        subscriber: &U,
        inbox: RunnerInbox<M, S, F>,
    ) -> Result<()> {
        let producer = self.resolver.resolve(method);
        self.notify_controller(ControllerEvent::NewDependency {
            from: subscriber.clone(),
            to: producer,
        })?;

        let subscriber = subscriber.clone();
        self.storages.summary_edges.subscribe(method, move |fact| {
            match inbox.send(RunnerMessage::Summary(fact.edge.clone())) {
                Ok(()) => !inbox.is_closed(),
                Err(err) => {
                    warn!(unit = ?subscriber, %err, "summary subscriber gone");
                    false
                }
            }
        });
        Ok(())
    }

    fn update_queue_status(&self, unit: &U, is_empty: bool) -> Result<()> {
        self.notify_controller(ControllerEvent::QueueStatusUpdate {
            unit: unit.clone(),
            is_empty,
        })
    }

    fn upload_summary_fact(&self, fact: SummaryFact<M, S, F>) -> Result<()> {
        self.storages.upload(fact);
        Ok(())
    }

    fn add_edge_for_other_runner(
        &self,
        sender: &U,
        edge: Edge<M, S, F>,
        reason: Reason<M, S, F>,
    ) -> Result<()> {
        let target = self.resolver.resolve(&edge.from.method);
        if &target == sender {
            return Err(IfdsError::contract(format!(
                "unit {:?} sent an edge for another runner to itself: {:?}",
                sender, edge
            )));
        }

        match self.inboxes.get(&target) {
            Some(inbox) => {
                debug!(from = ?sender, to = ?target, "edge for other runner");
                inbox.send(RunnerMessage::Edge { edge, reason })
            }
            None => {
                self.dropped_edges.fetch_add(1, Ordering::SeqCst);
                warn!(from = ?sender, to = ?target, "no runner for unit, edge dropped");
                Ok(())
            }
        }
    }
}
