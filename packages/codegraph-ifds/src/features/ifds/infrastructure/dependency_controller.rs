//! Inter-unit dependency tracking and quiescence detection
//!
//! The controller consumes one event channel. The run is quiescent when every
//! registered unit reports an empty queue and the work tracker shows no
//! token outstanding; the controller then cancels the stop token.

use super::work_tracker::WorkTracker;
use crate::features::ifds::domain::IfdsNode;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent<U> {
    NewRunner(U),

    /// `from` waits on summaries produced by `to`
    NewDependency { from: U, to: U },

    QueueStatusUpdate { unit: U, is_empty: bool },
}

/// Unit dependency graph observed during a run
#[derive(Debug, Clone)]
pub struct DependencyReport<U> {
    pub graph: DiGraph<U, ()>,
    pub has_cycles: bool,
    /// Whether the run ended by quiescence rather than by the deadline
    pub quiescent: bool,
}

impl<U: Clone> DependencyReport<U> {
    /// `(from, to)` pairs in insertion order
    pub fn dependencies(&self) -> Vec<(U, U)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
            .collect()
    }
}

pub struct DependencyController<U: IfdsNode> {
    events: mpsc::UnboundedReceiver<ControllerEvent<U>>,
    tracker: Arc<WorkTracker>,
    stop: CancellationToken,
    queue_empty: FxHashMap<U, bool>,
    graph: DiGraph<U, ()>,
    nodes: FxHashMap<U, NodeIndex>,
    quiescent: bool,
}

impl<U: IfdsNode> DependencyController<U> {
    pub fn new(
        events: mpsc::UnboundedReceiver<ControllerEvent<U>>,
        tracker: Arc<WorkTracker>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            events,
            tracker,
            stop,
            queue_empty: FxHashMap::default(),
            graph: DiGraph::new(),
            nodes: FxHashMap::default(),
            quiescent: false,
        }
    }

    /// Process events until quiescence, external stop, or channel close
    pub async fn dispatch(mut self) -> DependencyReport<U> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.stop.cancelled() => None,
                event = self.events.recv() => event,
            };
            let Some(event) = event else {
                break;
            };

            self.handle(event);
            if self.is_quiescent() {
                info!(units = self.queue_empty.len(), "All units quiescent, stopping run");
                self.quiescent = true;
                self.stop.cancel();
                break;
            }
        }
        self.report()
    }

    pub fn handle(&mut self, event: ControllerEvent<U>) {
        trace!(?event, "controller event");
        match event {
            ControllerEvent::NewRunner(unit) => {
                self.node(&unit);
                self.queue_empty.entry(unit).or_insert(false);
            }
            ControllerEvent::NewDependency { from, to } => {
                let from_node = self.node(&from);
                let to_node = self.node(&to);
                if self.graph.find_edge(from_node, to_node).is_none() {
                    debug!(?from, ?to, "new unit dependency");
                    self.graph.add_edge(from_node, to_node, ());
                }
            }
            ControllerEvent::QueueStatusUpdate { unit, is_empty } => {
                self.queue_empty.insert(unit, is_empty);
            }
        }
    }

    pub fn is_quiescent(&self) -> bool {
        !self.queue_empty.is_empty()
            && self.queue_empty.values().all(|empty| *empty)
            && self.tracker.is_idle()
    }

    fn node(&mut self, unit: &U) -> NodeIndex {
        if let Some(index) = self.nodes.get(unit) {
            return *index;
        }
        let index = self.graph.add_node(unit.clone());
        self.nodes.insert(unit.clone(), index);
        index
    }

    fn report(self) -> DependencyReport<U> {
        let has_cycles = is_cyclic_directed(&self.graph);
        debug!(
            units = self.graph.node_count(),
            dependencies = self.graph.edge_count(),
            has_cycles,
            "dependency controller stopped"
        );
        DependencyReport {
            graph: self.graph,
            has_cycles,
            quiescent: self.quiescent,
        }
    }
}
