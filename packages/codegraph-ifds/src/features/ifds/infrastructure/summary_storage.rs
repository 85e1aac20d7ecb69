//! Per-method pub/sub fact store
//!
//! Each method is an independent shard guarded by its own lock. A send
//! appends to the shard history and publishes to the shard's live
//! subscribers while the lock is held, so every subscriber of a method sees
//! the same total order. Nothing is ever retracted.

use crate::features::ifds::domain::{
    CrossUnitCallFact, DomainFact, IfdsNode, MethodKeyed, SummaryEdgeFact, SummaryFact,
    TraceGraphFact, VulnerabilityLocation,
};
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

type Subscriber<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct MethodFacts<T> {
    history: Vec<T>,
    subscribers: Vec<Subscriber<T>>,
}

impl<T> Default for MethodFacts<T> {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            subscribers: Vec::new(),
        }
    }
}

type Shard<T> = Arc<Mutex<MethodFacts<T>>>;

pub struct SummaryStorage<K, T> {
    methods: DashMap<K, Shard<T>>,
    closed: AtomicBool,
}

impl<K, T> Default for SummaryStorage<K, T>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            methods: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }
}

impl<K, T> SummaryStorage<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, method: &K) -> Shard<T> {
        self.methods.entry(method.clone()).or_default().value().clone()
    }

    /// Append `fact` to the history of `method` and publish it
    pub fn send(&self, method: &K, fact: T) {
        let shard = self.shard(method);
        let mut facts = shard.lock();
        facts.subscribers.retain(|subscriber| subscriber(&fact));
        facts.history.push(fact);
    }

    /// Snapshot of the history of `method`
    pub fn get_current_facts(&self, method: &K) -> Vec<T> {
        let shard = self.methods.get(method).map(|entry| entry.value().clone());
        match shard {
            Some(shard) => shard.lock().history.clone(),
            None => Vec::new(),
        }
    }

    /// Replay the history of `method` into `callback`, then keep it live
    ///
    /// The callback runs under the shard lock and must not block; returning
    /// `false` unsubscribes it. After `close` only the replay happens.
    pub fn subscribe<C>(&self, method: &K, callback: C)
    where
        C: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let shard = self.shard(method);
        let mut facts = shard.lock();
        for fact in &facts.history {
            if !callback(fact) {
                return;
            }
        }
        if !self.closed.load(Ordering::SeqCst) {
            facts.subscribers.push(Box::new(callback));
        }
    }

    /// History of `method` followed by live arrivals, until `close`
    pub fn get_facts(&self, method: &K) -> BoxStream<'static, T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(method, move |fact: &T| tx.send(fact.clone()).is_ok());
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|fact| (fact, rx)) }).boxed()
    }

    /// Drop every live subscriber; open streams end after what they buffered
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let shards: Vec<Shard<T>> = self.methods.iter().map(|entry| entry.value().clone()).collect();
        for shard in shards {
            shard.lock().subscribers.clear();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Methods that have a shard
    pub fn methods(&self) -> Vec<K> {
        self.methods.iter().map(|entry| entry.key().clone()).collect()
    }
}

/// The four stores of one run
pub struct SummaryStorages<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    pub summary_edges: SummaryStorage<M, SummaryEdgeFact<M, S, F>>,
    pub trace_graphs: SummaryStorage<M, TraceGraphFact<M, S, F>>,
    pub cross_unit_calls: SummaryStorage<M, CrossUnitCallFact<M, S, F>>,
    pub vulnerabilities: SummaryStorage<M, VulnerabilityLocation<M, S, F>>,
}

impl<M, S, F> Default for SummaryStorages<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    fn default() -> Self {
        Self {
            summary_edges: SummaryStorage::new(),
            trace_graphs: SummaryStorage::new(),
            cross_unit_calls: SummaryStorage::new(),
            vulnerabilities: SummaryStorage::new(),
        }
    }
}

impl<M, S, F> SummaryStorages<M, S, F>
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a fact to its store, keyed by the fact's method
    pub fn upload(&self, fact: SummaryFact<M, S, F>) {
        let method = fact.method().clone();
        match fact {
            SummaryFact::SummaryEdge(fact) => self.summary_edges.send(&method, fact),
            SummaryFact::TraceGraph(fact) => self.trace_graphs.send(&method, fact),
            SummaryFact::CrossUnitCall(fact) => self.cross_unit_calls.send(&method, fact),
            SummaryFact::Vulnerability(fact) => self.vulnerabilities.send(&method, fact),
        }
    }

    pub fn close(&self) {
        self.summary_edges.close();
        self.trace_graphs.close();
        self.cross_unit_calls.close();
        self.vulnerabilities.close();
    }
}
