//! What a runner may ask of the run it belongs to

use crate::errors::Result;
use crate::features::ifds::domain::{DomainFact, Edge, IfdsNode, Reason, SummaryFact};
use crate::features::ifds::infrastructure::RunnerInbox;
use std::sync::Arc;

pub trait UnitManagerPort<M, S, F, U>: Send + Sync
where
    M: IfdsNode,
    S: IfdsNode,
    F: DomainFact,
    U: IfdsNode,
{
    fn resolve_unit(&self, method: &M) -> U;

    /// Deliver every summary edge of `method`, past and future, to `inbox`
    fn subscribe_for_summary_edges_of(
        &self,
        method: &M,
        subscriber: &U,
        inbox: RunnerInbox<M, S, F>,
    ) -> Result<()>;

    fn update_queue_status(&self, unit: &U, is_empty: bool) -> Result<()>;

    fn upload_summary_fact(&self, fact: SummaryFact<M, S, F>) -> Result<()>;

    /// Route `edge` to the runner owning `edge.from.method`
    fn add_edge_for_other_runner(
        &self,
        sender: &U,
        edge: Edge<M, S, F>,
        reason: Reason<M, S, F>,
    ) -> Result<()>;
}

pub type ManagerPortRef<M, S, F, U> = Arc<dyn UnitManagerPort<M, S, F, U>>;
