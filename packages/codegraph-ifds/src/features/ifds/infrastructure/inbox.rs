//! Runner inboxes
//!
//! Every send takes a work token on behalf of the receiver; the receiving
//! runner releases it once the message has been taken over.

use super::work_tracker::WorkTracker;
use crate::errors::{IfdsError, Result};
use crate::features::ifds::domain::{Edge, Reason};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Work injected into a runner from outside its own worklist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerMessage<M, S, F> {
    /// Path edge to propagate with the given reason
    Edge {
        edge: Edge<M, S, F>,
        reason: Reason<M, S, F>,
    },

    /// Summary edge of a method owned by another unit
    Summary(Edge<M, S, F>),
}

pub type InboxReceiver<M, S, F> = mpsc::UnboundedReceiver<RunnerMessage<M, S, F>>;

#[derive(Debug)]
pub struct RunnerInbox<M, S, F> {
    tx: mpsc::UnboundedSender<RunnerMessage<M, S, F>>,
    tracker: Arc<WorkTracker>,
    stop: CancellationToken,
}

impl<M, S, F> Clone for RunnerInbox<M, S, F> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            tracker: self.tracker.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<M, S, F> RunnerInbox<M, S, F> {
    pub fn channel(
        tracker: Arc<WorkTracker>,
        stop: CancellationToken,
    ) -> (Self, InboxReceiver<M, S, F>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, tracker, stop }, rx)
    }

    /// Send a message; a closed inbox is an error only while the run is live
    pub fn send(&self, message: RunnerMessage<M, S, F>) -> Result<()> {
        self.tracker.acquire();
        if self.tx.send(message).is_err() {
            self.tracker.release();
            if !self.stop.is_cancelled() {
                return Err(IfdsError::channel_closed(
                    "runner inbox closed before the run stopped",
                ));
            }
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
