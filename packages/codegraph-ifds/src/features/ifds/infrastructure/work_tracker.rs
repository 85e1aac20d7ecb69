//! In-flight work counter
//!
//! A busy runner holds one token; every message sitting in a runner inbox
//! holds one token until the receiving runner has reported itself busy.
//! The count therefore reaches zero only when no runner can produce work.

use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct WorkTracker {
    outstanding: AtomicUsize,
}

impl WorkTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
    }

    pub fn release(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "work token released twice");
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst) == 0
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}
