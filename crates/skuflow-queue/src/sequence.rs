//! Issuance-order sequence numbers.

use std::sync::atomic::{AtomicU64, Ordering};

use skuflow_core::Sequence;

/// Hands out strictly increasing, unique sequence numbers starting at 1.
///
/// Call [`next`](Self::next) once per accepted event, before it is queued.
#[derive(Debug, Default)]
pub struct Sequencer {
    last: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Sequence {
        self.last.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// The most recently issued number, or 0 if none yet.
    pub fn last(&self) -> Sequence {
        self.last.load(Ordering::Acquire)
    }
}
