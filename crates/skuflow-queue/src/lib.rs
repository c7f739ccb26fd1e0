//! skuflow-queue — non-blocking event intake.
//!
//! Accepted events land in an unbounded backlog so callers never wait.
//! A background broker moves them, in FIFO order, into a small bounded
//! ready buffer that workers pull from:
//!
//! ```text
//! enqueue() ──► backlog (VecDeque, unbounded)
//!                  │  broker: on wake or every 50ms
//!                  ▼
//!               ready buffer (mpsc, bounded) ──► next() ──► worker
//! ```
//!
//! The ready buffer is the only bounded resource on the ingestion path.
//! Backlog growth past the high watermark is logged, never rejected.

pub mod queue;
pub mod sequence;

pub use queue::{EventQueue, QueueMetrics};
pub use sequence::Sequencer;
