//! skuflow-autoscale — worker pool management.
//!
//! The [`WorkerManager`] owns the consumer tasks that pull events off the
//! queue's ready buffer and apply them to the store. A scaling loop
//! adjusts the pool one worker per tick from backlog pressure.
//!
//! # Scaling Algorithm
//!
//! ```text
//! every scale_interval:
//!     if backlog > workers * scale_up_backlog_per_worker and workers < max:
//!         add one worker, idle_ticks = 0
//!     else if backlog == 0:
//!         idle_ticks += 1
//!         if idle_ticks >= scale_down_idle_ticks and workers > min:
//!             remove newest worker, idle_ticks = 0
//!     else:
//!         idle_ticks = 0
//! ```
//!
//! # Shutdown
//!
//! `Running → IntakeClosed (close_intake) → Draining (drain_until) →
//! Stopped (stop)`. There is no way back. `stop` does not wait for
//! in-flight events, so callers drain first.

pub mod manager;
pub mod scaler;

pub use manager::{DRAIN_POLL_INTERVAL, WorkerManager};
pub use scaler::{ScaleDecision, ScalePolicy, Scaler};
