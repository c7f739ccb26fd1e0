//! skuflow-state — authoritative, merged product state.
//!
//! # Ordering
//!
//! Workers pull from a shared buffer, so two events for the same product
//! can be applied out of acceptance order. The store does not try to
//! restore that order. Instead each product remembers the highest
//! [`Sequence`](skuflow_core::Sequence) it has applied and discards
//! anything at or below it:
//!
//! ```text
//! upsert(ev):
//!     entry missing          → create from ev, last_sequence = ev.sequence
//!     ev.sequence <= last    → discard (stale or duplicate)
//!     otherwise              → merge present fields, last_sequence = ev.sequence
//! ```
//!
//! The `ProductStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<RwLock<..>>`) and can be shared across worker tasks.

pub mod store;

pub use store::{ProductStore, UpsertOutcome};
