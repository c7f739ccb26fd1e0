//! skuflow-core — shared types and configuration for the product update
//! pipeline.
//!
//! Every other crate in the workspace speaks in terms of
//! [`ProductEvent`] (a partial update, stamped with a [`Sequence`] before
//! it is queued) and [`Product`] (the merged, externally visible state).

pub mod config;
pub mod types;

pub use config::{ConfigError, QueueConfig, ServiceConfig, WorkerConfig};
pub use types::*;
