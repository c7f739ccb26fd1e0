//! skuflowd — assembles the skuflow pipeline into a running service.
//!
//! ```text
//! POST /events ──► Sequencer ──► EventQueue ──► workers ──► ProductStore
//!                                    ▲              ▲
//!                                 broker      WorkerManager (scaling loop)
//! ```
//!
//! Shutdown order: close intake, drain with a deadline, let the HTTP
//! server finish in-flight requests, then stop the workers.

pub mod service;

pub use service::{Service, listen_addr, load_config, serve, shutdown_signal};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,skuflowd=debug,skuflow=debug";
