//! Service assembly, configuration loading, and the shutdown sequence.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{info, warn};

use skuflow_api::{ApiState, build_router};
use skuflow_autoscale::WorkerManager;
use skuflow_core::ServiceConfig;
use skuflow_queue::EventQueue;
use skuflow_state::ProductStore;

/// Defaults, then the optional TOML file, then the environment, then the
/// `--addr` flag. The result is validated.
pub fn load_config(path: Option<&Path>, addr: Option<String>) -> anyhow::Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => ServiceConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    config.apply_env()?;
    if let Some(addr) = addr {
        config.http_addr = addr;
    }
    config.validate()?;
    Ok(config)
}

/// Accept `:8080` shorthand for all interfaces.
pub fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// The wired-up pipeline: queue, store, worker manager, and API state.
#[derive(Clone)]
pub struct Service {
    config: ServiceConfig,
    manager: WorkerManager,
    state: ApiState,
}

impl Service {
    pub fn new(config: ServiceConfig) -> Self {
        let queue = Arc::new(EventQueue::new(config.queue.ready_capacity));
        let manager = WorkerManager::new(&config, queue, ProductStore::new());
        let state = ApiState::new(manager.clone());
        Self {
            config,
            manager,
            state,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn manager(&self) -> &WorkerManager {
        &self.manager
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn start(&self) {
        self.manager.start();
    }

    /// Close intake and wait up to the configured timeout for every
    /// accepted event to be applied. Returns whether the drain finished.
    pub async fn drain(&self) -> bool {
        self.manager.close_intake();
        let timeout = self.config.shutdown_timeout();
        info!(
            backlog_size = self.manager.backlog_size(),
            queue_depth = self.manager.queue_depth(),
            worker_count = self.manager.worker_count(),
            timeout_secs = timeout.as_secs(),
            "draining queue"
        );

        let drained = self.manager.drain_until(Instant::now() + timeout).await;
        let m = self.manager.metrics();
        if drained {
            info!(events_processed = m.processed, "queue drained");
        } else {
            warn!(
                backlog_size = m.backlog,
                queue_depth = m.depth,
                unprocessed = m.enqueued.saturating_sub(m.processed),
                "drain timed out; remaining events are dropped"
            );
        }
        drained
    }

    pub fn stop(&self) {
        self.manager.stop();
    }
}

/// Run the service on `listener` until `signal` resolves, then drain and
/// stop.
pub async fn serve<F>(service: Service, listener: TcpListener, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    service.start();
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP server listening");

    let drainer = service.clone();
    let result = axum::serve(listener, service.router())
        .with_graceful_shutdown(async move {
            signal.await;
            info!("shutdown signal received");
            drainer.drain().await;
        })
        .await;

    service.stop();
    result?;
    info!("skuflowd stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
