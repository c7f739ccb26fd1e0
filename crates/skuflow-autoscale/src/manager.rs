//! WorkerManager — owns the worker pool, the scaling loop, and shutdown.
//!
//! Each worker is a task with its own `watch` shutdown channel, kept in a
//! slot alongside its join handle. Workers are added at the end of the
//! slot list and removed from the end (LIFO). The broker and the scaling
//! loop share one parent shutdown channel that `stop` flips.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use skuflow_core::{ProductEvent, ServiceConfig, WorkerConfig};
use skuflow_queue::{EventQueue, QueueMetrics};
use skuflow_state::{ProductStore, UpsertOutcome};

use crate::scaler::{ScaleDecision, ScalePolicy, Scaler};

/// How often `drain_until` re-checks the queue counters.
pub const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One running worker.
struct WorkerSlot {
    id: u64,
    /// Dropped when the slot is removed; the worker is detached, not aborted.
    _handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

struct Inner {
    config: WorkerConfig,
    high_watermark: usize,
    queue: Arc<EventQueue>,
    store: ProductStore,
    /// Active workers, oldest first.
    workers: Mutex<Vec<WorkerSlot>>,
    next_worker_id: AtomicU64,
    /// Parent lifecycle signal for the broker and the scaling loop.
    shutdown_tx: watch::Sender<bool>,
    background: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

/// Supervises workers and scaling. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WorkerManager {
    inner: Arc<Inner>,
}

impl WorkerManager {
    pub fn new(config: &ServiceConfig, queue: Arc<EventQueue>, store: ProductStore) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config: config.workers.clone(),
                high_watermark: config.queue.high_watermark,
                queue,
                store,
                workers: Mutex::new(Vec::new()),
                next_worker_id: AtomicU64::new(1),
                shutdown_tx,
                background: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
            }),
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<WorkerSlot>> {
        self.inner
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the broker, the initial workers, and the scaling loop.
    ///
    /// Must be called from inside a tokio runtime. Only the first call
    /// has any effect.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            warn!("worker manager already started");
            return;
        }

        let broker = self
            .inner
            .queue
            .spawn_broker(self.inner.high_watermark, self.inner.shutdown_tx.subscribe());
        self.add_workers(self.inner.config.initial_workers());
        let scaler = self.spawn_scaler();

        self.inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([broker, scaler]);

        info!(
            worker_count = self.worker_count(),
            min = self.inner.config.min,
            max = self.inner.config.max,
            scale_interval_ms = self.inner.config.scale_interval_ms,
            "worker manager started"
        );
    }

    fn spawn_scaler(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        let interval = self.inner.config.scale_interval().max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut scaler = Scaler::new(ScalePolicy::from(&manager.inner.config));
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.scale_tick(&mut scaler);
                    }
                    _ = shutdown.changed() => {
                        debug!("scaling loop shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Sample the queue, evaluate one tick, and carry out the decision.
    pub fn scale_tick(&self, scaler: &mut Scaler) -> ScaleDecision {
        let backlog = self.inner.queue.backlog_size();
        let worker_count = self.worker_count();
        let decision = scaler.evaluate(backlog, worker_count);
        match decision {
            ScaleDecision::Up => {
                self.add_workers(1);
            }
            ScaleDecision::Down => {
                self.remove_workers(1);
            }
            ScaleDecision::NoChange => {}
        }
        decision
    }

    /// Spawn up to `n` workers without exceeding the configured max.
    /// Returns how many were added. Does nothing once stopped.
    pub fn add_workers(&self, n: usize) -> usize {
        let mut workers = self.lock_workers();
        // `stop` flips the flag before taking this lock.
        if self.is_stopped() {
            return 0;
        }
        let room = self.inner.config.max.saturating_sub(workers.len());
        let n = n.min(room);

        for _ in 0..n {
            let id = self.inner.next_worker_id.fetch_add(1, Ordering::Relaxed);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let handle = tokio::spawn(run_worker(
                id,
                Arc::clone(&self.inner.queue),
                self.inner.store.clone(),
                shutdown_rx,
            ));
            workers.push(WorkerSlot {
                id,
                _handle: handle,
                shutdown_tx,
            });
        }

        if n > 0 {
            info!(worker_count = workers.len(), "workers scaled");
        }
        n
    }

    /// Cancel up to `n` of the most recently added workers without going
    /// below the configured min. Returns how many were removed.
    pub fn remove_workers(&self, n: usize) -> usize {
        let mut workers = self.lock_workers();
        let surplus = workers.len().saturating_sub(self.inner.config.min);
        let n = n.min(surplus);

        for _ in 0..n {
            if let Some(slot) = workers.pop() {
                let _ = slot.shutdown_tx.send(true);
                debug!(worker_id = slot.id, "worker cancelled");
            }
        }

        if n > 0 {
            info!(worker_count = workers.len(), "workers scaled");
        }
        n
    }

    pub fn worker_count(&self) -> usize {
        self.lock_workers().len()
    }

    /// Ids of the active workers, oldest first.
    pub fn worker_ids(&self) -> Vec<u64> {
        self.lock_workers().iter().map(|w| w.id).collect()
    }

    /// Poll until every accepted event has been applied or `deadline`
    /// passes. Returns whether the drain completed.
    pub async fn drain_until(&self, deadline: Instant) -> bool {
        loop {
            if self.inner.queue.metrics().is_drained() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep_until(deadline.min(now + DRAIN_POLL_INTERVAL)).await;
        }
    }

    /// Cancel all workers and background tasks.
    ///
    /// Does not wait for in-flight events; call `drain_until` first.
    pub fn stop(&self) {
        let _ = self.inner.shutdown_tx.send(true);

        let mut workers = self.lock_workers();
        let stopped = workers.len();
        for slot in workers.drain(..).rev() {
            let _ = slot.shutdown_tx.send(true);
        }
        drop(workers);

        self.inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        info!(workers_stopped = stopped, "worker manager stopped");
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    // ── Queue passthrough ──────────────────────────────────────────

    pub fn enqueue(&self, event: ProductEvent) -> bool {
        self.inner.queue.enqueue(event)
    }

    pub fn close_intake(&self) {
        self.inner.queue.close_intake();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.queue.is_shutting_down()
    }

    pub fn backlog_size(&self) -> usize {
        self.inner.queue.backlog_size()
    }

    pub fn queue_depth(&self) -> usize {
        self.inner.queue.queue_depth()
    }

    pub fn metrics(&self) -> QueueMetrics {
        self.inner.queue.metrics()
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.inner.queue
    }

    pub fn store(&self) -> &ProductStore {
        &self.inner.store
    }
}

/// Worker loop: apply events until cancelled.
///
/// Cancellation is only observed between events, so an event that has
/// been taken off the ready buffer is always applied and counted.
async fn run_worker(
    id: u64,
    queue: Arc<EventQueue>,
    store: ProductStore,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker_id = id, "worker started");
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            event = queue.next() => {
                let Some(event) = event else { break };
                if store.upsert(&event) == UpsertOutcome::Ignored {
                    debug!(worker_id = id, "event without product id ignored");
                }
                queue.mark_processed();
            }
        }
    }
    debug!(worker_id = id, "worker stopped");
}
