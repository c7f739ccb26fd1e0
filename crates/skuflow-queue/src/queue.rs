//! EventQueue — unbounded backlog plus bounded ready buffer.
//!
//! The backlog and the closed flag share one `std::sync::Mutex`. Lock
//! hold time is a push, a pop loop bounded by the ready capacity, or a
//! length read; nothing awaits while holding it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use skuflow_core::ProductEvent;

/// Fallback broker cadence for wakes that were coalesced or missed.
pub const BROKER_INTERVAL: Duration = Duration::from_millis(50);

/// Point-in-time counters and sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueMetrics {
    /// Events accepted. Never decreases.
    pub enqueued: u64,
    /// Events fully applied by a worker. Never decreases.
    pub processed: u64,
    /// Events not yet moved into the ready buffer.
    pub backlog: usize,
    /// Backlog plus events sitting in the ready buffer.
    pub depth: usize,
}

impl QueueMetrics {
    /// Every accepted event has been applied and nothing is buffered.
    pub fn is_drained(&self) -> bool {
        self.backlog == 0 && self.depth == 0 && self.enqueued == self.processed
    }
}

struct Intake {
    backlog: VecDeque<ProductEvent>,
    closed: bool,
}

pub struct EventQueue {
    intake: Mutex<Intake>,
    ready_tx: mpsc::Sender<ProductEvent>,
    ready_rx: tokio::sync::Mutex<mpsc::Receiver<ProductEvent>>,
    /// Broker wake-up. `Notify` keeps at most one pending permit, so
    /// redundant wakes coalesce.
    wake: Notify,
    enqueued: AtomicU64,
    processed: AtomicU64,
}

impl EventQueue {
    /// Create a queue whose ready buffer holds `ready_capacity` events.
    /// A capacity of 0 is raised to 1.
    pub fn new(ready_capacity: usize) -> Self {
        let (ready_tx, ready_rx) = mpsc::channel(ready_capacity.max(1));
        Self {
            intake: Mutex::new(Intake {
                backlog: VecDeque::new(),
                closed: false,
            }),
            ready_tx,
            ready_rx: tokio::sync::Mutex::new(ready_rx),
            wake: Notify::new(),
            enqueued: AtomicU64::new(0),
            processed: AtomicU64::new(0),
        }
    }

    fn lock_intake(&self) -> MutexGuard<'_, Intake> {
        self.intake.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept an event into the backlog. Never blocks.
    ///
    /// Returns `false`, with no side effect, once intake has been closed.
    pub fn enqueue(&self, event: ProductEvent) -> bool {
        {
            let mut intake = self.lock_intake();
            if intake.closed {
                return false;
            }
            intake.backlog.push_back(event);
            self.enqueued.fetch_add(1, Ordering::AcqRel);
        }
        self.wake.notify_one();
        true
    }

    /// Wait for the next event in the ready buffer.
    ///
    /// Cancel-safe: dropping the future never loses an event.
    pub async fn next(&self) -> Option<ProductEvent> {
        let event = self.ready_rx.lock().await.recv().await;
        // A slot just opened up; let the broker refill it.
        self.wake.notify_one();
        event
    }

    /// Record that a worker has finished applying one event.
    pub fn mark_processed(&self) {
        self.processed.fetch_add(1, Ordering::AcqRel);
    }

    /// Close intake for good. Later `enqueue` calls return `false`.
    pub fn close_intake(&self) {
        let mut intake = self.lock_intake();
        if !intake.closed {
            intake.closed = true;
            debug!(backlog = intake.backlog.len(), "intake closed");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock_intake().closed
    }

    pub fn backlog_size(&self) -> usize {
        self.lock_intake().backlog.len()
    }

    pub fn queue_depth(&self) -> usize {
        let intake = self.lock_intake();
        intake.backlog.len() + self.ready_len()
    }

    /// Capacity of the ready buffer.
    pub fn ready_capacity(&self) -> usize {
        self.ready_tx.max_capacity()
    }

    pub fn metrics(&self) -> QueueMetrics {
        let intake = self.lock_intake();
        let backlog = intake.backlog.len();
        QueueMetrics {
            enqueued: self.enqueued.load(Ordering::Acquire),
            processed: self.processed.load(Ordering::Acquire),
            backlog,
            depth: backlog + self.ready_len(),
        }
    }

    fn ready_len(&self) -> usize {
        self.ready_tx.max_capacity() - self.ready_tx.capacity()
    }

    /// Move backlog items into the ready buffer until one side runs out.
    /// Returns how many moved.
    pub fn flush_once(&self) -> usize {
        let mut intake = self.lock_intake();
        let mut moved = 0;
        while !intake.backlog.is_empty() {
            let Ok(permit) = self.ready_tx.try_reserve() else {
                break;
            };
            if let Some(event) = intake.backlog.pop_front() {
                permit.send(event);
                moved += 1;
            }
        }
        moved
    }

    /// Spawn the broker loop.
    ///
    /// Each cycle flushes the backlog and warns if it is above
    /// `high_watermark` (0 disables the check). Runs until `shutdown`
    /// flips to `true` or its sender is dropped.
    pub fn spawn_broker(
        self: &Arc<Self>,
        high_watermark: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BROKER_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(high_watermark, "broker started");

            loop {
                if *shutdown.borrow() {
                    break;
                }
                queue.flush_once();
                if high_watermark > 0 {
                    let backlog_size = queue.backlog_size();
                    if backlog_size > high_watermark {
                        warn!(
                            backlog_size,
                            high_watermark, "queue backlog exceeds high watermark"
                        );
                    }
                }

                tokio::select! {
                    res = shutdown.changed() => {
                        if res.is_err() {
                            break;
                        }
                    }
                    _ = queue.wake.notified() => {}
                    _ = ticker.tick() => {}
                }
            }

            debug!("broker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(id: &str, price: f64) -> ProductEvent {
        ProductEvent::new(id).with_price(price)
    }

    #[test]
    fn enqueue_never_blocks_past_ready_capacity() {
        let q = EventQueue::new(1);
        for i in 0..1000 {
            assert!(q.enqueue(ev("x", i as f64)), "enqueue failed at {i}");
        }
        assert_eq!(q.backlog_size(), 1000);
        assert_eq!(q.metrics().enqueued, 1000);
    }

    #[test]
    fn closed_intake_rejects_without_side_effects() {
        let q = EventQueue::new(4);
        assert!(q.enqueue(ev("a", 1.0)));
        q.close_intake();
        assert!(q.is_shutting_down());

        for _ in 0..10 {
            assert!(!q.enqueue(ev("b", 2.0)));
        }
        let m = q.metrics();
        assert_eq!(m.enqueued, 1);
        assert_eq!(m.backlog, 1);
        assert_eq!(m.depth, 1);
    }

    #[test]
    fn close_is_a_one_way_latch() {
        let q = EventQueue::new(4);
        q.close_intake();
        q.close_intake();
        assert!(q.is_shutting_down());
        assert!(!q.enqueue(ev("a", 1.0)));
    }

    #[test]
    fn flush_moves_up_to_capacity_in_fifo_order() {
        let q = EventQueue::new(3);
        for i in 0..5 {
            q.enqueue(ev("x", i as f64));
        }
        assert_eq!(q.flush_once(), 3);
        assert_eq!(q.backlog_size(), 2);
        assert_eq!(q.queue_depth(), 5);
        assert_eq!(q.flush_once(), 0, "ready buffer is full");
    }

    #[tokio::test]
    async fn next_yields_in_backlog_order() {
        let q = EventQueue::new(8);
        for i in 0..5 {
            q.enqueue(ev("x", i as f64));
        }
        q.flush_once();
        for i in 0..5 {
            let got = q.next().await.unwrap();
            assert_eq!(got.price, Some(i as f64));
        }
        assert_eq!(q.queue_depth(), 0);
    }

    #[tokio::test]
    async fn drained_only_after_processing() {
        let q = EventQueue::new(4);
        q.enqueue(ev("x", 1.0));
        q.flush_once();
        assert!(!q.metrics().is_drained());

        let _event = q.next().await.unwrap();
        let m = q.metrics();
        assert_eq!((m.backlog, m.depth), (0, 0));
        assert!(!m.is_drained(), "dequeued but not yet applied");

        q.mark_processed();
        assert!(q.metrics().is_drained());
    }

    #[tokio::test]
    async fn broker_moves_backlog_into_ready_buffer() {
        let q = Arc::new(EventQueue::new(2));
        let (tx, rx) = watch::channel(false);
        let broker = q.spawn_broker(0, rx);

        for i in 0..6 {
            q.enqueue(ev("x", i as f64));
        }

        let mut seen = Vec::new();
        for _ in 0..6 {
            let got = tokio::time::timeout(Duration::from_secs(2), q.next())
                .await
                .expect("broker should keep the ready buffer fed")
                .unwrap();
            seen.push(got.price.unwrap());
        }
        assert_eq!(seen, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), broker)
            .await
            .expect("broker should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn backlog_above_watermark_is_still_accepted_and_delivered() {
        let q = Arc::new(EventQueue::new(2));
        for i in 0..48 {
            assert!(q.enqueue(ev("w", i as f64)), "enqueue refused at {i}");
        }
        assert!(q.backlog_size() > 1);

        let (tx, rx) = watch::channel(false);
        let broker = q.spawn_broker(1, rx);

        let mut seen = Vec::new();
        for _ in 0..48 {
            let got = tokio::time::timeout(Duration::from_secs(2), q.next())
                .await
                .expect("watermark must not hold events back")
                .unwrap();
            seen.push(got.price.unwrap());
            q.mark_processed();
        }
        let expected: Vec<f64> = (0..48).map(|i| i as f64).collect();
        assert_eq!(seen, expected);
        assert!(q.metrics().is_drained());

        tx.send(true).unwrap();
        broker.await.unwrap();
    }

    #[tokio::test]
    async fn broker_stops_when_sender_dropped() {
        let q = Arc::new(EventQueue::new(2));
        let (tx, rx) = watch::channel(false);
        let broker = q.spawn_broker(1, rx);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), broker)
            .await
            .expect("broker should stop")
            .unwrap();
    }

    #[test]
    fn capacity_zero_is_raised_to_one() {
        let q = EventQueue::new(0);
        assert_eq!(q.ready_capacity(), 1);
    }
}
