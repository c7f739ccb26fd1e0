//! Scaler — backlog-driven, one-step-per-tick scaling decisions.
//!
//! Pure and synchronous so the policy can be exercised without a
//! runtime. The manager feeds it one `(backlog, worker_count)` sample per
//! tick and carries out whatever it returns.

use tracing::debug;

use skuflow_core::WorkerConfig;

/// A scaling decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Add one worker.
    Up,
    /// Remove the most recently added worker.
    Down,
    /// No change needed.
    NoChange,
}

/// Pool bounds and thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePolicy {
    pub min: usize,
    pub max: usize,
    pub scale_up_backlog_per_worker: usize,
    pub scale_down_idle_ticks: u32,
}

impl From<&WorkerConfig> for ScalePolicy {
    fn from(cfg: &WorkerConfig) -> Self {
        Self {
            min: cfg.min,
            max: cfg.max,
            scale_up_backlog_per_worker: cfg.scale_up_backlog_per_worker,
            scale_down_idle_ticks: cfg.scale_down_idle_ticks,
        }
    }
}

/// Tracks consecutive idle ticks between evaluations.
#[derive(Debug, Clone)]
pub struct Scaler {
    policy: ScalePolicy,
    idle_ticks: u32,
}

impl Scaler {
    pub fn new(policy: ScalePolicy) -> Self {
        Self {
            policy,
            idle_ticks: 0,
        }
    }

    pub fn policy(&self) -> &ScalePolicy {
        &self.policy
    }

    /// Consecutive ticks with an empty backlog since the last reset.
    pub fn idle_ticks(&self) -> u32 {
        self.idle_ticks
    }

    /// Evaluate one tick.
    pub fn evaluate(&mut self, backlog: usize, worker_count: usize) -> ScaleDecision {
        let p = &self.policy;

        // Scale up: more backlog than the current pool is sized for.
        let threshold = worker_count.saturating_mul(p.scale_up_backlog_per_worker);
        if backlog > threshold && worker_count < p.max {
            self.idle_ticks = 0;
            debug!(backlog, worker_count, threshold, "scale up");
            return ScaleDecision::Up;
        }

        if backlog > 0 {
            self.idle_ticks = 0;
            return ScaleDecision::NoChange;
        }

        // Scale down: backlog has stayed empty long enough.
        self.idle_ticks = self.idle_ticks.saturating_add(1);
        if self.idle_ticks >= p.scale_down_idle_ticks && worker_count > p.min {
            self.idle_ticks = 0;
            debug!(worker_count, "scale down");
            return ScaleDecision::Down;
        }

        ScaleDecision::NoChange
    }
}
