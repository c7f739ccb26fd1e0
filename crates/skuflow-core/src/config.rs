//! Service configuration: defaults, `skuflow.toml`, and environment overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("worker max must be at least 1")]
    ZeroMaxWorkers,
    #[error("worker min ({min}) exceeds worker max ({max})")]
    MinAboveMax { min: usize, max: usize },
    #[error("queue ready_capacity must be at least 1")]
    ZeroReadyCapacity,
    #[error("scale_interval_ms must be at least 1")]
    ZeroScaleInterval,
    #[error("scale_down_idle_ticks must be at least 1")]
    ZeroIdleTicks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub http_addr: String,
    pub shutdown_timeout_secs: u64,
    pub queue: QueueConfig,
    pub workers: WorkerConfig,
}

/// Sizing of the hand-off between intake and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Capacity of the bounded ready buffer.
    pub ready_capacity: usize,
    /// Backlog size above which the broker warns. 0 disables the warning.
    pub high_watermark: usize,
}

/// Worker pool bounds and autoscaling thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Workers spawned at start. Defaults to `min`.
    pub initial: Option<usize>,
    pub min: usize,
    pub max: usize,
    pub scale_interval_ms: u64,
    pub scale_up_backlog_per_worker: usize,
    pub scale_down_idle_ticks: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            shutdown_timeout_secs: 15,
            queue: QueueConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            ready_capacity: 128,
            high_watermark: 5000,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            initial: None,
            min: 3,
            max: 8,
            scale_interval_ms: 500,
            scale_up_backlog_per_worker: 100,
            scale_down_idle_ticks: 6,
        }
    }
}

impl WorkerConfig {
    /// Initial pool size, clamped into `[min, max]`.
    pub fn initial_workers(&self) -> usize {
        self.initial.unwrap_or(self.min).clamp(self.min, self.max.max(self.min))
    }

    pub fn scale_interval(&self) -> Duration {
        Duration::from_millis(self.scale_interval_ms)
    }
}

impl ServiceConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from `lookup`. Empty values are treated as unset.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("HTTP_ADDR") {
            self.http_addr = addr;
        }
        if let Some(v) = parse_var(&get, "SHUTDOWN_TIMEOUT")? {
            self.shutdown_timeout_secs = v;
        }
        if let Some(v) = parse_var(&get, "QUEUE_READY_CAPACITY")? {
            self.queue.ready_capacity = v;
        }
        if let Some(v) = parse_var(&get, "QUEUE_HIGH_WATERMARK")? {
            self.queue.high_watermark = v;
        }
        if let Some(v) = parse_var(&get, "WORKER_COUNT")? {
            self.workers.initial = Some(v);
        }
        if let Some(v) = parse_var(&get, "WORKER_MIN")? {
            self.workers.min = v;
        }
        if let Some(v) = parse_var(&get, "WORKER_MAX")? {
            self.workers.max = v;
        }
        if let Some(v) = parse_var(&get, "SCALE_INTERVAL_MS")? {
            self.workers.scale_interval_ms = v;
        }
        if let Some(v) = parse_var(&get, "SCALE_UP_BACKLOG_PER_WORKER")? {
            self.workers.scale_up_backlog_per_worker = v;
        }
        if let Some(v) = parse_var(&get, "SCALE_DOWN_IDLE_TICKS")? {
            self.workers.scale_down_idle_ticks = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let w = &self.workers;
        if w.max == 0 {
            return Err(ConfigError::ZeroMaxWorkers);
        }
        if w.min > w.max {
            return Err(ConfigError::MinAboveMax { min: w.min, max: w.max });
        }
        if self.queue.ready_capacity == 0 {
            return Err(ConfigError::ZeroReadyCapacity);
        }
        if w.scale_interval_ms == 0 {
            return Err(ConfigError::ZeroScaleInterval);
        }
        if w.scale_down_idle_ticks == 0 {
            return Err(ConfigError::ZeroIdleTicks);
        }
        Ok(())
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse_var<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
        None => Ok(None),
    }
}
