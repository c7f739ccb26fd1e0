//! Pipeline figures for `/debug/metrics` and the Prometheus exposition.

use serde::Serialize;

use crate::ApiState;

/// One consistent reading of the pipeline counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineStats {
    pub events_enqueued: u64,
    pub events_processed: u64,
    pub backlog_size: usize,
    pub queue_depth: usize,
    pub worker_count: usize,
    pub uptime_sec: f64,
}

impl PipelineStats {
    pub fn collect(state: &ApiState) -> Self {
        let m = state.manager.metrics();
        Self {
            events_enqueued: m.enqueued,
            events_processed: m.processed,
            backlog_size: m.backlog,
            queue_depth: m.depth,
            worker_count: state.manager.worker_count(),
            uptime_sec: state.started_at.elapsed().as_secs_f64(),
        }
    }
}

/// Render the stats in Prometheus text exposition format.
pub fn render_prometheus(stats: &PipelineStats) -> String {
    let mut out = String::new();

    let mut metric = |name: &str, kind: &str, help: &str, value: String| {
        out.push_str(&format!("# HELP {name} {help}\n"));
        out.push_str(&format!("# TYPE {name} {kind}\n"));
        out.push_str(&format!("{name} {value}\n"));
    };

    metric(
        "skuflow_events_enqueued_total",
        "counter",
        "Events accepted into the queue.",
        stats.events_enqueued.to_string(),
    );
    metric(
        "skuflow_events_processed_total",
        "counter",
        "Events applied to the product store.",
        stats.events_processed.to_string(),
    );
    metric(
        "skuflow_backlog_size",
        "gauge",
        "Events waiting in the unbounded backlog.",
        stats.backlog_size.to_string(),
    );
    metric(
        "skuflow_queue_depth",
        "gauge",
        "Events in the backlog plus the ready buffer.",
        stats.queue_depth.to_string(),
    );
    metric(
        "skuflow_workers",
        "gauge",
        "Active worker tasks.",
        stats.worker_count.to_string(),
    );
    metric(
        "skuflow_uptime_seconds",
        "gauge",
        "Seconds since the API started.",
        format!("{:.3}", stats.uptime_sec),
    );

    out
}
