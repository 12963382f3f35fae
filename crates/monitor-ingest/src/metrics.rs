//! Prometheus metrics for the ingestion pipeline, mirroring
//! `workflow-engine-api::monitoring::metrics`'s global-registry-plus-helper
//! style.

use lazy_static::lazy_static;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    /// Events accepted by the intake surface, labeled by outcome
    /// (`enqueued`, `dropped_sample`, `dropped_filter`, `malformed`).
    pub static ref EVENTS_INGESTED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("events_ingested_total", "Total number of events accepted by the intake surface")
            .namespace("monitor")
            .subsystem("ingest"),
        &["platform", "outcome"]
    ).unwrap();

    /// Aggregations created vs. merged into an existing fingerprint
    /// (spec.md §4.7).
    pub static ref AGGREGATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("aggregations_total", "Total number of aggregation outcomes")
            .namespace("monitor")
            .subsystem("aggregation"),
        &["outcome"]
    ).unwrap();

    /// Alert rule evaluations, labeled by whether the rule fired.
    pub static ref ALERTS_EVALUATED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("alerts_evaluated_total", "Total number of alert rule evaluations")
            .namespace("monitor")
            .subsystem("alert"),
        &["rule_type", "fired"]
    ).unwrap();

    /// Notification sends, labeled by channel and result.
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("notifications_sent_total", "Total number of notification send attempts")
            .namespace("monitor")
            .subsystem("notification"),
        &["channel", "result"]
    ).unwrap();

    /// End-to-end worker latency, per worker stage.
    pub static ref WORKER_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("worker_duration_seconds", "Duration of one worker job in seconds")
            .namespace("monitor")
            .subsystem("pipeline")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["worker"]
    ).unwrap();

    /// Current depth of each shard's in-process job channel.
    pub static ref QUEUE_DEPTH: IntGaugeVec = IntGaugeVec::new(
        Opts::new("queue_depth", "Current number of queued jobs per shard")
            .namespace("monitor")
            .subsystem("pipeline"),
        &["shard"]
    ).unwrap();

    /// Entries currently held in the source-map LRU cache (spec.md §4.8).
    pub static ref SOURCEMAP_CACHE_SIZE: IntGauge = IntGauge::with_opts(
        Opts::new("sourcemap_cache_size", "Entries currently cached in the source-map cache")
            .namespace("monitor")
            .subsystem("sourcemap")
    ).unwrap();

    /// Source-map cache hits vs. misses.
    pub static ref SOURCEMAP_CACHE_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("sourcemap_cache_requests_total", "Source-map cache lookups")
            .namespace("monitor")
            .subsystem("sourcemap"),
        &["outcome"]
    ).unwrap();
}

pub fn init_metrics() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(EVENTS_INGESTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(AGGREGATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ALERTS_EVALUATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(NOTIFICATIONS_SENT_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WORKER_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(QUEUE_DEPTH.clone()))?;
    REGISTRY.register(Box::new(SOURCEMAP_CACHE_SIZE.clone()))?;
    REGISTRY.register(Box::new(SOURCEMAP_CACHE_REQUESTS_TOTAL.clone()))?;
    Ok(())
}

/// RAII timer recording a worker's duration into `WORKER_DURATION_SECONDS`
/// when dropped.
pub struct WorkerTimer {
    worker: &'static str,
    started: Instant,
}

impl WorkerTimer {
    pub fn start(worker: &'static str) -> Self {
        Self {
            worker,
            started: Instant::now(),
        }
    }

    pub fn histogram(&self) -> Histogram {
        WORKER_DURATION_SECONDS.with_label_values(&[self.worker])
    }
}

impl Drop for WorkerTimer {
    fn drop(&mut self) {
        self.histogram().observe(self.started.elapsed().as_secs_f64());
    }
}

pub fn record_ingest(platform: &str, outcome: &str) {
    EVENTS_INGESTED_TOTAL.with_label_values(&[platform, outcome]).inc();
}

pub fn record_aggregation(outcome: &str) {
    AGGREGATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_alert_evaluation(rule_type: &str, fired: bool) {
    ALERTS_EVALUATED_TOTAL
        .with_label_values(&[rule_type, if fired { "true" } else { "false" }])
        .inc();
}

pub fn record_notification(channel: &str, result: &str) {
    NOTIFICATIONS_SENT_TOTAL.with_label_values(&[channel, result]).inc();
}

pub fn record_sourcemap_cache(outcome: &str) {
    SOURCEMAP_CACHE_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Renders the registry in the Prometheus text exposition format, for the
/// `/api/metrics` scrape endpoint.
pub fn export_metrics() -> Result<String, prometheus::Error> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
