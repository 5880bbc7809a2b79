//! Observability infrastructure for the collector and analyzer
//!
//! Provides:
//! - Prometheus metrics (sampling duration, probe latency, write/reject counts, health score)
//! - Structured JSON logging of pipeline events with tracing

use crate::models::{MetricRecord, ServerAnalysis};
use prometheus::{
    register_gauge, register_histogram, register_int_counter, register_int_counter_vec, Encoder,
    Gauge, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for the counter sampling step (seconds); centred on the 1s window
const SAMPLE_BUCKETS: &[f64] = &[0.5, 0.9, 0.95, 1.0, 1.01, 1.05, 1.1, 1.25, 1.5, 2.0, 5.0];

/// Histogram buckets for TCP connect latency (seconds)
const PROBE_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.02, 0.03, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PipelineMetricsInner> = OnceLock::new();

struct PipelineMetricsInner {
    sample_duration_seconds: Histogram,
    probe_latency_seconds: Histogram,
    records_written: IntCounter,
    records_rejected: IntCounter,
    sample_failures: IntCounter,
    probe_failures: IntCounter,
    store_errors: IntCounterVec,
    ticks_skipped: IntCounterVec,
    assessments_written: IntCounter,
    anomalies_detected: IntCounter,
    health_score: Gauge,
}

impl PipelineMetricsInner {
    fn new() -> Self {
        Self {
            sample_duration_seconds: register_histogram!(
                "netpulse_sample_duration_seconds",
                "Time spent taking one counter sample, including the measurement window",
                SAMPLE_BUCKETS.to_vec()
            )
            .expect("Failed to register sample_duration_seconds"),

            probe_latency_seconds: register_histogram!(
                "netpulse_probe_latency_seconds",
                "TCP connect latency to the probe target",
                PROBE_BUCKETS.to_vec()
            )
            .expect("Failed to register probe_latency_seconds"),

            records_written: register_int_counter!(
                "netpulse_records_written_total",
                "network_metrics records persisted"
            )
            .expect("Failed to register records_written"),

            records_rejected: register_int_counter!(
                "netpulse_records_rejected_total",
                "network_metrics records dropped by validation"
            )
            .expect("Failed to register records_rejected"),

            sample_failures: register_int_counter!(
                "netpulse_sample_failures_total",
                "Counter reads that failed"
            )
            .expect("Failed to register sample_failures"),

            probe_failures: register_int_counter!(
                "netpulse_probe_failures_total",
                "Latency probes that timed out or could not connect"
            )
            .expect("Failed to register probe_failures"),

            store_errors: register_int_counter_vec!(
                "netpulse_store_errors_total",
                "Failed store operations",
                &["operation"]
            )
            .expect("Failed to register store_errors"),

            ticks_skipped: register_int_counter_vec!(
                "netpulse_ticks_skipped_total",
                "Loop ticks that produced no record",
                &["role", "reason"]
            )
            .expect("Failed to register ticks_skipped"),

            assessments_written: register_int_counter!(
                "netpulse_assessments_written_total",
                "server_analysis records persisted"
            )
            .expect("Failed to register assessments_written"),

            anomalies_detected: register_int_counter!(
                "netpulse_anomalies_detected_total",
                "Analyzer ticks that flagged an anomaly"
            )
            .expect("Failed to register anomalies_detected"),

            health_score: register_gauge!(
                "netpulse_health_score",
                "Most recent health score in [0, 1]"
            )
            .expect("Failed to register health_score"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct PipelineMetrics {
    _private: (),
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PipelineMetricsInner {
        GLOBAL_METRICS.get_or_init(PipelineMetricsInner::new)
    }

    pub fn observe_sample_duration(&self, duration_secs: f64) {
        self.inner().sample_duration_seconds.observe(duration_secs);
    }

    pub fn observe_probe_latency(&self, latency_secs: f64) {
        self.inner().probe_latency_seconds.observe(latency_secs);
    }

    pub fn inc_records_written(&self) {
        self.inner().records_written.inc();
    }

    pub fn inc_records_rejected(&self) {
        self.inner().records_rejected.inc();
    }

    pub fn inc_sample_failures(&self) {
        self.inner().sample_failures.inc();
    }

    pub fn inc_probe_failures(&self) {
        self.inner().probe_failures.inc();
    }

    /// `operation` is `write` or `query`
    pub fn inc_store_errors(&self, operation: &str) {
        self.inner()
            .store_errors
            .with_label_values(&[operation])
            .inc();
    }

    pub fn inc_ticks_skipped(&self, role: &str, reason: &str) {
        self.inner()
            .ticks_skipped
            .with_label_values(&[role, reason])
            .inc();
    }

    pub fn inc_assessments_written(&self) {
        self.inner().assessments_written.inc();
    }

    pub fn inc_anomalies_detected(&self) {
        self.inner().anomalies_detected.inc();
    }

    pub fn set_health_score(&self, score: f64) {
        self.inner().health_score.set(score);
    }

    /// Anomalies counted since process start
    pub fn anomalies_detected(&self) -> u64 {
        self.inner().anomalies_detected.get()
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<Vec<u8>, prometheus::Error> {
        self.inner();
        let mut body = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut body)?;
        Ok(body)
    }
}

/// Structured logger for pipeline events
///
/// Emits consistent JSON-friendly fields for records, assessments and
/// anomalies so they can be correlated with the stored series.
#[derive(Clone)]
pub struct StructuredLogger {
    host: String,
}

impl StructuredLogger {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn log_startup(&self, version: &str, role: &str) {
        info!(
            event = "process_started",
            host = %self.host,
            version = %version,
            role = %role,
            "netpulse started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "process_shutdown",
            host = %self.host,
            reason = %reason,
            "netpulse shutting down"
        );
    }

    pub fn log_record_written(&self, record: &MetricRecord) {
        info!(
            event = "record_written",
            host = %self.host,
            download_mbps = record.download_speed,
            upload_mbps = record.upload_speed,
            packets_sent = record.packets_sent,
            packets_recv = record.packets_recv,
            latency_ms = ?record.latency,
            "Network metrics saved"
        );
    }

    pub fn log_record_rejected(&self, record: &MetricRecord, reason: &str) {
        warn!(
            event = "record_rejected",
            host = %self.host,
            download_mbps = record.download_speed,
            upload_mbps = record.upload_speed,
            reason = %reason,
            "Dropped invalid measurement (likely counter reset)"
        );
    }

    pub fn log_assessment(&self, analysis: &ServerAnalysis) {
        let period = if analysis.is_peak_hour { "peak" } else { "off_peak" };
        info!(
            event = "assessment_written",
            host = %self.host,
            status = %analysis.health_status,
            score = analysis.health_score,
            period = %period,
            anomaly = analysis.is_anomaly,
            current_upload = analysis.current_upload,
            current_latency = analysis.current_latency,
            "Server analysis recorded"
        );
    }

    pub fn log_anomaly(&self, metric: &str, current: f64, mean: f64, std_dev: f64, sigmas: f64) {
        warn!(
            event = "anomaly_detected",
            host = %self.host,
            metric = %metric,
            current = current,
            mean = mean,
            std_dev = std_dev,
            sigmas = sigmas,
            "Metric deviates from rolling mean"
        );
    }
}
