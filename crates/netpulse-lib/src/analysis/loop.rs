//! Analyzer loop
//!
//! Each tick reads the trailing window, computes per-metric statistics,
//! applies the anomaly rule, scores health and writes one
//! `server_analysis` point. Ticks without usable history write nothing.
//! The loop sleeps a full period after each tick.

use super::anomaly::AnomalyDetector;
use super::scorer::{HealthPolicy, HealthScorer};
use super::stats::MetricStats;
use super::window::{HistoryReader, TrackedMetric, DEFAULT_WINDOW};
use crate::error::PipelineError;
use crate::health::{components, HealthRegistry};
use crate::models::ServerAnalysis;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::store::{with_timeout, MetricStore};
use anyhow::Result;
use chrono::{Local, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const ROLE: &str = "analyzer";

/// Configuration for the analyzer loop
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Wall-clock period of one tick (default: 5 seconds)
    pub period: Duration,
    /// Trailing window of records to analyze (default: 5 minutes)
    pub window: Duration,
    /// Upper bound on each store query/write (default: 5 seconds)
    pub store_timeout: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            window: DEFAULT_WINDOW,
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Periodic history → stats → anomaly → health pipeline
pub struct AnalyzerLoop {
    reader: HistoryReader,
    store: Arc<dyn MetricStore>,
    detector: AnomalyDetector,
    scorer: HealthScorer,
    config: AnalyzerConfig,
    health: HealthRegistry,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl AnalyzerLoop {
    pub fn new(
        store: Arc<dyn MetricStore>,
        policy: HealthPolicy,
        config: AnalyzerConfig,
        health: HealthRegistry,
        metrics: PipelineMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            reader: HistoryReader::new(store.clone(), config.window, config.store_timeout),
            store,
            detector: AnomalyDetector::default(),
            scorer: HealthScorer::new(policy),
            config,
            health,
            metrics,
            logger,
        }
    }

    /// Run until a shutdown message arrives
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            period_secs = self.config.period.as_secs_f64(),
            window_secs = self.reader.window().as_secs(),
            "Starting analyzer loop"
        );

        let mut delay = Duration::ZERO;
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!(ticks = tick_count, "Shutting down analyzer loop");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    let start = Instant::now();
                    let outcome = self.tick().await;
                    let elapsed = start.elapsed();
                    tick_count += 1;

                    debug!(
                        tick = tick_count,
                        written = outcome.is_ok(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Analyzer tick complete"
                    );

                    delay = self.config.period;
                }
            }
        }
    }

    /// Run one analysis cycle and persist the assessment
    pub async fn tick(&self) -> Result<ServerAnalysis, PipelineError> {
        let outcome = self.analyze().await;

        let analysis = match outcome {
            Ok(analysis) => analysis,
            Err(e) => {
                self.report_skip(&e, "query").await;
                return Err(e);
            }
        };

        let point = analysis.to_point();
        match with_timeout(self.config.store_timeout, self.store.write_point(&point)).await {
            Ok(()) => {
                self.metrics.inc_assessments_written();
                if analysis.is_anomaly {
                    self.metrics.inc_anomalies_detected();
                }
                self.metrics.set_health_score(analysis.health_score);
                self.health.record_success(components::STORE).await;
                self.health.record_success(components::ANALYZER).await;
                self.logger.log_assessment(&analysis);
                Ok(analysis)
            }
            Err(e) => {
                let e = PipelineError::from(e);
                self.report_skip(&e, "write").await;
                Err(e)
            }
        }
    }

    /// Compute the assessment for the current window without persisting it
    pub async fn analyze(&self) -> Result<ServerAnalysis, PipelineError> {
        let window = self.reader.read().await?;

        let upload = MetricStats::compute(&window, TrackedMetric::UploadSpeed)?;
        let latency = MetricStats::compute(&window, TrackedMetric::Latency)?;

        let deviations = self.detector.detect_all(&[
            (TrackedMetric::UploadSpeed, upload),
            (TrackedMetric::Latency, latency),
        ]);
        for deviation in &deviations {
            self.logger.log_anomaly(
                deviation.metric.field_name(),
                deviation.current,
                deviation.mean,
                deviation.std_dev,
                deviation.sigmas,
            );
        }
        let is_anomaly = !deviations.is_empty();

        let assessment = self
            .scorer
            .score(&upload, &latency, &Local::now(), is_anomaly);

        Ok(ServerAnalysis {
            timestamp: Utc::now(),
            current_upload: upload.current,
            current_latency: latency.current,
            avg_upload_5min: upload.avg_window,
            avg_latency_5min: latency.avg_window,
            health_status: assessment.status,
            health_score: assessment.health_score,
            is_anomaly: assessment.is_anomaly,
            is_peak_hour: assessment.is_peak_hour,
        })
    }

    async fn report_skip(&self, error: &PipelineError, operation: &str) {
        self.metrics.inc_ticks_skipped(ROLE, error.kind());
        match error {
            // the query succeeded; an empty window leaves analyzer health alone
            PipelineError::InsufficientHistory(reason) => {
                warn!(reason = %reason, "No recent data available, skipping analysis");
                self.health.record_success(components::STORE).await;
            }
            other => {
                warn!(error = %other, operation = %operation, "Store unavailable during analysis");
                self.metrics.inc_store_errors(operation);
                self.health
                    .record_failure(components::STORE, other.to_string())
                    .await;
            }
        }
    }
}

/// Builder for creating the analyzer loop
pub struct AnalyzerLoopBuilder {
    store: Option<Arc<dyn MetricStore>>,
    policy: HealthPolicy,
    config: AnalyzerConfig,
    health: Option<HealthRegistry>,
    metrics: Option<PipelineMetrics>,
    logger: Option<StructuredLogger>,
}

impl AnalyzerLoopBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            policy: HealthPolicy::default(),
            config: AnalyzerConfig::default(),
            health: None,
            metrics: None,
            logger: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn MetricStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the scoring policy (threshold tables and peak hours)
    pub fn policy(mut self, policy: HealthPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.config.window = window;
        self
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = timeout;
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<AnalyzerLoop> {
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Metric store is required"))?;

        if self.config.period.is_zero() {
            anyhow::bail!("Analysis period must be greater than zero");
        }
        if self.config.window.is_zero() {
            anyhow::bail!("Analysis window must be greater than zero");
        }

        Ok(AnalyzerLoop::new(
            store,
            self.policy,
            self.config,
            self.health.unwrap_or_default(),
            self.metrics.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("localhost")),
        ))
    }
}

impl Default for AnalyzerLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
