//! Collector loop
//!
//! One tick is `sample → probe → assemble → write`, followed by a sleep that
//! pads the tick out to the configured period. Shutdown is checked only
//! between ticks, so an in-flight tick always completes.

use super::prober::{DEFAULT_PROBE_TARGET, DEFAULT_PROBE_TIMEOUT};
use super::sampler::DEFAULT_SAMPLE_INTERVAL;
use super::writer::DEFAULT_STORE_TIMEOUT;
use super::{CounterSampler, CounterSource, LatencyProber, MetricWriter};
use crate::error::PipelineError;
use crate::health::{components, HealthRegistry};
use crate::models::MetricRecord;
use crate::observability::{PipelineMetrics, StructuredLogger};
use crate::store::MetricStore;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const ROLE: &str = "collector";

/// Configuration for the collector loop
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Wall-clock period of one tick (default: 5 seconds)
    pub period: Duration,
    /// Gap between the two counter reads (default: 1 second)
    pub sample_interval: Duration,
    /// Latency probe endpoint as `host:port`
    pub probe_target: String,
    /// Latency probe connect timeout (default: 2 seconds)
    pub probe_timeout: Duration,
    /// Upper bound on a store write (default: 5 seconds)
    pub store_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(5),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            probe_target: DEFAULT_PROBE_TARGET.to_string(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Sleep needed to pad a tick out to `period`; zero on overrun
pub fn remaining_sleep(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Periodic sampler → prober → writer pipeline
pub struct CollectorLoop {
    sampler: CounterSampler,
    prober: LatencyProber,
    writer: MetricWriter,
    config: CollectorConfig,
    health: HealthRegistry,
    metrics: PipelineMetrics,
    logger: StructuredLogger,
}

impl CollectorLoop {
    pub fn new(
        source: Arc<dyn CounterSource>,
        store: Arc<dyn MetricStore>,
        config: CollectorConfig,
        health: HealthRegistry,
        metrics: PipelineMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            sampler: CounterSampler::new(source, config.sample_interval),
            prober: LatencyProber::new(config.probe_target.clone(), config.probe_timeout),
            writer: MetricWriter::new(store, config.store_timeout),
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
            probe_target = %self.config.probe_target,
            "Starting collector loop"
        );

        let mut delay = Duration::ZERO;
        let mut tick_count = 0u64;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    info!(ticks = tick_count, "Shutting down collector loop");
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
                        "Collector tick complete"
                    );

                    delay = remaining_sleep(self.config.period, elapsed);
                }
            }
        }
    }

    /// Run one collection cycle
    ///
    /// Every failure is handled here (logged, counted, reported to the
    /// health registry); the returned error only says why no record was
    /// written this tick.
    pub async fn tick(&self) -> Result<MetricRecord, PipelineError> {
        let sample_start = Instant::now();
        let sample = match self.sampler.sample().await {
            Ok(sample) => {
                self.metrics
                    .observe_sample_duration(sample_start.elapsed().as_secs_f64());
                self.health.record_success(components::SAMPLER).await;
                sample
            }
            Err(e) => {
                warn!(error = %e, "Counter sample failed, skipping tick");
                self.metrics.inc_sample_failures();
                self.metrics.inc_ticks_skipped(ROLE, e.kind());
                self.health
                    .record_failure(components::SAMPLER, e.to_string())
                    .await;
                return Err(e);
            }
        };

        let latency = match self.prober.probe().await {
            Ok(ms) => {
                self.metrics.observe_probe_latency(ms / 1000.0);
                self.health.record_success(components::PROBER).await;
                Some(ms)
            }
            Err(e) => {
                warn!(error = %e, "Latency probe unavailable, recording without latency");
                self.metrics.inc_probe_failures();
                self.health
                    .record_failure(components::PROBER, e.to_string())
                    .await;
                None
            }
        };

        let record = sample.into_record(latency, Utc::now());

        match self.writer.write(&record).await {
            Ok(written) => {
                self.metrics.inc_records_written();
                self.health.record_success(components::STORE).await;
                self.logger.log_record_written(&written);
                Ok(written)
            }
            Err(e) => {
                match &e {
                    PipelineError::InvalidMeasurement(reason) => {
                        self.metrics.inc_records_rejected();
                        self.logger.log_record_rejected(&record, reason);
                    }
                    other => {
                        warn!(error = %other, "Failed to write network metrics");
                        self.metrics.inc_store_errors("write");
                        self.health
                            .record_failure(components::STORE, other.to_string())
                            .await;
                    }
                }
                self.metrics.inc_ticks_skipped(ROLE, e.kind());
                Err(e)
            }
        }
    }
}

/// Builder for creating the collector loop
pub struct CollectorLoopBuilder {
    source: Option<Arc<dyn CounterSource>>,
    store: Option<Arc<dyn MetricStore>>,
    config: CollectorConfig,
    health: Option<HealthRegistry>,
    metrics: Option<PipelineMetrics>,
    logger: Option<StructuredLogger>,
}

impl CollectorLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            source: None,
            store: None,
            config: CollectorConfig::default(),
            health: None,
            metrics: None,
            logger: None,
        }
    }

    /// Set the counter source
    pub fn source(mut self, source: Arc<dyn CounterSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the metric store
    pub fn store(mut self, store: Arc<dyn MetricStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the tick period
    pub fn period(mut self, period: Duration) -> Self {
        self.config.period = period;
        self
    }

    /// Set the gap between the two counter reads
    pub fn sample_interval(mut self, interval: Duration) -> Self {
        self.config.sample_interval = interval;
        self
    }

    /// Set the latency probe target and timeout
    pub fn probe(mut self, target: impl Into<String>, timeout: Duration) -> Self {
        self.config.probe_target = target.into();
        self.config.probe_timeout = timeout;
        self
    }

    /// Set the store write timeout
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = timeout;
        self
    }

    /// Share a health registry with the API server
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

    /// Build the collector loop
    pub fn build(self) -> Result<CollectorLoop> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Counter source is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Metric store is required"))?;

        if self.config.sample_interval.is_zero() {
            anyhow::bail!("Sample interval must be greater than zero");
        }
        if self.config.period.is_zero() {
            anyhow::bail!("Collection period must be greater than zero");
        }

        Ok(CollectorLoop::new(
            source,
            store,
            self.config,
            self.health.unwrap_or_default(),
            self.metrics.unwrap_or_default(),
            self.logger
                .unwrap_or_else(|| StructuredLogger::new("localhost")),
        ))
    }
}

impl Default for CollectorLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawCounterSnapshot;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;

    struct FixedSource;

    #[async_trait]
    impl CounterSource for FixedSource {
        async fn read(&self) -> Result<RawCounterSnapshot, PipelineError> {
            Ok(RawCounterSnapshot::default())
        }
    }

    #[test]
    fn test_collector_config_default() {
        let config = CollectorConfig::default();
        assert_eq!(config.period, Duration::from_secs(5));
        assert_eq!(config.sample_interval, Duration::from_secs(1));
        assert_eq!(config.probe_target, "8.8.8.8:53");
        assert_eq!(config.probe_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_remaining_sleep() {
        let period = Duration::from_secs(5);
        assert_eq!(
            remaining_sleep(period, Duration::from_millis(1_200)),
            Duration::from_millis(3_800)
        );
        assert_eq!(remaining_sleep(period, Duration::from_secs(7)), Duration::ZERO);
        assert_eq!(remaining_sleep(period, period), Duration::ZERO);
    }

    #[test]
    fn test_builder_requires_source_and_store() {
        let store: Arc<dyn MetricStore> = Arc::new(InMemoryStore::new());
        assert!(CollectorLoopBuilder::new().store(store).build().is_err());

        let source: Arc<dyn CounterSource> = Arc::new(FixedSource);
        assert!(CollectorLoopBuilder::new().source(source).build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_intervals() {
        let result = CollectorLoopBuilder::new()
            .source(Arc::new(FixedSource))
            .store(Arc::new(InMemoryStore::new()))
            .sample_interval(Duration::ZERO)
            .build();
        assert!(result.is_err());

        let result = CollectorLoopBuilder::new()
            .source(Arc::new(FixedSource))
            .store(Arc::new(InMemoryStore::new()))
            .period(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_success() {
        let result = CollectorLoopBuilder::new()
            .source(Arc::new(FixedSource))
            .store(Arc::new(InMemoryStore::new()))
            .period(Duration::from_secs(10))
            .build();
        assert!(result.is_ok());
    }
}
