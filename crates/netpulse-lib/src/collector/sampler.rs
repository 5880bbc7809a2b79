//! Counter sampling and rate derivation

use super::CounterSource;
use crate::error::PipelineError;
use crate::models::{MetricRecord, RawCounterSnapshot};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

const BITS_PER_BYTE: f64 = 8.0;
const BITS_PER_MEGABIT: f64 = 1_000_000.0;

/// Default gap between the two counter reads
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Throughput derived from two snapshots taken `interval` apart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    pub upload_mbps: f64,
    pub download_mbps: f64,
    /// Totals from the second snapshot, not deltas
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

/// Megabits per second between two cumulative byte counters
///
/// A counter that went backwards yields a negative rate; it is not clamped.
pub fn rate_mbps(first: u64, second: u64, interval_secs: f64) -> f64 {
    let delta = (i128::from(second) - i128::from(first)) as f64;
    delta * BITS_PER_BYTE / BITS_PER_MEGABIT / interval_secs
}

impl ThroughputSample {
    pub fn from_snapshots(
        first: &RawCounterSnapshot,
        second: &RawCounterSnapshot,
        interval: Duration,
    ) -> Result<Self, PipelineError> {
        let secs = interval.as_secs_f64();
        if secs <= 0.0 {
            return Err(PipelineError::InvalidMeasurement(
                "sampling interval must be positive".to_string(),
            ));
        }

        Ok(Self {
            upload_mbps: rate_mbps(first.bytes_sent, second.bytes_sent, secs),
            download_mbps: rate_mbps(first.bytes_recv, second.bytes_recv, secs),
            packets_sent: second.packets_sent,
            packets_recv: second.packets_recv,
            errors_in: second.errors_in,
            errors_out: second.errors_out,
        })
    }

    /// Assemble the record persisted for this tick
    pub fn into_record(self, latency: Option<f64>, timestamp: DateTime<Utc>) -> MetricRecord {
        MetricRecord {
            timestamp,
            download_speed: self.download_mbps,
            upload_speed: self.upload_mbps,
            packets_sent: saturating_i64(self.packets_sent),
            packets_recv: saturating_i64(self.packets_recv),
            errors_in: saturating_i64(self.errors_in),
            errors_out: saturating_i64(self.errors_out),
            latency,
        }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Reads counters twice, `interval` apart, and derives rates
pub struct CounterSampler {
    source: Arc<dyn CounterSource>,
    interval: Duration,
}

impl CounterSampler {
    pub fn new(source: Arc<dyn CounterSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take one throughput sample; blocks for the sampling interval
    pub async fn sample(&self) -> Result<ThroughputSample, PipelineError> {
        let first = self.source.read().await?;
        tokio::time::sleep(self.interval).await;
        let second = self.source.read().await?;

        ThroughputSample::from_snapshots(&first, &second, self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bytes_sent: u64, bytes_recv: u64) -> RawCounterSnapshot {
        RawCounterSnapshot {
            bytes_sent,
            bytes_recv,
            packets_sent: 10,
            packets_recv: 20,
            errors_in: 1,
            errors_out: 2,
        }
    }

    #[test]
    fn test_rate_formula() {
        // 1_000_000 bytes in one second = 8 Mbps
        assert!((rate_mbps(0, 1_000_000, 1.0) - 8.0).abs() < 1e-12);
        // same delta over two seconds halves the rate
        assert!((rate_mbps(500, 1_000_500, 2.0) - 4.0).abs() < 1e-12);
        assert_eq!(rate_mbps(42, 42, 1.0), 0.0);
    }

    #[test]
    fn test_non_decreasing_counters_give_non_negative_rates() {
        let pairs = [(0u64, 0u64), (1, 2), (1_000, 1_000_000), (u64::MAX - 1, u64::MAX)];
        for (a, b) in pairs {
            for interval in [0.5, 1.0, 3.0] {
                let rate = rate_mbps(a, b, interval);
                assert!(rate >= 0.0, "rate for {}->{} was {}", a, b, rate);
                let expected = (b - a) as f64 * 8.0 / 1_000_000.0 / interval;
                assert!((rate - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_counter_reset_passes_negative_rate_through() {
        let sample = ThroughputSample::from_snapshots(
            &snapshot(5_000_000, 9_000_000),
            &snapshot(100, 200),
            Duration::from_secs(1),
        )
        .unwrap();

        assert!(sample.upload_mbps < 0.0);
        assert!(sample.download_mbps < 0.0);
    }

    #[test]
    fn test_totals_come_from_second_snapshot() {
        let mut second = snapshot(2_000, 4_000);
        second.packets_sent = 99;
        second.errors_out = 7;

        let sample =
            ThroughputSample::from_snapshots(&snapshot(1_000, 1_000), &second, Duration::from_secs(1))
                .unwrap();

        assert_eq!(sample.packets_sent, 99);
        assert_eq!(sample.errors_out, 7);
        assert_eq!(sample.packets_recv, 20);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let err = ThroughputSample::from_snapshots(&snapshot(0, 0), &snapshot(1, 1), Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMeasurement(_)));
    }

    #[test]
    fn test_into_record_saturates_huge_totals() {
        let sample = ThroughputSample {
            upload_mbps: 1.0,
            download_mbps: 2.0,
            packets_sent: u64::MAX,
            packets_recv: 5,
            errors_in: 0,
            errors_out: 0,
        };
        let record = sample.into_record(None, Utc::now());
        assert_eq!(record.packets_sent, i64::MAX);
        assert_eq!(record.packets_recv, 5);
        assert_eq!(record.download_speed, 2.0);
        assert!(record.latency.is_none());
    }
}
