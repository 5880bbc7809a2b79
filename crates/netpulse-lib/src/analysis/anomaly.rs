//! Standard-deviation anomaly rule

use super::stats::MetricStats;
use super::window::TrackedMetric;

/// A metric is anomalous when it sits more than this many standard
/// deviations from its rolling mean
pub const ANOMALY_STD_MULTIPLIER: f64 = 2.0;

/// Details of a flagged deviation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deviation {
    pub metric: TrackedMetric,
    pub current: f64,
    pub mean: f64,
    pub std_dev: f64,
    /// Distance from the mean in standard deviations; infinite when std is 0
    pub sigmas: f64,
}

/// Flags values far from the rolling mean
#[derive(Debug, Clone, Copy)]
pub struct AnomalyDetector {
    pub std_dev_multiplier: f64,
}

impl AnomalyDetector {
    pub fn new(std_dev_multiplier: f64) -> Self {
        Self { std_dev_multiplier }
    }

    /// `|current - mean| > k * std`
    ///
    /// With a constant window (std 0) any deviation is anomalous; equality
    /// never is.
    pub fn is_anomalous(&self, stats: &MetricStats) -> bool {
        (stats.current - stats.avg_window).abs() > self.std_dev_multiplier * stats.std_window
    }

    /// Deviation details when `stats` is anomalous
    pub fn detect(&self, metric: TrackedMetric, stats: &MetricStats) -> Option<Deviation> {
        if !self.is_anomalous(stats) {
            return None;
        }

        let distance = (stats.current - stats.avg_window).abs();
        let sigmas = if stats.std_window > 0.0 {
            distance / stats.std_window
        } else {
            f64::INFINITY
        };

        Some(Deviation {
            metric,
            current: stats.current,
            mean: stats.avg_window,
            std_dev: stats.std_window,
            sigmas,
        })
    }

    /// Deviations across all tracked metrics; the tick is anomalous if any
    pub fn detect_all(&self, stats: &[(TrackedMetric, MetricStats)]) -> Vec<Deviation> {
        stats
            .iter()
            .filter_map(|(metric, s)| self.detect(*metric, s))
            .collect()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(ANOMALY_STD_MULTIPLIER)
    }
}
