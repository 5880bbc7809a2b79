//! Rolling statistics over an analysis window
//!
//! Recomputed from scratch on every tick with the two-pass algorithm; nothing
//! is carried between windows.

use super::window::{AnalysisWindow, TrackedMetric};
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Current value, mean and sample standard deviation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub current: f64,
    pub avg_window: f64,
    /// Bessel-corrected (N-1); 0 when fewer than two values
    pub std_window: f64,
    pub count: usize,
}

impl MetricStats {
    /// Statistics over `values` (oldest first); `None` when empty
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let current = *values.last()?;
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;

        let std_dev = if count > 1 {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        Some(Self {
            current,
            avg_window: mean,
            std_window: std_dev,
            count,
        })
    }

    /// Statistics for `metric` over a window
    ///
    /// `current` is taken from the newest record that carries the metric, so
    /// a failed latency probe on the last tick does not void the window.
    pub fn compute(window: &AnalysisWindow, metric: TrackedMetric) -> Result<Self, PipelineError> {
        if window.is_empty() {
            return Err(PipelineError::InsufficientHistory(
                "analysis window is empty".to_string(),
            ));
        }

        Self::from_values(&window.values(metric)).ok_or_else(|| {
            PipelineError::InsufficientHistory(format!("no {} values in window", metric))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricRecord;
    use chrono::Utc;

    fn window(uploads: &[f64], latencies: &[Option<f64>]) -> AnalysisWindow {
        let now = Utc::now();
        let records = uploads
            .iter()
            .zip(latencies.iter())
            .enumerate()
            .map(|(i, (upload, latency))| MetricRecord {
                timestamp: now + chrono::Duration::seconds(i as i64 * 5),
                download_speed: 1.0,
                upload_speed: *upload,
                packets_sent: 0,
                packets_recv: 0,
                errors_in: 0,
                errors_out: 0,
                latency: *latency,
            })
            .collect();
        AnalysisWindow::new(records)
    }

    #[test]
    fn test_known_values() {
        let stats = MetricStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.current, 9.0);
        assert!((stats.avg_window - 5.0).abs() < 1e-12);
        // population std is 2; sample std is sqrt(32/7)
        assert!((stats.std_window - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(stats.count, 8);
    }

    #[test]
    fn test_single_value_has_zero_std() {
        let stats = MetricStats::from_values(&[3.5]).unwrap();
        assert_eq!(stats.current, 3.5);
        assert_eq!(stats.avg_window, 3.5);
        assert_eq!(stats.std_window, 0.0);
    }

    #[test]
    fn test_empty_window_is_insufficient() {
        let empty = AnalysisWindow::default();
        let err = MetricStats::compute(&empty, TrackedMetric::UploadSpeed).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientHistory(_)));
    }

    #[test]
    fn test_missing_latency_values_are_skipped() {
        let w = window(&[1.0, 2.0, 3.0], &[Some(10.0), Some(30.0), None]);
        let stats = MetricStats::compute(&w, TrackedMetric::Latency).unwrap();

        assert_eq!(stats.count, 2);
        assert_eq!(stats.current, 30.0);
        assert!((stats.avg_window - 20.0).abs() < 1e-12);

        let upload = MetricStats::compute(&w, TrackedMetric::UploadSpeed).unwrap();
        assert_eq!(upload.current, 3.0);
        assert_eq!(upload.count, 3);
    }

    #[test]
    fn test_metric_without_values_is_insufficient() {
        let w = window(&[1.0, 2.0], &[None, None]);
        assert!(matches!(
            MetricStats::compute(&w, TrackedMetric::Latency),
            Err(PipelineError::InsufficientHistory(_))
        ));
    }
}
