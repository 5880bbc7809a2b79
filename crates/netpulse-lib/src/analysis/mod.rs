//! Network health analysis
//!
//! Reads the trailing window of `network_metrics`, computes rolling
//! statistics for upload speed and latency, flags deviations and scores
//! health against time-of-day thresholds.

pub mod anomaly;
mod r#loop;
pub mod rates;
pub mod scorer;
pub mod stats;
pub mod window;

pub use anomaly::{AnomalyDetector, Deviation, ANOMALY_STD_MULTIPLIER};
pub use r#loop::{AnalyzerConfig, AnalyzerLoop, AnalyzerLoopBuilder};
pub use rates::{derive_packet_rates, packet_rate, PacketRate};
pub use scorer::{HealthPolicy, HealthScorer, PeriodThresholds, ThresholdTable};
pub use stats::MetricStats;
pub use window::{AnalysisWindow, HistoryReader, TrackedMetric, DEFAULT_WINDOW};
