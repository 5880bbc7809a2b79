//! Time-of-day aware health scoring
//!
//! Upload adequacy contributes up to 40% of the score and latency adequacy
//! up to 60%. Peak hours use a stricter threshold table.

use super::stats::MetricStats;
use crate::models::{HealthAssessment, HealthStatus};
use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Score added when upload meets the optimal cutoff
pub const UPLOAD_OPTIMAL_WEIGHT: f64 = 0.4;
/// Score added when upload only meets the warning cutoff
pub const UPLOAD_WARNING_WEIGHT: f64 = 0.2;
/// Score added when latency is within the optimal cutoff
pub const LATENCY_OPTIMAL_WEIGHT: f64 = 0.6;
/// Score added when latency is only within the warning cutoff
pub const LATENCY_WARNING_WEIGHT: f64 = 0.3;

/// Minimum score for each status
pub const OPTIMAL_SCORE: f64 = 0.8;
pub const GOOD_SCORE: f64 = 0.5;
pub const WARNING_SCORE: f64 = 0.3;

/// Local hours of day with stricter thresholds, end exclusive
pub const DEFAULT_PEAK_HOURS: Range<u32> = 9..18;

/// Cutoffs for one metric in one period
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutoffs {
    pub optimal: f64,
    pub warning: f64,
    pub critical: f64,
}

/// Upload (Mbps, higher is better) and latency (ms, lower is better) cutoffs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodThresholds {
    pub upload: Cutoffs,
    pub latency: Cutoffs,
}

/// Threshold table for peak and off-peak periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    pub peak: PeriodThresholds,
    pub off_peak: PeriodThresholds,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            peak: PeriodThresholds {
                upload: Cutoffs {
                    optimal: 0.75,
                    warning: 0.50,
                    critical: 0.25,
                },
                latency: Cutoffs {
                    optimal: 30.0,
                    warning: 50.0,
                    critical: 100.0,
                },
            },
            off_peak: PeriodThresholds {
                upload: Cutoffs {
                    optimal: 0.85,
                    warning: 0.60,
                    critical: 0.35,
                },
                latency: Cutoffs {
                    optimal: 20.0,
                    warning: 40.0,
                    critical: 80.0,
                },
            },
        }
    }
}

/// Immutable scoring policy, built once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    pub thresholds: ThresholdTable,
    pub peak_hours: Range<u32>,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            peak_hours: DEFAULT_PEAK_HOURS,
        }
    }
}

impl HealthPolicy {
    pub fn is_peak_hour(&self, hour: u32) -> bool {
        self.peak_hours.contains(&hour)
    }

    pub fn thresholds_for(&self, is_peak: bool) -> &PeriodThresholds {
        if is_peak {
            &self.thresholds.peak
        } else {
            &self.thresholds.off_peak
        }
    }
}

/// Map a score to its status
pub fn status_for_score(score: f64) -> HealthStatus {
    if score >= OPTIMAL_SCORE {
        HealthStatus::Optimal
    } else if score >= GOOD_SCORE {
        HealthStatus::Good
    } else if score >= WARNING_SCORE {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    }
}

/// Weighted score for current upload and latency against one period's cutoffs
pub fn weighted_score(upload: f64, latency: f64, thresholds: &PeriodThresholds) -> f64 {
    let mut score = 0.0;

    if upload >= thresholds.upload.optimal {
        score += UPLOAD_OPTIMAL_WEIGHT;
    } else if upload >= thresholds.upload.warning {
        score += UPLOAD_WARNING_WEIGHT;
    }

    if latency <= thresholds.latency.optimal {
        score += LATENCY_OPTIMAL_WEIGHT;
    } else if latency <= thresholds.latency.warning {
        score += LATENCY_WARNING_WEIGHT;
    }

    score
}

/// Classifies server health from current upload and latency
#[derive(Debug, Clone)]
pub struct HealthScorer {
    policy: HealthPolicy,
}

impl HealthScorer {
    pub fn new(policy: HealthPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Score at a given local hour of day
    pub fn score_at_hour(
        &self,
        upload: &MetricStats,
        latency: &MetricStats,
        hour: u32,
        is_anomaly: bool,
    ) -> HealthAssessment {
        let is_peak_hour = self.policy.is_peak_hour(hour);
        let thresholds = self.policy.thresholds_for(is_peak_hour);
        let health_score = weighted_score(upload.current, latency.current, thresholds);

        HealthAssessment {
            status: status_for_score(health_score),
            health_score,
            is_peak_hour,
            is_anomaly,
        }
    }

    /// Score at `now`, using the hour of `now` in its own time zone
    pub fn score<Tz: TimeZone>(
        &self,
        upload: &MetricStats,
        latency: &MetricStats,
        now: &DateTime<Tz>,
        is_anomaly: bool,
    ) -> HealthAssessment {
        self.score_at_hour(upload, latency, now.hour(), is_anomaly)
    }
}

impl Default for HealthScorer {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
