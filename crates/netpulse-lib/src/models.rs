//! Core data models for the sampling and analysis pipelines

use crate::store::{Point, NETWORK_METRICS, SERVER_ANALYSIS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cumulative interface counters read from the OS at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCounterSnapshot {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub packets_sent: u64,
    pub packets_recv: u64,
    pub errors_in: u64,
    pub errors_out: u64,
}

/// One network measurement as persisted in `network_metrics`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    /// Megabits per second
    pub download_speed: f64,
    /// Megabits per second
    pub upload_speed: f64,
    pub packets_sent: i64,
    pub packets_recv: i64,
    pub errors_in: i64,
    pub errors_out: i64,
    /// TCP connect latency in milliseconds; `None` when the probe failed
    pub latency: Option<f64>,
}

impl MetricRecord {
    /// Convert into a `network_metrics` point; absent latency is omitted
    pub fn to_point(&self) -> Point {
        Point::new(NETWORK_METRICS, self.timestamp)
            .field("download_speed", self.download_speed)
            .field("upload_speed", self.upload_speed)
            .field("packets_sent", self.packets_sent)
            .field("packets_recv", self.packets_recv)
            .field("errors_in", self.errors_in)
            .field("errors_out", self.errors_out)
            .optional_field("latency", self.latency)
    }

    /// Rebuild a record from a stored point
    ///
    /// Returns `None` when a required field is missing or mistyped.
    pub fn from_point(point: &Point) -> Option<Self> {
        Some(Self {
            timestamp: point.timestamp,
            download_speed: point.get("download_speed")?.as_f64()?,
            upload_speed: point.get("upload_speed")?.as_f64()?,
            packets_sent: point.get("packets_sent")?.as_i64()?,
            packets_recv: point.get("packets_recv")?.as_i64()?,
            errors_in: point.get("errors_in")?.as_i64()?,
            errors_out: point.get("errors_out")?.as_i64()?,
            latency: point.get("latency").and_then(|v| v.as_f64()),
        })
    }
}

/// Four-level server health classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Optimal,
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Optimal => "optimal",
            HealthStatus::Good => "good",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "optimal" => Ok(HealthStatus::Optimal),
            "good" => Ok(HealthStatus::Good),
            "warning" => Ok(HealthStatus::Warning),
            "critical" => Ok(HealthStatus::Critical),
            other => Err(format!("unknown health status: {}", other)),
        }
    }
}

/// Result of scoring one analysis window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub status: HealthStatus,
    /// Weighted score in [0.0, 1.0]
    pub health_score: f64,
    pub is_peak_hour: bool,
    pub is_anomaly: bool,
}

/// Assessment plus the statistics it was computed from, as persisted in
/// `server_analysis`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerAnalysis {
    pub timestamp: DateTime<Utc>,
    pub current_upload: f64,
    pub current_latency: f64,
    pub avg_upload_5min: f64,
    pub avg_latency_5min: f64,
    pub health_status: HealthStatus,
    pub health_score: f64,
    pub is_anomaly: bool,
    pub is_peak_hour: bool,
}

impl ServerAnalysis {
    /// Booleans are stored as 0/1 integers
    pub fn to_point(&self) -> Point {
        Point::new(SERVER_ANALYSIS, self.timestamp)
            .field("current_upload", self.current_upload)
            .field("current_latency", self.current_latency)
            .field("avg_upload_5min", self.avg_upload_5min)
            .field("avg_latency_5min", self.avg_latency_5min)
            .field("health_status", self.health_status.as_str())
            .field("health_score", self.health_score)
            .field("is_anomaly", i64::from(self.is_anomaly))
            .field("is_peak_hour", i64::from(self.is_peak_hour))
    }

    pub fn from_point(point: &Point) -> Option<Self> {
        Some(Self {
            timestamp: point.timestamp,
            current_upload: point.get("current_upload")?.as_f64()?,
            current_latency: point.get("current_latency")?.as_f64()?,
            avg_upload_5min: point.get("avg_upload_5min")?.as_f64()?,
            avg_latency_5min: point.get("avg_latency_5min")?.as_f64()?,
            health_status: point.get("health_status")?.as_str()?.parse().ok()?,
            health_score: point.get("health_score")?.as_f64()?,
            is_anomaly: point.get("is_anomaly")?.as_i64()? != 0,
            is_peak_hour: point.get("is_peak_hour")?.as_i64()? != 0,
        })
    }
}
