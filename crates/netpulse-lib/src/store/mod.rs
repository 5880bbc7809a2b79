//! Time-series store interface
//!
//! Both loops talk to the store only through [`MetricStore`], which is
//! injected as a trait object. [`InfluxStore`] speaks the InfluxDB v2 HTTP
//! API; [`InMemoryStore`] is a drop-in fake for tests.

mod influx;
mod memory;

pub use influx::{InfluxConfig, InfluxStore};
pub use memory::InMemoryStore;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Series written by the collector
pub const NETWORK_METRICS: &str = "network_metrics";

/// Series written by the analyzer
pub const SERVER_ANALYSIS: &str = "server_analysis";

/// A single typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    String(String),
    Boolean(bool),
}

impl FieldValue {
    /// Numeric view of the value; integers widen to f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Integer view of the value; floats are accepted only when integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

/// A timestamped point in a named series
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub series: String,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(series: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            series: series.into(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    /// Add a field (builder style)
    pub fn field(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Add a field only when a value is present
    pub fn optional_field(self, name: &str, value: Option<impl Into<FieldValue>>) -> Self {
        match value {
            Some(v) => self.field(name, v),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
}

/// Range query over the trailing `lookback` of one series
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub series: String,
    pub lookback: Duration,
}

impl RangeQuery {
    pub fn new(series: impl Into<String>, lookback: Duration) -> Self {
        Self {
            series: series.into(),
            lookback,
        }
    }
}

/// Point sink and range-query source backing both pipelines
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Append one point
    async fn write_point(&self, point: &Point) -> Result<(), StoreError>;

    /// Points of `query.series` newer than `now - query.lookback`, oldest first
    async fn query_range(&self, query: &RangeQuery) -> Result<Vec<Point>, StoreError>;
}

/// Run a store future with an upper bound on its duration
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_builder_skips_absent_fields() {
        let point = Point::new(NETWORK_METRICS, Utc::now())
            .field("upload_speed", 1.5)
            .optional_field("latency", None::<f64>);

        assert_eq!(point.fields.len(), 1);
        assert_eq!(point.get("upload_speed"), Some(&FieldValue::Float(1.5)));
        assert!(point.get("latency").is_none());
    }

    #[test]
    fn test_field_value_views() {
        assert_eq!(FieldValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(FieldValue::Float(3.0).as_i64(), Some(3));
        assert_eq!(FieldValue::Float(3.5).as_i64(), None);
        assert_eq!(FieldValue::from("good").as_str(), Some("good"));
        assert_eq!(FieldValue::Boolean(true).as_f64(), None);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<(), StoreError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
