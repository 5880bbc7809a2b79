//! Analysis windows read back from the store

use crate::error::PipelineError;
use crate::models::MetricRecord;
use crate::store::{with_timeout, MetricStore, RangeQuery, NETWORK_METRICS};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default trailing window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Metrics the analyzer tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedMetric {
    UploadSpeed,
    Latency,
}

impl TrackedMetric {
    pub const ALL: [TrackedMetric; 2] = [TrackedMetric::UploadSpeed, TrackedMetric::Latency];

    /// Field name in `network_metrics`
    pub fn field_name(&self) -> &'static str {
        match self {
            TrackedMetric::UploadSpeed => "upload_speed",
            TrackedMetric::Latency => "latency",
        }
    }

    pub fn value(&self, record: &MetricRecord) -> Option<f64> {
        match self {
            TrackedMetric::UploadSpeed => Some(record.upload_speed),
            TrackedMetric::Latency => record.latency,
        }
    }
}

impl fmt::Display for TrackedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Time-ordered records from the trailing window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisWindow {
    records: Vec<MetricRecord>,
}

impl AnalysisWindow {
    /// Build a window; records are sorted by timestamp
    pub fn new(mut records: Vec<MetricRecord>) -> Self {
        records.sort_by_key(|r| r.timestamp);
        Self { records }
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&MetricRecord> {
        self.records.last()
    }

    /// Non-missing values of `metric`, oldest first
    pub fn values(&self, metric: TrackedMetric) -> Vec<f64> {
        self.records.iter().filter_map(|r| metric.value(r)).collect()
    }
}

/// Reads the trailing window of `network_metrics` from the store
pub struct HistoryReader {
    store: Arc<dyn MetricStore>,
    window: Duration,
    timeout: Duration,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn MetricStore>, window: Duration, timeout: Duration) -> Self {
        Self {
            store,
            window,
            timeout,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Query the store and rebuild the window from scratch
    pub async fn read(&self) -> Result<AnalysisWindow, PipelineError> {
        let query = RangeQuery::new(NETWORK_METRICS, self.window);
        let points = with_timeout(self.timeout, self.store.query_range(&query)).await?;

        let total = points.len();
        let records: Vec<MetricRecord> = points.iter().filter_map(MetricRecord::from_point).collect();
        if records.len() < total {
            debug!(
                skipped = total - records.len(),
                "Ignored points with missing fields"
            );
        }

        Ok(AnalysisWindow::new(records))
    }
}
