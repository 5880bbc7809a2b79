//! Validated writes to the `network_metrics` series

use crate::error::PipelineError;
use crate::models::MetricRecord;
use crate::store::{with_timeout, MetricStore};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Default upper bound on a single store write
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reject physically impossible records
///
/// Negative speeds show up when an interface counter resets between the two
/// reads of a sample. This is the only place they are filtered.
pub fn validate_record(record: &MetricRecord) -> Result<(), PipelineError> {
    if !(record.download_speed.is_finite() && record.download_speed >= 0.0) {
        return Err(PipelineError::InvalidMeasurement(format!(
            "download_speed {} is negative or not finite",
            record.download_speed
        )));
    }
    if !(record.upload_speed.is_finite() && record.upload_speed >= 0.0) {
        return Err(PipelineError::InvalidMeasurement(format!(
            "upload_speed {} is negative or not finite",
            record.upload_speed
        )));
    }
    if record.packets_sent < 0 || record.packets_recv < 0 {
        return Err(PipelineError::InvalidMeasurement(format!(
            "negative packet totals (sent={}, recv={})",
            record.packets_sent, record.packets_recv
        )));
    }
    Ok(())
}

/// Persists metric records after validation
pub struct MetricWriter {
    store: Arc<dyn MetricStore>,
    timeout: Duration,
}

impl MetricWriter {
    pub fn new(store: Arc<dyn MetricStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Validate, stamp with the write time, and append to the store
    ///
    /// Returns the record exactly as persisted.
    pub async fn write(&self, record: &MetricRecord) -> Result<MetricRecord, PipelineError> {
        validate_record(record)?;

        let mut stamped = record.clone();
        stamped.timestamp = Utc::now();

        with_timeout(self.timeout, self.store.write_point(&stamped.to_point())).await?;
        Ok(stamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, NETWORK_METRICS};

    fn record(download: f64, upload: f64) -> MetricRecord {
        MetricRecord {
            timestamp: Utc::now() - chrono::Duration::seconds(30),
            download_speed: download,
            upload_speed: upload,
            packets_sent: 10,
            packets_recv: 10,
            errors_in: 0,
            errors_out: 0,
            latency: Some(20.0),
        }
    }

    #[test]
    fn test_validate_accepts_zero_rates() {
        assert!(validate_record(&record(0.0, 0.0)).is_ok());
    }

    #[test]
    fn test_validate_rejects_impossible_values() {
        assert!(validate_record(&record(-0.1, 1.0)).is_err());
        assert!(validate_record(&record(1.0, -12.0)).is_err());
        assert!(validate_record(&record(f64::NAN, 1.0)).is_err());
        assert!(validate_record(&record(1.0, f64::INFINITY)).is_err());

        let mut negative_packets = record(1.0, 1.0);
        negative_packets.packets_recv = -1;
        assert!(validate_record(&negative_packets).is_err());
    }

    #[tokio::test]
    async fn test_write_stamps_at_write_time() {
        let store = Arc::new(InMemoryStore::new());
        let writer = MetricWriter::new(store.clone(), DEFAULT_STORE_TIMEOUT);

        let original = record(3.0, 1.0);
        let before = Utc::now();
        let written = writer.write(&original).await.unwrap();

        assert!(written.timestamp >= before);
        assert_eq!(written.upload_speed, original.upload_speed);

        let points = store.points(NETWORK_METRICS).await;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].timestamp, written.timestamp);
    }

    #[tokio::test]
    async fn test_rejected_record_is_not_persisted() {
        let store = Arc::new(InMemoryStore::new());
        let writer = MetricWriter::new(store.clone(), DEFAULT_STORE_TIMEOUT);

        let err = writer.write(&record(-5.0, 1.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidMeasurement(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_failure_maps_to_store_unavailable() {
        let store = Arc::new(InMemoryStore::new());
        store.set_fail_writes(true);
        let writer = MetricWriter::new(store, DEFAULT_STORE_TIMEOUT);

        let err = writer.write(&record(1.0, 1.0)).await.unwrap_err();
        assert!(matches!(err, PipelineError::StoreUnavailable(_)));
    }
}
