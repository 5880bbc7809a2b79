//! In-memory store used in tests and local dry runs

use super::{MetricStore, Point, RangeQuery};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Vec-backed store that keeps every point it is given
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    points: Arc<RwLock<Vec<Point>>>,
    fail_writes: Arc<AtomicBool>,
    fail_queries: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail with a request error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent queries fail with a request error
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Insert a point directly, bypassing failure injection
    pub async fn insert(&self, point: Point) {
        self.points.write().await.push(point);
    }

    /// All points of one series in insertion order
    pub async fn points(&self, series: &str) -> Vec<Point> {
        self.points
            .read()
            .await
            .iter()
            .filter(|p| p.series == series)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }
}

#[async_trait]
impl MetricStore for InMemoryStore {
    async fn write_point(&self, point: &Point) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Request("injected write failure".to_string()));
        }
        self.points.write().await.push(point.clone());
        Ok(())
    }

    async fn query_range(&self, query: &RangeQuery) -> Result<Vec<Point>, StoreError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Request("injected query failure".to_string()));
        }

        let lookback = chrono::Duration::from_std(query.lookback)
            .map_err(|e| StoreError::Request(format!("invalid lookback: {}", e)))?;
        let start = Utc::now() - lookback;

        let mut matched: Vec<Point> = self
            .points
            .read()
            .await
            .iter()
            .filter(|p| p.series == query.series && p.timestamp >= start)
            .cloned()
            .collect();
        matched.sort_by_key(|p| p.timestamp);

        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NETWORK_METRICS, SERVER_ANALYSIS};
    use std::time::Duration;

    #[tokio::test]
    async fn test_query_filters_series_and_range() {
        let store = InMemoryStore::new();
        let now = Utc::now();

        store
            .insert(Point::new(NETWORK_METRICS, now - chrono::Duration::minutes(10)))
            .await;
        store
            .insert(Point::new(NETWORK_METRICS, now - chrono::Duration::seconds(10)))
            .await;
        store
            .insert(Point::new(NETWORK_METRICS, now - chrono::Duration::seconds(30)))
            .await;
        store.insert(Point::new(SERVER_ANALYSIS, now)).await;

        let points = store
            .query_range(&RangeQuery::new(NETWORK_METRICS, Duration::from_secs(300)))
            .await
            .unwrap();

        assert_eq!(points.len(), 2);
        assert!(points[0].timestamp < points[1].timestamp);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        store.set_fail_queries(true);

        let point = Point::new(NETWORK_METRICS, Utc::now());
        assert!(store.write_point(&point).await.is_err());
        assert!(store
            .query_range(&RangeQuery::new(NETWORK_METRICS, Duration::from_secs(60)))
            .await
            .is_err());
        assert!(store.is_empty().await);
    }
}
