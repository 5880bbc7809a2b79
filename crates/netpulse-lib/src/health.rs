//! Per-stage health for the collector and analyzer processes
//!
//! Each loop reports the outcome of its stages (sampling, probing, store
//! access, analysis) after every tick. One failure leaves a stage degraded
//! and [`UNHEALTHY_AFTER_FAILURES`] in a row make it unhealthy; the next
//! success clears the streak. The agent serves the rollup on `/healthz`
//! and `/readyz`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive failures after which a stage is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Stage names reported by the loops
pub mod components {
    pub const SAMPLER: &str = "sampler";
    pub const PROBER: &str = "prober";
    pub const STORE: &str = "store";
    pub const ANALYZER: &str = "analyzer";
}

/// Ordered from best to worst so the rollup is a `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    fn after_failures(streak: u32) -> Self {
        match streak {
            0 => ComponentStatus::Healthy,
            n if n < UNHEALTHY_AFTER_FAILURES => ComponentStatus::Degraded,
            _ => ComponentStatus::Unhealthy,
        }
    }

    /// Degraded stages still produce data
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

/// Health of one pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    /// Error from the most recent failure, cleared on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub consecutive_failures: u32,
    /// When the stage last completed; `None` until it first does
    pub last_success: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    pub fn new() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            last_success: None,
            updated_at: Utc::now(),
        }
    }

    fn succeeded(&mut self) {
        let now = Utc::now();
        self.consecutive_failures = 0;
        self.status = ComponentStatus::Healthy;
        self.message = None;
        self.last_success = Some(now);
        self.updated_at = now;
    }

    fn failed(&mut self, message: String) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.status = ComponentStatus::after_failures(self.consecutive_failures);
        self.message = Some(message);
        self.updated_at = Utc::now();
    }
}

impl Default for ComponentHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Worst status across all stages
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let status = components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        Self { status, components }
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct RegistryState {
    components: BTreeMap<String, ComponentHealth>,
    loop_running: bool,
}

/// Shared between a pipeline loop and the API server; clones share state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a stage as healthy
    pub async fn register(&self, name: &str) {
        self.state
            .write()
            .await
            .components
            .insert(name.to_string(), ComponentHealth::new());
    }

    pub async fn record_success(&self, name: &str) {
        let mut state = self.state.write().await;
        state.components.entry(name.to_string()).or_default().succeeded();
    }

    /// Unregistered stages are tracked from their first failure
    pub async fn record_failure(&self, name: &str, message: impl Into<String>) {
        let mut state = self.state.write().await;
        state
            .components
            .entry(name.to_string())
            .or_default()
            .failed(message.into());
    }

    /// Flipped on once the loop task is spawned and off on shutdown
    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.loop_running = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        HealthResponse::from_components(self.state.read().await.components.clone())
    }

    /// Ready while the loop runs and no stage is unhealthy
    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        if !state.loop_running {
            return ReadinessResponse {
                ready: false,
                reason: Some("pipeline loop not running".to_string()),
            };
        }

        let failing = state
            .components
            .iter()
            .find(|(_, health)| !health.status.is_operational());

        match failing {
            Some((name, health)) => ReadinessResponse {
                ready: false,
                reason: Some(format!(
                    "{} failed {} times in a row",
                    name, health.consecutive_failures
                )),
            },
            None => ReadinessResponse {
                ready: true,
                reason: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_registry_is_healthy() {
        let health = HealthRegistry::new().health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[test]
    fn test_status_follows_failure_streak() {
        assert_eq!(ComponentStatus::after_failures(0), ComponentStatus::Healthy);
        assert_eq!(ComponentStatus::after_failures(1), ComponentStatus::Degraded);
        assert_eq!(
            ComponentStatus::after_failures(UNHEALTHY_AFTER_FAILURES),
            ComponentStatus::Unhealthy
        );
        assert!(ComponentStatus::Degraded > ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_store_failure_degrades_rollup() {
        let registry = HealthRegistry::new();
        registry.register(components::SAMPLER).await;
        registry.register(components::STORE).await;

        registry
            .record_failure(components::STORE, "connection refused")
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        let store = &health.components[components::STORE];
        assert_eq!(store.consecutive_failures, 1);
        assert_eq!(store.message.as_deref(), Some("connection refused"));
        assert_eq!(
            health.components[components::SAMPLER].status,
            ComponentStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_probe_streak_turns_unhealthy_then_recovers() {
        let registry = HealthRegistry::new();
        registry.register(components::PROBER).await;

        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry.record_failure(components::PROBER, "timeout").await;
        }
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);

        registry.record_success(components::PROBER).await;
        let prober = registry.health().await.components[components::PROBER].clone();
        assert_eq!(prober.status, ComponentStatus::Healthy);
        assert_eq!(prober.consecutive_failures, 0);
        assert!(prober.message.is_none());
        assert!(prober.last_success.is_some());
    }

    #[tokio::test]
    async fn test_unregistered_stage_tracked_on_failure() {
        let registry = HealthRegistry::new();
        registry.record_failure(components::ANALYZER, "empty window").await;

        let health = registry.health().await;
        assert_eq!(health.components[components::ANALYZER].last_success, None);
        assert_eq!(health.status, ComponentStatus::Degraded);
    }

    #[tokio::test]
    async fn test_not_ready_until_loop_runs() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_degraded_stage_stays_ready() {
        let registry = HealthRegistry::new();
        registry.register(components::ANALYZER).await;
        registry.set_ready(true).await;
        registry
            .record_failure(components::ANALYZER, "empty window")
            .await;

        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_unhealthy_stage_named_in_reason() {
        let registry = HealthRegistry::new();
        registry.register(components::STORE).await;
        registry.set_ready(true).await;
        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            registry.record_failure(components::STORE, "down").await;
        }

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert!(readiness.reason.unwrap().starts_with("store failed 3"));
    }
}
