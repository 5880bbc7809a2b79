//! Network telemetry sampling and health analysis
//!
//! This crate provides the core functionality for:
//! - Sampling interface counters and TCP connect latency
//! - Persisting metric records to a time-series store
//! - Rolling statistics and anomaly detection over recent history
//! - Time-of-day aware health scoring
//! - Health checks and observability

pub mod analysis;
pub mod collector;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod store;

pub use error::{PipelineError, StoreError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{PipelineMetrics, StructuredLogger};
