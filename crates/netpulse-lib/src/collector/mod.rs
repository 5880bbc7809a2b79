//! Network telemetry collection
//!
//! This module turns cumulative OS interface counters into per-interval
//! throughput, measures TCP connect latency, and persists one validated
//! `network_metrics` record per collector tick.

mod r#loop;
mod proc_net;
mod prober;
mod sampler;
mod sysinfo_source;
mod writer;


pub use proc_net::{parse_net_dev, ProcNetDevSource};
pub use prober::LatencyProber;
pub use r#loop::{remaining_sleep, CollectorConfig, CollectorLoop, CollectorLoopBuilder};
pub use sampler::{rate_mbps, CounterSampler, ThroughputSample};
pub use sysinfo_source::{sum_interfaces, SysinfoSource};
pub use writer::{validate_record, MetricWriter};

use crate::error::PipelineError;
use crate::models::RawCounterSnapshot;
use std::sync::Arc;

pub use async_trait::async_trait;

/// Source of cumulative interface counters
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Read the current cumulative counters
    async fn read(&self) -> Result<RawCounterSnapshot, PipelineError>;
}

/// Counter source for the current platform
///
/// Linux reads `/proc/net/dev` directly; other hosts go through `sysinfo`.
pub fn platform_counter_source() -> Arc<dyn CounterSource> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcNetDevSource::new())
    } else {
        Arc::new(SysinfoSource::new())
    }
}
