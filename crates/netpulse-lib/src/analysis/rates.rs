//! Packet rates derived from consecutive cumulative totals

use crate::models::MetricRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Packets per second between a record and its predecessor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacketRate {
    pub timestamp: DateTime<Utc>,
    /// `None` when the counter went backwards between the two records
    pub packets_sent_per_sec: Option<f64>,
    pub packets_recv_per_sec: Option<f64>,
}

fn per_second(previous: i64, current: i64, elapsed_secs: f64) -> Option<f64> {
    let delta = current.checked_sub(previous)?;
    if delta < 0 {
        return None;
    }
    Some(delta as f64 / elapsed_secs)
}

/// Rate from `previous` to `current`, `None` when no time elapsed between them
pub fn packet_rate(previous: &MetricRecord, current: &MetricRecord) -> Option<PacketRate> {
    let elapsed = (current.timestamp - previous.timestamp).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return None;
    }

    Some(PacketRate {
        timestamp: current.timestamp,
        packets_sent_per_sec: per_second(previous.packets_sent, current.packets_sent, elapsed),
        packets_recv_per_sec: per_second(previous.packets_recv, current.packets_recv, elapsed),
    })
}

/// Rates for each consecutive pair of time-ordered records
///
/// The first record has no predecessor and produces no rate; pairs with no
/// elapsed time are skipped. Gaps in the series simply lower the resolution.
pub fn derive_packet_rates(records: &[MetricRecord]) -> Vec<PacketRate> {
    records
        .windows(2)
        .filter_map(|pair| packet_rate(&pair[0], &pair[1]))
        .collect()
}
