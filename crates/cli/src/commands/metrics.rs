//! Recent network metrics with derived packet rates

use anyhow::{Context, Result};
use colored::Colorize;
use netpulse_lib::analysis::packet_rate;
use netpulse_lib::models::MetricRecord;
use netpulse_lib::store::{MetricStore, RangeQuery, NETWORK_METRICS};
use serde::Serialize;
use tabled::Tabled;

use super::TimeRange;
use crate::output::{
    format_latency, format_mbps, format_rate, format_timestamp, print_info, print_json,
    print_table, print_warning, OutputFormat,
};

/// One record joined with the rate since its predecessor
#[derive(Debug, Clone, Serialize)]
pub struct MetricEntry {
    #[serde(flatten)]
    pub record: MetricRecord,
    pub packets_sent_per_sec: Option<f64>,
    pub packets_recv_per_sec: Option<f64>,
}

/// Row for the metrics table
#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Download")]
    download: String,
    #[tabled(rename = "Upload")]
    upload: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Sent")]
    sent_rate: String,
    #[tabled(rename = "Recv")]
    recv_rate: String,
    #[tabled(rename = "Errors In/Out")]
    errors: String,
}

impl From<&MetricEntry> for MetricRow {
    fn from(entry: &MetricEntry) -> Self {
        let r = &entry.record;
        Self {
            time: format_timestamp(&r.timestamp),
            download: format_mbps(r.download_speed),
            upload: format_mbps(r.upload_speed),
            latency: format_latency(r.latency),
            sent_rate: format_rate(entry.packets_sent_per_sec),
            recv_rate: format_rate(entry.packets_recv_per_sec),
            errors: format!("{}/{}", r.errors_in, r.errors_out),
        }
    }
}

/// Keep the newest `limit` records and attach the rate since each one's predecessor
///
/// The oldest record in range has no predecessor, and a record sharing its
/// predecessor's timestamp has no elapsed time, so both get empty rates.
pub fn build_entries(records: &[MetricRecord], limit: usize) -> Vec<MetricEntry> {
    let start = records.len().saturating_sub(limit);

    records[start..]
        .iter()
        .enumerate()
        .map(|(offset, record)| {
            let rate = (start + offset)
                .checked_sub(1)
                .and_then(|prev| packet_rate(&records[prev], record));
            MetricEntry {
                record: record.clone(),
                packets_sent_per_sec: rate.and_then(|r| r.packets_sent_per_sec),
                packets_recv_per_sec: rate.and_then(|r| r.packets_recv_per_sec),
            }
        })
        .collect()
}

/// Fetch `network_metrics` over the range in time order
pub async fn fetch_records(store: &dyn MetricStore, range: TimeRange) -> Result<Vec<MetricRecord>> {
    let points = store
        .query_range(&RangeQuery::new(NETWORK_METRICS, range.duration()))
        .await
        .context("Failed to query network metrics")?;

    Ok(points.iter().filter_map(MetricRecord::from_point).collect())
}

/// Show recent network metrics
pub async fn show_metrics(
    store: &dyn MetricStore,
    range: TimeRange,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let records = fetch_records(store, range).await?;
    let total = records.len();
    let entries = build_entries(&records, limit);

    match format {
        OutputFormat::Json => print_json(&entries)?,
        OutputFormat::Table => {
            println!("{} ({})", "Network Metrics".bold(), range.label());
            println!("{}", "=".repeat(60));

            if entries.is_empty() {
                print_warning("No data available for the selected time range");
                return Ok(());
            }

            let rows: Vec<MetricRow> = entries.iter().map(MetricRow::from).collect();
            print_table(&rows);

            if total > entries.len() {
                print_info(&format!(
                    "Showing newest {} of {} records; use --limit to see more",
                    entries.len(),
                    total
                ));
            }
        }
    }

    Ok(())
}
