//! Latest health assessment and its distribution over a range

use anyhow::{Context, Result};
use colored::Colorize;
use netpulse_lib::models::{HealthStatus, ServerAnalysis};
use netpulse_lib::store::{MetricStore, RangeQuery, SERVER_ANALYSIS};
use serde::Serialize;
use tabled::Tabled;

use super::TimeRange;
use crate::output::{
    color_flag, color_health, format_latency, format_mbps, format_score, format_timestamp,
    print_json, print_table, print_warning, OutputFormat,
};

const STATUSES: [HealthStatus; 4] = [
    HealthStatus::Optimal,
    HealthStatus::Good,
    HealthStatus::Warning,
    HealthStatus::Critical,
];

/// How often each status occurred
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusCount {
    pub status: HealthStatus,
    pub count: usize,
}

/// Latest assessment plus a summary of the range
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub latest: ServerAnalysis,
    pub assessments: usize,
    pub anomalies: usize,
    pub distribution: Vec<StatusCount>,
}

/// Row for the status distribution table
#[derive(Tabled)]
struct DistributionRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Count")]
    count: usize,
    #[tabled(rename = "Share")]
    share: String,
}

/// Summarize time-ordered assessments; `None` when there are none
pub fn summarize(analyses: Vec<ServerAnalysis>) -> Option<StatusReport> {
    let assessments = analyses.len();
    let anomalies = analyses.iter().filter(|a| a.is_anomaly).count();
    let distribution = STATUSES
        .iter()
        .map(|status| StatusCount {
            status: *status,
            count: analyses.iter().filter(|a| a.health_status == *status).count(),
        })
        .collect();

    let latest = analyses.into_iter().last()?;

    Some(StatusReport {
        latest,
        assessments,
        anomalies,
        distribution,
    })
}

/// Fetch `server_analysis` over the range in time order
pub async fn fetch_analyses(
    store: &dyn MetricStore,
    range: TimeRange,
) -> Result<Vec<ServerAnalysis>> {
    let points = store
        .query_range(&RangeQuery::new(SERVER_ANALYSIS, range.duration()))
        .await
        .context("Failed to query server analysis")?;

    Ok(points.iter().filter_map(ServerAnalysis::from_point).collect())
}

/// Show the latest health assessment
pub async fn show_status(store: &dyn MetricStore, range: TimeRange, format: OutputFormat) -> Result<()> {
    let report = summarize(fetch_analyses(store, range).await?);

    let Some(report) = report else {
        print_warning(&format!(
            "No health assessments in the {}; is the analyzer running?",
            range.label()
        ));
        return Ok(());
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let latest = &report.latest;
            let period = if latest.is_peak_hour { "peak" } else { "off-peak" };

            println!("{}", "Server Health".bold());
            println!("{}", "=".repeat(50));
            println!("Assessed:               {}", format_timestamp(&latest.timestamp));
            println!("Status:                 {}", color_health(latest.health_status));
            println!("Score:                  {}", format_score(latest.health_score));
            println!("Period:                 {}", period.cyan());
            println!("Anomaly:                {}", color_flag(latest.is_anomaly));
            println!();

            println!("{}", "Current vs 5-minute average".bold());
            println!("{}", "-".repeat(50));
            println!(
                "Upload:                 {} (avg {})",
                format_mbps(latest.current_upload),
                format_mbps(latest.avg_upload_5min)
            );
            println!(
                "Latency:                {} (avg {})",
                format_latency(Some(latest.current_latency)),
                format_latency(Some(latest.avg_latency_5min))
            );
            println!();

            println!("{} ({})", "Status distribution".bold(), range.label());
            let rows: Vec<DistributionRow> = report
                .distribution
                .iter()
                .map(|c| DistributionRow {
                    status: color_health(c.status),
                    count: c.count,
                    share: format!(
                        "{:.0}%",
                        c.count as f64 * 100.0 / report.assessments as f64
                    ),
                })
                .collect();
            print_table(&rows);
            println!(
                "\nTotal: {} assessments, {} anomalous",
                report.assessments, report.anomalies
            );
        }
    }

    Ok(())
}
