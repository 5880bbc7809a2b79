//! Output formatting utilities

use chrono::{DateTime, Local, Utc};
use clap::ValueEnum;
use colored::Colorize;
use netpulse_lib::models::HealthStatus;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: &[T]) {
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a throughput in megabits per second
pub fn format_mbps(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{:.2} Mbps", mbps)
    } else {
        format!("{:.1} Kbps", mbps * 1000.0)
    }
}

/// Format a latency in milliseconds; `-` when unmeasured
pub fn format_latency(latency_ms: Option<f64>) -> String {
    match latency_ms {
        Some(ms) => format!("{:.1} ms", ms),
        None => "-".to_string(),
    }
}

/// Format a packet rate; `-` when not derivable
pub fn format_rate(per_sec: Option<f64>) -> String {
    match per_sec {
        Some(rate) => format!("{:.1}/s", rate),
        None => "-".to_string(),
    }
}

/// Format a score in [0, 1] as a percentage
pub fn format_score(score: f64) -> String {
    format!("{:.0}%", score * 100.0)
}

/// Format a UTC timestamp in local time
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Color a health status by severity
pub fn color_health(status: HealthStatus) -> String {
    let label = status.as_str();
    match status {
        HealthStatus::Optimal => label.green().to_string(),
        HealthStatus::Good => label.cyan().to_string(),
        HealthStatus::Warning => label.yellow().to_string(),
        HealthStatus::Critical => label.red().bold().to_string(),
    }
}

/// Color a yes/no flag, highlighting `true` when it signals trouble
pub fn color_flag(flag: bool) -> String {
    if flag {
        "yes".red().to_string()
    } else {
        "no".green().to_string()
    }
}
