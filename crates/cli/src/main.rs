//! Netpulse CLI
//!
//! Read-only terminal reports over the `network_metrics` and
//! `server_analysis` series written by the netpulse agent.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{metrics, status, TimeRange};
use netpulse_lib::store::InfluxStore;

/// Netpulse CLI
#[derive(Parser)]
#[command(name = "netpulse")]
#[command(author, version, about = "Reports for netpulse network telemetry", long_about = None)]
pub struct Cli {
    /// InfluxDB URL (can also be set via NETPULSE_INFLUX_URL env var)
    #[arg(long, env = "NETPULSE_INFLUX_URL")]
    pub influx_url: Option<String>,

    /// InfluxDB API token
    #[arg(long, env = "NETPULSE_INFLUX_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// InfluxDB organization
    #[arg(long, env = "NETPULSE_INFLUX_ORG")]
    pub org: Option<String>,

    /// InfluxDB bucket
    #[arg(long, env = "NETPULSE_INFLUX_BUCKET")]
    pub bucket: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show recent network metrics with packet rates
    Metrics {
        /// Time range to query
        #[arg(long, short, value_enum, default_value = "1h")]
        range: TimeRange,

        /// Maximum number of rows, newest last
        #[arg(long, short, default_value_t = 20)]
        limit: usize,
    },

    /// Show the latest server health assessment
    Status {
        /// Time range for the status distribution
        #[arg(long, short, value_enum, default_value = "1h")]
        range: TimeRange,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = config::Config::load()?;
    let influx = file_config.resolve(config::ConnectionArgs {
        influx_url: cli.influx_url,
        influx_token: cli.token,
        influx_org: cli.org,
        influx_bucket: cli.bucket,
    })?;

    let store = InfluxStore::new(influx).context("Failed to create InfluxDB client")?;

    match cli.command {
        Commands::Metrics { range, limit } => {
            metrics::show_metrics(&store, range, limit, cli.format).await?;
        }
        Commands::Status { range } => {
            status::show_status(&store, range, cli.format).await?;
        }
    }

    Ok(())
}
