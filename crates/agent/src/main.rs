//! Netpulse agent - network telemetry collector and health analyzer
//!
//! Runs one role per process: `collect` samples interface counters and
//! probe latency into `network_metrics`, `analyze` scores recent history
//! into `server_analysis`. Both serve `/healthz`, `/readyz` and `/metrics`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netpulse_agent::{api, config::AgentConfig};
use netpulse_lib::{
    analysis::{AnalyzerLoopBuilder, HealthPolicy},
    collector::{platform_counter_source, CollectorLoopBuilder},
    health::{components, HealthRegistry},
    observability::{PipelineMetrics, StructuredLogger},
    store::{InfluxStore, MetricStore},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "netpulse-agent")]
#[command(about = "Network telemetry collector and health analyzer", long_about = None)]
#[command(version)]
struct Cli {
    /// Optional configuration file; NETPULSE_* environment variables override it
    #[arg(short, long, env = "NETPULSE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Clone, Copy)]
enum Role {
    /// Sample interface counters and latency into network_metrics
    Collect,
    /// Score recent network_metrics into server_analysis
    Analyze,
}

impl Role {
    fn name(&self) -> &'static str {
        match self {
            Role::Collect => "collector",
            Role::Analyze => "analyzer",
        }
    }

    fn components(&self) -> &'static [&'static str] {
        match self {
            Role::Collect => &[components::SAMPLER, components::PROBER, components::STORE],
            Role::Analyze => &[components::ANALYZER, components::STORE],
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let cli = Cli::parse();
    let role = cli.role;

    info!(role = role.name(), "Starting netpulse-agent");

    // Configuration errors are fatal
    let config = AgentConfig::load(cli.config.as_deref())?;
    info!(
        host = %config.host_name,
        influx_url = %config.influx_url,
        bucket = %config.influx_bucket,
        "Agent configured"
    );

    let store: Arc<dyn MetricStore> = Arc::new(
        InfluxStore::new(config.influx()).context("Failed to create InfluxDB client")?,
    );

    let health_registry = HealthRegistry::new();
    for component in role.components() {
        health_registry.register(component).await;
    }

    let metrics = PipelineMetrics::new();
    let logger = StructuredLogger::new(&config.host_name);
    logger.log_startup(AGENT_VERSION, role.name());

    let app_state = Arc::new(
        api::AppState::new(health_registry.clone(), metrics.clone()).with_role(role.name()),
    );
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "API server stopped");
        }
    });

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let loop_handle = match role {
        Role::Collect => {
            let collector = CollectorLoopBuilder::new()
                .source(platform_counter_source())
                .store(store)
                .config(config.collector())
                .health(health_registry.clone())
                .metrics(metrics.clone())
                .logger(logger.clone())
                .build()?;
            tokio::spawn(collector.run(shutdown_rx))
        }
        Role::Analyze => {
            let analyzer = AnalyzerLoopBuilder::new()
                .store(store)
                .policy(HealthPolicy::default())
                .config(config.analyzer())
                .health(health_registry.clone())
                .metrics(metrics.clone())
                .logger(logger.clone())
                .build()?;
            tokio::spawn(analyzer.run(shutdown_rx))
        }
    };

    health_registry.set_ready(true).await;

    let reason = shutdown_signal().await?;
    logger.log_shutdown(reason);
    health_registry.set_ready(false).await;

    // The loop finishes its in-flight tick before exiting
    let _ = shutdown_tx.send(());
    loop_handle.await.context("Pipeline task panicked")?;

    info!("Shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                res?;
                Ok("SIGINT received")
            }
            _ = terminate.recv() => Ok("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT received")
    }
}
