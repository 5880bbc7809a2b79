//! Agent configuration

use anyhow::{bail, Context, Result};
use netpulse_lib::analysis::AnalyzerConfig;
use netpulse_lib::collector::CollectorConfig;
use netpulse_lib::store::InfluxConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `NETPULSE_INFLUX_TOKEN`
pub const ENV_PREFIX: &str = "NETPULSE";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// InfluxDB base URL
    #[serde(default = "default_influx_url")]
    pub influx_url: String,

    /// InfluxDB API token (required)
    #[serde(default)]
    pub influx_token: String,

    /// InfluxDB organization (required)
    #[serde(default)]
    pub influx_org: String,

    /// InfluxDB bucket (required)
    #[serde(default)]
    pub influx_bucket: String,

    /// Host name attached to log events
    #[serde(default = "default_host_name")]
    pub host_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Collector tick period in seconds
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Gap between the two counter reads in seconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_secs: u64,

    /// Latency probe host
    #[serde(default = "default_probe_host")]
    pub probe_host: String,

    /// Latency probe TCP port
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,

    /// Latency probe connect timeout in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Upper bound on each store request in seconds
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,

    /// Analyzer tick period in seconds
    #[serde(default = "default_analysis_interval")]
    pub analysis_interval_secs: u64,

    /// Trailing analysis window in minutes
    #[serde(default = "default_analysis_window")]
    pub analysis_window_minutes: u64,
}

fn default_influx_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_collection_interval() -> u64 {
    5
}

fn default_sample_interval() -> u64 {
    1
}

fn default_probe_host() -> String {
    "8.8.8.8".to_string()
}

fn default_probe_port() -> u16 {
    53
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_store_timeout() -> u64 {
    5
}

fn default_analysis_interval() -> u64 {
    5
}

fn default_analysis_window() -> u64 {
    5
}

impl AgentConfig {
    /// Load configuration from an optional file, then the environment
    ///
    /// Environment variables take precedence over the file.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        Self::from_config(config)
    }

    /// Deserialize and validate an already assembled configuration
    pub fn from_config(config: config::Config) -> Result<Self> {
        let agent: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        agent.validate()?;
        Ok(agent)
    }

    /// Reject missing credentials and zero intervals
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("influx_token", &self.influx_token),
            ("influx_org", &self.influx_org),
            ("influx_bucket", &self.influx_bucket),
        ] {
            if value.trim().is_empty() {
                bail!("{}_{} must be set", ENV_PREFIX, key.to_uppercase());
            }
        }

        for (key, value) in [
            ("collection_interval_secs", self.collection_interval_secs),
            ("sample_interval_secs", self.sample_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("store_timeout_secs", self.store_timeout_secs),
            ("analysis_interval_secs", self.analysis_interval_secs),
            ("analysis_window_minutes", self.analysis_window_minutes),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", key);
            }
        }

        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn influx(&self) -> InfluxConfig {
        InfluxConfig {
            url: self.influx_url.clone(),
            token: self.influx_token.clone(),
            org: self.influx_org.clone(),
            bucket: self.influx_bucket.clone(),
            timeout: self.store_timeout(),
        }
    }

    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            period: Duration::from_secs(self.collection_interval_secs),
            sample_interval: Duration::from_secs(self.sample_interval_secs),
            probe_target: format!("{}:{}", self.probe_host, self.probe_port),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            store_timeout: self.store_timeout(),
        }
    }

    pub fn analyzer(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            period: Duration::from_secs(self.analysis_interval_secs),
            window: Duration::from_secs(self.analysis_window_minutes * 60),
            store_timeout: self.store_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> config::ConfigBuilder<config::builder::DefaultState> {
        config::Config::builder()
            .set_override("influx_token", "secret")
            .unwrap()
            .set_override("influx_org", "netpulse")
            .unwrap()
            .set_override("influx_bucket", "network")
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_config(with_credentials().build().unwrap()).unwrap();

        assert_eq!(config.influx_url, "http://localhost:8086");
        assert_eq!(config.api_port, 8080);

        let collector = config.collector();
        assert_eq!(collector.period, Duration::from_secs(5));
        assert_eq!(collector.sample_interval, Duration::from_secs(1));
        assert_eq!(collector.probe_target, "8.8.8.8:53");
        assert_eq!(collector.probe_timeout, Duration::from_secs(2));

        let analyzer = config.analyzer();
        assert_eq!(analyzer.period, Duration::from_secs(5));
        assert_eq!(analyzer.window, Duration::from_secs(300));
        assert_eq!(analyzer.store_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = AgentConfig::from_config(config::Config::builder().build().unwrap())
            .unwrap_err()
            .to_string();
        assert!(err.contains("NETPULSE_INFLUX_TOKEN"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = with_credentials()
            .set_override("collection_interval_secs", 0)
            .unwrap()
            .build()
            .unwrap();
        assert!(AgentConfig::from_config(config).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let config = with_credentials()
            .set_override("probe_host", "1.1.1.1")
            .unwrap()
            .set_override("probe_port", 443)
            .unwrap()
            .set_override("analysis_window_minutes", 15)
            .unwrap()
            .build()
            .unwrap();
        let config = AgentConfig::from_config(config).unwrap();

        assert_eq!(config.collector().probe_target, "1.1.1.1:443");
        assert_eq!(config.analyzer().window, Duration::from_secs(900));
        assert_eq!(config.influx().bucket, "network");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(
            &path,
            "influx_token = \"t\"\ninflux_org = \"o\"\ninflux_bucket = \"b\"\napi_port = 9100\n",
        )
        .unwrap();

        let config = AgentConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api_port, 9100);
        assert_eq!(config.influx().org, "o");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AgentConfig::load(Some(Path::new("/nonexistent/agent.toml"))).is_err());
    }
}
