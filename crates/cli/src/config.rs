//! Configuration management for the CLI
//!
//! Connection defaults live in `~/.config/netpulse/config.json`; flags and
//! `NETPULSE_*` environment variables take precedence.

use anyhow::{Context, Result};
use netpulse_lib::store::InfluxConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// InfluxDB base URL
    pub influx_url: Option<String>,
    /// InfluxDB API token
    pub influx_token: Option<String>,
    /// InfluxDB organization
    pub influx_org: Option<String>,
    /// InfluxDB bucket
    pub influx_bucket: Option<String>,
}

/// Connection values given on the command line or via the environment
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub influx_url: Option<String>,
    pub influx_token: Option<String>,
    pub influx_org: Option<String>,
    pub influx_bucket: Option<String>,
}

impl Config {
    /// Load configuration from the default location; empty if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file; empty if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("netpulse").join("config.json"))
    }

    /// Merge explicit arguments over the file values
    pub fn resolve(&self, args: ConnectionArgs) -> Result<InfluxConfig> {
        fn pick(arg: Option<String>, file: &Option<String>, name: &str) -> Result<String> {
            arg.or_else(|| file.clone())
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("No InfluxDB {} configured (flag, env or config file)", name))
        }

        Ok(InfluxConfig {
            url: args
                .influx_url
                .or_else(|| self.influx_url.clone())
                .unwrap_or_else(|| DEFAULT_INFLUX_URL.to_string()),
            token: pick(args.influx_token, &self.influx_token, "token")?,
            org: pick(args.influx_org, &self.influx_org, "organization")?,
            bucket: pick(args.influx_bucket, &self.influx_bucket, "bucket")?,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}
