//! Report commands

pub mod metrics;
pub mod status;

use clap::ValueEnum;
use std::time::Duration;

/// Lookback ranges offered by the reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TimeRange {
    #[default]
    #[value(name = "1h")]
    LastHour,
    #[value(name = "6h")]
    Last6Hours,
    #[value(name = "24h")]
    LastDay,
    #[value(name = "7d")]
    LastWeek,
}

impl TimeRange {
    pub fn duration(&self) -> Duration {
        let hours = match self {
            TimeRange::LastHour => 1,
            TimeRange::Last6Hours => 6,
            TimeRange::LastDay => 24,
            TimeRange::LastWeek => 7 * 24,
        };
        Duration::from_secs(hours * 3600)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::LastHour => "last hour",
            TimeRange::Last6Hours => "last 6 hours",
            TimeRange::LastDay => "last 24 hours",
            TimeRange::LastWeek => "last 7 days",
        }
    }
}
