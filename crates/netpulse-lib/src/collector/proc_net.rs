//! Interface counters from `/proc/net/dev`
//!
//! Sums the receive/transmit columns across interfaces:
//! - bytes, packets and errs for receive (columns 0, 1, 2)
//! - bytes, packets and errs for transmit (columns 8, 9, 10)

use super::CounterSource;
use crate::error::PipelineError;
use crate::models::RawCounterSnapshot;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Number of numeric columns on each interface line
const NET_DEV_COLUMNS: usize = 16;

/// Counter source reading the Linux `/proc/net/dev` table
pub struct ProcNetDevSource {
    path: PathBuf,
    excluded: Vec<String>,
}

impl ProcNetDevSource {
    pub fn new() -> Self {
        Self::with_path("/proc/net/dev")
    }

    /// Create a source reading a custom path (for testing)
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            excluded: Vec::new(),
        }
    }

    /// Leave the named interfaces out of the aggregate
    pub fn exclude_interfaces<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded = names.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for ProcNetDevSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterSource for ProcNetDevSource {
    async fn read(&self) -> Result<RawCounterSnapshot, PipelineError> {
        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            PipelineError::TransientSampleFailure(format!(
                "failed to read {}: {}",
                self.path.display(),
                e
            ))
        })?;

        parse_net_dev(&content, &self.excluded)
    }
}

/// Parse `/proc/net/dev` content into an aggregate snapshot
///
/// Format after two header lines: `  eth0: 12345 678 0 0 0 0 0 0 9876 543 0 0 0 0 0 0`
pub fn parse_net_dev(content: &str, excluded: &[String]) -> Result<RawCounterSnapshot, PipelineError> {
    let mut snapshot = RawCounterSnapshot::default();
    let mut interfaces = 0usize;

    for line in content.lines().skip(2) {
        let Some((name, stats)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if excluded.iter().any(|e| e == name) {
            continue;
        }

        let values: Vec<u64> = stats
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if values.len() < NET_DEV_COLUMNS {
            continue;
        }

        snapshot.bytes_recv = snapshot.bytes_recv.saturating_add(values[0]);
        snapshot.packets_recv = snapshot.packets_recv.saturating_add(values[1]);
        snapshot.errors_in = snapshot.errors_in.saturating_add(values[2]);
        snapshot.bytes_sent = snapshot.bytes_sent.saturating_add(values[8]);
        snapshot.packets_sent = snapshot.packets_sent.saturating_add(values[9]);
        snapshot.errors_out = snapshot.errors_out.saturating_add(values[10]);
        interfaces += 1;
    }

    if interfaces == 0 {
        return Err(PipelineError::TransientSampleFailure(
            "no interface counters found".to_string(),
        ));
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:    1000      10    0    0    0     0          0         0     1000      10    0    0    0     0       0          0
  eth0: 5000000    4000    2    0    0     0          0         0  2500000    3000    1    0    0     0       0          0
";

    #[test]
    fn test_parse_sums_interfaces() {
        let snapshot = parse_net_dev(NET_DEV, &[]).unwrap();
        assert_eq!(snapshot.bytes_recv, 5_001_000);
        assert_eq!(snapshot.bytes_sent, 2_501_000);
        assert_eq!(snapshot.packets_recv, 4_010);
        assert_eq!(snapshot.packets_sent, 3_010);
        assert_eq!(snapshot.errors_in, 2);
        assert_eq!(snapshot.errors_out, 1);
    }

    #[test]
    fn test_parse_excludes_interfaces() {
        let snapshot = parse_net_dev(NET_DEV, &["lo".to_string()]).unwrap();
        assert_eq!(snapshot.bytes_recv, 5_000_000);
        assert_eq!(snapshot.packets_sent, 3_000);
    }

    #[test]
    fn test_parse_without_interfaces_fails() {
        let header_only: String = NET_DEV.lines().take(2).collect::<Vec<_>>().join("\n");
        let err = parse_net_dev(&header_only, &[]).unwrap_err();
        assert!(matches!(err, PipelineError::TransientSampleFailure(_)));
    }

    #[tokio::test]
    async fn test_read_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dev");
        std::fs::write(&path, NET_DEV).unwrap();

        let source = ProcNetDevSource::with_path(&path).exclude_interfaces(["lo"]);
        let snapshot = source.read().await.unwrap();
        assert_eq!(snapshot.bytes_sent, 2_500_000);
        assert_eq!(snapshot.errors_in, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_transient_failure() {
        let source = ProcNetDevSource::with_path("/nonexistent/net/dev");
        let err = source.read().await.unwrap_err();
        assert!(matches!(err, PipelineError::TransientSampleFailure(_)));
    }
}
