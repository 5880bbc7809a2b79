//! TCP connect latency probe

use crate::error::PipelineError;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Default probe target: a public DNS resolver
pub const DEFAULT_PROBE_TARGET: &str = "8.8.8.8:53";

/// Default connect timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Measures wall-clock time to establish a TCP connection
#[derive(Debug, Clone)]
pub struct LatencyProber {
    target: String,
    timeout: Duration,
}

impl LatencyProber {
    pub fn new(target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Connect, close, and return the elapsed milliseconds
    pub async fn probe(&self) -> Result<f64, PipelineError> {
        let start = Instant::now();

        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(stream)) => {
                let elapsed = start.elapsed();
                drop(stream);
                Ok(elapsed.as_secs_f64() * 1000.0)
            }
            Ok(Err(e)) => Err(PipelineError::ProbeUnavailable {
                target: self.target.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(PipelineError::ProbeUnavailable {
                target: self.target.clone(),
                reason: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}

impl Default for LatencyProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TARGET, DEFAULT_PROBE_TIMEOUT)
    }
}
