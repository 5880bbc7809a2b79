//! Error taxonomy for the sampling and analysis pipeline
//!
//! Every variant is local to a single loop tick. The loops log, count and
//! continue; none of these errors terminates a process.

use thiserror::Error;

/// Failure talking to the backing time-series store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(String),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("malformed store response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Request(err.to_string())
    }
}

/// Per-tick failures of the collector and analyzer pipelines
#[derive(Debug, Error)]
pub enum PipelineError {
    /// OS counter read failed; skip this tick
    #[error("counter sample failed: {0}")]
    TransientSampleFailure(String),

    /// Latency probe timed out or could not connect; latency is recorded as absent
    #[error("latency probe to {target} unavailable: {reason}")]
    ProbeUnavailable { target: String, reason: String },

    /// Physically impossible measurement (e.g. counter reset); the record is dropped
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Analysis window has no usable data; the analyzer tick is skipped
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    /// Write or query against the store failed
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl PipelineError {
    /// Short machine-friendly label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::TransientSampleFailure(_) => "transient_sample_failure",
            PipelineError::ProbeUnavailable { .. } => "probe_unavailable",
            PipelineError::InvalidMeasurement(_) => "invalid_measurement",
            PipelineError::InsufficientHistory(_) => "insufficient_history",
            PipelineError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}
