//! Interface counters through `sysinfo`, for hosts without `/proc/net/dev`

use super::CounterSource;
use crate::error::PipelineError;
use crate::models::RawCounterSnapshot;
use async_trait::async_trait;
use sysinfo::Networks;
use tokio::sync::Mutex;

/// Counter source backed by the platform network APIs
pub struct SysinfoSource {
    networks: Mutex<Networks>,
    excluded: Vec<String>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Networks::new_with_refreshed_list()),
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

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Sum per-interface totals, skipping excluded names
///
/// Fails when no interface remains, matching the `/proc/net/dev` reader.
pub fn sum_interfaces<'a, I>(
    interfaces: I,
    excluded: &[String],
) -> Result<RawCounterSnapshot, PipelineError>
where
    I: IntoIterator<Item = (&'a str, RawCounterSnapshot)>,
{
    let mut total = RawCounterSnapshot::default();
    let mut counted = 0usize;

    for (name, counters) in interfaces {
        if excluded.iter().any(|e| e == name) {
            continue;
        }
        total.bytes_sent = total.bytes_sent.saturating_add(counters.bytes_sent);
        total.bytes_recv = total.bytes_recv.saturating_add(counters.bytes_recv);
        total.packets_sent = total.packets_sent.saturating_add(counters.packets_sent);
        total.packets_recv = total.packets_recv.saturating_add(counters.packets_recv);
        total.errors_in = total.errors_in.saturating_add(counters.errors_in);
        total.errors_out = total.errors_out.saturating_add(counters.errors_out);
        counted += 1;
    }

    if counted == 0 {
        return Err(PipelineError::TransientSampleFailure(
            "no interface counters found".to_string(),
        ));
    }
    Ok(total)
}

#[async_trait]
impl CounterSource for SysinfoSource {
    async fn read(&self) -> Result<RawCounterSnapshot, PipelineError> {
        let mut networks = self.networks.lock().await;
        networks.refresh_list();

        let interfaces = (&*networks).into_iter().map(|(name, data)| {
            (
                name.as_str(),
                RawCounterSnapshot {
                    bytes_sent: data.total_transmitted(),
                    bytes_recv: data.total_received(),
                    packets_sent: data.total_packets_transmitted(),
                    packets_recv: data.total_packets_received(),
                    errors_in: data.total_errors_on_received(),
                    errors_out: data.total_errors_on_transmitted(),
                },
            )
        });
        sum_interfaces(interfaces, &self.excluded)
    }
}
