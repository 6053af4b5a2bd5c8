//! Runs the configured concurrency levels one after another and turns
//! snapshots into human-readable summaries.

use crate::engine::fleet::Fleet;
use crate::engine::reporter::Snapshot;
use crate::engine::transport::Dialer;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vghw_common::PhaseConfig;

/// Run `phases` in order. Stops at the first phase whose fleet died early or
/// once `token` is cancelled. Returns how many phases ran to completion.
pub async fn run_sweep<D: Dialer>(
    token: &CancellationToken,
    fleet: &Fleet<D>,
    phases: &[PhaseConfig],
) -> usize {
    let mut completed = 0;

    for phase in phases {
        if token.is_cancelled() {
            info!("Sweep cancelled");
            break;
        }

        if !fleet.run_phase(token, *phase).await {
            warn!(
                concurrency = phase.concurrency,
                "Aborting sweep, the fleet did not survive the phase"
            );
            break;
        }
        completed += 1;
    }

    completed
}

/// Per-client figures derived from a [`Snapshot`].
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub concurrency: usize,
    pub window: Duration,
    /// Commands sent by one client over the window.
    pub sent_per_client: u64,
    /// Commands per second per client.
    pub send_rate: f64,
    pub updates_per_client: u64,
    pub update_rate: f64,
    pub movement_latency: Duration,
    /// Server update frequency implied by the latency, in ticks per second.
    pub update_frequency: u64,
}

impl Summary {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let clients = snapshot.config.concurrency.max(1) as u64;
        let secs = snapshot.window.as_secs_f64();
        let per_sec = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };

        let sent_per_client = snapshot.counters.commands_sent / clients;
        let updates_per_client = snapshot.counters.updates_received / clients;
        let latency = snapshot.counters.movement_latency;

        let update_frequency = if latency.is_zero() {
            0
        } else {
            (1.0 / latency.as_secs_f64()).round() as u64
        };

        Self {
            concurrency: snapshot.config.concurrency,
            window: snapshot.window,
            sent_per_client,
            send_rate: per_sec(sent_per_client),
            updates_per_client,
            update_rate: per_sec(updates_per_client),
            movement_latency: latency,
            update_frequency,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "report for concurrency={}:", self.concurrency)?;
        writeln!(
            f,
            "  send rate: {}/{:?} ({:.0}/s)",
            self.sent_per_client, self.window, self.send_rate
        )?;
        write!(
            f,
            "  update rate: {}/{:?} ({:.0}/s) ({:?} latency, {} tps)",
            self.updates_per_client,
            self.window,
            self.update_rate,
            self.movement_latency,
            self.update_frequency
        )
    }
}
