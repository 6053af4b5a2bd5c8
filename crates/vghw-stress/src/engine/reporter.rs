//! Per-phase statistics shared by every driver of a phase.
//!
//! Counters live behind a single mutex and are only reachable through
//! [`Reporter::mutate`] and [`Reporter::reset_and_get`]. Each reset closes
//! the current reporting window and opens a fresh one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vghw_common::PhaseConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// `MOVE` commands produced by the movement emitters.
    pub commands_sent: u64,
    /// `ENTITY_MOVE` events received.
    pub updates_received: u64,
    /// Rolling average gap between entity updates, as last reported by any
    /// driver.
    pub movement_latency: Duration,
}

/// Totals of one closed reporting window.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub config: PhaseConfig,
    /// How long the window was open.
    pub window: Duration,
    /// Wall-clock time at which the window was opened.
    pub captured_at: SystemTime,
    pub counters: Counters,
}

struct Window {
    opened: Instant,
    captured_at: SystemTime,
    counters: Counters,
}

impl Window {
    fn open(opened: Instant) -> Self {
        Self {
            opened,
            captured_at: SystemTime::now(),
            counters: Counters::default(),
        }
    }
}

pub struct Reporter {
    config: PhaseConfig,
    window: Mutex<Window>,
}

impl Reporter {
    pub fn new(config: PhaseConfig) -> Self {
        Self {
            config,
            window: Mutex::new(Window::open(Instant::now())),
        }
    }

    pub fn config(&self) -> &PhaseConfig {
        &self.config
    }

    /// Apply a read-modify-write to the live counters under the lock.
    pub fn mutate<F>(&self, f: F)
    where
        F: FnOnce(&mut Counters),
    {
        f(&mut self.lock().counters);
    }

    /// Close the current window and return its totals, replacing it with a
    /// zeroed one that starts now.
    pub fn reset_and_get(&self) -> Snapshot {
        let now = Instant::now();
        let closed = std::mem::replace(&mut *self.lock(), Window::open(now));

        Snapshot {
            config: self.config,
            window: now.saturating_duration_since(closed.opened),
            captured_at: closed.captured_at,
            counters: closed.counters,
        }
    }

    /// Emit a snapshot into `dst` every `report_interval` until `token` is
    /// cancelled. Returns `None` when the phase has periodic reports disabled.
    ///
    /// Handing a snapshot over waits for the consumer, so a slow consumer
    /// delays reports rather than losing them. Cancellation always wins over a
    /// pending handoff.
    pub fn start_periodic(
        self: &Arc<Self>,
        token: CancellationToken,
        dst: mpsc::Sender<Snapshot>,
    ) -> Option<PeriodicReports> {
        let period = self.config.report_interval;
        if period.is_zero() {
            return None;
        }

        let reporter = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let snapshot = reporter.reset_and_get();
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    res = dst.send(snapshot) => {
                        if res.is_err() {
                            debug!("Report consumer is gone, stopping periodic reports");
                            break;
                        }
                    }
                }
            }
        });

        Some(PeriodicReports { handle })
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        // Plain integers; a poisoned lock still holds usable counters.
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background task started by [`Reporter::start_periodic`].
pub struct PeriodicReports {
    handle: JoinHandle<()>,
}

impl PeriodicReports {
    /// Wait for the emitter to exit. Its token must be cancelled first.
    pub async fn wait(self) {
        if let Err(e) = self.handle.await {
            debug!(error = %e, "Periodic report task ended abnormally");
        }
    }
}
