use crate::engine::driver::{dial_and_run, PhaseContext};
use crate::engine::reporter::{Reporter, Snapshot};
use crate::engine::transport::Dialer;
use crate::engine::ErrorSink;
use crate::error::StressError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use vghw_common::PhaseConfig;

/// Runs timed phases of concurrent drivers against one target.
pub struct Fleet<D> {
    dialer: Arc<D>,
    reports: mpsc::Sender<Snapshot>,
    errors: ErrorSink,
}

impl<D: Dialer> Fleet<D> {
    pub fn new(
        dialer: Arc<D>,
        reports: mpsc::Sender<Snapshot>,
        errors: mpsc::Sender<StressError>,
    ) -> Self {
        Self {
            dialer,
            reports,
            errors: ErrorSink::new(errors),
        }
    }

    /// Run `config.concurrency` drivers for `config.duration`.
    ///
    /// Returns `true` when the duration elapsed and the sweep may move on to
    /// the next level, `false` when every driver died before that (or `parent`
    /// was cancelled). Either way all drivers and emitters have exited by the
    /// time this returns.
    pub async fn run_phase(&self, parent: &CancellationToken, config: PhaseConfig) -> bool {
        info!(
            concurrency = config.concurrency,
            level = config.level,
            duration = ?config.duration,
            "Starting phase"
        );

        let phase = parent.child_token();
        let reporter = Arc::new(Reporter::new(config));
        let periodic = reporter.start_periodic(phase.clone(), self.reports.clone());

        let tracker = TaskTracker::new();
        let ctx = PhaseContext {
            reporter: Arc::clone(&reporter),
            errors: self.errors.clone(),
            tracker: tracker.clone(),
            phase: phase.clone(),
        };

        for id in 0..config.concurrency {
            tracker.spawn(dial_and_run(id, Arc::clone(&self.dialer), ctx.clone()));
        }
        tracker.close();
        drop(ctx);

        let proceed = tokio::select! {
            biased;
            _ = tracker.wait() => {
                warn!(concurrency = config.concurrency, "All drivers exited before the phase ended");
                false
            }
            _ = sleep(config.duration) => {
                debug!(concurrency = config.concurrency, "Phase duration elapsed");
                true
            }
        };

        phase.cancel();
        tracker.wait().await;

        match periodic {
            Some(periodic) => periodic.wait().await,
            None => self.emit_final(parent, &reporter, config).await,
        }

        info!(concurrency = config.concurrency, proceed, "Phase finished");
        proceed
    }

    /// Without periodic reports the phase ends with one snapshot spanning its
    /// whole configured duration.
    async fn emit_final(&self, parent: &CancellationToken, reporter: &Reporter, config: PhaseConfig) {
        let mut snapshot = reporter.reset_and_get();
        snapshot.window = config.duration;

        tokio::select! {
            biased;
            res = self.reports.send(snapshot) => {
                if res.is_err() {
                    debug!("Report consumer is gone, dropping final report");
                }
            }
            _ = parent.cancelled() => {
                debug!("Final report abandoned");
            }
        }
    }
}
