pub mod connection;
pub mod driver;
pub mod emitter;
pub mod fleet;
pub mod latency;
pub mod reporter;
pub mod transport;

use crate::error::StressError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Capacity of the snapshot channel. One pending snapshot at most; the
/// periodic reporter waits for the consumer instead of piling reports up.
pub const REPORT_CHANNEL_CAPACITY: usize = 1;

/// Capacity of the shared error channel.
pub const ERROR_CHANNEL_CAPACITY: usize = 64;

/// Many-producer handle onto a phase's error channel.
#[derive(Clone, Debug)]
pub struct ErrorSink {
    tx: mpsc::Sender<StressError>,
}

impl ErrorSink {
    pub fn new(tx: mpsc::Sender<StressError>) -> Self {
        Self { tx }
    }

    /// Forward a terminal error. Gives up if `token` is cancelled before the
    /// consumer takes it, so a finished phase never blocks on reporting.
    pub async fn report(&self, token: &CancellationToken, err: StressError) {
        if !err.is_expected() {
            crate::metrics::DRIVER_FAILURES.inc();
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Error report abandoned, phase is over");
            }
            res = self.tx.send(err) => {
                if res.is_err() {
                    debug!("Error consumer is gone");
                }
            }
        }
    }
}
