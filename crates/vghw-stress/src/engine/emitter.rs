//! Fixed-rate command spam over a shared connection.

use crate::engine::connection::Connection;
use crate::engine::transport::Transport;
use crate::engine::ErrorSink;
use crate::protocol::Command;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

/// 60 Hz, the rate a real client reports player movement at.
pub const MOVE_TICK: Duration = Duration::from_nanos(1_000_000_000 / 60);

/// Stops a running emitter. Cancelling is idempotent, and the handle also
/// reports stopped once the emitter ended on its own after a failed send.
#[derive(Debug, Clone)]
pub struct EmitterHandle {
    token: CancellationToken,
}

impl EmitterHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawn a loop that sends `next()` over `conn` once per `tick`, the first one
/// immediately. The loop stops on the first failed send or as soon as
/// `parent` or the returned handle is cancelled.
pub fn spawn_emitter<T, F>(
    tracker: &TaskTracker,
    parent: &CancellationToken,
    conn: Arc<Connection<T>>,
    tick: Duration,
    errors: ErrorSink,
    mut next: F,
) -> EmitterHandle
where
    T: Transport,
    F: FnMut() -> Command + Send + 'static,
{
    let token = parent.child_token();
    let handle = EmitterHandle {
        token: token.clone(),
    };

    tracker.spawn(async move {
        let _stop = token.clone().drop_guard();

        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let cmd = next();
            let res = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                res = conn.send_command(&cmd) => res,
            };

            if let Err(e) = res {
                debug!(error = %e, command = cmd.command_type(), "Emitter send failed");
                errors.report(&token, e).await;
                break;
            }
        }
    });

    handle
}
