//! One simulated client.
//!
//! A driver reacts to the server's events in arrival order:
//!
//! | Event            | Reaction                                          |
//! |------------------|---------------------------------------------------|
//! | `HELLO`          | send `JOIN` for the configured level              |
//! | `WARNING`        | report it and disconnect                          |
//! | `LEVEL_JOINED`   | start spamming `MOVE` along [`MOVEMENT_PATH`]     |
//! | `LEVEL_FINISHED` | stop every movement emitter                       |
//! | `ENTITY_MOVE`    | count the update and refresh the latency average  |
//!
//! Anything else is ignored. State is owned by the driver's own task, only the
//! phase [`Reporter`] is shared.

use crate::engine::connection::Connection;
use crate::engine::emitter::{spawn_emitter, EmitterHandle, MOVE_TICK};
use crate::engine::latency::LatencyWindow;
use crate::engine::reporter::Reporter;
use crate::engine::transport::{Dialer, Transport};
use crate::engine::ErrorSink;
use crate::error::StressError;
use crate::metrics;
use crate::protocol::{Command, Event, Vector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

pub static ACTIVE_DRIVERS: AtomicUsize = AtomicUsize::new(0);

/// Back-and-forth walk along the x axis, replayed forever.
pub static MOVEMENT_PATH: [Vector; 7] = [
    Vector::new(10.0, 10.0),
    Vector::new(12.0, 10.0),
    Vector::new(14.0, 10.0),
    Vector::new(16.0, 10.0),
    Vector::new(14.0, 10.0),
    Vector::new(12.0, 10.0),
    Vector::new(10.0, 10.0),
];

struct DriverGuard;

impl DriverGuard {
    fn new() -> Self {
        ACTIVE_DRIVERS.fetch_add(1, Ordering::SeqCst);
        Self
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        ACTIVE_DRIVERS.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What every driver of a phase shares.
#[derive(Clone)]
pub struct PhaseContext {
    pub reporter: Arc<Reporter>,
    pub errors: ErrorSink,
    /// Tracks drivers and their emitters so the phase can wait for all of them.
    pub tracker: TaskTracker,
    pub phase: CancellationToken,
}

pub struct Driver<T> {
    id: usize,
    conn: Arc<Connection<T>>,
    ctx: PhaseContext,
    token: CancellationToken,
    latency: LatencyWindow,
    emitters: Vec<EmitterHandle>,
}

impl<T: Transport> Driver<T> {
    pub fn new(id: usize, conn: Connection<T>, ctx: PhaseContext) -> Self {
        let token = ctx.phase.child_token();
        Self {
            id,
            conn: Arc::new(conn),
            ctx,
            token,
            latency: LatencyWindow::new(),
            emitters: Vec::new(),
        }
    }

    /// Number of movement emitters still running.
    pub fn active_emitters(&self) -> usize {
        self.emitters.iter().filter(|e| !e.is_stopped()).count()
    }

    /// Process events until the connection closes, the phase is cancelled, or
    /// a terminal error occurs. Terminal errors go to the phase error channel.
    pub async fn run(mut self) {
        let _guard = DriverGuard::new();

        let result = self.event_loop().await;

        self.token.cancel();
        self.emitters.clear();
        self.conn.close().await;

        match result {
            Ok(()) => debug!(driver = self.id, "Driver finished"),
            Err(e) => {
                warn!(driver = self.id, error = %e, "Driver terminated");
                self.ctx.errors.report(&self.ctx.phase, e).await;
            }
        }
    }

    async fn event_loop(&mut self) -> Result<(), StressError> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Ok(()),
                event = self.conn.next_event() => event?,
            };

            match event {
                Some(event) => self.handle_event(event).await?,
                None => return Ok(()),
            }
        }
    }

    /// React to a single event. An error means the driver must stop.
    pub async fn handle_event(&mut self, event: Event) -> Result<(), StressError> {
        match event {
            Event::Hello { username, .. } => {
                debug!(driver = self.id, %username, "Greeted by server");
                let join = Command::Join {
                    level: self.ctx.reporter.config().level,
                };
                self.send(&join).await?;
            }
            Event::Warning { message } => return Err(StressError::Warning(message)),
            Event::EntityMove { .. } => {
                let latency = self.latency.observe(Instant::now());
                self.ctx.reporter.mutate(|c| {
                    c.updates_received += 1;
                    c.movement_latency = latency;
                });
                metrics::UPDATES_RECEIVED.inc();
            }
            Event::LevelJoined { level, .. } => {
                debug!(driver = self.id, level, "Level joined, starting movement");
                self.start_moving();
            }
            Event::LevelFinished {
                level,
                won,
                elapsed,
            } => {
                debug!(driver = self.id, level, won, ?elapsed, "Level finished");
                self.stop_moving();
            }
            Event::PersonalScore(_) | Event::LeaderboardUpdate(_) => {}
        }
        Ok(())
    }

    async fn send(&self, cmd: &Command) -> Result<(), StressError> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Ok(()),
            res = self.conn.send_command(cmd) => res,
        }
    }

    fn start_moving(&mut self) {
        // One movement loop per driver; a second join replaces the first.
        self.stop_moving();

        let reporter = Arc::clone(&self.ctx.reporter);
        let mut idx = 0;
        let handle = spawn_emitter(
            &self.ctx.tracker,
            &self.token,
            Arc::clone(&self.conn),
            MOVE_TICK,
            self.ctx.errors.clone(),
            move || {
                let position = MOVEMENT_PATH[idx];
                idx = (idx + 1) % MOVEMENT_PATH.len();
                reporter.mutate(|c| c.commands_sent += 1);
                metrics::COMMANDS_SENT.inc();
                Command::Move { position }
            },
        );
        self.emitters.push(handle);
    }

    fn stop_moving(&mut self) {
        for emitter in self.emitters.drain(..) {
            emitter.cancel();
        }
    }
}

impl<T> Drop for Driver<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Dial a connection and run a driver on it. A failed dial is reported and
/// the driver never starts.
pub async fn dial_and_run<D: Dialer>(id: usize, dialer: Arc<D>, ctx: PhaseContext) {
    let dialed = tokio::select! {
        biased;
        _ = ctx.phase.cancelled() => return,
        res = dialer.dial() => res,
    };

    match dialed {
        Ok(transport) => {
            debug!(driver = id, "Connected");
            Driver::new(id, Connection::new(transport), ctx).run().await;
        }
        Err(e) => {
            metrics::DIAL_FAILURES.inc();
            warn!(driver = id, error = %e, "Dial failed");
            ctx.errors.report(&ctx.phase, StressError::Dial(e)).await;
        }
    }
}
