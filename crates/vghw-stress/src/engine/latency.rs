use std::time::Duration;
use tokio::time::Instant;

/// Number of gaps averaged into the reported movement latency.
pub const LATENCY_WINDOW: usize = 5;

/// Rolling average of the gaps between consecutive `ENTITY_MOVE` events on
/// one connection.
///
/// The window always holds [`LATENCY_WINDOW`] slots, zero until filled, and the
/// average is taken over all of them. Until five gaps have been seen the
/// reported latency is therefore scaled down by the empty slots.
#[derive(Debug, Default)]
pub struct LatencyWindow {
    last_seen: Option<Instant>,
    gaps: [Duration; LATENCY_WINDOW],
    recorded: usize,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an update arriving at `at` and return the current average.
    /// The very first update has nothing to measure against.
    pub fn observe(&mut self, at: Instant) -> Duration {
        if let Some(last) = self.last_seen {
            self.push(at.saturating_duration_since(last));
        }
        self.last_seen = Some(at);
        self.average()
    }

    /// Shift every slot one to the left, dropping the oldest, and store `gap`
    /// in the last one.
    pub fn push(&mut self, gap: Duration) {
        self.gaps.rotate_left(1);
        self.gaps[LATENCY_WINDOW - 1] = gap;
        self.recorded = (self.recorded + 1).min(LATENCY_WINDOW);
    }

    pub fn average(&self) -> Duration {
        let total: Duration = self.gaps.iter().sum();
        total / LATENCY_WINDOW as u32
    }

    /// Slots holding a measured gap.
    pub fn len(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }
}
