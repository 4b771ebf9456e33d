//! Reconnect delay schedule.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with full jitter.
///
/// The cap doubles on every failed attempt, from `base` up to `max`, and
/// each delay is drawn uniformly from `[0, cap]`. Jittering the whole
/// range keeps a fleet of clients from reconnecting in lockstep after a
/// shared outage.
#[derive(Debug)]
pub struct BackoffSchedule {
    base: Duration,
    max: Duration,
    cap: Duration,
}

impl BackoffSchedule {
    /// Creates a schedule starting at `base` and capped at `max`.
    pub fn new(base: Duration, max: Duration) -> BackoffSchedule {
        BackoffSchedule {
            base,
            max,
            cap: base.min(max),
        }
    }

    /// Draws the next delay and advances the cap.
    pub fn next_delay(&mut self) -> Duration {
        let cap = self.cap;
        self.cap = (self.cap * 2).min(self.max);
        cap.mul_f64(rand::thread_rng().gen::<f64>())
    }

    /// Current ceiling of the jitter range.
    pub fn current_cap(&self) -> Duration {
        self.cap
    }

    /// Restarts the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.cap = self.base.min(self.max);
    }
}
