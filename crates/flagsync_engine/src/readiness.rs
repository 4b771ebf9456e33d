//! One-shot readiness signal.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// A set-once gate with timed waiting.
///
/// Used for the client readiness signal and for stop requests; both are
/// events that happen at most once and that multiple threads may block
/// on. Once set, the gate never clears.
#[derive(Debug, Default)]
pub struct ReadyGate {
    state: Mutex<bool>,
    cond: Condvar,
}

impl ReadyGate {
    /// Creates an unset gate.
    pub fn new() -> ReadyGate {
        ReadyGate::default()
    }

    /// Sets the gate and wakes all waiters. Idempotent.
    pub fn set(&self) {
        let mut set = self.state.lock();
        if !*set {
            *set = true;
            self.cond.notify_all();
        }
    }

    /// Whether the gate has been set.
    pub fn is_set(&self) -> bool {
        *self.state.lock()
    }

    /// Blocks until the gate is set or `timeout` elapses. Returns the
    /// gate state on return, so `false` means the wait timed out.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut set = self.state.lock();
        if !*set {
            let _ = self.cond.wait_while_for(&mut set, |set| !*set, timeout);
        }
        *set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn wait_times_out_when_unset() {
        let gate = ReadyGate::new();
        let started = Instant::now();
        assert!(!gate.wait_timeout(Duration::from_millis(20)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn set_wakes_waiter() {
        let gate = Arc::new(ReadyGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait_timeout(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(10));
        gate.set();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn set_is_sticky_and_idempotent() {
        let gate = ReadyGate::new();
        gate.set();
        gate.set();
        assert!(gate.is_set());
        assert!(gate.wait_timeout(Duration::ZERO));
    }
}
