//! Leading-edge debouncing with a trailing flush.
//!
//! The first trigger after a quiet period fires immediately. Triggers that
//! arrive while the window is still open are coalesced into a single trailing
//! fire once `window` has passed since the most recent of them.
//!
//! Time is always passed in by the caller, so the owner decides what "now" is
//! and tests can step the clock.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_fire: Option<Instant>,
    /// Time of the latest coalesced trigger, if a trailing fire is owed.
    pending: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fire: None,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Register a trigger. Returns true when the action should run now.
    pub fn trigger(&mut self, now: Instant) -> bool {
        let window_open = self
            .last_fire
            .is_some_and(|last| now.saturating_duration_since(last) < self.window);

        if window_open || self.pending.is_some() {
            self.pending = Some(now);
            false
        } else {
            self.last_fire = Some(now);
            true
        }
    }

    /// Returns true when a coalesced trailing fire is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if now.saturating_duration_since(at) >= self.window => {
                self.pending = None;
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }

    /// When the owed trailing fire becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|at| at + self.window)
    }

    /// Whether a trailing fire is owed.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any owed trailing fire.
    pub fn cancel(&mut self) {
        self.pending = None;
    }
}
