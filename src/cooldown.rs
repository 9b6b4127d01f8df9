//! Re-recognition cooldown after a known face is confirmed.

use std::time::Duration;

use crate::frame::Timestamp;

/// Default window: five minutes.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Tracks the last time a known identity was confirmed.
#[derive(Clone, Debug)]
pub struct CooldownTracker {
    window: Duration,
    last_known_at: Option<Timestamp>,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_known_at: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn last_known_at(&self) -> Option<Timestamp> {
        self.last_known_at
    }

    pub fn record_known(&mut self, at: Timestamp) {
        self.last_known_at = Some(at);
    }

    /// True when no known face was ever confirmed, or when more than the window
    /// has elapsed since the last one. A clock that moved backwards counts as
    /// no time elapsed.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.last_known_at {
            None => true,
            Some(last) => now
                .duration_since(last)
                .map(|elapsed| elapsed > self.window)
                .unwrap_or(false),
        }
    }
}

impl Default for CooldownTracker {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
