use std::time::Duration;
use std::time::Instant;

use derive_new::new;

pub const DEFAULT_THROTTLE_INTERVAL: Duration = Duration::from_millis(50);

/// Accepts at most one event per `interval`.
#[derive(Clone, Debug, new)]
pub struct Throttle {
    interval: Duration,
    #[new(default)]
    last_accepted: Option<Instant>,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_INTERVAL)
    }
}

impl Throttle {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_open(&self, now: Instant) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }
}
