// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Holds the latest value until input has been quiet for `delay`. Time is
/// passed in so callers drive it from their own event loop.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces any pending value and restarts the wait.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, deadline)| *deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Yields the value once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if !self.deadline().is_some_and(|deadline| now >= deadline) {
            return None;
        }
        self.pending.take().map(|(value, _)| value)
    }

    /// Drops the pending value. Returns whether one was dropped.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }
}

impl<T> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_DEBOUNCE, Debouncer};
    use std::time::{Duration, Instant};

    #[test]
    fn value_fires_only_after_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debouncer::default();
        debounce.schedule("ac", start);
        assert_eq!(debounce.poll(start + Duration::from_millis(100)), None);

        debounce.schedule("acme", start + Duration::from_millis(200));
        assert_eq!(debounce.poll(start + Duration::from_millis(400)), None);
        assert_eq!(debounce.poll(start + Duration::from_millis(500)), Some("acme"));
        assert!(!debounce.is_pending());
        assert_eq!(debounce.poll(start + Duration::from_secs(5)), None);
    }

    #[test]
    fn cancel_drops_pending_value() {
        let start = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(50));
        debounce.schedule(1, start);
        assert_eq!(debounce.deadline(), Some(start + Duration::from_millis(50)));
        assert!(debounce.cancel());
        assert!(!debounce.cancel());
        assert_eq!(debounce.poll(start + DEFAULT_DEBOUNCE), None);
    }
}
