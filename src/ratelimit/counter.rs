//! Fixed window hit counter.

use std::time::{Duration, Instant};

/// The outcome of recording one hit against a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    /// Count after this hit was recorded
    pub count: u64,
    /// When the window the hit landed in started
    pub window_start: Instant,
}

/// A counter that tracks hits within a fixed time window.
///
/// The counter is not synchronized on its own; the store holding it is
/// responsible for serializing access per key.
#[derive(Debug, Clone)]
pub struct WindowCounter {
    /// Hits recorded in the current window, admitted or not
    count: u64,
    /// When the current window started
    window_start: Instant,
    /// Length of the window
    window_length: Duration,
}

impl WindowCounter {
    /// Create a counter with an empty window starting at `now`.
    pub fn new(window_length: Duration, now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            window_length,
        }
    }

    /// Record a hit at `now`.
    ///
    /// An expired window is replaced by a fresh one starting at `now`
    /// rather than decremented.
    pub fn hit(&mut self, now: Instant) -> Hit {
        if self.is_expired(now) {
            self.count = 0;
            self.window_start = now;
        }
        self.count = self.count.saturating_add(1);

        Hit {
            count: self.count,
            window_start: self.window_start,
        }
    }

    /// Whether the window has elapsed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.window_start) >= self.window_length
    }

    /// Hits in the live window, zero once it has expired.
    pub fn current_count(&self, now: Instant) -> u64 {
        if self.is_expired(now) {
            0
        } else {
            self.count
        }
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    pub fn window_length(&self) -> Duration {
        self.window_length
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, now: Instant) -> Duration {
        (self.window_start + self.window_length).saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_hit_increments() {
        let now = Instant::now();
        let mut counter = WindowCounter::new(Duration::from_secs(1), now);

        assert_eq!(counter.hit(now).count, 1);
        assert_eq!(counter.hit(now).count, 2);
        assert_eq!(counter.current_count(now), 2);
    }

    #[test]
    fn test_counter_resets_after_window() {
        let start = Instant::now();
        let mut counter = WindowCounter::new(Duration::from_secs(1), start);

        counter.hit(start);
        counter.hit(start + Duration::from_millis(500));

        let later = start + Duration::from_secs(1);
        assert!(counter.is_expired(later));
        assert_eq!(counter.current_count(later), 0);

        let hit = counter.hit(later);
        assert_eq!(hit.count, 1);
        assert_eq!(hit.window_start, later);
    }

    #[test]
    fn test_window_does_not_slide_on_hits() {
        let start = Instant::now();
        let mut counter = WindowCounter::new(Duration::from_secs(10), start);

        counter.hit(start);
        let hit = counter.hit(start + Duration::from_secs(9));
        assert_eq!(hit.window_start, start);
        assert_eq!(
            counter.duration_until_reset(start + Duration::from_secs(9)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_duration_until_reset_saturates() {
        let start = Instant::now();
        let counter = WindowCounter::new(Duration::from_secs(1), start);
        assert_eq!(
            counter.duration_until_reset(start + Duration::from_secs(5)),
            Duration::ZERO
        );
    }
}
