use std::time::{Duration, Instant};

/// Tracks the time of the last accepted attendance event and enforces the
/// minimum gap between two accepted events on this device.
///
/// Only [`record_success`](CooldownTracker::record_success) mutates state;
/// rejections and transport failures never touch it.
#[derive(Debug, Clone)]
pub struct CooldownTracker {
    cooldown: Duration,
    last_success_at: Option<Instant>,
}

impl CooldownTracker {
    pub fn new(cooldown: Duration) -> Self {
        CooldownTracker {
            cooldown,
            last_success_at: None,
        }
    }

    pub fn may_attempt(&self, now: Instant) -> bool {
        match self.last_success_at {
            None => true,
            Some(at) => now.saturating_duration_since(at) >= self.cooldown,
        }
    }

    /// Record an accepted attendance event. Monotonic: the stored timestamp
    /// never moves backwards.
    pub fn record_success(&mut self, now: Instant) {
        match self.last_success_at {
            Some(at) if now < at => {}
            _ => self.last_success_at = Some(now),
        }
    }

    pub fn last_success_at(&self) -> Option<Instant> {
        self.last_success_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tracker_allows_attempt() {
        let tracker = CooldownTracker::new(Duration::from_millis(5000));
        assert!(tracker.may_attempt(Instant::now()));
    }

    #[test]
    fn blocks_until_cooldown_elapses() {
        let mut tracker = CooldownTracker::new(Duration::from_millis(5000));
        let t0 = Instant::now();
        tracker.record_success(t0);

        assert!(!tracker.may_attempt(t0));
        assert!(!tracker.may_attempt(t0 + Duration::from_millis(4999)));
        assert!(tracker.may_attempt(t0 + Duration::from_millis(5000)));
    }

    #[test]
    fn last_success_never_decreases() {
        let mut tracker = CooldownTracker::new(Duration::from_millis(5000));
        let t0 = Instant::now();
        let later = t0 + Duration::from_secs(10);

        tracker.record_success(later);
        tracker.record_success(t0);

        assert_eq!(tracker.last_success_at(), Some(later));
    }
}
