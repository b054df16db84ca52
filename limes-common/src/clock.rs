use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

/// All time-dependent logic consults this abstraction (§5, §9) instead of
/// calling `Utc::now()` directly, so tests can advance the clock between a
/// job's `MeasureTime` (start) and `MeasureTimeAtEnd` (post-task) reads.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests: starts at a fixed instant and only moves
/// when explicitly advanced, so a test can read `now()` at task start,
/// advance it, then read `now()` again at task end and observe the new value.
#[derive(Debug, Clone)]
pub struct FixedClock(Arc<Mutex<DateTime<Utc>>>);

impl FixedClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock().unwrap() = at;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// `jitter(d) = d × uniform(0.9, 1.1)` (§9), used to flatten load when many
/// jobs share the same nominal interval. Not cryptographically random.
pub fn jitter(d: Duration) -> Duration {
    let factor = rand::rng().random_range(0.9..=1.1);
    Duration::from_secs_f64(d.as_secs_f64() * factor)
}

/// Deterministic jitter override for tests (§9): always returns `d` unscaled.
pub fn jitter_fixed(d: Duration) -> Duration {
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_only_moves_when_advanced() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(chrono::Duration::hours(2));
        assert_eq!(clock.now(), start + chrono::Duration::hours(2));
    }

    #[test]
    fn fixed_clock_set_overrides_the_current_instant() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let target = Utc.with_ymd_and_hms(2030, 6, 15, 12, 0, 0).unwrap();
        clock.set(target);
        assert_eq!(clock.now(), target);
    }

    #[test]
    fn jitter_stays_within_the_documented_range() {
        let base = Duration::from_secs(900);
        for _ in 0..200 {
            let jittered = jitter(base);
            assert!(jittered >= Duration::from_secs_f64(900.0 * 0.9));
            assert!(jittered <= Duration::from_secs_f64(900.0 * 1.1));
        }
    }

    #[test]
    fn jitter_fixed_never_scales() {
        let base = Duration::from_secs(42);
        assert_eq!(jitter_fixed(base), base);
    }
}
