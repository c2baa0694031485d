//! Controllable clock
//!
//! `sleep` advances the clock instead of waiting, so backoff loops finish
//! instantly while still being observable through `sleeps()`.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use medrelay_core::PhysicalClock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Manually driven clock for deterministic testing
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<DateTime<Utc>>>,
    /// Added after every `now()` read so successive records get distinct stamps
    step: Arc<Mutex<ChronoDuration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
            step: Arc::new(Mutex::new(ChronoDuration::zero())),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Clock that ticks forward by `step` on every read
    pub fn ticking(start: DateTime<Utc>, step: ChronoDuration) -> Self {
        let clock = Self::at(start);
        *clock.step.lock().unwrap() = step;
        clock
    }

    /// Advance time without recording a sleep
    pub fn advance(&self, by: ChronoDuration) {
        let mut current = self.current.lock().unwrap();
        *current += by;
    }

    /// Peek at the current time without ticking
    pub fn current(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap()
    }

    /// Every duration passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl PhysicalClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let step = *self.step.lock().unwrap();
        let mut current = self.current.lock().unwrap();
        let now = *current;
        *current += step;
        now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        let by = ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::zero());
        self.advance(by);
        tokio::task::yield_now().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::fixed_time;

    #[tokio::test]
    async fn sleep_advances_without_waiting() {
        let clock = ManualClock::at(fixed_time(0));
        clock.sleep(Duration::from_secs(1)).await;
        clock.sleep(Duration::from_secs(1)).await;

        assert_eq!(clock.current(), fixed_time(2));
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(1); 2]);
    }

    #[test]
    fn ticking_clock_yields_distinct_stamps() {
        let clock = ManualClock::ticking(fixed_time(0), ChronoDuration::seconds(5));
        assert_eq!(clock.now(), fixed_time(0));
        assert_eq!(clock.now(), fixed_time(5));
    }
}
