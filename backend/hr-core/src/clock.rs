// src/clock.rs

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tracing::debug;

/// Source of "today" for date stamping (submitted dates, attendance upserts, dashboards).
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Process-local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug, Clone)]
pub struct FixedClock {
    current_time: Arc<Mutex<NaiveDateTime>>,
}

impl FixedClock {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(datetime)),
        }
    }

    /// Midnight on the given date.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(NaiveTime::MIN))
    }

    pub fn set(&self, datetime: NaiveDateTime) {
        *self.lock() = datetime;
    }

    pub fn set_date(&self, date: NaiveDate) {
        self.set(date.and_time(NaiveTime::MIN));
    }

    pub fn advance(&self, duration: Duration) {
        *self.lock() += duration;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NaiveDateTime> {
        self.current_time
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.lock()
    }
}

/// Artificial delay applied by fixture-backed stores to mimic network round trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency(StdDuration);

impl Latency {
    pub const NONE: Latency = Latency(StdDuration::ZERO);

    pub fn from_millis(ms: u64) -> Self {
        Latency(StdDuration::from_millis(ms))
    }

    pub fn duration(&self) -> StdDuration {
        self.0
    }

    pub async fn wait(&self) {
        if self.0.is_zero() {
            return;
        }
        debug!("Simulating {}ms latency", self.0.as_millis());
        tokio::time::sleep(self.0).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_can_be_moved() {
        let clock = FixedClock::on(NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 10).unwrap());

        clock.advance(Duration::hours(25));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 11).unwrap());

        clock.set_date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
    }

    #[tokio::test]
    async fn zero_latency_returns_immediately() {
        let started = std::time::Instant::now();
        Latency::NONE.wait().await;
        assert!(started.elapsed() < StdDuration::from_millis(50));
        assert_eq!(Latency::from_millis(0), Latency::NONE);
    }
}
