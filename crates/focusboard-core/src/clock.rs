//! Wall-clock abstraction.
//!
//! The timer engine never reads the system time directly. It asks a [`Clock`],
//! so tests and simulations can drive sessions with [`ManualClock`] and get
//! exact, repeatable timings and hour buckets.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Timelike};

/// Source of wall-clock time for the engine.
pub trait Clock: Send + Sync {
    /// Current local time, carrying its UTC offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Local system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Manually driven clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Clock fixed at `date` `hour:00:00` in UTC.
    ///
    /// Returns `None` when the date or hour does not exist.
    pub fn at(date: NaiveDate, hour: u32) -> Option<Self> {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        let offset = FixedOffset::east_opt(0)?;
        let start = naive.and_local_timezone(offset).single()?;
        Some(Self::new(start))
    }

    pub fn set(&self, instant: DateTime<FixedOffset>) {
        *self.lock() = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.lock();
        *guard += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn advance_ms(&self, ms: i64) {
        self.advance(Duration::milliseconds(ms));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<FixedOffset>> {
        // A poisoned clock only means a test panicked mid-advance; the value is still usable.
        self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.lock()
    }
}

pub(crate) fn epoch_ms(instant: &DateTime<FixedOffset>) -> i64 {
    instant.timestamp_millis()
}

/// Local hour-of-day bucket (0..=23).
pub(crate) fn hour_of(instant: &DateTime<FixedOffset>) -> u8 {
    instant.hour() as u8
}

/// Local calendar date.
pub(crate) fn date_of(instant: &DateTime<FixedOffset>) -> NaiveDate {
    instant.date_naive()
}
