//! Focus-minute attribution.
//!
//! The timer engine never writes to storage itself. It pushes
//! [`AttributionEvent`]s into an unbounded channel and moves on; an
//! [`AttributionWorker`] drains the channel on its own task, applies each
//! event to an [`AttributionSink`] and retries transient failures. A sink
//! that stays broken costs the affected minutes, never a timer transition.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{DatabaseError, StorageError};

pub type AttributionSender = mpsc::UnboundedSender<AttributionEvent>;
pub type AttributionReceiver = mpsc::UnboundedReceiver<AttributionEvent>;

/// Create the channel between an engine and its worker.
pub fn channel() -> (AttributionSender, AttributionReceiver) {
    mpsc::unbounded_channel()
}

/// Queue an event for the worker. Fails once the receiving side is gone.
pub fn submit(tx: &AttributionSender, event: AttributionEvent) -> Result<(), StorageError> {
    tx.send(event).map_err(|_| StorageError::ChannelClosed)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributionEvent {
    /// Minutes credited to a calendar date and optionally a task/subtask.
    FocusMinutes {
        date: NaiveDate,
        minutes: u64,
        task_ref: Option<String>,
        subtask_ref: Option<String>,
    },
    /// Minutes credited to the hour bucket the session started in.
    HourlyFocusMinutes {
        date: NaiveDate,
        hour: u8,
        minutes: u64,
    },
}

impl AttributionEvent {
    pub fn minutes(&self) -> u64 {
        match self {
            AttributionEvent::FocusMinutes { minutes, .. }
            | AttributionEvent::HourlyFocusMinutes { minutes, .. } => *minutes,
        }
    }

    pub fn apply<S: AttributionSink + ?Sized>(&self, sink: &mut S) -> Result<(), StorageError> {
        match self {
            AttributionEvent::FocusMinutes {
                date,
                minutes,
                task_ref,
                subtask_ref,
            } => sink.record_focus_minutes(
                *date,
                *minutes,
                task_ref.as_deref(),
                subtask_ref.as_deref(),
            ),
            AttributionEvent::HourlyFocusMinutes {
                date,
                hour,
                minutes,
            } => sink.record_hourly_focus_minutes(*date, *hour, *minutes),
        }
    }
}

/// Persistence port for credited focus time.
pub trait AttributionSink: Send {
    fn record_focus_minutes(
        &mut self,
        date: NaiveDate,
        minutes: u64,
        task_ref: Option<&str>,
        subtask_ref: Option<&str>,
    ) -> Result<(), StorageError>;

    fn record_hourly_focus_minutes(
        &mut self,
        date: NaiveDate,
        hour: u8,
        minutes: u64,
    ) -> Result<(), StorageError>;
}

/// Reject hour buckets outside 0..=23.
pub fn validate_hour(hour: u8) -> Result<(), StorageError> {
    if hour > 23 {
        return Err(StorageError::InvalidArgument {
            field: "hour".into(),
            message: format!("{hour} is outside 0..=23"),
        });
    }
    Ok(())
}

impl StorageError {
    /// Whether retrying the same write could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Database(_))
    }
}

/// Counts from a finished worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub applied: usize,
    pub retried: usize,
    pub dropped: usize,
}

/// Drains an attribution channel into a sink.
pub struct AttributionWorker<S> {
    sink: S,
    max_attempts: u32,
    backoff: Duration,
}

impl<S: AttributionSink> AttributionWorker<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }

    /// `max_attempts` counts the first try; 0 is treated as 1.
    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Run until every sender is dropped, then hand the sink back.
    pub async fn run(mut self, mut rx: AttributionReceiver) -> (S, WorkerReport) {
        let mut report = WorkerReport::default();
        while let Some(event) = rx.recv().await {
            self.process(&event, &mut report).await;
        }
        debug!(
            applied = report.applied,
            dropped = report.dropped,
            "attribution worker finished"
        );
        (self.sink, report)
    }

    async fn process(&mut self, event: &AttributionEvent, report: &mut WorkerReport) {
        let mut attempt = 1;
        loop {
            match event.apply(&mut self.sink) {
                Ok(()) => {
                    report.applied += 1;
                    return;
                }
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, error = %err, "attribution write failed, retrying");
                    report.retried += 1;
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(err) => {
                    error!(
                        error = %err,
                        minutes = event.minutes(),
                        "dropping focus attribution"
                    );
                    report.dropped += 1;
                    return;
                }
            }
        }
    }
}

/// Running totals kept by [`MemorySink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTotals {
    pub daily: BTreeMap<NaiveDate, u64>,
    pub hourly: BTreeMap<(NaiveDate, u8), u64>,
    pub tasks: BTreeMap<(String, Option<String>), u64>,
    /// Every successfully applied event, in order.
    pub log: Vec<AttributionEvent>,
}

#[derive(Debug, Default)]
struct MemoryState {
    totals: MemoryTotals,
    failures_left: usize,
}

/// In-process sink. Clones share the same totals.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail with a locked-database error.
    pub fn fail_next(&self, n: usize) {
        self.lock().failures_left = n;
    }

    pub fn totals(&self) -> MemoryTotals {
        self.lock().totals.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failure(state: &mut MemoryState) -> Result<(), StorageError> {
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(StorageError::Database(DatabaseError::Locked));
        }
        Ok(())
    }
}

impl AttributionSink for MemorySink {
    fn record_focus_minutes(
        &mut self,
        date: NaiveDate,
        minutes: u64,
        task_ref: Option<&str>,
        subtask_ref: Option<&str>,
    ) -> Result<(), StorageError> {
        let mut state = self.lock();
        Self::check_failure(&mut state)?;
        let totals = &mut state.totals;
        *totals.daily.entry(date).or_default() += minutes;
        if let Some(task) = task_ref {
            *totals
                .tasks
                .entry((task.to_string(), subtask_ref.map(str::to_string)))
                .or_default() += minutes;
        }
        totals.log.push(AttributionEvent::FocusMinutes {
            date,
            minutes,
            task_ref: task_ref.map(str::to_string),
            subtask_ref: subtask_ref.map(str::to_string),
        });
        Ok(())
    }

    fn record_hourly_focus_minutes(
        &mut self,
        date: NaiveDate,
        hour: u8,
        minutes: u64,
    ) -> Result<(), StorageError> {
        validate_hour(hour)?;
        let mut state = self.lock();
        Self::check_failure(&mut state)?;
        let totals = &mut state.totals;
        *totals.hourly.entry((date, hour)).or_default() += minutes;
        totals
            .log
            .push(AttributionEvent::HourlyFocusMinutes { date, hour, minutes });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
    }

    #[test]
    fn submit_fails_without_a_worker() {
        let (tx, rx) = channel();
        let event = AttributionEvent::HourlyFocusMinutes {
            date: day(),
            hour: 9,
            minutes: 5,
        };
        assert!(submit(&tx, event.clone()).is_ok());
        drop(rx);
        assert!(matches!(submit(&tx, event), Err(StorageError::ChannelClosed)));
    }

    #[tokio::test]
    async fn worker_applies_events_in_order() {
        let sink = MemorySink::new();
        let (tx, rx) = channel();
        tx.send(AttributionEvent::FocusMinutes {
            date: day(),
            minutes: 25,
            task_ref: Some("todo-1".into()),
            subtask_ref: None,
        })
        .unwrap();
        tx.send(AttributionEvent::HourlyFocusMinutes {
            date: day(),
            hour: 14,
            minutes: 25,
        })
        .unwrap();
        drop(tx);

        let (_, report) = AttributionWorker::new(sink.clone()).run(rx).await;

        assert_eq!(report.applied, 2);
        let totals = sink.totals();
        assert_eq!(totals.daily[&day()], 25);
        assert_eq!(totals.hourly[&(day(), 14)], 25);
        assert_eq!(totals.tasks[&("todo-1".to_string(), None)], 25);
    }

    #[tokio::test]
    async fn worker_retries_transient_failures() {
        let sink = MemorySink::new();
        sink.fail_next(2);
        let (tx, rx) = channel();
        tx.send(AttributionEvent::FocusMinutes {
            date: day(),
            minutes: 5,
            task_ref: None,
            subtask_ref: None,
        })
        .unwrap();
        drop(tx);

        let (_, report) = AttributionWorker::new(sink.clone())
            .with_retry(3, Duration::from_millis(1))
            .run(rx)
            .await;

        assert_eq!(report, WorkerReport { applied: 1, retried: 2, dropped: 0 });
        assert_eq!(sink.totals().daily[&day()], 5);
    }

    #[tokio::test]
    async fn worker_drops_after_last_attempt() {
        let sink = MemorySink::new();
        sink.fail_next(5);
        let (tx, rx) = channel();
        tx.send(AttributionEvent::FocusMinutes {
            date: day(),
            minutes: 5,
            task_ref: None,
            subtask_ref: None,
        })
        .unwrap();
        drop(tx);

        let (_, report) = AttributionWorker::new(sink.clone())
            .with_retry(2, Duration::from_millis(1))
            .run(rx)
            .await;

        assert_eq!(report.dropped, 1);
        assert!(sink.totals().daily.is_empty());
    }

    #[tokio::test]
    async fn invalid_hour_is_not_retried() {
        let sink = MemorySink::new();
        let (tx, rx) = channel();
        tx.send(AttributionEvent::HourlyFocusMinutes {
            date: day(),
            hour: 24,
            minutes: 5,
        })
        .unwrap();
        drop(tx);

        let (_, report) = AttributionWorker::new(sink)
            .with_retry(5, Duration::from_millis(1))
            .run(rx)
            .await;

        assert_eq!(report, WorkerReport { applied: 0, retried: 0, dropped: 1 });
    }
}
