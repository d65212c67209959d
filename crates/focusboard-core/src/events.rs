use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::TimerStatus;

/// Every state change of the timer produces an Event.
/// Shells print them; UIs render snapshots from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        task_ref: Option<String>,
        subtask_ref: Option<String>,
        duration_secs: u64,
        start_hour: u8,
        at: DateTime<Utc>,
    },
    TimerPaused {
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Session halted; measured minutes up to now were credited.
    TimerStopped {
        remaining_secs: u64,
        credited_minutes: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        from: TimerStatus,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Target length changed. `credited_minutes` is the partial progress
    /// flushed before the change (0 when nothing was running).
    DurationChanged {
        duration_secs: u64,
        remaining_secs: u64,
        credited_minutes: u64,
        at: DateTime<Utc>,
    },
    TimerCompleted {
        task_ref: Option<String>,
        subtask_ref: Option<String>,
        completed_minutes: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        credited_minutes: u64,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        task_ref: Option<String>,
        subtask_ref: Option<String>,
        duration_secs: u64,
        remaining_secs: u64,
        elapsed_secs: u64,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
}
