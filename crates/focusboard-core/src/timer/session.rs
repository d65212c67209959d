use serde::{Deserialize, Serialize};

/// Default target length of a focus session.
pub const DEFAULT_DURATION_SECS: u64 = 25 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    /// Halted with its progress already credited. Resumable, but nothing
    /// expects it to be resumed.
    Stopped,
    /// Ran to completion. Terminal until reset.
    Finished,
}

impl TimerStatus {
    /// Running, paused or stopped: a session whose minutes are not yet final.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            TimerStatus::Running | TimerStatus::Paused | TimerStatus::Stopped
        )
    }
}

/// Timing state of one session.
///
/// Timestamps are epoch milliseconds. Elapsed active time is always
/// recomputed from them, never decremented tick by tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSession {
    pub(crate) status: TimerStatus,
    pub(crate) duration_secs: u64,
    #[serde(default)]
    pub(crate) started_at_ms: Option<i64>,
    /// Start of the current pause/stop gap (also set at finish to freeze time).
    #[serde(default)]
    pub(crate) paused_at_ms: Option<i64>,
    /// Completed pause/stop gaps.
    #[serde(default)]
    pub(crate) total_paused_ms: i64,
    #[serde(default)]
    pub(crate) task_ref: Option<String>,
    #[serde(default)]
    pub(crate) subtask_ref: Option<String>,
    #[serde(default)]
    pub(crate) start_hour: Option<u8>,
    /// Minutes of this session already sent for attribution.
    #[serde(default)]
    pub(crate) credited_minutes: u64,
}

impl TimerSession {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            status: TimerStatus::Idle,
            duration_secs,
            started_at_ms: None,
            paused_at_ms: None,
            total_paused_ms: 0,
            task_ref: None,
            subtask_ref: None,
            start_hour: None,
            credited_minutes: 0,
        }
    }

    pub fn status(&self) -> TimerStatus {
        self.status
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn task_ref(&self) -> Option<&str> {
        self.task_ref.as_deref()
    }

    pub fn subtask_ref(&self) -> Option<&str> {
        self.subtask_ref.as_deref()
    }

    pub fn start_hour(&self) -> Option<u8> {
        self.start_hour
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        self.started_at_ms
    }

    pub fn total_paused_secs(&self) -> u64 {
        (self.total_paused_ms / 1000).max(0) as u64
    }

    pub fn credited_minutes(&self) -> u64 {
        self.credited_minutes
    }

    /// Active milliseconds since start, excluding every pause/stop gap
    /// including one still open.
    pub(crate) fn elapsed_active_ms(&self, now_ms: i64) -> i64 {
        let Some(started) = self.started_at_ms else {
            return 0;
        };
        let open_gap = self
            .paused_at_ms
            .map(|paused| now_ms.saturating_sub(paused))
            .unwrap_or(0);
        now_ms
            .saturating_sub(started)
            .saturating_sub(self.total_paused_ms)
            .saturating_sub(open_gap)
            .max(0)
    }

    pub(crate) fn elapsed_secs(&self, now_ms: i64) -> u64 {
        (self.elapsed_active_ms(now_ms) / 1000) as u64
    }

    /// May be negative once the target has been overrun.
    pub(crate) fn remaining_secs_signed(&self, now_ms: i64) -> i64 {
        self.duration_secs as i64 - self.elapsed_secs(now_ms) as i64
    }

    /// Elapsed active time rounded to whole minutes (half up).
    pub(crate) fn measured_minutes(&self, now_ms: i64) -> u64 {
        (self.elapsed_secs(now_ms) + 30) / 60
    }

    /// Target duration rounded to whole minutes (half up).
    pub(crate) fn nominal_minutes(&self) -> u64 {
        (self.duration_secs + 30) / 60
    }

    pub(crate) fn begin(
        &mut self,
        now_ms: i64,
        hour: u8,
        task_ref: Option<String>,
        subtask_ref: Option<String>,
    ) {
        self.status = TimerStatus::Running;
        self.started_at_ms = Some(now_ms);
        self.paused_at_ms = None;
        self.total_paused_ms = 0;
        self.task_ref = task_ref;
        self.subtask_ref = subtask_ref;
        self.start_hour = Some(hour);
        self.credited_minutes = 0;
    }

    /// Open a pause gap unless one is already open.
    pub(crate) fn open_gap(&mut self, now_ms: i64) {
        if self.paused_at_ms.is_none() {
            self.paused_at_ms = Some(now_ms);
        }
    }

    /// Close the open gap, folding it into the paused total.
    pub(crate) fn close_gap(&mut self, now_ms: i64) {
        if let Some(paused) = self.paused_at_ms.take() {
            self.total_paused_ms = self
                .total_paused_ms
                .saturating_add(now_ms.saturating_sub(paused).max(0));
        }
    }

    /// Back to idle defaults; the configured duration survives.
    pub(crate) fn clear(&mut self) {
        *self = Self::new(self.duration_secs);
    }
}

impl Default for TimerSession {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION_SECS)
    }
}
