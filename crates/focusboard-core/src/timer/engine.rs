//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It does not use
//! internal threads - the caller (or a [`super::TimerHandle`]) is responsible
//! for calling `tick()` periodically. Every query recomputes elapsed time from
//! stored timestamps, so late or skipped ticks never cause drift.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//!            |  \        |
//!            |   -> Stopped (minutes credited) -> Running
//!            v
//!         Finished -> (reset) -> Idle
//! ```
//!
//! ## Crediting
//!
//! Interrupting a session (stop, retarget, reset) credits the measured
//! active minutes. Running to completion credits the nominal duration. Minutes
//! already credited earlier in the same session are never sent twice.
//!
//! ## Usage
//!
//! ```ignore
//! let (tx, rx) = attribution::channel();
//! let mut engine = TimerEngine::new(Arc::new(SystemClock), tx);
//! engine.start(Some("todo-1".into()), None)?;
//! // In a loop:
//! engine.tick(); // Returns Some(Event::TimerCompleted) once
//! ```

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::session::{TimerSession, TimerStatus};
use crate::attribution::{self, AttributionEvent, AttributionSender};
use crate::clock::{self, Clock};
use crate::error::TimerError;
use crate::events::Event;
use crate::notify::{Notification, Notifier};

/// Called every tick with `(task_ref, subtask_ref, elapsed_secs)`.
pub type TickCallback = Box<dyn FnMut(Option<&str>, Option<&str>, u64) + Send>;
/// Called with `(task_ref, subtask_ref, credited_minutes)` when minutes are credited.
pub type CompleteCallback = Box<dyn FnMut(Option<&str>, Option<&str>, u64) + Send>;

/// Outcome of a timer command: `Some(event)` when the state changed,
/// `None` when the command was ignored.
pub type TimerResult = Result<Option<Event>, TimerError>;

/// How commands issued from the wrong state are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    /// Ignore them (`Ok(None)`).
    #[default]
    Permissive,
    /// Reject them with [`TimerError::InvalidTransition`].
    Strict,
}

/// Core timer engine. One per user session.
pub struct TimerEngine {
    session: TimerSession,
    clock: Arc<dyn Clock>,
    attribution: AttributionSender,
    policy: TransitionPolicy,
    notifier: Option<Arc<dyn Notifier>>,
    voice: bool,
    on_tick: Option<TickCallback>,
    on_complete: Option<CompleteCallback>,
}

impl fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEngine")
            .field("session", &self.session)
            .field("policy", &self.policy)
            .field("voice", &self.voice)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    /// Create an idle engine with the default 25-minute target.
    pub fn new(clock: Arc<dyn Clock>, attribution: AttributionSender) -> Self {
        Self {
            session: TimerSession::default(),
            clock,
            attribution,
            policy: TransitionPolicy::default(),
            notifier: None,
            voice: false,
            on_tick: None,
            on_complete: None,
        }
    }

    // ── Builders ─────────────────────────────────────────────────────

    /// Initial target length. Ignored when zero.
    pub fn with_duration_minutes(mut self, minutes: u64) -> Self {
        if minutes > 0 {
            self.session.duration_secs = minutes.saturating_mul(60);
        }
        self
    }

    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_voice(mut self, voice: bool) -> Self {
        self.voice = voice;
        self
    }

    pub fn on_tick<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Option<&str>, Option<&str>, u64) + Send + 'static,
    {
        self.on_tick = Some(Box::new(callback));
        self
    }

    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnMut(Option<&str>, Option<&str>, u64) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Continue a previously saved session.
    pub fn restore(mut self, session: TimerSession) -> Self {
        self.session = session;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        self.session.status
    }

    pub fn session(&self) -> &TimerSession {
        &self.session
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn duration_secs(&self) -> u64 {
        self.session.duration_secs
    }

    pub fn task_ref(&self) -> Option<&str> {
        self.session.task_ref()
    }

    pub fn subtask_ref(&self) -> Option<&str> {
        self.session.subtask_ref()
    }

    /// Active seconds in the current session; 0 when idle. Frozen while
    /// paused, stopped or finished.
    pub fn elapsed_secs(&self) -> u64 {
        self.session.elapsed_secs(self.now_ms())
    }

    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed_secs() / 60
    }

    /// Seconds left, clamped at zero. The full duration while idle.
    pub fn remaining_secs(&self) -> u64 {
        match self.session.status {
            TimerStatus::Idle => self.session.duration_secs,
            TimerStatus::Finished => 0,
            _ => self.session.remaining_secs_signed(self.now_ms()).max(0) as u64,
        }
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now();
        let now_ms = clock::epoch_ms(&now);
        let duration_secs = self.session.duration_secs;
        let elapsed_secs = self.session.elapsed_secs(now_ms);
        let progress_pct = match self.session.status {
            TimerStatus::Finished => 100.0,
            _ if duration_secs == 0 => 0.0,
            _ => (elapsed_secs as f64 / duration_secs as f64 * 100.0).min(100.0),
        };
        Event::StateSnapshot {
            status: self.session.status,
            task_ref: self.session.task_ref.clone(),
            subtask_ref: self.session.subtask_ref.clone(),
            duration_secs,
            remaining_secs: self.remaining_secs(),
            elapsed_secs,
            progress_pct,
            at: now.with_timezone(&Utc),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, task_ref: Option<String>, subtask_ref: Option<String>) -> TimerResult {
        if self.session.status != TimerStatus::Idle {
            return self.ignored("start");
        }
        let now = self.clock.now();
        let hour = clock::hour_of(&now);
        self.session
            .begin(clock::epoch_ms(&now), hour, task_ref, subtask_ref);
        info!(
            task = self.session.task_ref().unwrap_or("-"),
            subtask = self.session.subtask_ref().unwrap_or("-"),
            duration_secs = self.session.duration_secs,
            "focus session started"
        );
        Ok(Some(Event::TimerStarted {
            task_ref: self.session.task_ref.clone(),
            subtask_ref: self.session.subtask_ref.clone(),
            duration_secs: self.session.duration_secs,
            start_hour: hour,
            at: now.with_timezone(&Utc),
        }))
    }

    pub fn pause(&mut self) -> TimerResult {
        let now = self.clock.now();
        if let Some(completed) = self.catch_up(&now) {
            return Ok(Some(completed));
        }
        if self.session.status != TimerStatus::Running {
            return self.ignored("pause");
        }
        self.session.open_gap(clock::epoch_ms(&now));
        self.session.status = TimerStatus::Paused;
        Ok(Some(Event::TimerPaused {
            remaining_secs: self.remaining_secs(),
            at: now.with_timezone(&Utc),
        }))
    }

    /// Credit measured progress and halt. Valid from running or paused.
    /// A session already past its target finishes instead.
    pub fn stop(&mut self) -> TimerResult {
        let now = self.clock.now();
        if let Some(completed) = self.catch_up(&now) {
            return Ok(Some(completed));
        }
        if !matches!(
            self.session.status,
            TimerStatus::Running | TimerStatus::Paused
        ) {
            return self.ignored("stop");
        }
        let credited_minutes = self.flush(&now);
        // A gap already opened by pause keeps its original start.
        self.session.open_gap(clock::epoch_ms(&now));
        self.session.status = TimerStatus::Stopped;
        info!(credited_minutes, "focus session stopped");
        Ok(Some(Event::TimerStopped {
            remaining_secs: self.remaining_secs(),
            credited_minutes,
            at: now.with_timezone(&Utc),
        }))
    }

    pub fn resume(&mut self) -> TimerResult {
        let from = self.session.status;
        if !matches!(from, TimerStatus::Paused | TimerStatus::Stopped) {
            return self.ignored("resume");
        }
        let now = self.clock.now();
        self.session.close_gap(clock::epoch_ms(&now));
        self.session.status = TimerStatus::Running;
        Ok(Some(Event::TimerResumed {
            from,
            remaining_secs: self.remaining_secs(),
            at: now.with_timezone(&Utc),
        }))
    }

    /// Retarget the session. Progress made so far is credited first, and
    /// elapsed time carries over into the new target.
    pub fn set_duration(&mut self, minutes: i64) -> TimerResult {
        if minutes <= 0 {
            return Err(TimerError::invalid_argument(
                "minutes",
                format!("duration must be a positive number of minutes, got {minutes}"),
            ));
        }
        let duration_secs = (minutes as u64)
            .checked_mul(60)
            .filter(|secs| *secs <= i64::MAX as u64)
            .ok_or_else(|| {
                TimerError::invalid_argument("minutes", format!("{minutes} is too large"))
            })?;

        let now = self.clock.now();
        self.catch_up(&now);
        let credited_minutes = if self.session.status.is_active() {
            self.flush(&now)
        } else {
            0
        };
        self.session.duration_secs = duration_secs;
        debug!(duration_secs, credited_minutes, "timer retargeted");
        Ok(Some(Event::DurationChanged {
            duration_secs,
            remaining_secs: self.remaining_secs(),
            credited_minutes,
            at: now.with_timezone(&Utc),
        }))
    }

    /// Back to idle. An unfinished session is credited first. Resetting an
    /// idle engine is always a silent no-op.
    pub fn reset(&mut self) -> TimerResult {
        if self.session.status == TimerStatus::Idle {
            return Ok(None);
        }
        let now = self.clock.now();
        self.catch_up(&now);
        let credited_minutes = if self.session.status.is_active() {
            self.flush(&now)
        } else {
            0
        };
        self.session.clear();
        info!(credited_minutes, "timer reset");
        Ok(Some(Event::TimerReset {
            credited_minutes,
            at: now.with_timezone(&Utc),
        }))
    }

    /// Call periodically while running. Returns `Some(Event::TimerCompleted)`
    /// exactly once, when the target is reached.
    pub fn tick(&mut self) -> Option<Event> {
        if self.session.status != TimerStatus::Running {
            return None;
        }
        let now = self.clock.now();
        let now_ms = clock::epoch_ms(&now);
        let elapsed = self.session.elapsed_secs(now_ms);

        if let Some(callback) = self.on_tick.as_mut() {
            callback(
                self.session.task_ref.as_deref(),
                self.session.subtask_ref.as_deref(),
                elapsed,
            );
        }

        if self.session.remaining_secs_signed(now_ms) <= 0 {
            return Some(self.finish(&now));
        }
        None
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Finish a running session whose target has already passed, so a late
    /// command never credits the overrun as measured time.
    fn catch_up(&mut self, now: &DateTime<FixedOffset>) -> Option<Event> {
        if self.session.status == TimerStatus::Running
            && self.session.remaining_secs_signed(clock::epoch_ms(now)) <= 0
        {
            return Some(self.finish(now));
        }
        None
    }

    fn finish(&mut self, now: &DateTime<FixedOffset>) -> Event {
        let nominal = self.session.nominal_minutes();
        let minutes = nominal.saturating_sub(self.session.credited_minutes);

        self.session.open_gap(clock::epoch_ms(now));
        self.session.status = TimerStatus::Finished;
        if minutes > 0 {
            self.credit(now, minutes);
        }
        if let Some(callback) = self.on_complete.as_mut() {
            callback(
                self.session.task_ref.as_deref(),
                self.session.subtask_ref.as_deref(),
                minutes,
            );
        }
        if let Some(notifier) = &self.notifier {
            notifier.notify(&Notification::session_complete(nominal, self.voice));
        }
        info!(
            task = self.session.task_ref().unwrap_or("-"),
            completed_minutes = minutes,
            "focus session finished"
        );

        Event::TimerCompleted {
            task_ref: self.session.task_ref.clone(),
            subtask_ref: self.session.subtask_ref.clone(),
            completed_minutes: minutes,
            at: now.with_timezone(&Utc),
        }
    }

    /// Credit measured minutes not yet credited. Returns the minutes sent.
    fn flush(&mut self, now: &DateTime<FixedOffset>) -> u64 {
        let measured = self.session.measured_minutes(clock::epoch_ms(now));
        let minutes = measured.saturating_sub(self.session.credited_minutes);
        if minutes == 0 {
            return 0;
        }
        self.credit(now, minutes);
        if let Some(callback) = self.on_complete.as_mut() {
            callback(
                self.session.task_ref.as_deref(),
                self.session.subtask_ref.as_deref(),
                minutes,
            );
        }
        minutes
    }

    fn credit(&mut self, now: &DateTime<FixedOffset>, minutes: u64) {
        let date = clock::date_of(now);
        self.session.credited_minutes += minutes;
        self.send(AttributionEvent::FocusMinutes {
            date,
            minutes,
            task_ref: self.session.task_ref.clone(),
            subtask_ref: self.session.subtask_ref.clone(),
        });
        if let Some(hour) = self.session.start_hour {
            self.send(AttributionEvent::HourlyFocusMinutes {
                date,
                hour,
                minutes,
            });
        }
    }

    fn send(&self, event: AttributionEvent) {
        let minutes = event.minutes();
        if let Err(err) = attribution::submit(&self.attribution, event) {
            warn!(minutes, error = %err, "focus minutes lost");
        }
    }

    fn ignored(&self, operation: &'static str) -> TimerResult {
        match self.policy {
            TransitionPolicy::Permissive => {
                debug!(operation, status = ?self.session.status, "ignoring timer command");
                Ok(None)
            }
            TransitionPolicy::Strict => Err(TimerError::InvalidTransition {
                operation,
                from: self.session.status,
            }),
        }
    }

    fn now_ms(&self) -> i64 {
        clock::epoch_ms(&self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::NaiveDate;

    use super::*;
    use crate::attribution::{self, AttributionReceiver};
    use crate::clock::ManualClock;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
    }

    fn engine_at(hour: u32) -> (TimerEngine, ManualClock, AttributionReceiver) {
        let clock = ManualClock::at(today(), hour).unwrap();
        let (tx, rx) = attribution::channel();
        let engine = TimerEngine::new(Arc::new(clock.clone()), tx);
        (engine, clock, rx)
    }

    fn drain(rx: &mut AttributionReceiver) -> Vec<AttributionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn focus(minutes: u64) -> AttributionEvent {
        AttributionEvent::FocusMinutes {
            date: today(),
            minutes,
            task_ref: None,
            subtask_ref: None,
        }
    }

    fn hourly(hour: u8, minutes: u64) -> AttributionEvent {
        AttributionEvent::HourlyFocusMinutes {
            date: today(),
            hour,
            minutes,
        }
    }

    #[test]
    fn start_pause_resume() {
        let (mut engine, _clock, _rx) = engine_at(9);
        assert_eq!(engine.status(), TimerStatus::Idle);

        assert!(engine.start(None, None).unwrap().is_some());
        assert_eq!(engine.status(), TimerStatus::Running);

        assert!(engine.pause().unwrap().is_some());
        assert_eq!(engine.status(), TimerStatus::Paused);

        assert!(engine.resume().unwrap().is_some());
        assert_eq!(engine.status(), TimerStatus::Running);
    }

    #[test]
    fn full_run_credits_nominal_minutes_once() {
        let (mut engine, clock, mut rx) = engine_at(14);
        engine.start(None, None).unwrap();

        clock.advance_secs(1499);
        assert!(engine.tick().is_none());
        assert_eq!(engine.remaining_secs(), 1);

        clock.advance_secs(1);
        let event = engine.tick().unwrap();
        assert!(matches!(
            event,
            Event::TimerCompleted {
                completed_minutes: 25,
                ..
            }
        ));
        assert_eq!(engine.status(), TimerStatus::Finished);
        assert_eq!(engine.remaining_secs(), 0);

        clock.advance_secs(60);
        assert!(engine.tick().is_none());
        assert_eq!(drain(&mut rx), vec![focus(25), hourly(14, 25)]);
    }

    #[test]
    fn late_tick_still_credits_nominal_duration() {
        let (mut engine, clock, mut rx) = engine_at(10);
        engine.set_duration(1).unwrap();
        engine.start(None, None).unwrap();

        clock.advance_secs(150);
        engine.tick().unwrap();

        assert_eq!(drain(&mut rx), vec![focus(1), hourly(10, 1)]);
    }

    #[test]
    fn stop_after_overrun_finishes_with_nominal_minutes() {
        let (mut engine, clock, mut rx) = engine_at(10);
        engine.set_duration(1).unwrap();
        engine.start(None, None).unwrap();

        clock.advance_secs(7200);
        let event = engine.stop().unwrap();

        assert!(matches!(
            event,
            Some(Event::TimerCompleted {
                completed_minutes: 1,
                ..
            })
        ));
        assert_eq!(engine.status(), TimerStatus::Finished);
        assert_eq!(drain(&mut rx), vec![focus(1), hourly(10, 1)]);
    }

    #[test]
    fn pause_after_overrun_finishes() {
        let (mut engine, clock, mut rx) = engine_at(10);
        engine.set_duration(2).unwrap();
        engine.start(None, None).unwrap();

        clock.advance_secs(600);
        assert!(matches!(
            engine.pause().unwrap(),
            Some(Event::TimerCompleted { .. })
        ));
        assert_eq!(engine.status(), TimerStatus::Finished);
        assert_eq!(drain(&mut rx), vec![focus(2), hourly(10, 2)]);
    }

    #[test]
    fn reset_and_retarget_after_overrun_credit_nominal_only() {
        let (mut engine, clock, mut rx) = engine_at(10);
        engine.set_duration(1).unwrap();
        engine.start(None, None).unwrap();
        clock.advance_secs(7200);

        let event = engine.reset().unwrap();
        assert!(matches!(
            event,
            Some(Event::TimerReset {
                credited_minutes: 0,
                ..
            })
        ));
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert_eq!(drain(&mut rx), vec![focus(1), hourly(10, 1)]);

        engine.start(None, None).unwrap();
        clock.advance_secs(7200);
        engine.set_duration(5).unwrap();
        assert_eq!(engine.status(), TimerStatus::Finished);
        assert_eq!(engine.duration_secs(), 300);
        assert_eq!(drain(&mut rx), vec![focus(1), hourly(12, 1)]);
    }

    #[test]
    fn long_pause_is_not_counted() {
        let (mut engine, clock, _rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_secs(600);
        engine.pause().unwrap();
        clock.advance_secs(10_000);
        assert_eq!(engine.elapsed_secs(), 600);
        engine.resume().unwrap();
        clock.advance_secs(900);

        assert_eq!(engine.elapsed_secs(), 1500);
    }

    #[test]
    fn elapsed_is_continuous_across_pause() {
        let (mut engine, clock, _rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_ms(123_456);

        let before = engine.elapsed_secs();
        engine.pause().unwrap();
        clock.advance_secs(77);
        engine.resume().unwrap();

        assert_eq!(engine.elapsed_secs(), before);
    }

    #[test]
    fn retarget_flushes_before_changing_duration() {
        let (mut engine, clock, mut rx) = engine_at(9);
        engine.set_duration(10).unwrap();
        engine.start(None, None).unwrap();
        clock.advance_secs(300);

        let event = engine.set_duration(20).unwrap().unwrap();

        assert!(matches!(
            event,
            Event::DurationChanged {
                duration_secs: 1200,
                remaining_secs: 900,
                credited_minutes: 5,
                ..
            }
        ));
        assert_eq!(drain(&mut rx), vec![focus(5), hourly(9, 5)]);
        assert_eq!(engine.remaining_secs(), 900);
        assert_eq!(engine.status(), TimerStatus::Running);
    }

    #[test]
    fn finish_after_retarget_credits_only_the_rest() {
        let (mut engine, clock, mut rx) = engine_at(9);
        engine.set_duration(10).unwrap();
        engine.start(None, None).unwrap();
        clock.advance_secs(300);
        engine.set_duration(20).unwrap();
        drain(&mut rx);

        clock.advance_secs(900);
        engine.tick().unwrap();

        assert_eq!(drain(&mut rx), vec![focus(15), hourly(9, 15)]);
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        let (mut engine, clock, _rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_secs(120);
        let before = engine.session().clone();

        for minutes in [0, -5] {
            let err = engine.set_duration(minutes).unwrap_err();
            assert!(matches!(err, TimerError::InvalidArgument { .. }));
        }
        assert_eq!(engine.session(), &before);
    }

    #[test]
    fn reset_from_finished_keeps_duration() {
        let (mut engine, clock, mut rx) = engine_at(9);
        engine.set_duration(15).unwrap();
        engine.start(Some("todo-1".into()), None).unwrap();
        clock.advance_secs(900);
        engine.tick().unwrap();
        drain(&mut rx);

        let event = engine.reset().unwrap().unwrap();

        assert!(matches!(event, Event::TimerReset { credited_minutes: 0, .. }));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(engine.status(), TimerStatus::Idle);
        assert!(engine.task_ref().is_none());
        assert_eq!(engine.duration_secs(), 900);
        assert_eq!(engine.remaining_secs(), 900);
        assert_eq!(engine.elapsed_secs(), 0);
    }

    #[test]
    fn reset_while_running_credits_measured_time() {
        let (mut engine, clock, mut rx) = engine_at(16);
        engine.start(Some("todo-1".into()), Some("sub-1".into())).unwrap();
        clock.advance_secs(7 * 60 + 40);

        engine.reset().unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                AttributionEvent::FocusMinutes {
                    date: today(),
                    minutes: 8,
                    task_ref: Some("todo-1".into()),
                    subtask_ref: Some("sub-1".into()),
                },
                hourly(16, 8),
            ]
        );
    }

    #[test]
    fn short_interruption_credits_nothing() {
        let (mut engine, clock, mut rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_secs(29);

        let event = engine.stop().unwrap().unwrap();

        assert!(matches!(event, Event::TimerStopped { credited_minutes: 0, .. }));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn stop_then_resume_accrues_on_top() {
        let (mut engine, clock, mut rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_secs(600);

        engine.stop().unwrap();
        assert_eq!(engine.status(), TimerStatus::Stopped);
        assert_eq!(drain(&mut rx), vec![focus(10), hourly(9, 10)]);

        clock.advance_secs(300);
        assert_eq!(engine.elapsed_secs(), 600);

        engine.resume().unwrap();
        clock.advance_secs(300);
        assert_eq!(engine.elapsed_secs(), 900);

        engine.reset().unwrap();
        assert_eq!(drain(&mut rx), vec![focus(5), hourly(9, 5)]);
    }

    #[test]
    fn stop_from_paused_keeps_pause_gap() {
        let (mut engine, clock, _rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_secs(60);
        engine.pause().unwrap();
        clock.advance_secs(500);
        engine.stop().unwrap();
        clock.advance_secs(500);
        engine.resume().unwrap();

        assert_eq!(engine.elapsed_secs(), 60);
    }

    #[test]
    fn invalid_commands_are_ignored_by_default() {
        let (mut engine, _clock, _rx) = engine_at(9);
        assert_eq!(engine.pause().unwrap(), None);
        assert_eq!(engine.stop().unwrap(), None);
        assert_eq!(engine.resume().unwrap(), None);
        assert_eq!(engine.reset().unwrap(), None);

        engine.start(None, None).unwrap();
        assert_eq!(engine.start(Some("other".into()), None).unwrap(), None);
        assert!(engine.task_ref().is_none());
        assert_eq!(engine.resume().unwrap(), None);
    }

    #[test]
    fn strict_policy_reports_invalid_transitions() {
        let (engine, _clock, _rx) = engine_at(9);
        let mut engine = engine.with_policy(TransitionPolicy::Strict);

        assert_eq!(
            engine.pause().unwrap_err(),
            TimerError::InvalidTransition {
                operation: "pause",
                from: TimerStatus::Idle
            }
        );
        assert_eq!(engine.reset().unwrap(), None);

        engine.start(None, None).unwrap();
        assert!(matches!(
            engine.start(None, None),
            Err(TimerError::InvalidTransition { operation: "start", .. })
        ));
    }

    #[test]
    fn callbacks_receive_refs_and_minutes() {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let completions = Arc::new(Mutex::new(Vec::new()));
        let (engine, clock, _rx) = engine_at(9);
        let tick_log = ticks.clone();
        let complete_log = completions.clone();
        let mut engine = engine
            .on_tick(move |task, sub, elapsed| {
                tick_log
                    .lock()
                    .unwrap()
                    .push((task.map(String::from), sub.map(String::from), elapsed));
            })
            .on_complete(move |task, _sub, minutes| {
                complete_log
                    .lock()
                    .unwrap()
                    .push((task.map(String::from), minutes));
            });
        engine.set_duration(2).unwrap();

        engine.start(Some("todo-9".into()), Some("sub-2".into())).unwrap();
        clock.advance_secs(45);
        engine.tick();
        clock.advance_secs(75);
        engine.tick().unwrap();

        assert_eq!(
            *ticks.lock().unwrap(),
            vec![
                (Some("todo-9".into()), Some("sub-2".into()), 45),
                (Some("todo-9".into()), Some("sub-2".into()), 120),
            ]
        );
        assert_eq!(*completions.lock().unwrap(), vec![(Some("todo-9".into()), 2)]);
    }

    #[test]
    fn notifier_fires_on_completion() {
        #[derive(Default)]
        struct Recorder(Mutex<Vec<Notification>>);
        impl Notifier for Recorder {
            fn notify(&self, n: &Notification) {
                self.0.lock().unwrap().push(n.clone());
            }
        }

        let recorder = Arc::new(Recorder::default());
        let (engine, clock, _rx) = engine_at(9);
        let mut engine = engine.with_notifier(recorder.clone()).with_voice(true);
        engine.start(None, None).unwrap();
        clock.advance_secs(1500);
        engine.tick().unwrap();

        let sent = recorder.0.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(*sent, vec![Notification::session_complete(25, true)]);
    }

    #[test]
    fn closed_channel_does_not_block_transitions() {
        let (mut engine, clock, rx) = engine_at(9);
        drop(rx);
        engine.start(None, None).unwrap();
        clock.advance_secs(1500);

        assert!(engine.tick().is_some());
        assert_eq!(engine.status(), TimerStatus::Finished);
    }

    #[test]
    fn restored_session_keeps_counting() {
        let (mut engine, clock, _rx) = engine_at(9);
        engine.start(Some("todo-1".into()), None).unwrap();
        clock.advance_secs(200);
        let saved = serde_json::to_string(engine.session()).unwrap();

        let (tx, _rx2) = attribution::channel();
        let restored = TimerEngine::new(Arc::new(clock.clone()), tx)
            .restore(serde_json::from_str(&saved).unwrap());
        clock.advance_secs(100);

        assert_eq!(restored.status(), TimerStatus::Running);
        assert_eq!(restored.task_ref(), Some("todo-1"));
        assert_eq!(restored.elapsed_secs(), 300);
    }

    #[test]
    fn snapshot_returns_valid_event() {
        let (mut engine, clock, _rx) = engine_at(9);
        engine.start(None, None).unwrap();
        clock.advance_secs(750);

        match engine.snapshot() {
            Event::StateSnapshot {
                status,
                remaining_secs,
                elapsed_secs,
                progress_pct,
                ..
            } => {
                assert_eq!(status, TimerStatus::Running);
                assert_eq!(remaining_secs, 750);
                assert_eq!(elapsed_secs, 750);
                assert!((progress_pct - 50.0).abs() < f64::EPSILON);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }
}
