//! Async driver for [`TimerEngine`].
//!
//! The handle owns the engine behind an async mutex and runs the tick loop on
//! a tokio task while the timer is running. Commands and ticks serialize on
//! that mutex, so a tick can never interleave with a transition.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use super::engine::{TimerEngine, TimerResult};
use super::session::{TimerSession, TimerStatus};
use crate::events::Event;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct TimerHandle {
    engine: Arc<Mutex<TimerEngine>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    status: watch::Sender<TimerStatus>,
    tick_interval: Duration,
}

impl TimerHandle {
    pub fn new(engine: TimerEngine) -> Self {
        Self::with_tick_interval(engine, DEFAULT_TICK_INTERVAL)
    }

    pub fn with_tick_interval(engine: TimerEngine, tick_interval: Duration) -> Self {
        let (status, _) = watch::channel(engine.status());
        Self {
            engine: Arc::new(Mutex::new(engine)),
            ticker: Arc::new(Mutex::new(None)),
            status,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
        }
    }

    /// Wrap an engine that may already be running (e.g. a restored session)
    /// and resume ticking if so.
    pub async fn attach(engine: TimerEngine, tick_interval: Duration) -> Self {
        let running = engine.status() == TimerStatus::Running;
        let handle = Self::with_tick_interval(engine, tick_interval);
        if running {
            handle.spawn_ticker().await;
        }
        handle
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn start(&self, task_ref: Option<String>, subtask_ref: Option<String>) -> TimerResult {
        let event = self.command(|e| e.start(task_ref, subtask_ref)).await?;
        if event.is_some() {
            self.spawn_ticker().await;
        }
        Ok(event)
    }

    pub async fn pause(&self) -> TimerResult {
        let event = self.command(TimerEngine::pause).await?;
        if event.is_some() {
            self.cancel_ticker().await;
        }
        Ok(event)
    }

    pub async fn stop(&self) -> TimerResult {
        let event = self.command(TimerEngine::stop).await?;
        if event.is_some() {
            self.cancel_ticker().await;
        }
        Ok(event)
    }

    pub async fn resume(&self) -> TimerResult {
        let event = self.command(TimerEngine::resume).await?;
        if event.is_some() {
            self.spawn_ticker().await;
        }
        Ok(event)
    }

    pub async fn reset(&self) -> TimerResult {
        let event = self.command(TimerEngine::reset).await?;
        self.cancel_ticker().await;
        Ok(event)
    }

    pub async fn set_duration(&self, minutes: i64) -> TimerResult {
        self.command(|e| e.set_duration(minutes)).await
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn status(&self) -> TimerStatus {
        self.engine.lock().await.status()
    }

    pub async fn snapshot(&self) -> Event {
        self.engine.lock().await.snapshot()
    }

    pub async fn session(&self) -> TimerSession {
        self.engine.lock().await.session().clone()
    }

    pub async fn remaining_secs(&self) -> u64 {
        self.engine.lock().await.remaining_secs()
    }

    pub async fn elapsed_secs(&self) -> u64 {
        self.engine.lock().await.elapsed_secs()
    }

    pub async fn elapsed_minutes(&self) -> u64 {
        self.engine.lock().await.elapsed_minutes()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<TimerStatus> {
        self.status.subscribe()
    }

    /// Wait until the timer is no longer running.
    pub async fn settled(&self) -> TimerStatus {
        let mut rx = self.subscribe();
        loop {
            let status = *rx.borrow_and_update();
            if status != TimerStatus::Running {
                return status;
            }
            if rx.changed().await.is_err() {
                return status;
            }
        }
    }

    /// Stop ticking and give the engine back. Fails if other handles are alive.
    pub async fn into_engine(self) -> Result<TimerEngine, Self> {
        self.cancel_ticker().await;
        let Self {
            engine,
            ticker,
            status,
            tick_interval,
        } = self;
        match Arc::try_unwrap(engine) {
            Ok(mutex) => Ok(mutex.into_inner()),
            Err(engine) => Err(Self {
                engine,
                ticker,
                status,
                tick_interval,
            }),
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn command<F>(&self, op: F) -> TimerResult
    where
        F: FnOnce(&mut TimerEngine) -> TimerResult,
    {
        let mut engine = self.engine.lock().await;
        let result = op(&mut engine);
        self.status.send_replace(engine.status());
        result
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let engine = self.engine.clone();
        let status = self.status.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;

                let mut guard = engine.lock().await;
                if guard.status() != TimerStatus::Running {
                    break;
                }
                if let Some(event) = guard.tick() {
                    debug!(?event, "ticker observed completion");
                    status.send_replace(guard.status());
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        let handle = self.ticker.lock().await.take();
        if let Some(handle) = handle {
            handle.abort();
            // Wait for the task to drop its engine reference.
            let _ = handle.await;
        }
    }
}
