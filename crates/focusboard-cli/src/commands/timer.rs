use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use focusboard_core::attribution::{self, AttributionReceiver, AttributionSender};
use focusboard_core::notify::{LogNotifier, Notification, Notifier};
use focusboard_core::storage::{Config, Database};
use focusboard_core::timer::TimerResult;
use focusboard_core::{
    AttributionWorker, Event, SystemClock, TimerEngine, TimerHandle, TimerSession, TimerStatus,
};
use tokio::runtime::Runtime;

use super::todo;
use tracing::warn;

const SESSION_KEY: &str = "timer_session";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus session
    Start {
        /// Todo ID to credit
        #[arg(long)]
        task: Option<String>,
        /// Subtask ID within the todo
        #[arg(long)]
        subtask: Option<String>,
        /// Session length in minutes
        #[arg(long)]
        minutes: Option<i64>,
    },
    /// Pause the running session
    Pause,
    /// Stop the session and credit the minutes focused so far
    Stop,
    /// Resume a paused or stopped session
    Resume,
    /// Reset to idle
    Reset,
    /// Change the session length
    Duration {
        /// New length in minutes
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    /// Print current timer state as JSON
    Status,
    /// Run the timer in the foreground until it finishes (Ctrl-C pauses)
    Run {
        #[arg(long)]
        task: Option<String>,
        #[arg(long)]
        subtask: Option<String>,
        #[arg(long)]
        minutes: Option<i64>,
    },
}

/// Prints completion notices to stderr.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notification: &Notification) {
        eprintln!("{}: {}", notification.title, notification.body);
        if let Some(speech) = &notification.speech {
            eprintln!("{speech}");
        }
    }
}

fn load_session(db: &Database) -> Option<TimerSession> {
    let json = db.kv_get(SESSION_KEY).ok().flatten()?;
    match serde_json::from_str::<TimerSession>(&json) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(error = %e, "discarding unreadable timer session");
            None
        }
    }
}

fn save_session(db: &Database, engine: &TimerEngine) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(engine.session())?;
    db.kv_set(SESSION_KEY, &json)?;
    Ok(())
}

fn build_engine(config: &Config, tx: AttributionSender, saved: Option<TimerSession>) -> TimerEngine {
    let mut engine = TimerEngine::new(Arc::new(SystemClock), tx)
        .with_duration_minutes(config.timer.default_duration_min)
        .with_policy(config.timer.transition_policy())
        .with_voice(config.notifications.voice);
    engine = if config.notifications.enabled {
        engine.with_notifier(Arc::new(TerminalNotifier))
    } else {
        engine.with_notifier(Arc::new(LogNotifier))
    };
    match saved {
        Some(session) => engine.restore(session),
        None => engine,
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the transition event, or the current state when the command was a no-op.
fn print_outcome(engine: &TimerEngine, event: Option<Event>) -> Result<(), Box<dyn std::error::Error>> {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&engine.snapshot()),
    }
}

/// Apply every queued credit to the database before exiting.
fn drain_attribution(
    rt: &Runtime,
    db: Database,
    rx: AttributionReceiver,
    config: &Config,
) {
    let worker = AttributionWorker::new(db).with_retry(
        config.attribution.max_attempts,
        config.attribution.retry_backoff(),
    );
    let (_, report) = rt.block_on(worker.run(rx));
    if report.dropped > 0 {
        warn!(dropped = report.dropped, "some focus minutes were not recorded");
    }
}

fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

async fn run_foreground(
    engine: TimerEngine,
    tick_interval: Duration,
    task: Option<String>,
    subtask: Option<String>,
    minutes: Option<i64>,
) -> Result<TimerEngine, Box<dyn std::error::Error>> {
    let handle = TimerHandle::attach(engine, tick_interval).await;

    if let Some(minutes) = minutes {
        handle.set_duration(minutes).await?;
    }
    match handle.status().await {
        TimerStatus::Idle => {
            handle.start(task, subtask).await?;
        }
        TimerStatus::Paused | TimerStatus::Stopped => {
            handle.resume().await?;
        }
        TimerStatus::Running | TimerStatus::Finished => {}
    }

    let mut progress = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            status = handle.settled() => {
                eprintln!();
                tracing::debug!(?status, "foreground timer settled");
                break;
            }
            _ = progress.tick() => {
                eprint!("\r{} remaining ", format_remaining(handle.remaining_secs().await));
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                eprintln!();
                handle.pause().await?;
                break;
            }
        }
    }

    print_json(&handle.snapshot().await)?;
    handle
        .into_engine()
        .await
        .map_err(|_| "timer is still in use".into())
}

/// Apply a one-shot command. `status` and `run` change nothing here.
fn execute(engine: &mut TimerEngine, action: TimerAction) -> TimerResult {
    match action {
        TimerAction::Start {
            task,
            subtask,
            minutes,
        } => {
            if let Some(minutes) = minutes {
                if engine.status() == TimerStatus::Idle {
                    engine.set_duration(minutes)?;
                }
            }
            engine.start(task, subtask)
        }
        TimerAction::Pause => engine.pause(),
        TimerAction::Stop => engine.stop(),
        TimerAction::Resume => engine.resume(),
        TimerAction::Reset => engine.reset(),
        TimerAction::Duration { minutes } => engine.set_duration(minutes),
        TimerAction::Status | TimerAction::Run { .. } => Ok(None),
    }
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    if let TimerAction::Start { task, subtask, .. } | TimerAction::Run { task, subtask, .. } = &action {
        todo::ensure_exists(&db, task.as_deref(), subtask.as_deref())?;
    }

    let (tx, rx) = attribution::channel();
    let mut engine = build_engine(&config, tx, load_session(&db));

    // A session may have run out since the last invocation.
    if let Some(completed) = engine.tick() {
        print_json(&completed)?;
    }

    let outcome = match action {
        TimerAction::Run {
            task,
            subtask,
            minutes,
        } => {
            engine = rt.block_on(run_foreground(
                engine,
                config.timer.tick_interval(),
                task,
                subtask,
                minutes,
            ))?;
            Ok(())
        }
        action => match execute(&mut engine, action) {
            Ok(event) => print_outcome(&engine, event),
            Err(e) => Err(e.into()),
        },
    };

    // Credits from a completion are kept even when the command itself failed.
    save_session(&db, &engine)?;
    // Closing the channel lets the worker finish once the queue is empty.
    drop(engine);
    drain_attribution(&rt, db, rx, &config);
    outcome
}
