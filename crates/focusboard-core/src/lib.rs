//! # Focusboard Core Library
//!
//! Core logic for the Focusboard focus timer. Every operation is available
//! through the standalone `focusboard` CLI, which is a thin shell over this
//! crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. Time is always
//!   recomputed from timestamps, so missed ticks never cause drift. The caller
//!   (or [`TimerHandle`]) periodically invokes `tick()` to detect completion.
//! - **Attribution**: Completed and interrupted sessions emit minute credits
//!   over a channel; an [`AttributionWorker`] applies them to a sink with retry.
//! - **Storage**: SQLite focus history and TOML configuration.
//! - **Todos**: Todo items with subtasks; their ids are the task references
//!   the timer credits.
//! - **History**: Date windows for 7-day, 30-day and custom history views.
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`TimerHandle`]: Async ticker driving an engine on a tokio task
//! - [`Database`]: Focus history persistence and statistics
//! - [`Config`]: Application configuration management

pub mod attribution;
pub mod clock;
pub mod error;
pub mod events;
pub mod history;
pub mod notify;
pub mod storage;
pub mod timer;
pub mod todo;

pub use attribution::{AttributionEvent, AttributionSink, AttributionWorker, MemorySink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, StorageError, TimerError, ValidationError};
pub use events::Event;
pub use history::ViewMode;
pub use notify::{LogNotifier, Notification, Notifier};
pub use storage::{Config, Database, Stats};
pub use timer::{TimerEngine, TimerHandle, TimerSession, TimerStatus, TransitionPolicy};
pub use todo::{Subtask, Todo};
