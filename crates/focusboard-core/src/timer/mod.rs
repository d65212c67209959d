mod engine;
mod session;
mod ticker;

pub use engine::{CompleteCallback, TickCallback, TimerEngine, TimerResult, TransitionPolicy};
pub use session::{TimerSession, TimerStatus, DEFAULT_DURATION_SECS};
pub use ticker::{TimerHandle, DEFAULT_TICK_INTERVAL};
