//! Completion notifications.
//!
//! Best-effort side effects: a notifier must return quickly and never fail
//! the caller.

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Line to speak aloud when voice announcements are on.
    pub speech: Option<String>,
}

impl Notification {
    pub fn session_complete(minutes: u64, voice: bool) -> Self {
        Self {
            title: "Pomodoro complete!".into(),
            body: format!("{minutes}-minute focus session finished. Take a short break."),
            speech: voice.then(|| {
                format!("Well done. {minutes} minutes completed. Set up your next session.")
            }),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Emits notifications as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!(
            title = %notification.title,
            speech = notification.speech.as_deref().unwrap_or(""),
            "{}",
            notification.body
        );
    }
}
