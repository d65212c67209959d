mod config;
pub mod database;
mod todos;

pub use config::{AttributionConfig, Config, NotificationsConfig, TimerConfig};
pub use database::{Database, Stats, TaskFocus};

use std::path::PathBuf;

use crate::error::Result;

/// Returns `~/.config/focusboard[-dev]/` based on FOCUSBOARD_ENV.
///
/// Set FOCUSBOARD_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSBOARD_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusboard-dev")
    } else {
        base_dir.join("focusboard")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
