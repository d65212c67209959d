//! Todo items the timer credits focus time to.
//!
//! A todo's `id` doubles as the timer's task reference, and a subtask's `id`
//! as its subtask reference. Focus minutes are not stored on the todo rows;
//! they are read back from the attribution totals when todos are loaded.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    pub completed: bool,
    /// Minutes credited to this subtask.
    #[serde(default)]
    pub focus_min: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Minutes credited to the todo, subtask sessions included.
    #[serde(default)]
    pub focus_min: u64,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

fn clean_text(text: &str) -> Result<String, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "text".into(),
            message: "must not be empty".into(),
        });
    }
    Ok(text.to_string())
}

impl Todo {
    /// New open todo with a fresh id. Text is trimmed and must not be empty.
    pub fn new(
        text: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Self, ValidationError> {
        if let (Some(start), Some(end)) = (start_date, end_date) {
            if end < start {
                return Err(ValidationError::InvalidDateRange { start, end });
            }
        }
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            text: clean_text(text)?,
            completed: false,
            start_date,
            end_date,
            focus_min: 0,
            subtasks: Vec::new(),
        })
    }

    pub fn subtask(&self, id: &str) -> Option<&Subtask> {
        self.subtasks.iter().find(|s| s.id == id)
    }
}

impl Subtask {
    pub fn new(text: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            text: clean_text(text)?,
            completed: false,
            focus_min: 0,
        })
    }
}

/// Share of todos marked completed, as a rounded percentage. 0 with no todos.
pub fn completion_rate(todos: &[Todo]) -> u64 {
    let total = todos.len() as u64;
    if total == 0 {
        return 0;
    }
    let done = todos.iter().filter(|t| t.completed).count() as u64;
    (done * 100 + total / 2) / total
}
