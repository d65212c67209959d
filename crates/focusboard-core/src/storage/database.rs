//! SQLite-based focus-time storage and statistics.
//!
//! Provides persistent storage for:
//! - Daily focus minutes (the focus history)
//! - Hour-of-day focus buckets per date
//! - Focus minutes per task and subtask
//! - Todo items and their subtasks (see `todos.rs`)
//! - Key-value store for application state (e.g. the saved timer session)

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Days, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::attribution::{validate_hour, AttributionSink};
use crate::error::{DatabaseError, Result, StorageError};
use crate::todo::completion_rate;

/// Minutes per session used when deriving a session count from totals.
pub const NOMINAL_SESSION_MIN: u64 = 25;

pub(super) const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Stats {
    pub total_focus_min: u64,
    /// Derived: total focus minutes / 25.
    pub total_sessions: u64,
    pub today_focus_min: u64,
    pub active_days: u64,
    pub best_day: Option<NaiveDate>,
    pub best_day_min: u64,
    pub avg_focus_min_per_active_day: f64,
    /// Monday through Sunday of the current week.
    pub week_total_min: u64,
    /// Rounded average over the last 30 days that have any focus.
    pub avg_30d_min: u64,
    /// Percentage of todos marked completed.
    pub completion_rate: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFocus {
    pub task_ref: String,
    pub subtask_ref: Option<String>,
    pub minutes: u64,
}

/// SQLite database for focus attribution.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub(super) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/focusboard/focusboard.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("focusboard.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS focus_history (
                    date    TEXT PRIMARY KEY,
                    minutes INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS hourly_focus (
                    date    TEXT NOT NULL,
                    hour    INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
                    minutes INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (date, hour)
                );

                -- subtask_ref '' marks the task-level row
                CREATE TABLE IF NOT EXISTS task_focus (
                    task_ref    TEXT NOT NULL,
                    subtask_ref TEXT NOT NULL DEFAULT '',
                    minutes     INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (task_ref, subtask_ref)
                );

                CREATE TABLE IF NOT EXISTS todos (
                    id         TEXT PRIMARY KEY,
                    text       TEXT NOT NULL,
                    completed  INTEGER NOT NULL DEFAULT 0,
                    start_date TEXT,
                    end_date   TEXT
                );

                CREATE TABLE IF NOT EXISTS subtasks (
                    id        TEXT PRIMARY KEY,
                    todo_id   TEXT NOT NULL,
                    text      TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_subtasks_todo ON subtasks(todo_id);

                CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))
    }

    /// Add focus minutes to a date.
    pub fn add_focus_minutes(&self, date: NaiveDate, minutes: u64) -> Result<(), rusqlite::Error> {
        upsert_focus(&self.conn, date, minutes)
    }

    /// Add focus minutes to an hour bucket of a date.
    pub fn add_hourly_focus_minutes(
        &self,
        date: NaiveDate,
        hour: u8,
        minutes: u64,
    ) -> Result<(), StorageError> {
        validate_hour(hour)?;
        self.conn.execute(
            "INSERT INTO hourly_focus (date, hour, minutes) VALUES (?1, ?2, ?3)
             ON CONFLICT(date, hour) DO UPDATE SET minutes = minutes + excluded.minutes",
            params![date.format(DATE_FORMAT).to_string(), hour, minutes as i64],
        )?;
        Ok(())
    }

    /// Whole focus history, date -> minutes.
    pub fn focus_history(&self) -> Result<BTreeMap<NaiveDate, u64>, rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, minutes FROM focus_history ORDER BY date")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        collect_history(rows)
    }

    /// Focus history between two dates, inclusive.
    pub fn focus_history_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, u64>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT date, minutes FROM focus_history
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date",
        )?;
        let rows = stmt.query_map(
            params![
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        collect_history(rows)
    }

    /// Focus minutes on one date.
    pub fn focus_minutes_on(&self, date: NaiveDate) -> Result<u64, rusqlite::Error> {
        let minutes = self
            .conn
            .query_row(
                "SELECT minutes FROM focus_history WHERE date = ?1",
                params![date.format(DATE_FORMAT).to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(minutes.unwrap_or(0).max(0) as u64)
    }

    /// The 24 hour buckets of a date.
    pub fn hourly_focus(&self, date: NaiveDate) -> Result<[u64; 24], rusqlite::Error> {
        let mut stmt = self
            .conn
            .prepare("SELECT hour, minutes FROM hourly_focus WHERE date = ?1")?;
        let rows = stmt.query_map(params![date.format(DATE_FORMAT).to_string()], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut buckets = [0u64; 24];
        for row in rows {
            let (hour, minutes) = row?;
            if let Some(slot) = usize::try_from(hour).ok().and_then(|h| buckets.get_mut(h)) {
                *slot = minutes.max(0) as u64;
            }
        }
        Ok(buckets)
    }

    /// Focus minutes credited to a task (or one of its subtasks).
    pub fn task_focus_minutes(
        &self,
        task_ref: &str,
        subtask_ref: Option<&str>,
    ) -> Result<u64, rusqlite::Error> {
        let minutes = self
            .conn
            .query_row(
                "SELECT minutes FROM task_focus WHERE task_ref = ?1 AND subtask_ref = ?2",
                params![task_ref, subtask_ref.unwrap_or("")],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(minutes.unwrap_or(0).max(0) as u64)
    }

    /// Every task/subtask row.
    pub fn task_focus(&self) -> Result<Vec<TaskFocus>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT task_ref, subtask_ref, minutes FROM task_focus
             ORDER BY task_ref, subtask_ref",
        )?;
        let rows = stmt.query_map([], |row| {
            let sub: String = row.get(1)?;
            Ok(TaskFocus {
                task_ref: row.get(0)?,
                subtask_ref: (!sub.is_empty()).then_some(sub),
                minutes: row.get::<_, i64>(2)?.max(0) as u64,
            })
        })?;
        rows.collect()
    }

    pub fn stats(&self, today: NaiveDate) -> Result<Stats, rusqlite::Error> {
        let history = self.focus_history()?;
        let mut stats = Stats::default();
        for (date, minutes) in &history {
            stats.total_focus_min += minutes;
            if *minutes > 0 {
                stats.active_days += 1;
            }
            if *minutes > stats.best_day_min {
                stats.best_day_min = *minutes;
                stats.best_day = Some(*date);
            }
        }
        stats.total_sessions = stats.total_focus_min / NOMINAL_SESSION_MIN;
        stats.today_focus_min = history.get(&today).copied().unwrap_or(0);
        if stats.active_days > 0 {
            stats.avg_focus_min_per_active_day =
                stats.total_focus_min as f64 / stats.active_days as f64;
        }

        let monday = today
            .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
            .unwrap_or(today);
        stats.week_total_min = history
            .range(monday..)
            .take_while(|(date, _)| (**date - monday).num_days() < 7)
            .map(|(_, minutes)| minutes)
            .sum();

        let window_start = today.checked_sub_days(Days::new(29)).unwrap_or(NaiveDate::MIN);
        let (sum, days) = history
            .range(window_start..=today)
            .filter(|(_, minutes)| **minutes > 0)
            .fold((0u64, 0u64), |(sum, days), (_, minutes)| (sum + minutes, days + 1));
        if days > 0 {
            stats.avg_30d_min = (sum + days / 2) / days;
        }

        stats.completion_rate = completion_rate(&self.list_todos()?);
        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn upsert_focus(conn: &Connection, date: NaiveDate, minutes: u64) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO focus_history (date, minutes) VALUES (?1, ?2)
         ON CONFLICT(date) DO UPDATE SET minutes = minutes + excluded.minutes",
        params![date.format(DATE_FORMAT).to_string(), minutes as i64],
    )?;
    Ok(())
}

fn upsert_task(
    conn: &Connection,
    task_ref: &str,
    subtask_ref: Option<&str>,
    minutes: u64,
) -> Result<(), rusqlite::Error> {
    let mut targets = vec![""];
    if let Some(sub) = subtask_ref.filter(|s| !s.is_empty()) {
        targets.push(sub);
    }
    for sub in targets {
        conn.execute(
            "INSERT INTO task_focus (task_ref, subtask_ref, minutes) VALUES (?1, ?2, ?3)
             ON CONFLICT(task_ref, subtask_ref) DO UPDATE SET minutes = minutes + excluded.minutes",
            params![task_ref, sub, minutes as i64],
        )?;
    }
    Ok(())
}

fn collect_history<I>(rows: I) -> Result<BTreeMap<NaiveDate, u64>, rusqlite::Error>
where
    I: Iterator<Item = Result<(String, i64), rusqlite::Error>>,
{
    let mut history = BTreeMap::new();
    for row in rows {
        let (date, minutes) = row?;
        // Rows are only ever written by this module; skip anything unparseable.
        if let Ok(date) = NaiveDate::parse_from_str(&date, DATE_FORMAT) {
            history.insert(date, minutes.max(0) as u64);
        }
    }
    Ok(history)
}

impl AttributionSink for Database {
    fn record_focus_minutes(
        &mut self,
        date: NaiveDate,
        minutes: u64,
        task_ref: Option<&str>,
        subtask_ref: Option<&str>,
    ) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        upsert_focus(&tx, date, minutes)?;
        if let Some(task) = task_ref {
            upsert_task(&tx, task, subtask_ref, minutes)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn record_hourly_focus_minutes(
        &mut self,
        date: NaiveDate,
        hour: u8,
        minutes: u64,
    ) -> Result<(), StorageError> {
        self.add_hourly_focus_minutes(date, hour, minutes)
    }
}
