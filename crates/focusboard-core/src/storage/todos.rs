//! Todo and subtask persistence.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::database::DATE_FORMAT;
use super::Database;
use crate::error::StorageError;
use crate::todo::{Subtask, Todo};

fn not_found(kind: &'static str, id: &str) -> StorageError {
    StorageError::NotFound {
        kind,
        id: id.to_string(),
    }
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    value.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn row_to_todo(row: &Row<'_>) -> Result<Todo, rusqlite::Error> {
    Ok(Todo {
        id: row.get(0)?,
        text: row.get(1)?,
        completed: row.get(2)?,
        start_date: parse_date(row.get(3)?),
        end_date: parse_date(row.get(4)?),
        focus_min: 0,
        subtasks: Vec::new(),
    })
}

fn insert_subtask(conn: &Connection, todo_id: &str, subtask: &Subtask) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO subtasks (id, todo_id, text, completed) VALUES (?1, ?2, ?3, ?4)",
        params![subtask.id, todo_id, subtask.text, subtask.completed],
    )?;
    Ok(())
}

impl Database {
    pub fn create_todo(&self, todo: &Todo) -> Result<(), rusqlite::Error> {
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO todos (id, text, completed, start_date, end_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                todo.id,
                todo.text,
                todo.completed,
                format_date(todo.start_date),
                format_date(todo.end_date),
            ],
        )?;
        for subtask in &todo.subtasks {
            insert_subtask(&tx, &todo.id, subtask)?;
        }
        tx.commit()
    }

    /// A todo with its subtasks and credited focus minutes.
    pub fn get_todo(&self, id: &str) -> Result<Option<Todo>, rusqlite::Error> {
        let todo = self
            .conn()
            .query_row(
                "SELECT id, text, completed, start_date, end_date FROM todos WHERE id = ?1",
                params![id],
                row_to_todo,
            )
            .optional()?;
        match todo {
            Some(mut todo) => {
                self.load_todo_details(&mut todo)?;
                Ok(Some(todo))
            }
            None => Ok(None),
        }
    }

    /// Every todo in creation order.
    pub fn list_todos(&self) -> Result<Vec<Todo>, rusqlite::Error> {
        let mut stmt = self.conn().prepare(
            "SELECT id, text, completed, start_date, end_date FROM todos ORDER BY rowid",
        )?;
        let mut todos = stmt
            .query_map([], row_to_todo)?
            .collect::<Result<Vec<_>, _>>()?;
        for todo in &mut todos {
            self.load_todo_details(todo)?;
        }
        Ok(todos)
    }

    /// Flip a todo's completed flag and return the new value.
    pub fn toggle_todo(&self, id: &str) -> Result<bool, StorageError> {
        let changed = self.conn().execute(
            "UPDATE todos SET completed = NOT completed WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(not_found("todo", id));
        }
        let completed = self.conn().query_row(
            "SELECT completed FROM todos WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(completed)
    }

    /// Remove a todo, its subtasks and the focus minutes credited to them.
    /// The daily and hourly history is kept.
    pub fn delete_todo(&self, id: &str) -> Result<(), StorageError> {
        let tx = self.conn().unchecked_transaction()?;
        if tx.execute("DELETE FROM todos WHERE id = ?1", params![id])? == 0 {
            return Err(not_found("todo", id));
        }
        tx.execute("DELETE FROM subtasks WHERE todo_id = ?1", params![id])?;
        tx.execute("DELETE FROM task_focus WHERE task_ref = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    pub fn create_subtask(&self, todo_id: &str, subtask: &Subtask) -> Result<(), StorageError> {
        if !self.todo_exists(todo_id)? {
            return Err(not_found("todo", todo_id));
        }
        insert_subtask(self.conn(), todo_id, subtask)?;
        Ok(())
    }

    pub fn toggle_subtask(&self, todo_id: &str, subtask_id: &str) -> Result<bool, StorageError> {
        let changed = self.conn().execute(
            "UPDATE subtasks SET completed = NOT completed WHERE id = ?1 AND todo_id = ?2",
            params![subtask_id, todo_id],
        )?;
        if changed == 0 {
            return Err(not_found("subtask", subtask_id));
        }
        let completed = self.conn().query_row(
            "SELECT completed FROM subtasks WHERE id = ?1",
            params![subtask_id],
            |row| row.get(0),
        )?;
        Ok(completed)
    }

    pub fn delete_subtask(&self, todo_id: &str, subtask_id: &str) -> Result<(), StorageError> {
        let tx = self.conn().unchecked_transaction()?;
        let removed = tx.execute(
            "DELETE FROM subtasks WHERE id = ?1 AND todo_id = ?2",
            params![subtask_id, todo_id],
        )?;
        if removed == 0 {
            return Err(not_found("subtask", subtask_id));
        }
        tx.execute(
            "DELETE FROM task_focus WHERE task_ref = ?1 AND subtask_ref = ?2",
            params![todo_id, subtask_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn todo_exists(&self, id: &str) -> Result<bool, rusqlite::Error> {
        Ok(self
            .conn()
            .query_row("SELECT 1 FROM todos WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some())
    }

    fn load_todo_details(&self, todo: &mut Todo) -> Result<(), rusqlite::Error> {
        let mut stmt = self.conn().prepare(
            "SELECT id, text, completed FROM subtasks WHERE todo_id = ?1 ORDER BY rowid",
        )?;
        let subtasks = stmt
            .query_map(params![todo.id], |row| {
                Ok(Subtask {
                    id: row.get(0)?,
                    text: row.get(1)?,
                    completed: row.get(2)?,
                    focus_min: 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        todo.subtasks = subtasks;
        for subtask in &mut todo.subtasks {
            subtask.focus_min = self.task_focus_minutes(&todo.id, Some(&subtask.id))?;
        }
        todo.focus_min = self.task_focus_minutes(&todo.id, None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::attribution::AttributionSink;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
    }

    #[test]
    fn todos_roundtrip_in_creation_order() {
        let db = Database::open_memory().unwrap();
        let first = Todo::new("first", Some(day()), None).unwrap();
        let second = Todo::new("second", None, None).unwrap();
        db.create_todo(&first).unwrap();
        db.create_todo(&second).unwrap();

        let todos = db.list_todos().unwrap();
        assert_eq!(todos, vec![first.clone(), second]);
        assert_eq!(db.get_todo(&first.id).unwrap(), Some(first));
        assert!(db.get_todo("missing").unwrap().is_none());
    }

    #[test]
    fn toggle_flips_and_reports_missing() {
        let db = Database::open_memory().unwrap();
        let todo = Todo::new("write", None, None).unwrap();
        db.create_todo(&todo).unwrap();

        assert!(db.toggle_todo(&todo.id).unwrap());
        assert!(!db.toggle_todo(&todo.id).unwrap());
        assert!(matches!(
            db.toggle_todo("nope"),
            Err(StorageError::NotFound { kind: "todo", .. })
        ));
    }

    #[test]
    fn focus_minutes_come_from_attribution() {
        let mut db = Database::open_memory().unwrap();
        let todo = Todo::new("essay", None, None).unwrap();
        db.create_todo(&todo).unwrap();
        let sub = Subtask::new("outline").unwrap();
        db.create_subtask(&todo.id, &sub).unwrap();

        db.record_focus_minutes(day(), 25, Some(&todo.id), Some(&sub.id))
            .unwrap();
        db.record_focus_minutes(day(), 10, Some(&todo.id), None)
            .unwrap();

        let loaded = db.get_todo(&todo.id).unwrap().unwrap();
        assert_eq!(loaded.focus_min, 35);
        assert_eq!(loaded.subtask(&sub.id).map(|s| s.focus_min), Some(25));
    }

    #[test]
    fn subtasks_toggle_and_delete() {
        let db = Database::open_memory().unwrap();
        let todo = Todo::new("essay", None, None).unwrap();
        db.create_todo(&todo).unwrap();
        let sub = Subtask::new("draft").unwrap();
        db.create_subtask(&todo.id, &sub).unwrap();

        assert!(db.toggle_subtask(&todo.id, &sub.id).unwrap());
        assert!(db.get_todo(&todo.id).unwrap().unwrap().subtasks[0].completed);

        db.delete_subtask(&todo.id, &sub.id).unwrap();
        assert!(db.get_todo(&todo.id).unwrap().unwrap().subtasks.is_empty());
        assert!(db.delete_subtask(&todo.id, &sub.id).is_err());
        assert!(matches!(
            db.create_subtask("missing", &Subtask::new("x").unwrap()),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_removes_subtasks_and_task_totals_but_keeps_history() {
        let mut db = Database::open_memory().unwrap();
        let todo = Todo::new("essay", None, None).unwrap();
        db.create_todo(&todo).unwrap();
        db.create_subtask(&todo.id, &Subtask::new("a").unwrap())
            .unwrap();
        db.record_focus_minutes(day(), 20, Some(&todo.id), None)
            .unwrap();

        db.delete_todo(&todo.id).unwrap();

        assert!(db.list_todos().unwrap().is_empty());
        assert_eq!(db.task_focus_minutes(&todo.id, None).unwrap(), 0);
        assert_eq!(db.focus_minutes_on(day()).unwrap(), 20);
        assert!(db.delete_todo(&todo.id).is_err());
    }

    #[test]
    fn completion_rate_in_stats() {
        let db = Database::open_memory().unwrap();
        for text in ["a", "b", "c", "d"] {
            db.create_todo(&Todo::new(text, None, None).unwrap()).unwrap();
        }
        let first = db.list_todos().unwrap()[0].id.clone();
        db.toggle_todo(&first).unwrap();

        assert_eq!(db.stats(day()).unwrap().completion_rate, 25);
    }
}
