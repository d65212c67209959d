//! Todo list commands. Todo and subtask ids are what `timer start --task`
//! and `--subtask` take.

use clap::Subcommand;
use focusboard_core::history;
use focusboard_core::storage::Database;
use focusboard_core::{Subtask, Todo};
use serde::Serialize;

#[derive(Subcommand)]
pub enum TodoAction {
    /// Create a todo
    Add {
        /// What needs doing
        text: String,
        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Due day (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },
    /// List todos with their subtasks and focus minutes
    List {
        /// Only todos not yet completed
        #[arg(long)]
        open: bool,
    },
    /// Show one todo
    Show {
        /// Todo ID
        id: String,
    },
    /// Mark a todo done, or open again
    Toggle {
        /// Todo ID
        id: String,
    },
    /// Delete a todo and its subtasks
    Delete {
        /// Todo ID
        id: String,
    },
    /// Subtask management
    Subtask {
        #[command(subcommand)]
        action: SubtaskAction,
    },
}

#[derive(Subcommand)]
pub enum SubtaskAction {
    /// Add a subtask to a todo
    Add {
        /// Todo ID
        todo: String,
        /// What needs doing
        text: String,
    },
    /// Mark a subtask done, or open again
    Toggle {
        /// Todo ID
        todo: String,
        /// Subtask ID
        id: String,
    },
    /// Delete a subtask
    Delete {
        /// Todo ID
        todo: String,
        /// Subtask ID
        id: String,
    },
}

#[derive(Serialize)]
struct Toggled<'a> {
    id: &'a str,
    completed: bool,
}

#[derive(Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_optional_date(
    value: Option<String>,
) -> Result<Option<chrono::NaiveDate>, Box<dyn std::error::Error>> {
    Ok(value.map(|s| history::parse_date(&s)).transpose()?)
}

/// Fail unless `task` names a todo and `subtask`, when given, one of its subtasks.
pub fn ensure_exists(
    db: &Database,
    task: Option<&str>,
    subtask: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    match (task, subtask) {
        (None, Some(_)) => Err("--subtask requires --task".into()),
        (None, None) => Ok(()),
        (Some(task), subtask) => {
            let todo = db
                .get_todo(task)?
                .ok_or_else(|| format!("todo not found: {task}"))?;
            match subtask {
                Some(id) if todo.subtask(id).is_none() => {
                    Err(format!("subtask not found: {id}").into())
                }
                _ => Ok(()),
            }
        }
    }
}

pub fn run(action: TodoAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        TodoAction::Add { text, start, end } => {
            let todo = Todo::new(&text, parse_optional_date(start)?, parse_optional_date(end)?)?;
            db.create_todo(&todo)?;
            print_json(&todo)?;
        }
        TodoAction::List { open } => {
            let todos: Vec<Todo> = db
                .list_todos()?
                .into_iter()
                .filter(|todo| !open || !todo.completed)
                .collect();
            print_json(&todos)?;
        }
        TodoAction::Show { id } => {
            let todo = db.get_todo(&id)?.ok_or(format!("todo not found: {id}"))?;
            print_json(&todo)?;
        }
        TodoAction::Toggle { id } => {
            let completed = db.toggle_todo(&id)?;
            print_json(&Toggled { id: &id, completed })?;
        }
        TodoAction::Delete { id } => {
            db.delete_todo(&id)?;
            print_json(&Deleted { deleted: &id })?;
        }
        TodoAction::Subtask { action } => match action {
            SubtaskAction::Add { todo, text } => {
                let subtask = Subtask::new(&text)?;
                db.create_subtask(&todo, &subtask)?;
                print_json(&subtask)?;
            }
            SubtaskAction::Toggle { todo, id } => {
                let completed = db.toggle_subtask(&todo, &id)?;
                print_json(&Toggled { id: &id, completed })?;
            }
            SubtaskAction::Delete { todo, id } => {
                db.delete_subtask(&todo, &id)?;
                print_json(&Deleted { deleted: &id })?;
            }
        },
    }
    Ok(())
}
