use chrono::{Local, NaiveDate};
use clap::Subcommand;
use focusboard_core::history::{self, ViewMode};
use focusboard_core::storage::Database;
use serde::Serialize;

#[derive(Subcommand)]
pub enum StatsAction {
    /// All-time totals and today's focus
    Summary,
    /// Daily focus minutes for a window of days
    History {
        /// Number of days ending today
        #[arg(long, conflicts_with_all = ["from", "to"])]
        days: Option<u32>,
        /// First day (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Last day (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
    /// Focus minutes per hour of one day
    Hourly {
        /// Day to show (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Focus minutes credited to a task
    Task {
        /// Task ID
        id: String,
        /// Subtask ID
        #[arg(long)]
        subtask: Option<String>,
    },
}

#[derive(Serialize)]
struct DayRow {
    date: NaiveDate,
    minutes: u64,
}

#[derive(Serialize)]
struct HourRow {
    hour: u8,
    minutes: u64,
}

#[derive(Serialize)]
struct TaskRow {
    task_ref: String,
    subtask_ref: Option<String>,
    minutes: u64,
}

fn view_mode(
    today: NaiveDate,
    days: Option<u32>,
    from: Option<String>,
    to: Option<String>,
) -> Result<ViewMode, Box<dyn std::error::Error>> {
    let view = match (days, from, to) {
        (_, Some(from), Some(to)) => {
            ViewMode::custom(history::parse_date(&from)?, history::parse_date(&to)?)?
        }
        (Some(days), _, _) => ViewMode::last_days(today, days)?,
        _ => ViewMode::SevenDays,
    };
    Ok(view)
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let today = Local::now().date_naive();

    match action {
        StatsAction::Summary => {
            let stats = db.stats(today)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::History { days, from, to } => {
            let dates = view_mode(today, days, from, to)?.display_dates(today);
            let rows: Vec<DayRow> = match (dates.first(), dates.last()) {
                (Some(&start), Some(&end)) => {
                    let recorded = db.focus_history_range(start, end)?;
                    dates
                        .into_iter()
                        .map(|date| DayRow {
                            date,
                            minutes: recorded.get(&date).copied().unwrap_or(0),
                        })
                        .collect()
                }
                _ => Vec::new(),
            };
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        StatsAction::Hourly { date } => {
            let date = match date {
                Some(s) => history::parse_date(&s)?,
                None => today,
            };
            let rows: Vec<HourRow> = db
                .hourly_focus(date)?
                .into_iter()
                .zip(0u8..)
                .map(|(minutes, hour)| HourRow { hour, minutes })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        StatsAction::Task { id, subtask } => {
            let minutes = db.task_focus_minutes(&id, subtask.as_deref())?;
            let row = TaskRow {
                task_ref: id,
                subtask_ref: subtask,
                minutes,
            };
            println!("{}", serde_json::to_string_pretty(&row)?);
        }
    }
    Ok(())
}
