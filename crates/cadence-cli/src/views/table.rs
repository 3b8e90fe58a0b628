use cadence_core::models::{InstanceState, Task, TaskPriority, TaskStatus};
use chrono::NaiveDate;
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};

/// One occurrence of a series as shown by `show`
#[derive(Debug, Clone)]
pub struct OccurrenceRow {
    pub original_date: NaiveDate,
    pub state: InstanceState,
    /// Absent once the occurrence is deleted
    pub task: Option<Task>,
}

/// One date produced by `preview`
#[derive(Debug, Clone)]
pub struct PreviewRow {
    pub date: NaiveDate,
    /// Set when an instance row already exists for the date
    pub state: Option<InstanceState>,
}

fn relative_day(date: NaiveDate, today: NaiveDate) -> String {
    let days = (date - today).num_days();
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "yesterday".to_string(),
        _ => (date - today).humanize(),
    }
}

fn title_cell(task: &Task) -> Cell {
    let cell = Cell::new(&task.title);
    match task.status {
        TaskStatus::Done | TaskStatus::Cancelled => {
            cell.add_attribute(Attribute::CrossedOut).fg(Color::DarkGrey)
        }
        TaskStatus::Todo | TaskStatus::InProgress => match task.priority {
            TaskPriority::Urgent => cell.fg(Color::Red).add_attribute(Attribute::Bold),
            TaskPriority::High => cell.fg(Color::Red),
            TaskPriority::Medium => cell.fg(Color::Yellow),
            TaskPriority::Low => cell.fg(Color::Green),
            TaskPriority::None => cell,
        },
    }
}

fn status_cell(status: TaskStatus) -> Cell {
    let cell = Cell::new(format!("{:?}", status));
    match status {
        TaskStatus::Done => cell.fg(Color::Green),
        TaskStatus::Cancelled => cell.fg(Color::DarkGrey),
        TaskStatus::InProgress => cell.fg(Color::Cyan),
        TaskStatus::Todo => cell,
    }
}

fn state_cell(state: InstanceState) -> Cell {
    let cell = Cell::new(state.to_string());
    match state {
        InstanceState::Scheduled => cell,
        InstanceState::Exception => cell.fg(Color::Yellow),
        InstanceState::Deleted => cell.fg(Color::DarkGrey).add_attribute(Attribute::CrossedOut),
    }
}

pub fn display_occurrences(rows: &[OccurrenceRow], today: NaiveDate) {
    if rows.is_empty() {
        println!("No occurrences generated yet.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Title", "Status", "State", "Due"]);

    for occurrence in rows {
        let mut row = Row::new();
        match &occurrence.task {
            Some(task) => {
                let due = task.due_date.unwrap_or(occurrence.original_date);
                row.add_cell(Cell::new(task.id.to_string()));
                row.add_cell(Cell::new(occurrence.original_date.format("%a %Y-%m-%d")));
                row.add_cell(title_cell(task));
                row.add_cell(status_cell(task.status));
                row.add_cell(state_cell(occurrence.state));

                let due_cell = Cell::new(relative_day(due, today));
                let due_cell = if task.status == TaskStatus::Todo && due < today {
                    due_cell.fg(Color::Red)
                } else if due == today {
                    due_cell.fg(Color::Yellow)
                } else {
                    due_cell
                };
                row.add_cell(due_cell);
            }
            None => {
                row.add_cell(Cell::new("-"));
                row.add_cell(Cell::new(occurrence.original_date.format("%a %Y-%m-%d")));
                row.add_cell(Cell::new("-"));
                row.add_cell(Cell::new("-"));
                row.add_cell(state_cell(occurrence.state));
                row.add_cell(Cell::new("-"));
            }
        }
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_preview(rows: &[PreviewRow], today: NaiveDate) {
    if rows.is_empty() {
        println!("No upcoming occurrences.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Date", "When", "Generated"]);

    for (index, preview) in rows.iter().enumerate() {
        let mut row = Row::new();
        row.add_cell(Cell::new(index + 1));
        row.add_cell(Cell::new(preview.date.format("%a %Y-%m-%d")));
        row.add_cell(Cell::new(relative_day(preview.date, today)));
        row.add_cell(match preview.state {
            Some(state) => state_cell(state),
            None => Cell::new("no").fg(Color::DarkGrey),
        });
        table.add_row(row);
    }

    println!("{table}");
}
