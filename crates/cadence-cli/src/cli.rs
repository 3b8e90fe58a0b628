use cadence_core::models::{
    EditScope, EndCondition, Frequency, RecurrenceConfig, TaskPriority, TaskStatus,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::parser::{parse_date, parse_week_of_month, parse_weekday};

/// Recurring tasks on a calendar: create a series, preview it, and edit or
/// delete one occurrence, the ones ahead, or all of them
#[derive(Parser, Debug)]
#[command(name = "cadence", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a task, or a recurring series when --every is given
    Add(AddCommand),
    /// Materialize more occurrences of a series
    Generate(GenerateCommand),
    /// Show upcoming dates of a series without creating anything
    Preview(PreviewCommand),
    /// Show a series and its materialized occurrences
    Show(TaskRef),
    /// Describe the recurrence pattern of a series in words
    Describe(TaskRef),
    /// Edit a task or occurrence
    Edit(EditCommand),
    /// Delete a task or occurrence
    Delete(DeleteCommand),
    /// Replace the recurrence pattern of a series
    Pattern(PatternCommand),
    /// Stop generating occurrences for a series
    Pause(TaskRef),
    /// Resume a paused series
    Resume(TaskRef),
}

/// A task addressed by full ID or unique prefix
#[derive(Args, Debug, Clone)]
pub struct TaskRef {
    /// Task ID (master or occurrence) or a unique prefix of it
    pub id: String,
}

/// Flags describing a recurrence pattern
#[derive(Args, Debug, Clone, Default)]
pub struct PatternArgs {
    /// Repeat frequency (daily, weekly, monthly, yearly)
    #[arg(long)]
    pub every: Option<Frequency>,
    /// Repeat every N periods
    #[arg(long, requires = "every")]
    pub interval: Option<u32>,
    /// Weekdays, comma separated (e.g. mon,wed,fri)
    #[arg(long, value_delimiter = ',', value_parser = parse_weekday, requires = "every")]
    pub on: Vec<u8>,
    /// Day of the month (1-31); months without it are skipped
    #[arg(long, conflicts_with = "week", requires = "every")]
    pub day: Option<u8>,
    /// Week of the month (first, second, third, fourth, last)
    #[arg(long, value_parser = parse_week_of_month, requires = "weekday")]
    pub week: Option<i8>,
    /// Weekday used with --week (e.g. fri)
    #[arg(long, value_parser = parse_weekday, requires = "week", requires = "every")]
    pub weekday: Option<u8>,
    /// Month of the year (1-12)
    #[arg(long, requires = "every")]
    pub month: Option<u8>,
    /// Stop after N occurrences
    #[arg(long, conflicts_with = "until", requires = "every")]
    pub count: Option<u32>,
    /// Last date an occurrence may fall on (e.g. '2025-12-31')
    #[arg(long, value_parser = parse_date, requires = "every")]
    pub until: Option<NaiveDate>,
    /// Timezone deciding "today" for the series (IANA format)
    #[arg(long)]
    pub timezone: Option<String>,
}

impl PatternArgs {
    /// The structured pattern, or `None` when no --every was given.
    pub fn to_config(&self, timezone: String) -> Option<RecurrenceConfig> {
        let frequency = self.every?;
        let end = match (self.count, self.until) {
            (Some(count), _) => EndCondition::Count(count),
            (None, Some(until)) => EndCondition::Until(until),
            (None, None) => EndCondition::Never,
        };

        Some(RecurrenceConfig {
            frequency,
            interval: self.interval.unwrap_or(1),
            days_of_week: if self.on.is_empty() {
                None
            } else {
                Some(self.on.clone())
            },
            day_of_month: self.day,
            week_of_month: self.week,
            day_of_week_for_month: self.weekday,
            month_of_year: self.month,
            end,
            timezone,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddCommand {
    /// The title of the task
    pub title: String,
    /// The description of the task
    #[arg(short, long)]
    pub description: Option<String>,
    /// Due date; for a series this is the first possible occurrence
    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,
    /// The priority of the task (none, low, medium, high, urgent)
    #[arg(long)]
    pub priority: Option<TaskPriority>,
    /// Effort estimate in points
    #[arg(long)]
    pub effort: Option<i64>,
    /// Plan the task belongs to
    #[arg(long)]
    pub plan: Option<Uuid>,
    /// Tag IDs to attach
    #[arg(long)]
    pub tag: Vec<Uuid>,
    /// Assignee IDs to attach
    #[arg(long)]
    pub assignee: Vec<Uuid>,
    #[command(flatten)]
    pub pattern: PatternArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateCommand {
    /// Master or occurrence ID of the series
    pub id: String,
    /// Generate occurrences on or after this date (default: today)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,
    /// How many occurrences to create, capped by the series limit
    #[arg(long, short)]
    pub count: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewCommand {
    /// Master or occurrence ID of the series
    pub id: String,
    /// Number of dates to show
    #[arg(long, short, default_value_t = 10)]
    pub count: usize,
    /// First date to consider (default: today)
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,
    /// Show every date up to and including this one instead of --count dates
    #[arg(long, value_parser = parse_date)]
    pub to: Option<NaiveDate>,
}

#[derive(Args, Debug, Clone)]
pub struct EditCommand {
    /// The ID of the task or occurrence to edit
    pub id: String,

    /// How far the edit reaches for series tasks (this, future, all)
    #[arg(long)]
    pub scope: Option<EditScope>,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    pub description_clear: bool,

    #[arg(long)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub priority: Option<TaskPriority>,

    #[arg(long)]
    pub effort: Option<i64>,
    #[arg(long, conflicts_with = "effort")]
    pub effort_clear: bool,

    /// Move to another day; for series only valid with --scope this
    #[arg(long, value_parser = parse_date)]
    pub due: Option<NaiveDate>,

    #[arg(long)]
    pub add_tag: Vec<Uuid>,
    #[arg(long)]
    pub remove_tag: Vec<Uuid>,
    #[arg(long)]
    pub add_assignee: Vec<Uuid>,
    #[arg(long)]
    pub remove_assignee: Vec<Uuid>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID of the task or occurrence to delete
    pub id: String,
    /// How far the delete reaches for series tasks (this, future, all)
    #[arg(long)]
    pub scope: Option<EditScope>,
    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PatternCommand {
    /// Master or occurrence ID of the series
    pub id: String,
    #[command(flatten)]
    pub pattern: PatternArgs,
}
