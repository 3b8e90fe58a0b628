use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Cancelled,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" | "in-progress" | "doing" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    None,
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(TaskPriority::None),
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

/// A row of the task store.
///
/// Master tasks carry `is_recurring = true` and no `recurring_master_id`.
/// Instance tasks point at their master through `recurring_master_id` and
/// have `due_date` set to the occurrence they were generated for.
/// Ordinary tasks have neither.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    /// Plan (or other context) the task belongs to
    pub plan_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Effort estimate in points
    pub effort: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub is_recurring: bool,
    pub recurring_master_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    #[inline]
    pub fn is_master(&self) -> bool {
        self.is_recurring && self.recurring_master_id.is_none()
    }

    #[inline]
    pub fn is_instance(&self) -> bool {
        self.recurring_master_id.is_some()
    }
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: Uuid::now_v7(),
            plan_id: None,
            title: "".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::None,
            effort: None,
            due_date: None,
            due_time: None,
            is_recurring: false,
            recurring_master_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

/// Fields supplied by the caller for a new task (or a series template).
#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub plan_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub effort: Option<i64>,
    /// For series templates this is the anchor of the recurrence rule
    pub due_date: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
}

/// Partial update of a task. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub effort: Option<Option<i64>>,
    pub due_time: Option<Option<NaiveTime>>,
    /// Moving an occurrence to another day; only valid for a single occurrence
    pub due_date: Option<NaiveDate>,
    pub add_tags: Option<Vec<Uuid>>,
    pub remove_tags: Option<Vec<Uuid>>,
    pub add_assignees: Option<Vec<Uuid>>,
    pub remove_assignees: Option<Vec<Uuid>>,
}

impl UpdateTaskData {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.effort.is_none()
            && self.due_time.is_none()
            && self.due_date.is_none()
            && self.add_tags.as_ref().map_or(true, Vec::is_empty)
            && self.remove_tags.as_ref().map_or(true, Vec::is_empty)
            && self.add_assignees.as_ref().map_or(true, Vec::is_empty)
            && self.remove_assignees.as_ref().map_or(true, Vec::is_empty)
    }
}

// ============================================================================
// Recurrence configuration
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// The RFC 5545 `FREQ` token.
    pub fn as_rrule(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid frequency: {0}")]
pub struct ParseFrequencyError(String);

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "yearly" | "annually" => Ok(Frequency::Yearly),
            _ => Err(ParseFrequencyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EndType {
    Never,
    Count,
    Until,
}

/// How a series ends. Carrying the bound inside the variant keeps
/// "count required iff count-ended" true by construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum EndCondition {
    #[default]
    Never,
    Count(u32),
    Until(NaiveDate),
}

impl EndCondition {
    pub fn end_type(&self) -> EndType {
        match self {
            EndCondition::Never => EndType::Never,
            EndCondition::Count(_) => EndType::Count,
            EndCondition::Until(_) => EndType::Until,
        }
    }

    pub fn end_count(&self) -> Option<u32> {
        match self {
            EndCondition::Count(n) => Some(*n),
            _ => None,
        }
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        match self {
            EndCondition::Until(d) => Some(*d),
            _ => None,
        }
    }
}

/// Structured description of a recurrence pattern, as entered by a user.
///
/// Weekday numbers run from 1 (Monday) to 7 (Sunday). `week_of_month` is an
/// ordinal in {1, 2, 3, 4, -1}, where -1 means "last".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceConfig {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_of_month: Option<i8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week_for_month: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_of_year: Option<u8>,
    #[serde(default)]
    pub end: EndCondition,
    pub timezone: String,
}

impl RecurrenceConfig {
    /// An every-`interval` pattern of the given frequency with no constraints.
    pub fn new(frequency: Frequency, interval: u32) -> Self {
        Self {
            frequency,
            interval,
            days_of_week: None,
            day_of_month: None,
            week_of_month: None,
            day_of_week_for_month: None,
            month_of_year: None,
            end: EndCondition::Never,
            timezone: "UTC".to_string(),
        }
    }

    pub fn with_days_of_week(mut self, days: impl Into<Vec<u8>>) -> Self {
        self.days_of_week = Some(days.into());
        self
    }

    pub fn with_day_of_month(mut self, day: u8) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn with_relative_day(mut self, week_of_month: i8, weekday: u8) -> Self {
        self.week_of_month = Some(week_of_month);
        self.day_of_week_for_month = Some(weekday);
        self
    }

    pub fn with_month(mut self, month: u8) -> Self {
        self.month_of_year = Some(month);
        self
    }

    pub fn with_end(mut self, end: EndCondition) -> Self {
        self.end = end;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }
}

// ============================================================================
// Persisted series records
// ============================================================================

/// The recurrence rule owned by a master task.
///
/// `rrule` and the structured columns are two views of the same pattern and
/// are only ever written together by the codec.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurrenceRule {
    pub id: Uuid,
    pub master_task_id: Uuid,
    pub rrule: String,
    pub start_date: NaiveDate,
    pub frequency: Frequency,
    pub interval: i64,
    /// Comma separated weekday numbers, e.g. "1,3,5"
    pub days_of_week: Option<String>,
    pub day_of_month: Option<i64>,
    pub week_of_month: Option<i64>,
    pub day_of_week_for_month: Option<i64>,
    pub month_of_year: Option<i64>,
    pub end_type: EndType,
    pub end_count: Option<i64>,
    pub end_date: Option<NaiveDate>,
    pub timezone: String,
    /// Maximum instances materialized per generation call
    pub generation_limit: i64,
    pub last_generated_date: Option<NaiveDate>,
    pub is_paused: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle state of one materialized occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    /// Follows series-wide edits
    Scheduled,
    /// Detached from series-wide edits
    Exception,
    /// Tombstoned; the task row is gone and the date is never regenerated
    Deleted,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::Scheduled => write!(f, "scheduled"),
            InstanceState::Exception => write!(f, "exception"),
            InstanceState::Deleted => write!(f, "deleted"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurrenceInstance {
    pub id: Uuid,
    pub rule_id: Uuid,
    /// NULL once the occurrence has been deleted and its task removed
    pub task_id: Option<Uuid>,
    pub original_date: NaiveDate,
    pub is_exception: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceInstance {
    pub fn state(&self) -> InstanceState {
        if self.is_deleted {
            InstanceState::Deleted
        } else if self.is_exception {
            InstanceState::Exception
        } else {
            InstanceState::Scheduled
        }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}

/// An instance record together with the task generated for it.
#[derive(Debug, Clone)]
pub struct MaterializedInstance {
    pub instance: RecurrenceInstance,
    pub task: Task,
}

/// Result of creating a recurring series.
#[derive(Debug, Clone)]
pub struct SeriesCreated {
    pub master_task: Task,
    pub rule: RecurrenceRule,
    pub instances: Vec<MaterializedInstance>,
}

/// How far an edit or delete propagates across a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditScope {
    /// Only the selected occurrence
    This,
    /// The master and occurrences from today onward
    Future,
    /// The master and every occurrence
    All,
}

impl std::fmt::Display for EditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditScope::This => write!(f, "this"),
            EditScope::Future => write!(f, "future"),
            EditScope::All => write!(f, "all"),
        }
    }
}

impl FromStr for EditScope {
    type Err = ParseEditScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "this" | "occurrence" => Ok(EditScope::This),
            "future" | "this_and_future" => Ok(EditScope::Future),
            "all" | "series" | "entire" => Ok(EditScope::All),
            _ => Err(ParseEditScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid edit scope: {0}")]
pub struct ParseEditScopeError(String);

/// Settings for series creation and generation.
#[derive(Debug, Clone)]
pub struct SeriesConfig {
    /// Instances materialized per generation call for new rules
    pub generation_limit: u32,
    /// Zone used to resolve "today" when a series has none
    pub default_timezone: String,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            generation_limit: 20,
            default_timezone: "UTC".to_string(),
        }
    }
}
