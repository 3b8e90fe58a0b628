use crate::db::DbPool;
use crate::error::CoreError;
use crate::lifecycle::{Mutation, ScopeOutcome, ScopePlan};
use crate::models::{
    EditScope, MaterializedInstance, NewTaskData, RecurrenceConfig, RecurrenceInstance,
    RecurrenceRule, SeriesConfig, SeriesCreated, Task, UpdateTaskData,
};
use crate::timezone::Clock;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

pub mod materialization;
pub mod scope;
pub mod series;
pub mod tasks;

// Traits are defined here and implemented for SqliteRepository in the
// module of the same domain

/// Plain task store operations
#[async_trait]
pub trait TaskStore {
    /// Adds an ordinary, non-recurring task.
    async fn add_task(
        &self,
        data: NewTaskData,
        tag_ids: Vec<Uuid>,
        assignee_ids: Vec<Uuid>,
    ) -> Result<Task, CoreError>;
    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError>;
    /// Instance tasks of a series, ordered by due date.
    async fn find_series_tasks(&self, master_id: Uuid) -> Result<Vec<Task>, CoreError>;
    async fn find_task_tags(&self, id: Uuid) -> Result<Vec<Uuid>, CoreError>;
    async fn find_task_assignees(&self, id: Uuid) -> Result<Vec<Uuid>, CoreError>;
    /// Updates an ordinary task. Series tasks go through [`ScopeRepository`].
    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError>;
    /// Hard-deletes an ordinary task. Series tasks go through [`ScopeRepository`].
    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Series creation and rule maintenance
#[async_trait]
pub trait SeriesRepository {
    /// Creates the master task, its rule and the first batch of instances in
    /// one transaction.
    async fn create_series(
        &self,
        template: NewTaskData,
        config: RecurrenceConfig,
        tag_ids: Vec<Uuid>,
        assignee_ids: Vec<Uuid>,
    ) -> Result<SeriesCreated, CoreError>;
    async fn find_rule_by_id(&self, rule_id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    /// The rule governing the series `task_id` belongs to (master or instance).
    async fn find_rule_for_task(&self, task_id: Uuid) -> Result<RecurrenceRule, CoreError>;
    /// Replaces the pattern of a series. Materialized instances are untouched.
    async fn update_pattern(
        &self,
        task_id: Uuid,
        config: RecurrenceConfig,
    ) -> Result<RecurrenceRule, CoreError>;
    async fn set_paused(&self, rule_id: Uuid, paused: bool) -> Result<RecurrenceRule, CoreError>;
}

/// Turning occurrence dates into tasks
#[async_trait]
pub trait MaterializationRepository {
    /// Materializes up to `min(count, generation_limit)` new occurrences on or
    /// after `from`.
    async fn generate_instances(
        &self,
        rule_id: Uuid,
        from: NaiveDate,
        count: u32,
    ) -> Result<Vec<MaterializedInstance>, CoreError>;
    /// Every instance row of a rule, tombstones included, by date.
    async fn find_instances(&self, rule_id: Uuid) -> Result<Vec<RecurrenceInstance>, CoreError>;
    async fn find_instance_by_task(
        &self,
        task_id: Uuid,
    ) -> Result<Option<RecurrenceInstance>, CoreError>;
}

/// Scoped edits and deletes
#[async_trait]
pub trait ScopeRepository {
    /// Resolves what a scoped mutation would touch without changing anything.
    async fn plan_scope(
        &self,
        task_id: Uuid,
        mutation: Mutation,
        scope: EditScope,
    ) -> Result<ScopePlan, CoreError>;
    async fn update_series(
        &self,
        task_id: Uuid,
        updates: UpdateTaskData,
        scope: EditScope,
    ) -> Result<ScopeOutcome, CoreError>;
    async fn delete_series(&self, task_id: Uuid, scope: EditScope) -> Result<ScopeOutcome, CoreError>;
}

/// Everything the engine needs from storage
pub trait Repository:
    TaskStore + SeriesRepository + MaterializationRepository + ScopeRepository + Send + Sync
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    config: SeriesConfig,
    clock: Clock,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, config: SeriesConfig) -> Self {
        Self {
            pool,
            config,
            clock: Clock::System,
        }
    }

    /// Replaces the clock used to decide "today".
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn config(&self) -> &SeriesConfig {
        &self.config
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }
}

impl Repository for SqliteRepository {}
