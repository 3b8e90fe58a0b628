use crate::codec::{self, EncodedRule};
use crate::error::CoreError;
use crate::models::{NewTaskData, RecurrenceConfig, RecurrenceRule, SeriesCreated, Task};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::SeriesRepository for SqliteRepository {
    async fn create_series(
        &self,
        template: NewTaskData,
        config: RecurrenceConfig,
        tag_ids: Vec<Uuid>,
        assignee_ids: Vec<Uuid>,
    ) -> Result<SeriesCreated, CoreError> {
        let mut config = config;
        if config.timezone.trim().is_empty() {
            config.timezone = self.config().default_timezone.clone();
        }

        let anchor = match template.due_date {
            Some(date) => date,
            None => self.clock().today_in(&config.timezone)?,
        };
        let encoded = codec::encode(&config, anchor)?;

        let mut template = template;
        template.due_date = Some(anchor);
        let master = Self::task_from_data(template, true)?;
        let generation_limit = self.config().generation_limit.max(1);

        let mut tx = self.pool().begin().await?;

        Self::insert_task_in_transaction(&mut tx, &master).await?;
        Self::add_associations_in_transaction(&mut tx, master.id, &tag_ids, &assignee_ids).await?;
        let rule =
            Self::insert_rule_in_transaction(&mut tx, master.id, &encoded, generation_limit).await?;

        let instances =
            Self::materialize_in_transaction(&mut tx, &rule, &master, anchor, generation_limit)
                .await?;
        let rule = Self::find_rule_by_id_in_transaction(&mut tx, rule.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", rule.id)))?;

        tx.commit().await?;

        info!(
            master_id = %master.id,
            rule_id = %rule.id,
            rrule = %rule.rrule,
            instances = instances.len(),
            "series created"
        );

        Ok(SeriesCreated {
            master_task: master,
            rule,
            instances,
        })
    }

    async fn find_rule_by_id(&self, rule_id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(rule_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(rule)
    }

    async fn find_rule_for_task(&self, task_id: Uuid) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;
        let (_, rule) = Self::find_series_rule_in_transaction(&mut tx, task_id).await?;
        tx.commit().await?;
        Ok(rule)
    }

    async fn update_pattern(
        &self,
        task_id: Uuid,
        config: RecurrenceConfig,
    ) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let (_, current) = Self::find_series_rule_in_transaction(&mut tx, task_id).await?;
        let encoded = codec::encode(&config, current.start_date)?;
        let rule = Self::write_rule_in_transaction(&mut tx, current.id, &encoded).await?;

        tx.commit().await?;

        info!(rule_id = %rule.id, from = %current.rrule, to = %rule.rrule, "pattern updated");
        Ok(rule)
    }

    async fn set_paused(&self, rule_id: Uuid, paused: bool) -> Result<RecurrenceRule, CoreError> {
        let rule: RecurrenceRule = sqlx::query_as(
            r#"UPDATE recurrence_rules
            SET is_paused = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(paused)
        .bind(Utc::now())
        .bind(rule_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", rule_id)))?;

        info!(rule_id = %rule_id, paused, "rule pause state changed");
        Ok(rule)
    }
}

impl SqliteRepository {
    /// The master id of the series `task` belongs to.
    pub(crate) fn master_id_of(task: &Task) -> Result<Uuid, CoreError> {
        match task.recurring_master_id {
            Some(master_id) => Ok(master_id),
            None if task.is_recurring => Ok(task.id),
            None => Err(CoreError::NotRecurring(task.id)),
        }
    }

    /// Resolves `task_id` (master or instance) to its master task and rule.
    pub(crate) async fn find_series_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
    ) -> Result<(Task, RecurrenceRule), CoreError> {
        let task = Self::find_task_by_id_in_transaction(tx, task_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", task_id)))?;
        let master_id = Self::master_id_of(&task)?;

        let master = if master_id == task.id {
            task
        } else {
            Self::find_task_by_id_in_transaction(tx, master_id)
                .await?
                .ok_or_else(|| {
                    CoreError::NotFound(format!("Master task with id {} not found", master_id))
                })?
        };

        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE master_task_id = $1")
            .bind(master_id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!("No recurrence rule for master task {}", master_id))
            })?;

        Ok((master, rule))
    }

    pub(crate) async fn find_rule_by_id_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule_id: Uuid,
    ) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1")
            .bind(rule_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(rule)
    }

    async fn insert_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        master_task_id: Uuid,
        encoded: &EncodedRule,
        generation_limit: u32,
    ) -> Result<RecurrenceRule, CoreError> {
        let now = Utc::now();
        let rule = sqlx::query_as(
            r#"INSERT INTO recurrence_rules (
                id, master_task_id, rrule, start_date, frequency, interval, days_of_week,
                day_of_month, week_of_month, day_of_week_for_month, month_of_year,
                end_type, end_count, end_date, timezone, generation_limit,
                last_generated_date, is_paused, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, NULL, FALSE, $17, $17)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(master_task_id)
        .bind(&encoded.rrule)
        .bind(encoded.start_date)
        .bind(encoded.frequency)
        .bind(encoded.interval)
        .bind(&encoded.days_of_week)
        .bind(encoded.day_of_month)
        .bind(encoded.week_of_month)
        .bind(encoded.day_of_week_for_month)
        .bind(encoded.month_of_year)
        .bind(encoded.end_type)
        .bind(encoded.end_count)
        .bind(encoded.end_date)
        .bind(&encoded.timezone)
        .bind(i64::from(generation_limit))
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            CoreError::from_insert(e, || {
                format!("master task {} already has a recurrence rule", master_task_id)
            })
        })?;
        Ok(rule)
    }

    /// Rewrites the rule string and every mirrored column in one statement.
    pub(crate) async fn write_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule_id: Uuid,
        encoded: &EncodedRule,
    ) -> Result<RecurrenceRule, CoreError> {
        let rule = sqlx::query_as(
            r#"UPDATE recurrence_rules
            SET rrule = $1, start_date = $2, frequency = $3, interval = $4, days_of_week = $5,
                day_of_month = $6, week_of_month = $7, day_of_week_for_month = $8,
                month_of_year = $9, end_type = $10, end_count = $11, end_date = $12,
                timezone = $13, updated_at = $14
            WHERE id = $15
            RETURNING *
            "#,
        )
        .bind(&encoded.rrule)
        .bind(encoded.start_date)
        .bind(encoded.frequency)
        .bind(encoded.interval)
        .bind(&encoded.days_of_week)
        .bind(encoded.day_of_month)
        .bind(encoded.week_of_month)
        .bind(encoded.day_of_week_for_month)
        .bind(encoded.month_of_year)
        .bind(encoded.end_type)
        .bind(encoded.end_count)
        .bind(encoded.end_date)
        .bind(&encoded.timezone)
        .bind(Utc::now())
        .bind(rule_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", rule_id)))?;
        Ok(rule)
    }
}
