use crate::error::CoreError;
use crate::models::{MaterializedInstance, RecurrenceInstance, RecurrenceRule, Task, TaskStatus};
use crate::recurrence::OccurrenceExpander;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::MaterializationRepository for SqliteRepository {
    async fn generate_instances(
        &self,
        rule_id: Uuid,
        from: NaiveDate,
        count: u32,
    ) -> Result<Vec<MaterializedInstance>, CoreError> {
        let mut tx = self.pool().begin().await?;

        // Take the write lock before reading the exclusion set so concurrent
        // generators serialize on the rule row
        let locked = sqlx::query("UPDATE recurrence_rules SET updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Rule with id {} not found", rule_id)));
        }

        let rule = Self::find_rule_by_id_in_transaction(&mut tx, rule_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", rule_id)))?;

        if rule.is_paused {
            tx.commit().await?;
            debug!(rule_id = %rule_id, "rule is paused, nothing generated");
            return Ok(Vec::new());
        }

        let master = Self::find_task_by_id_in_transaction(&mut tx, rule.master_task_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "Master task with id {} not found",
                    rule.master_task_id
                ))
            })?;

        let limit = count.min(u32::try_from(rule.generation_limit).unwrap_or(u32::MAX));
        let instances = Self::materialize_in_transaction(&mut tx, &rule, &master, from, limit).await?;

        tx.commit().await?;
        Ok(instances)
    }

    async fn find_instances(&self, rule_id: Uuid) -> Result<Vec<RecurrenceInstance>, CoreError> {
        let instances = sqlx::query_as(
            "SELECT * FROM recurrence_instances WHERE rule_id = $1 ORDER BY original_date",
        )
        .bind(rule_id)
        .fetch_all(self.pool())
        .await?;
        Ok(instances)
    }

    async fn find_instance_by_task(
        &self,
        task_id: Uuid,
    ) -> Result<Option<RecurrenceInstance>, CoreError> {
        let instance = sqlx::query_as("SELECT * FROM recurrence_instances WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(instance)
    }
}

impl SqliteRepository {
    /// Creates task and instance rows for up to `limit` new occurrences of
    /// `rule` on or after `from`.
    ///
    /// Every date that already has an instance row, tombstones and exceptions
    /// included, is excluded. The caller must hold the write lock on the rule.
    pub(crate) async fn materialize_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule: &RecurrenceRule,
        master: &Task,
        from: NaiveDate,
        limit: u32,
    ) -> Result<Vec<MaterializedInstance>, CoreError> {
        let existing = Self::find_instances_in_transaction(tx, rule.id).await?;
        let exclude: HashSet<NaiveDate> = existing.iter().map(|i| i.original_date).collect();

        let expander = OccurrenceExpander::new(&rule.rrule)?;
        let dates = expander.next_occurrences(from, limit as usize, &exclude);
        if dates.is_empty() {
            debug!(rule_id = %rule.id, %from, "no occurrences left to generate");
            return Ok(Vec::new());
        }

        let tag_ids = Self::find_task_tags_in_transaction(tx, master.id).await?;
        let assignee_ids = Self::find_task_assignees_in_transaction(tx, master.id).await?;

        let mut created = Vec::with_capacity(dates.len());
        for date in &dates {
            let task = Self::instance_task(master, *date);
            Self::insert_task_in_transaction(tx, &task).await?;
            Self::add_associations_in_transaction(tx, task.id, &tag_ids, &assignee_ids).await?;

            let instance = Self::insert_instance_in_transaction(tx, rule.id, task.id, *date).await?;
            created.push(MaterializedInstance { instance, task });
        }

        // Ascending output, so the last date is the latest
        let latest = dates[dates.len() - 1];
        sqlx::query(
            r#"UPDATE recurrence_rules
            SET last_generated_date = MAX(COALESCE(last_generated_date, $1), $1), updated_at = $2
            WHERE id = $3"#,
        )
        .bind(latest)
        .bind(Utc::now())
        .bind(rule.id)
        .execute(&mut **tx)
        .await?;

        debug!(
            rule_id = %rule.id,
            generated = created.len(),
            first = %dates[0],
            last = %latest,
            "instances generated"
        );
        Ok(created)
    }

    /// A new task for one occurrence, copied from the master.
    fn instance_task(master: &Task, due_date: NaiveDate) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::now_v7(),
            plan_id: master.plan_id,
            title: master.title.clone(),
            description: master.description.clone(),
            status: TaskStatus::Todo,
            priority: master.priority,
            effort: master.effort,
            due_date: Some(due_date),
            due_time: master.due_time,
            is_recurring: false,
            recurring_master_id: Some(master.id),
            created_at: now,
            updated_at: now,
        }
    }

    async fn insert_instance_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule_id: Uuid,
        task_id: Uuid,
        original_date: NaiveDate,
    ) -> Result<RecurrenceInstance, CoreError> {
        let now = Utc::now();
        let instance = sqlx::query_as(
            r#"INSERT INTO recurrence_instances (id, rule_id, task_id, original_date, is_exception, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, FALSE, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(rule_id)
        .bind(task_id)
        .bind(original_date)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            CoreError::from_insert(e, || {
                format!("occurrence {} of rule {} already exists", original_date, rule_id)
            })
        })?;
        Ok(instance)
    }

    pub(crate) async fn find_instances_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule_id: Uuid,
    ) -> Result<Vec<RecurrenceInstance>, CoreError> {
        let instances = sqlx::query_as(
            "SELECT * FROM recurrence_instances WHERE rule_id = $1 ORDER BY original_date",
        )
        .bind(rule_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(instances)
    }
}
