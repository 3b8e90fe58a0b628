use crate::error::CoreError;
use crate::models::{NewTaskData, Task, TaskPriority, TaskStatus, UpdateTaskData};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, Transaction};
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::TaskStore for SqliteRepository {
    async fn add_task(
        &self,
        data: NewTaskData,
        tag_ids: Vec<Uuid>,
        assignee_ids: Vec<Uuid>,
    ) -> Result<Task, CoreError> {
        let task = Self::task_from_data(data, false)?;

        let mut tx = self.pool().begin().await?;
        Self::insert_task_in_transaction(&mut tx, &task).await?;
        Self::add_associations_in_transaction(&mut tx, task.id, &tag_ids, &assignee_ids).await?;
        tx.commit().await?;

        info!(task_id = %task.id, "task added");
        Ok(task)
    }

    async fn find_task_by_id(&self, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id_prefix(&self, short_id: &str) -> Result<Vec<Task>, CoreError> {
        // ids are stored as 16-byte blobs, so match on their hex form
        let mut pattern: String = short_id
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        pattern.push('%');

        let tasks = sqlx::query_as("SELECT * FROM tasks WHERE lower(hex(id)) LIKE $1")
            .bind(pattern)
            .fetch_all(self.pool())
            .await?;
        Ok(tasks)
    }

    async fn find_series_tasks(&self, master_id: Uuid) -> Result<Vec<Task>, CoreError> {
        let tasks = sqlx::query_as(
            "SELECT * FROM tasks WHERE recurring_master_id = $1 ORDER BY due_date, created_at",
        )
        .bind(master_id)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }

    async fn find_task_tags(&self, id: Uuid) -> Result<Vec<Uuid>, CoreError> {
        let tags = sqlx::query_scalar("SELECT tag_id FROM task_tags WHERE task_id = $1")
            .bind(id)
            .fetch_all(self.pool())
            .await?;
        Ok(tags)
    }

    async fn find_task_assignees(&self, id: Uuid) -> Result<Vec<Uuid>, CoreError> {
        let assignees =
            sqlx::query_scalar("SELECT assignee_id FROM task_assignees WHERE task_id = $1")
                .bind(id)
                .fetch_all(self.pool())
                .await?;
        Ok(assignees)
    }

    async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;

        let task = Self::find_task_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))?;
        Self::ensure_standalone(&task)?;

        Self::update_task_fields(&mut tx, id, &data).await?;
        let updated = Self::find_task_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let task = Self::find_task_by_id_in_transaction(&mut tx, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", id)))?;
        Self::ensure_standalone(&task)?;

        sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(task_id = %id, "task deleted");
        Ok(())
    }
}

impl SqliteRepository {
    /// Builds a fresh task row from caller-supplied fields.
    pub(crate) fn task_from_data(data: NewTaskData, is_recurring: bool) -> Result<Task, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::Validation("task title must not be empty".to_string()));
        }
        if matches!(data.effort, Some(effort) if effort < 0) {
            return Err(CoreError::Validation("effort must not be negative".to_string()));
        }

        let now = Utc::now();
        Ok(Task {
            id: Uuid::now_v7(),
            plan_id: data.plan_id,
            title: data.title,
            description: data.description,
            status: data.status.unwrap_or(TaskStatus::Todo),
            priority: data.priority.unwrap_or(TaskPriority::None),
            effort: data.effort,
            due_date: data.due_date,
            due_time: data.due_time,
            is_recurring,
            recurring_master_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure_standalone(task: &Task) -> Result<(), CoreError> {
        if task.is_master() || task.is_instance() {
            return Err(CoreError::Validation(format!(
                "task {} belongs to a recurring series; choose a scope (this, future or all)",
                task.id
            )));
        }
        Ok(())
    }

    pub(crate) async fn insert_task_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task: &Task,
    ) -> Result<(), CoreError> {
        sqlx::query(
            r#"INSERT INTO tasks (id, plan_id, title, description, status, priority, effort, due_date, due_time, is_recurring, recurring_master_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(task.id)
        .bind(task.plan_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.effort)
        .bind(task.due_date)
        .bind(task.due_time)
        .bind(task.is_recurring)
        .bind(task.recurring_master_id)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| CoreError::from_insert(e, || format!("task {} already exists", task.id)))?;
        Ok(())
    }

    pub(crate) async fn add_associations_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
        tag_ids: &[Uuid],
        assignee_ids: &[Uuid],
    ) -> Result<(), CoreError> {
        if !tag_ids.is_empty() {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO task_tags (task_id, tag_id) ");
            query_builder.push_values(tag_ids.iter(), |mut b, tag_id| {
                b.push_bind(task_id).push_bind(*tag_id);
            });
            query_builder.build().execute(&mut **tx).await?;
        }

        if !assignee_ids.is_empty() {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT OR IGNORE INTO task_assignees (task_id, assignee_id) ");
            query_builder.push_values(assignee_ids.iter(), |mut b, assignee_id| {
                b.push_bind(task_id).push_bind(*assignee_id);
            });
            query_builder.build().execute(&mut **tx).await?;
        }

        Ok(())
    }

    /// Find a task by ID within an existing transaction
    pub(crate) async fn find_task_by_id_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(task)
    }

    pub(crate) async fn find_task_tags_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<Vec<Uuid>, CoreError> {
        let tags = sqlx::query_scalar("SELECT tag_id FROM task_tags WHERE task_id = $1")
            .bind(id)
            .fetch_all(&mut **tx)
            .await?;
        Ok(tags)
    }

    pub(crate) async fn find_task_assignees_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
    ) -> Result<Vec<Uuid>, CoreError> {
        let assignees =
            sqlx::query_scalar("SELECT assignee_id FROM task_assignees WHERE task_id = $1")
                .bind(id)
                .fetch_all(&mut **tx)
                .await?;
        Ok(assignees)
    }

    /// Update task fields within an existing transaction
    pub(crate) async fn update_task_fields<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        id: Uuid,
        data: &UpdateTaskData,
    ) -> Result<(), CoreError> {
        if matches!(&data.title, Some(title) if title.trim().is_empty()) {
            return Err(CoreError::Validation("task title must not be empty".to_string()));
        }
        if matches!(data.effort, Some(Some(effort)) if effort < 0) {
            return Err(CoreError::Validation("effort must not be negative".to_string()));
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE tasks SET updated_at = ");
        qb.push_bind(Utc::now());

        if let Some(title) = &data.title {
            qb.push(", title = ");
            qb.push_bind(title);
        }
        if let Some(description) = &data.description {
            qb.push(", description = ");
            qb.push_bind(description);
        }
        if let Some(status) = data.status {
            qb.push(", status = ");
            qb.push_bind(status);
        }
        if let Some(priority) = data.priority {
            qb.push(", priority = ");
            qb.push_bind(priority);
        }
        if let Some(effort) = data.effort {
            qb.push(", effort = ");
            qb.push_bind(effort);
        }
        if let Some(due_time) = data.due_time {
            qb.push(", due_time = ");
            qb.push_bind(due_time);
        }
        if let Some(due_date) = data.due_date {
            qb.push(", due_date = ");
            qb.push_bind(due_date);
        }

        qb.push(" WHERE id = ");
        qb.push_bind(id);
        let result = qb.build().execute(&mut **tx).await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Task with id {} not found", id)));
        }

        Self::add_associations_in_transaction(
            tx,
            id,
            data.add_tags.as_deref().unwrap_or_default(),
            data.add_assignees.as_deref().unwrap_or_default(),
        )
        .await?;

        if let Some(tags_to_remove) = data.remove_tags.as_ref().filter(|t| !t.is_empty()) {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM task_tags WHERE task_id = ");
            query_builder.push_bind(id);
            query_builder.push(" AND tag_id IN (");
            let mut separated = query_builder.separated(", ");
            for tag_id in tags_to_remove.iter() {
                separated.push_bind(*tag_id);
            }
            separated.push_unseparated(")");
            query_builder.build().execute(&mut **tx).await?;
        }

        if let Some(to_remove) = data.remove_assignees.as_ref().filter(|a| !a.is_empty()) {
            let mut query_builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM task_assignees WHERE task_id = ");
            query_builder.push_bind(id);
            query_builder.push(" AND assignee_id IN (");
            let mut separated = query_builder.separated(", ");
            for assignee_id in to_remove.iter() {
                separated.push_bind(*assignee_id);
            }
            separated.push_unseparated(")");
            query_builder.build().execute(&mut **tx).await?;
        }

        Ok(())
    }
}
