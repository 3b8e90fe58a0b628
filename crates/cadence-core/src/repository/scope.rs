use crate::codec;
use crate::error::CoreError;
use crate::lifecycle::{self, Mutation, ScopeAction, ScopeOutcome, ScopePlan, SeriesSnapshot};
use crate::models::{EditScope, EndCondition, RecurrenceRule, UpdateTaskData};
use crate::recurrence::OccurrenceExpander;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::ScopeRepository for SqliteRepository {
    async fn plan_scope(
        &self,
        task_id: Uuid,
        mutation: Mutation,
        scope: EditScope,
    ) -> Result<ScopePlan, CoreError> {
        let mut tx = self.pool().begin().await?;
        let plan = self.resolve_in_transaction(&mut tx, task_id, mutation, scope).await?;
        tx.commit().await?;
        Ok(plan)
    }

    async fn update_series(
        &self,
        task_id: Uuid,
        updates: UpdateTaskData,
        scope: EditScope,
    ) -> Result<ScopeOutcome, CoreError> {
        lifecycle::check_update(&updates, scope)?;

        let mut tx = self.pool().begin().await?;
        let plan = self
            .resolve_in_transaction(&mut tx, task_id, Mutation::Update, scope)
            .await?;

        let outcome = Self::apply_update(&mut tx, &plan, &updates)
            .await
            .map_err(|source| scope_failed(&plan, source))?;
        tx.commit().await?;

        info!(
            task_id = %task_id,
            scope = %scope,
            tasks = outcome.task_ids.len(),
            "series updated"
        );
        Ok(outcome)
    }

    async fn delete_series(&self, task_id: Uuid, scope: EditScope) -> Result<ScopeOutcome, CoreError> {
        let mut tx = self.pool().begin().await?;
        let plan = self
            .resolve_in_transaction(&mut tx, task_id, Mutation::Delete, scope)
            .await?;

        let outcome = Self::apply_delete(&mut tx, &plan)
            .await
            .map_err(|source| scope_failed(&plan, source))?;
        tx.commit().await?;

        info!(
            task_id = %task_id,
            scope = %scope,
            tasks = outcome.task_ids.len(),
            "series deleted"
        );
        Ok(outcome)
    }
}

fn scope_failed(plan: &ScopePlan, source: CoreError) -> CoreError {
    CoreError::ScopeFailed {
        scope: plan.scope,
        task_id: plan.task_id,
        source: Box::new(source),
    }
}

impl SqliteRepository {
    async fn resolve_in_transaction<'a>(
        &self,
        tx: &mut Transaction<'a, Sqlite>,
        task_id: Uuid,
        mutation: Mutation,
        scope: EditScope,
    ) -> Result<ScopePlan, CoreError> {
        let (master, rule) = Self::find_series_rule_in_transaction(tx, task_id).await?;
        let instances = Self::find_instances_in_transaction(tx, rule.id).await?;
        let today = self.clock().today_in(&rule.timezone)?;

        let snapshot = SeriesSnapshot {
            master,
            rule,
            instances,
        };
        lifecycle::resolve(&snapshot, task_id, mutation, scope, today)
    }

    async fn apply_update<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        plan: &ScopePlan,
        updates: &UpdateTaskData,
    ) -> Result<ScopeOutcome, CoreError> {
        match &plan.action {
            ScopeAction::DetachInstance(instance) => {
                let task_id = instance.task_id.ok_or_else(|| {
                    CoreError::NotFound(format!("occurrence {} has no task", instance.original_date))
                })?;

                if let Some(new_date) = updates.due_date {
                    Self::ensure_date_free(tx, plan.rule_id, instance.id, new_date).await?;
                }

                Self::update_task_fields(tx, task_id, updates).await?;
                sqlx::query(
                    "UPDATE recurrence_instances SET is_exception = TRUE, updated_at = $1 WHERE id = $2",
                )
                .bind(Utc::now())
                .bind(instance.id)
                .execute(&mut **tx)
                .await?;
            }
            ScopeAction::UpdateSeries { .. } => {
                for task_id in plan.affected_task_ids() {
                    Self::update_task_fields(tx, task_id, updates).await?;
                }
            }
            ScopeAction::DeleteInstances { .. } | ScopeAction::DeleteSeries { .. } => {
                return Err(CoreError::Validation(format!(
                    "cannot apply an update with a {} plan",
                    plan.mutation
                )));
            }
        }

        Ok(ScopeOutcome {
            mutation: Mutation::Update,
            scope: plan.scope,
            task_ids: plan.affected_task_ids(),
            rule: None,
        })
    }

    /// Moving an occurrence onto a date the rule itself produces is only
    /// allowed when no other live occurrence holds that date.
    async fn ensure_date_free<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule_id: Uuid,
        instance_id: Uuid,
        new_date: NaiveDate,
    ) -> Result<(), CoreError> {
        let rule = Self::find_rule_by_id_in_transaction(tx, rule_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", rule_id)))?;
        if !OccurrenceExpander::new(&rule.rrule)?.is_valid_occurrence(new_date) {
            return Ok(());
        }

        let occupant: Option<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM recurrence_instances
            WHERE rule_id = $1 AND original_date = $2 AND is_deleted = FALSE AND id != $3"#,
        )
        .bind(rule_id)
        .bind(new_date)
        .bind(instance_id)
        .fetch_optional(&mut **tx)
        .await?;

        match occupant {
            Some(_) => Err(CoreError::Conflict(format!(
                "another occurrence is already scheduled on {}",
                new_date
            ))),
            None => Ok(()),
        }
    }

    async fn apply_delete<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        plan: &ScopePlan,
    ) -> Result<ScopeOutcome, CoreError> {
        let mut rule = None;

        match &plan.action {
            ScopeAction::DeleteInstances {
                instances,
                end_rule_on,
            } => {
                let now = Utc::now();
                for instance in instances {
                    if let Some(task_id) = instance.task_id {
                        sqlx::query("DELETE FROM tasks WHERE id = $1")
                            .bind(task_id)
                            .execute(&mut **tx)
                            .await?;
                    }
                    sqlx::query(
                        r#"UPDATE recurrence_instances
                        SET is_deleted = TRUE, task_id = NULL, updated_at = $1
                        WHERE id = $2"#,
                    )
                    .bind(now)
                    .bind(instance.id)
                    .execute(&mut **tx)
                    .await?;
                }

                if let Some(end) = end_rule_on {
                    rule = Some(Self::end_rule_in_transaction(tx, plan.rule_id, *end).await?);
                }
            }
            ScopeAction::DeleteSeries { .. } => {
                // Rule, instance rows and occurrence tasks go with the master
                sqlx::query("DELETE FROM tasks WHERE id = $1")
                    .bind(plan.master_id)
                    .execute(&mut **tx)
                    .await?;
            }
            ScopeAction::DetachInstance(_) | ScopeAction::UpdateSeries { .. } => {
                return Err(CoreError::Validation(format!(
                    "cannot apply a delete with a {} plan",
                    plan.mutation
                )));
            }
        }

        Ok(ScopeOutcome {
            mutation: Mutation::Delete,
            scope: plan.scope,
            task_ids: plan.affected_task_ids(),
            rule,
        })
    }

    /// Bounds the rule so expansion stops after `end`. A rule that produces
    /// nothing after `end`, through UNTIL or an exhausted COUNT, is left alone.
    async fn end_rule_in_transaction<'a>(
        tx: &mut Transaction<'a, Sqlite>,
        rule_id: Uuid,
        end: NaiveDate,
    ) -> Result<RecurrenceRule, CoreError> {
        let current = Self::find_rule_by_id_in_transaction(tx, rule_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", rule_id)))?;

        if matches!(current.end_date, Some(existing) if existing <= end) {
            return Ok(current);
        }
        let produces_after_end = match end.succ_opt() {
            Some(after) => OccurrenceExpander::new(&current.rrule)?
                .next_occurrence(after, &HashSet::new())
                .is_some(),
            None => false,
        };
        if !produces_after_end {
            return Ok(current);
        }

        // Dates up to `end` are the same under COUNT and UNTIL here, since
        // the rule still has occurrences past `end`.

        let encoded = codec::with_end(&current.rrule, &current.timezone, EndCondition::Until(end))?;
        Self::write_rule_in_transaction(tx, rule_id, &encoded).await
    }
}
