//! Scope resolution for edits and deletes on a recurring series.
//!
//! Resolution is pure: given a snapshot of the series and "today", it decides
//! which rows a mutation touches. The repository applies the resulting
//! [`ScopePlan`] inside one transaction, and the CLI shows the same plan to the
//! user before asking for confirmation.
//!
//! | mutation | this | future | all |
//! |---|---|---|---|
//! | update | the occurrence, detached as an exception | master + scheduled occurrences from today | master + every scheduled occurrence |
//! | delete | the occurrence | every live occurrence from today, rule ends the day before | master, rule and occurrences |

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{EditScope, RecurrenceInstance, RecurrenceRule, Task, UpdateTaskData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutation {
    Update,
    Delete,
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mutation::Update => write!(f, "update"),
            Mutation::Delete => write!(f, "delete"),
        }
    }
}

/// What the series looks like at the moment a mutation is resolved.
#[derive(Debug, Clone)]
pub struct SeriesSnapshot {
    pub master: Task,
    pub rule: RecurrenceRule,
    /// Every instance row of the rule, tombstones included
    pub instances: Vec<RecurrenceInstance>,
}

#[derive(Debug, Clone)]
pub enum ScopeAction {
    /// Apply the update to one occurrence and mark it as an exception
    DetachInstance(RecurrenceInstance),
    /// Apply the update to the master and the listed occurrences
    UpdateSeries { instances: Vec<RecurrenceInstance> },
    /// Tombstone the listed occurrences and remove their tasks, optionally
    /// ending the rule on `end_rule_on`
    DeleteInstances {
        instances: Vec<RecurrenceInstance>,
        end_rule_on: Option<NaiveDate>,
    },
    /// Remove the master; rule, instance rows and occurrence tasks cascade
    DeleteSeries { instances: Vec<RecurrenceInstance> },
}

/// The resolved effect of a scoped mutation.
#[derive(Debug, Clone)]
pub struct ScopePlan {
    pub mutation: Mutation,
    pub scope: EditScope,
    /// The task the user selected
    pub task_id: Uuid,
    pub master_id: Uuid,
    pub rule_id: Uuid,
    pub action: ScopeAction,
}

impl ScopePlan {
    /// Tasks the plan writes to or removes, master first.
    pub fn affected_task_ids(&self) -> Vec<Uuid> {
        let (includes_master, instances) = match &self.action {
            ScopeAction::DetachInstance(instance) => (false, std::slice::from_ref(instance)),
            ScopeAction::UpdateSeries { instances } => (true, instances.as_slice()),
            ScopeAction::DeleteInstances { instances, .. } => (false, instances.as_slice()),
            ScopeAction::DeleteSeries { instances } => (true, instances.as_slice()),
        };

        let mut ids = Vec::with_capacity(instances.len() + 1);
        if includes_master {
            ids.push(self.master_id);
        }
        ids.extend(instances.iter().filter_map(|i| i.task_id));
        ids
    }

    /// The occurrence dates the plan touches.
    pub fn affected_dates(&self) -> Vec<NaiveDate> {
        match &self.action {
            ScopeAction::DetachInstance(instance) => vec![instance.original_date],
            ScopeAction::UpdateSeries { instances }
            | ScopeAction::DeleteInstances { instances, .. }
            | ScopeAction::DeleteSeries { instances } => {
                instances.iter().map(|i| i.original_date).collect()
            }
        }
    }
}

/// What a scoped mutation did once committed.
#[derive(Debug, Clone)]
pub struct ScopeOutcome {
    pub mutation: Mutation,
    pub scope: EditScope,
    /// Tasks updated or removed
    pub task_ids: Vec<Uuid>,
    /// The rule after the change, when the mutation rewrote it
    pub rule: Option<RecurrenceRule>,
}

/// Rejects updates that cannot be applied with `scope`.
///
/// Moving an occurrence to another day only makes sense for that one
/// occurrence; series-wide date changes go through a pattern update.
pub fn check_update(updates: &UpdateTaskData, scope: EditScope) -> Result<(), CoreError> {
    if updates.is_empty() {
        return Err(CoreError::Validation("no changes requested".to_string()));
    }
    if updates.due_date.is_some() && scope != EditScope::This {
        return Err(CoreError::Validation(format!(
            "due date can only change for a single occurrence, not with scope '{}'",
            scope
        )));
    }
    Ok(())
}

/// Decides which rows `mutation` with `scope` touches when applied to `task_id`.
///
/// `task_id` must be the master of `series` or the task of one of its live
/// instances. "Today" is the calendar day in the series timezone.
pub fn resolve(
    series: &SeriesSnapshot,
    task_id: Uuid,
    mutation: Mutation,
    scope: EditScope,
    today: NaiveDate,
) -> Result<ScopePlan, CoreError> {
    let targets_master = task_id == series.master.id;

    let selected = if targets_master {
        None
    } else {
        let instance = series
            .instances
            .iter()
            .find(|i| i.task_id == Some(task_id) && i.is_live())
            .ok_or_else(|| {
                CoreError::NotFound(format!(
                    "task {} is not an occurrence of series {}",
                    task_id, series.master.id
                ))
            })?;
        Some(instance.clone())
    };

    let live = series.instances.iter().filter(|i| i.is_live());

    let action = match (mutation, scope) {
        (_, EditScope::This) => {
            let instance = selected.ok_or_else(|| {
                CoreError::Validation(
                    "scope 'this' applies to a single occurrence, not the series master"
                        .to_string(),
                )
            })?;
            match mutation {
                Mutation::Update => ScopeAction::DetachInstance(instance),
                Mutation::Delete => ScopeAction::DeleteInstances {
                    instances: vec![instance],
                    end_rule_on: None,
                },
            }
        }
        (Mutation::Update, EditScope::Future) => ScopeAction::UpdateSeries {
            instances: live
                .filter(|i| !i.is_exception && i.original_date >= today)
                .cloned()
                .collect(),
        },
        (Mutation::Update, EditScope::All) => ScopeAction::UpdateSeries {
            instances: live.filter(|i| !i.is_exception).cloned().collect(),
        },
        (Mutation::Delete, EditScope::Future) => ScopeAction::DeleteInstances {
            instances: live.filter(|i| i.original_date >= today).cloned().collect(),
            end_rule_on: Some(last_day_before(today, series.rule.start_date)),
        },
        (Mutation::Delete, EditScope::All) => ScopeAction::DeleteSeries {
            instances: live.cloned().collect(),
        },
    };

    Ok(ScopePlan {
        mutation,
        scope,
        task_id,
        master_id: series.master.id,
        rule_id: series.rule.id,
        action,
    })
}

/// The day before `today`, never earlier than `start`. An UNTIL before
/// DTSTART would make the rule unparseable.
fn last_day_before(today: NaiveDate, start: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today).max(start)
}
