use anyhow::Result;
use cadence_core::error::CoreError;
use cadence_core::lifecycle::{self, Mutation};
use cadence_core::models::UpdateTaskData;
use cadence_core::repository::{Repository, ScopeRepository, TaskStore};
use owo_colors::{OwoColorize, Style};

use crate::cli::EditCommand;
use crate::commands::scope::{choose_scope, confirm_plan};
use crate::util::{clearable, non_empty, resolve_task_id};

pub async fn edit_task(repo: &impl Repository, command: EditCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let task = repo
        .find_task_by_id(task_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", task_id)))?;

    let updates = UpdateTaskData {
        title: command.title,
        description: clearable(command.description, command.description_clear),
        status: command.status,
        priority: command.priority,
        effort: clearable(command.effort, command.effort_clear),
        due_time: None,
        due_date: command.due,
        add_tags: non_empty(command.add_tag),
        remove_tags: non_empty(command.remove_tag),
        add_assignees: non_empty(command.add_assignee),
        remove_assignees: non_empty(command.remove_assignee),
    };

    let success_style = Style::new().green().bold();

    if !task.is_master() && !task.is_instance() {
        let updated = repo.update_task(task_id, updates).await?;
        println!(
            "{} Updated task: {}",
            "✓".style(success_style),
            updated.title.bright_white().bold()
        );
        return Ok(());
    }

    let scope = choose_scope(&task, Mutation::Update, command.scope)?;
    // Reject impossible edits before showing the plan
    lifecycle::check_update(&updates, scope)?;

    let plan = repo.plan_scope(task_id, Mutation::Update, scope).await?;
    if !confirm_plan(&plan, command.yes)? {
        println!("Edit cancelled.");
        return Ok(());
    }

    let outcome = repo.update_series(task_id, updates, scope).await?;
    println!(
        "{} Updated {} task(s) of '{}' (scope: {})",
        "✓".style(success_style),
        outcome.task_ids.len(),
        task.title.bright_white().bold(),
        scope
    );
    Ok(())
}
