use anyhow::Result;
use cadence_core::error::CoreError;
use cadence_core::lifecycle::Mutation;
use cadence_core::repository::{Repository, ScopeRepository, TaskStore};
use dialoguer::Confirm;
use owo_colors::{OwoColorize, Style};

use crate::cli::DeleteCommand;
use crate::commands::scope::{choose_scope, confirm_plan};
use crate::util::resolve_task_id;

pub async fn delete_task(repo: &impl Repository, command: DeleteCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let task = repo
        .find_task_by_id(task_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Task with id {} not found", task_id)))?;

    let success_style = Style::new().green().bold();

    if !task.is_master() && !task.is_instance() {
        if !command.yes {
            let confirmation = Confirm::new()
                .with_prompt(format!("Are you sure you want to delete task '{}'?", task.title))
                .default(false)
                .interact()
                .unwrap_or(false);
            if !confirmation {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        repo.delete_task(task_id).await?;
        println!("{} Deleted task: {}", "✓".style(success_style), task.title);
        return Ok(());
    }

    let scope = choose_scope(&task, Mutation::Delete, command.scope)?;
    let plan = repo.plan_scope(task_id, Mutation::Delete, scope).await?;
    if !confirm_plan(&plan, command.yes)? {
        println!("Deletion cancelled.");
        return Ok(());
    }

    let outcome = repo.delete_series(task_id, scope).await?;
    println!(
        "{} Deleted {} task(s) of '{}' (scope: {})",
        "✓".style(success_style),
        outcome.task_ids.len(),
        task.title.bright_white().bold(),
        scope
    );
    if let Some(end) = outcome.rule.as_ref().and_then(|rule| rule.end_date) {
        println!("  {} Series now ends on {}", "→".blue(), end.to_string().yellow());
    }
    Ok(())
}
