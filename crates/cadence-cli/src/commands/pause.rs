use anyhow::Result;
use cadence_core::repository::{Repository, SeriesRepository};
use owo_colors::OwoColorize;

use crate::cli::TaskRef;
use crate::util::resolve_task_id;

/// Pauses or resumes generation for the series `command.id` belongs to.
pub async fn set_paused(repo: &impl Repository, command: TaskRef, paused: bool) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let rule = repo.find_rule_for_task(task_id).await?;

    if rule.is_paused == paused {
        println!(
            "Series is already {}.",
            if paused { "paused" } else { "active" }
        );
        return Ok(());
    }

    repo.set_paused(rule.id, paused).await?;
    if paused {
        println!("{} Series paused; no new occurrences will be generated.", "⏸".yellow());
    } else {
        println!("{} Series resumed.", "✓".green().bold());
    }
    Ok(())
}
