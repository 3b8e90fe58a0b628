use anyhow::Result;
use cadence_core::codec;
use cadence_core::error::CoreError;
use cadence_core::models::Task;
use cadence_core::repository::{MaterializationRepository, Repository, SeriesRepository, TaskStore};
use cadence_core::summary::summarize;
use cadence_core::timezone::Clock;
use owo_colors::OwoColorize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::cli::TaskRef;
use crate::util::resolve_task_id;
use crate::views::table::{display_occurrences, OccurrenceRow};

pub async fn show_series(repo: &impl Repository, command: TaskRef) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let rule = repo.find_rule_for_task(task_id).await?;
    let master = repo.find_task_by_id(rule.master_task_id).await?.ok_or_else(|| {
        CoreError::NotFound(format!("Master task with id {} not found", rule.master_task_id))
    })?;

    let summary = summarize(&codec::parse(&rule.rrule, &rule.timezone)?);
    println!("{} {}", "↻".cyan(), master.title.bright_white().bold());
    println!("  Pattern:  {}", summary.long);
    println!("  Master:   {}", master.id.to_string().yellow());
    println!("  Timezone: {}", rule.timezone);
    if let Some(last) = rule.last_generated_date {
        println!("  Generated through {}", last);
    }
    if rule.is_paused {
        println!("  {}", "Paused".yellow().bold());
    }
    println!();

    let mut tasks: HashMap<Uuid, Task> = repo
        .find_series_tasks(master.id)
        .await?
        .into_iter()
        .map(|task| (task.id, task))
        .collect();

    let rows: Vec<OccurrenceRow> = repo
        .find_instances(rule.id)
        .await?
        .into_iter()
        .map(|instance| OccurrenceRow {
            original_date: instance.original_date,
            state: instance.state(),
            task: instance.task_id.and_then(|id| tasks.remove(&id)),
        })
        .collect();

    let today = Clock::System.today_in(&rule.timezone)?;
    display_occurrences(&rows, today);
    Ok(())
}
