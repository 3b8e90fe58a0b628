use anyhow::Result;
use cadence_core::repository::{MaterializationRepository, Repository, SeriesRepository};
use cadence_core::timezone::Clock;
use owo_colors::{OwoColorize, Style};
use tracing::debug;

use crate::cli::GenerateCommand;
use crate::util::resolve_task_id;

pub async fn generate(repo: &impl Repository, command: GenerateCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let rule = repo.find_rule_for_task(task_id).await?;

    if rule.is_paused {
        println!(
            "{} Series is paused; resume it to generate occurrences.",
            "!".yellow().bold()
        );
        return Ok(());
    }

    let from = match command.from {
        Some(date) => date,
        None => Clock::System.today_in(&rule.timezone)?,
    };
    let limit = u32::try_from(rule.generation_limit).unwrap_or(u32::MAX);
    let count = command.count.unwrap_or(limit);

    debug!(rule_id = %rule.id, %from, count, "generating occurrences");
    let created = repo.generate_instances(rule.id, from, count).await?;
    if created.is_empty() {
        println!("No new occurrences on or after {}.", from);
        return Ok(());
    }

    let info_style = Style::new().blue();
    println!(
        "{} Generated {} occurrence(s)",
        "✓".green().bold(),
        created.len()
    );
    for materialized in &created {
        println!(
            "  {} {}  {}",
            "→".style(info_style),
            materialized.instance.original_date.format("%a %Y-%m-%d"),
            materialized.task.id.to_string().yellow()
        );
    }
    Ok(())
}
