use anyhow::{anyhow, Result};
use cadence_core::codec;
use cadence_core::repository::{Repository, SeriesRepository};
use cadence_core::summary::summarize;
use owo_colors::{OwoColorize, Style};

use crate::cli::PatternCommand;
use crate::timezone::normalize_timezone_input;
use crate::util::resolve_task_id;

pub async fn update_pattern(repo: &impl Repository, command: PatternCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let current = repo.find_rule_for_task(task_id).await?;

    let timezone = match command.pattern.timezone.as_deref() {
        Some(tz) => normalize_timezone_input(tz)?,
        None => current.timezone.clone(),
    };
    let config = command
        .pattern
        .to_config(timezone)
        .ok_or_else(|| anyhow!("--every is required to replace a pattern"))?;

    let rule = repo.update_pattern(task_id, config).await?;
    let summary = summarize(&codec::parse(&rule.rrule, &rule.timezone)?);

    let info_style = Style::new().blue();
    println!("{} Pattern updated: {}", "✓".green().bold(), summary.long.cyan());
    for (label, rrule) in [("Was", &current.rrule), ("Now", &rule.rrule)] {
        println!(
            "  {} {}:  {}",
            "→".style(info_style),
            label,
            rrule.replace('\n', " ").bright_black()
        );
    }
    println!(
        "  {} Generated occurrences keep their dates; `cadence generate` adds the new ones",
        "→".style(info_style)
    );
    Ok(())
}
