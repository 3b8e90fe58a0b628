use anyhow::Result;
use cadence_core::codec;
use cadence_core::models::EndType;
use cadence_core::recurrence::OccurrenceExpander;
use cadence_core::repository::{MaterializationRepository, Repository, SeriesRepository};
use cadence_core::summary::summarize;
use cadence_core::timezone::Clock;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use std::collections::HashSet;

use crate::cli::TaskRef;
use crate::util::resolve_task_id;

pub async fn describe(repo: &impl Repository, command: TaskRef) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let rule = repo.find_rule_for_task(task_id).await?;
    let config = codec::parse(&rule.rrule, &rule.timezone)?;
    let summary = summarize(&config);

    println!("{} {}", summary.short.cyan().bold(), summary.long);
    println!("  Rule:     {}", rule.rrule.replace('\n', " ").bright_black());
    println!("  Starts:   {}", rule.start_date.format("%a %Y-%m-%d"));
    match rule.end_type {
        EndType::Never => println!("  Ends:     never"),
        EndType::Count => println!("  Ends:     after {} occurrences", rule.end_count.unwrap_or(0)),
        EndType::Until => {
            if let Some(end) = rule.end_date {
                println!("  Ends:     {}", end.format("%a %Y-%m-%d"));
            }
        }
    }
    println!("  Timezone: {}", rule.timezone);

    if rule.is_paused {
        println!("  {}", "Paused".yellow().bold());
        return Ok(());
    }

    let deleted: HashSet<NaiveDate> = repo
        .find_instances(rule.id)
        .await?
        .into_iter()
        .filter(|instance| instance.is_deleted)
        .map(|instance| instance.original_date)
        .collect();
    let today = Clock::System.today_in(&rule.timezone)?;
    match OccurrenceExpander::new(&rule.rrule)?.next_occurrence(today, &deleted) {
        Some(next) => println!("  Next:     {}", next.format("%a %Y-%m-%d").to_string().green()),
        None => println!("  Next:     {}", "no further occurrences".bright_black()),
    }
    Ok(())
}
