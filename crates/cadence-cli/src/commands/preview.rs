use anyhow::{bail, Result};
use cadence_core::codec;
use cadence_core::models::InstanceState;
use cadence_core::recurrence::OccurrenceExpander;
use cadence_core::repository::{MaterializationRepository, Repository, SeriesRepository};
use cadence_core::summary::summarize;
use cadence_core::timezone::Clock;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use std::collections::{HashMap, HashSet};

use crate::cli::PreviewCommand;
use crate::util::resolve_task_id;
use crate::views::table::{display_preview, PreviewRow};

pub async fn preview(repo: &impl Repository, command: PreviewCommand) -> Result<()> {
    let task_id = resolve_task_id(repo, &command.id).await?;
    let rule = repo.find_rule_for_task(task_id).await?;
    let expander = OccurrenceExpander::new(&rule.rrule)?;

    let today = Clock::System.today_in(&rule.timezone)?;
    let from = command.from.unwrap_or(today);

    let states: HashMap<NaiveDate, InstanceState> = repo
        .find_instances(rule.id)
        .await?
        .into_iter()
        .map(|instance| (instance.original_date, instance.state()))
        .collect();
    // Deleted occurrences never come back, so they are not upcoming
    let deleted: HashSet<NaiveDate> = states
        .iter()
        .filter(|(_, state)| **state == InstanceState::Deleted)
        .map(|(date, _)| *date)
        .collect();

    let dates = match command.to {
        Some(to) if to < from => bail!("--to {} is before the first date {}", to, from),
        Some(to) => expander.occurrences_between(from, to, &deleted),
        None => expander.next_occurrences(from, command.count, &deleted),
    };

    let summary = summarize(&codec::parse(&rule.rrule, &rule.timezone)?);
    println!("{} {}", "↻".cyan(), summary.long.bold());
    if rule.is_paused {
        println!("{}", "Series is paused; these dates are not being generated.".yellow());
    }

    let rows: Vec<PreviewRow> = dates
        .into_iter()
        .map(|date| PreviewRow {
            date,
            state: states.get(&date).copied(),
        })
        .collect();
    display_preview(&rows, today);
    Ok(())
}
