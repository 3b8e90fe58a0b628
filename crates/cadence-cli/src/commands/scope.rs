use anyhow::Result;
use cadence_core::lifecycle::{Mutation, ScopeAction, ScopePlan};
use cadence_core::models::{EditScope, Task};
use dialoguer::{Confirm, Select};
use owo_colors::OwoColorize;

const LISTED_DATES: usize = 10;

/// The scope given on the command line, or one picked interactively.
///
/// A master only offers scopes that make sense for it; "this occurrence"
/// needs an occurrence.
pub fn choose_scope(task: &Task, mutation: Mutation, flag: Option<EditScope>) -> Result<EditScope> {
    if let Some(scope) = flag {
        return Ok(scope);
    }

    let mut options = Vec::with_capacity(3);
    if task.is_instance() {
        let date = task
            .due_date
            .map(|d| d.format("%a %Y-%m-%d").to_string())
            .unwrap_or_else(|| "no date".to_string());
        options.push((format!("This occurrence only ({})", date), EditScope::This));
    }
    options.push(("This and future occurrences".to_string(), EditScope::Future));
    options.push(("Entire series".to_string(), EditScope::All));

    println!("{}", "This task is part of a recurring series.".yellow());
    let labels: Vec<&str> = options.iter().map(|(label, _)| label.as_str()).collect();
    let selection = Select::new()
        .with_prompt(format!("Which occurrences should the {} apply to?", mutation))
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(options[selection].1)
}

/// Lists what `plan` touches and asks before going ahead, unless `assume_yes`.
pub fn confirm_plan(plan: &ScopePlan, assume_yes: bool) -> Result<bool> {
    let task_count = plan.affected_task_ids().len();
    println!(
        "{} with scope '{}' affects {} task(s):",
        capitalize(&plan.mutation.to_string()),
        plan.scope.to_string().cyan(),
        task_count
    );

    if matches!(
        plan.action,
        ScopeAction::UpdateSeries { .. } | ScopeAction::DeleteSeries { .. }
    ) {
        println!("  • the series master");
    }

    let dates = plan.affected_dates();
    for date in dates.iter().take(LISTED_DATES) {
        println!("  • {}", date.format("%a %Y-%m-%d"));
    }
    if dates.len() > LISTED_DATES {
        println!("  … and {} more", dates.len() - LISTED_DATES);
    }

    match &plan.action {
        ScopeAction::DeleteInstances {
            end_rule_on: Some(end),
            ..
        } => println!("  • the series stops after {}", end.to_string().yellow()),
        ScopeAction::DeleteSeries { .. } => {
            println!("  • the recurrence rule and its history are removed")
        }
        _ => {}
    }

    if assume_yes {
        return Ok(true);
    }

    Ok(Confirm::new()
        .with_prompt("Proceed?")
        .default(false)
        .interact()
        .unwrap_or(false))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
