use anyhow::Result;
use cadence_core::models::NewTaskData;
use cadence_core::repository::{Repository, SeriesRepository, TaskStore};
use cadence_core::summary::summarize;
use owo_colors::{OwoColorize, Style};

use crate::cli::AddCommand;
use crate::timezone::normalize_timezone_input;

pub async fn add_task(repo: &impl Repository, command: AddCommand) -> Result<()> {
    // An empty zone lets the repository apply the configured default
    let timezone = command
        .pattern
        .timezone
        .as_deref()
        .map(normalize_timezone_input)
        .transpose()?
        .unwrap_or_default();

    let template = NewTaskData {
        plan_id: command.plan,
        title: command.title,
        description: command.description,
        status: None,
        priority: command.priority,
        effort: command.effort,
        due_date: command.due,
        due_time: None,
    };

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();
    let subtle_style = Style::new().bright_black();

    let Some(config) = command.pattern.to_config(timezone) else {
        let task = repo.add_task(template, command.tag, command.assignee).await?;
        println!(
            "{} Created task: {}",
            "✓".style(success_style),
            task.title.bright_white().bold()
        );
        println!("  {} Task ID: {}", "→".style(info_style), task.id.to_string().yellow());
        if let Some(due) = task.due_date {
            println!(
                "  {} Due: {}",
                "→".style(info_style),
                due.format("%a %Y-%m-%d").to_string().cyan()
            );
        }
        return Ok(());
    };

    let summary = summarize(&config);
    let created = repo
        .create_series(template, config, command.tag, command.assignee)
        .await?;
    let master = &created.master_task;

    println!(
        "{} Created recurring task: {}",
        "✓".style(success_style),
        master.title.bright_white().bold()
    );
    println!("  {} Task ID: {}", "→".style(info_style), master.id.to_string().yellow());
    println!("  {} Pattern: {}", "→".style(info_style), summary.long.cyan());
    println!(
        "  {} Rule: {} ({})",
        "→".style(info_style),
        created.rule.rrule.replace('\n', " ").style(subtle_style),
        created.rule.timezone
    );

    match (created.instances.first(), created.instances.last()) {
        (Some(first), Some(last)) => println!(
            "  {} Generated {} occurrences, {} to {}",
            "→".style(info_style),
            created.instances.len(),
            first.instance.original_date,
            last.instance.original_date
        ),
        _ => println!(
            "  {} No occurrences fall on or after the start date",
            "→".style(info_style)
        ),
    }

    println!("\n{} Next steps:", "•".style(subtle_style));
    println!(
        "   {} See occurrences: cadence show {}",
        "•".style(subtle_style),
        master.id.to_string().yellow()
    );
    println!(
        "   {} Preview ahead:   cadence preview {}",
        "•".style(subtle_style),
        master.id.to_string().yellow()
    );

    Ok(())
}
