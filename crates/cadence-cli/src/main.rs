use cadence_core::db;
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;
use util::LookupError;

mod cli;
mod commands;
mod config;
mod parser;
mod timezone;
mod util;
mod views;

const LOG_ENV: &str = "CADENCE_LOG";

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = cli::Cli::parse();

    let config = match config::Config::new() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "invalid configuration, using defaults");
            config::Config::default()
        }
    };

    let db_pool = match db::establish_connection(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            handle_error(e.into());
            std::process::exit(1);
        }
    };
    let repository = SqliteRepository::new(db_pool, config.series_config());

    let result = match cli.command {
        cli::Commands::Add(command) => commands::add::add_task(&repository, command).await,
        cli::Commands::Generate(command) => {
            commands::generate::generate(&repository, command).await
        }
        cli::Commands::Preview(command) => commands::preview::preview(&repository, command).await,
        cli::Commands::Show(command) => commands::show::show_series(&repository, command).await,
        cli::Commands::Describe(command) => {
            commands::describe::describe(&repository, command).await
        }
        cli::Commands::Edit(command) => commands::edit::edit_task(&repository, command).await,
        cli::Commands::Delete(command) => {
            commands::delete::delete_task(&repository, command).await
        }
        cli::Commands::Pattern(command) => {
            commands::pattern::update_pattern(&repository, command).await
        }
        cli::Commands::Pause(command) => {
            commands::pause::set_paused(&repository, command, true).await
        }
        cli::Commands::Resume(command) => {
            commands::pause::set_paused(&repository, command, false).await
        }
    };

    if let Err(e) = result {
        handle_error(e);
        std::process::exit(1);
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    if let Some(lookup) = err.downcast_ref::<LookupError>() {
        match lookup {
            LookupError::Ambiguous { candidates, .. } => {
                eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
                eprintln!("Did you mean one of these?");
                for (id, title) in candidates {
                    eprintln!("  {} ({})", id.to_string().yellow(), title);
                }
            }
            LookupError::TooShort => eprintln!("{} {}", "Error:".style(error_style), lookup),
        }
        return;
    }

    let Some(core_error) = err.downcast_ref::<CoreError>() else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
        return;
    };

    if let CoreError::ScopeFailed { scope, .. } = core_error {
        eprintln!(
            "{} Nothing was changed; the '{}' change failed.",
            "Error:".style(error_style),
            scope
        );
    }

    match core_error.root() {
        CoreError::NotFound(s) => eprintln!("{} {}", "Error:".style(error_style), s),
        CoreError::NotRecurring(id) => eprintln!(
            "{} Task {} is not part of a recurring series.",
            "Error:".style(error_style),
            id.to_string().yellow()
        ),
        CoreError::Validation(s) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s)
        }
        CoreError::Conflict(s) => eprintln!(
            "{} {}",
            "Error:".style(error_style),
            s.yellow()
        ),
        CoreError::InvalidTimezone(s) => {
            eprintln!("{} Invalid timezone {}", "Error:".style(error_style), s)
        }
        CoreError::InvalidRRule(s) => {
            eprintln!("{} Invalid recurrence rule: {}", "Error:".style(error_style), s)
        }
        CoreError::Database(e) => {
            eprintln!("{} Database error: {}", "Error:".style(error_style), e)
        }
        other => eprintln!("{} {}", "Error:".style(error_style), other),
    }
}
