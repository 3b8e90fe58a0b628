//! # Cadence Core Library
//!
//! The recurring-task engine: recurrence patterns, their expansion into dates,
//! and the lifecycle of a master task and the instances it spawns.
//!
//! ## Core Modules
//!
//! - [`codec`]: RecurrenceConfig <-> RFC 5545 rule string
//! - [`recurrence`]: Occurrence expansion with exclusions
//! - [`lifecycle`]: Scope resolution for "this", "future" and "all" edits
//! - [`summary`]: Human-readable pattern descriptions
//! - [`repository`]: Data access layer with Repository pattern
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`timezone`]: Timezone utilities and the clock deciding "today"
//! - [`error`]: Error taxonomy
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     models::{Frequency, NewTaskData, RecurrenceConfig, SeriesConfig},
//!     repository::{SeriesRepository, SqliteRepository},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let repo = SqliteRepository::new(pool, SeriesConfig::default());
//!
//!     let template = NewTaskData {
//!         title: "Team sync".to_string(),
//!         ..Default::default()
//!     };
//!     let config = RecurrenceConfig::new(Frequency::Weekly, 1)
//!         .with_days_of_week([1, 3, 5])
//!         .with_timezone("America/New_York");
//!
//!     let created = repo.create_series(template, config, vec![], vec![]).await?;
//!     println!("{} instances from {}", created.instances.len(), created.rule.rrule);
//!
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod summary;
pub mod timezone;
