use cadence_core::models::SeriesConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::timezone::detect_system_timezone;

const CONFIG_FILE: &str = "cadence.toml";

#[derive(Deserialize, Debug)]
pub struct Config {
    /// SQLite database file, created on first use
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default)]
    pub recurrence: RecurrenceSettings,
}

/// Defaults applied to new series
#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct RecurrenceSettings {
    /// Zone for series created without `--timezone` (IANA format)
    pub default_timezone: String,
    /// Occurrences materialized per generation call
    pub generation_limit: u32,
}

impl Default for RecurrenceSettings {
    fn default() -> Self {
        Self {
            default_timezone: detect_system_timezone(),
            generation_limit: 20,
        }
    }
}

fn default_database_path() -> String {
    "cadence.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            recurrence: RecurrenceSettings::default(),
        }
    }
}

impl Config {
    /// Loads `cadence.toml` from the working directory, overridden by
    /// `CADENCE_*` variables (`CADENCE_RECURRENCE__GENERATION_LIMIT=10`).
    pub fn new() -> Result<Self, figment::Error> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed("CADENCE_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }

    pub fn series_config(&self) -> SeriesConfig {
        SeriesConfig {
            generation_limit: self.recurrence.generation_limit,
            default_timezone: self.recurrence.default_timezone.clone(),
        }
    }
}
