use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<(), CoreError> {
    parse_timezone(timezone).map(|_| ())
}

/// Parse an IANA timezone name
pub fn parse_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone).map_err(|_| CoreError::InvalidTimezone(timezone.to_string()))
}

/// The calendar day `at_time` falls on in `timezone`.
pub fn date_in(timezone: &str, at_time: DateTime<Utc>) -> Result<NaiveDate, CoreError> {
    let tz = parse_timezone(timezone)?;
    Ok(at_time.with_timezone(&tz).date_naive())
}

/// Source of the current time. Scope resolution depends on "today", so the
/// repository takes a clock that tests can pin.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// A clock pinned to midnight UTC of the given day.
    pub fn fixed_on(date: NaiveDate) -> Self {
        Clock::Fixed(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(at) => *at,
        }
    }

    /// Today's date in `timezone`.
    pub fn today_in(&self, timezone: &str) -> Result<NaiveDate, CoreError> {
        date_in(timezone, self.now())
    }
}
