//! Plain-language rendering of a [`RecurrenceConfig`].
//!
//! Summaries are derived from the config alone and never fail. Out-of-range
//! values that validation would reject still render as something readable.

use serde::Serialize;

use crate::models::{EndCondition, Frequency, RecurrenceConfig};

const WEEKDAY_SHORT: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const WEEKDAY_LONG: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];
const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Frequency label, e.g. "Weekly"
    pub short: String,
    /// Full sentence, e.g. "Every 2 weeks on Tue, until Dec 31, 2025"
    pub long: String,
}

pub fn summarize(config: &RecurrenceConfig) -> Summary {
    let short = match config.frequency {
        Frequency::Daily => "Daily",
        Frequency::Weekly => "Weekly",
        Frequency::Monthly => "Monthly",
        Frequency::Yearly => "Yearly",
    }
    .to_string();

    let mut long = match config.frequency {
        Frequency::Daily => every(config.interval, "day"),
        Frequency::Weekly => weekly_phrase(config),
        Frequency::Monthly => {
            let mut phrase = every(config.interval, "month");
            if let Some(day) = config.day_of_month {
                phrase.push_str(&format!(" on the {}", ordinal_day(day)));
            } else if let Some(relative) = relative_day(config) {
                phrase.push_str(&format!(" on the {}", relative));
            }
            phrase
        }
        Frequency::Yearly => {
            let mut phrase = every(config.interval, "year");
            match (config.month_of_year.map(month_name), config.day_of_month) {
                (Some(month), Some(day)) => phrase.push_str(&format!(" on {} {}", month, day)),
                (Some(month), None) => match relative_day(config) {
                    Some(relative) => phrase.push_str(&format!(" on the {} of {}", relative, month)),
                    None => phrase.push_str(&format!(" in {}", month)),
                },
                _ => {}
            }
            phrase
        }
    };

    match config.end {
        EndCondition::Never => {}
        EndCondition::Count(1) => long.push_str(", for 1 time"),
        EndCondition::Count(n) => long.push_str(&format!(", for {} times", n)),
        EndCondition::Until(date) => {
            long.push_str(&format!(", until {}", date.format("%b %-d, %Y")))
        }
    }

    Summary { short, long }
}

fn every(interval: u32, unit: &str) -> String {
    if interval <= 1 {
        format!("Every {}", unit)
    } else {
        format!("Every {} {}s", interval, unit)
    }
}

fn weekly_phrase(config: &RecurrenceConfig) -> String {
    let mut days = config.days_of_week.clone().unwrap_or_default();
    days.sort_unstable();
    days.dedup();

    if days.is_empty() {
        return every(config.interval, "week");
    }
    if config.interval <= 1 && days == [1, 2, 3, 4, 5] {
        return "Every weekday".to_string();
    }

    let names = days
        .iter()
        .map(|d| weekday_name(*d, &WEEKDAY_SHORT))
        .collect::<Vec<_>>()
        .join(", ");

    if config.interval <= 1 {
        format!("Every {}", names)
    } else {
        format!("Every {} weeks on {}", config.interval, names)
    }
}

/// "first Monday", "last Friday", ...
fn relative_day(config: &RecurrenceConfig) -> Option<String> {
    let week = config.week_of_month?;
    let weekday = config.day_of_week_for_month?;
    let ordinal = match week {
        1 => "first".to_string(),
        2 => "second".to_string(),
        3 => "third".to_string(),
        4 => "fourth".to_string(),
        -1 => "last".to_string(),
        other => ordinal_day(other.unsigned_abs()),
    };
    Some(format!("{} {}", ordinal, weekday_name(weekday, &WEEKDAY_LONG)))
}

fn weekday_name(day: u8, names: &[&str; 7]) -> String {
    match day {
        1..=7 => names[(day - 1) as usize].to_string(),
        other => format!("day {}", other),
    }
}

fn month_name(month: u8) -> String {
    match month {
        1..=12 => MONTHS[(month - 1) as usize].to_string(),
        other => format!("month {}", other),
    }
}

fn ordinal_day(day: u8) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}
