use chrono::{NaiveDate, Utc};
use chrono_english::{parse_date_string, Dialect};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum InputError {
    #[error("Failed to parse date '{0}'")]
    Date(String),
    #[error("Unknown weekday '{0}' (use mon, tue, wed, thu, fri, sat, sun)")]
    Weekday(String),
    #[error("Invalid week of month '{0}' (use first, second, third, fourth or last)")]
    WeekOfMonth(String),
}

/// ISO dates (`2025-03-14`) or English phrases (`next friday`, `tomorrow`).
pub fn parse_date(input: &str) -> Result<NaiveDate, InputError> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_date_string(input, Utc::now(), Dialect::Us)
        .map(|dt| dt.date_naive())
        .map_err(|_| InputError::Date(input.to_string()))
}

/// Weekday name or number, Monday = 1 through Sunday = 7.
pub fn parse_weekday(input: &str) -> Result<u8, InputError> {
    let day = match input.trim().to_lowercase().as_str() {
        "mon" | "monday" | "mo" | "1" => 1,
        "tue" | "tues" | "tuesday" | "tu" | "2" => 2,
        "wed" | "wednesday" | "we" | "3" => 3,
        "thu" | "thur" | "thurs" | "thursday" | "th" | "4" => 4,
        "fri" | "friday" | "fr" | "5" => 5,
        "sat" | "saturday" | "sa" | "6" => 6,
        "sun" | "sunday" | "su" | "7" => 7,
        _ => return Err(InputError::Weekday(input.to_string())),
    };
    Ok(day)
}

/// Ordinal week within a month; `last` is -1.
pub fn parse_week_of_month(input: &str) -> Result<i8, InputError> {
    let week = match input.trim().to_lowercase().as_str() {
        "first" | "1st" | "1" => 1,
        "second" | "2nd" | "2" => 2,
        "third" | "3rd" | "3" => 3,
        "fourth" | "4th" | "4" => 4,
        "last" | "-1" => -1,
        _ => return Err(InputError::WeekOfMonth(input.to_string())),
    };
    Ok(week)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_date("2025-03-14").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
        );
    }

    #[test]
    fn test_parse_english_date() {
        let today = Utc::now().date_naive();
        assert_eq!(parse_date("today").unwrap(), today);
        assert!(parse_date("tomorrow").unwrap() > today);
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(
            parse_date("not a date"),
            Err(InputError::Date("not a date".to_string()))
        );
    }

    #[rstest]
    #[case("mon", 1)]
    #[case("Tuesday", 2)]
    #[case("WE", 3)]
    #[case("thurs", 4)]
    #[case("5", 5)]
    #[case("sat", 6)]
    #[case("sunday", 7)]
    fn test_parse_weekday(#[case] input: &str, #[case] expected: u8) {
        assert_eq!(parse_weekday(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_weekday_rejects_unknown() {
        assert!(parse_weekday("funday").is_err());
        assert!(parse_weekday("8").is_err());
    }

    #[rstest]
    #[case("first", 1)]
    #[case("2nd", 2)]
    #[case("3", 3)]
    #[case("fourth", 4)]
    #[case("last", -1)]
    fn test_parse_week_of_month(#[case] input: &str, #[case] expected: i8) {
        assert_eq!(parse_week_of_month(input).unwrap(), expected);
    }

    #[test]
    fn test_parse_week_of_month_rejects_fifth() {
        assert!(parse_week_of_month("fifth").is_err());
    }
}
