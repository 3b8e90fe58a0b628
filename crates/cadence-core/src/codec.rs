//! Conversion between [`RecurrenceConfig`] and its RFC 5545 rule string.
//!
//! Rules are stored as two lines, a UTC `DTSTART` anchor and an `RRULE`:
//!
//! ```text
//! DTSTART:20250106T000000Z
//! RRULE:FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE,FR;COUNT=6
//! ```
//!
//! Occurrences are calendar dates, so the anchor always sits at midnight UTC
//! and the series timezone travels next to the rule rather than inside it.
//!
//! A `BYMONTHDAY` that does not exist in a given month (the 31st in April,
//! the 30th in February) yields no occurrence for that month. Such months are
//! skipped, never clamped to the last day.

use chrono::NaiveDate;

use crate::error::CoreError;
use crate::models::{EndCondition, EndType, Frequency, RecurrenceConfig};
use crate::timezone::validate_timezone;

const WEEKDAY_CODES: [&str; 7] = ["MO", "TU", "WE", "TH", "FR", "SA", "SU"];

/// Largest day each month can have, leap years included.
const MAX_MONTH_DAYS: [u8; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A rule string together with the structured columns mirroring it.
///
/// This is the only shape in which a rule is written to storage, so the two
/// representations cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRule {
    pub rrule: String,
    pub start_date: NaiveDate,
    pub frequency: Frequency,
    pub interval: i64,
    pub days_of_week: Option<String>,
    pub day_of_month: Option<i64>,
    pub week_of_month: Option<i64>,
    pub day_of_week_for_month: Option<i64>,
    pub month_of_year: Option<i64>,
    pub end_type: EndType,
    pub end_count: Option<i64>,
    pub end_date: Option<NaiveDate>,
    pub timezone: String,
}

/// Checks a configuration for combinations the rule grammar cannot express.
pub fn validate(config: &RecurrenceConfig) -> Result<(), CoreError> {
    let invalid = |msg: String| Err(CoreError::Validation(msg));

    if config.interval == 0 {
        return invalid("interval must be at least 1".to_string());
    }
    validate_timezone(&config.timezone)?;

    if let Some(days) = &config.days_of_week {
        if config.frequency != Frequency::Weekly {
            return invalid(format!(
                "days of week only apply to weekly patterns, not {}",
                config.frequency
            ));
        }
        if days.is_empty() {
            return invalid("days of week must not be empty".to_string());
        }
        if let Some(day) = days.iter().find(|d| !(1..=7).contains(*d)) {
            return invalid(format!("weekday {} is outside 1-7", day));
        }
    }

    if let Some(day) = config.day_of_month {
        if !(1..=31).contains(&day) {
            return invalid(format!("day of month {} is outside 1-31", day));
        }
    }

    match (config.week_of_month, config.day_of_week_for_month) {
        (Some(week), Some(weekday)) => {
            if !matches!(week, 1..=4 | -1) {
                return invalid(format!(
                    "week of month {} must be 1, 2, 3, 4 or -1 (last)",
                    week
                ));
            }
            if !(1..=7).contains(&weekday) {
                return invalid(format!("weekday {} is outside 1-7", weekday));
            }
            if config.day_of_month.is_some() {
                return invalid(
                    "a pattern cannot use both a day of month and a relative weekday".to_string(),
                );
            }
        }
        (Some(_), None) => {
            return invalid("week of month requires a weekday".to_string());
        }
        (None, Some(_)) => {
            return invalid("weekday for month requires a week of month".to_string());
        }
        (None, None) => {}
    }

    let has_day_constraint = config.day_of_month.is_some() || config.week_of_month.is_some();
    match config.frequency {
        Frequency::Daily | Frequency::Weekly if has_day_constraint => {
            return invalid(format!(
                "day-of-month constraints do not apply to {} patterns",
                config.frequency
            ));
        }
        Frequency::Monthly if !has_day_constraint => {
            return invalid(
                "monthly patterns need a day of month or a week of month with a weekday"
                    .to_string(),
            );
        }
        Frequency::Yearly if has_day_constraint && config.month_of_year.is_none() => {
            return invalid("yearly day constraints need a month of year".to_string());
        }
        _ => {}
    }

    if let Some(month) = config.month_of_year {
        if config.frequency != Frequency::Yearly {
            return invalid(format!(
                "month of year only applies to yearly patterns, not {}",
                config.frequency
            ));
        }
        if !(1..=12).contains(&month) {
            return invalid(format!("month {} is outside 1-12", month));
        }
        if let Some(day) = config.day_of_month {
            let max = MAX_MONTH_DAYS[(month - 1) as usize];
            if day > max {
                return invalid(format!("month {} never has a day {}", month, day));
            }
        }
    }

    if let EndCondition::Count(0) = config.end {
        return invalid("end count must be at least 1".to_string());
    }

    Ok(())
}

/// Encodes `config` as a rule string anchored at `start`.
pub fn generate(config: &RecurrenceConfig, start: NaiveDate) -> Result<String, CoreError> {
    validate(config)?;
    if let EndCondition::Until(until) = config.end {
        if until < start {
            return Err(CoreError::Validation(format!(
                "end date {} is before the start date {}",
                until, start
            )));
        }
    }

    let mut parts = vec![
        format!("FREQ={}", config.frequency.as_rrule()),
        format!("INTERVAL={}", config.interval),
    ];

    if let Some(days) = &config.days_of_week {
        let mut sorted = days.clone();
        sorted.sort_unstable();
        sorted.dedup();
        let codes: Vec<&str> = sorted.iter().map(|d| weekday_code(*d)).collect();
        parts.push(format!("BYDAY={}", codes.join(",")));
    }
    if let (Some(week), Some(weekday)) = (config.week_of_month, config.day_of_week_for_month) {
        parts.push(format!("BYDAY={}{}", week, weekday_code(weekday)));
    }
    if let Some(day) = config.day_of_month {
        parts.push(format!("BYMONTHDAY={}", day));
    }
    if let Some(month) = config.month_of_year {
        parts.push(format!("BYMONTH={}", month));
    }
    match config.end {
        EndCondition::Never => {}
        EndCondition::Count(n) => parts.push(format!("COUNT={}", n)),
        EndCondition::Until(date) => {
            parts.push(format!("UNTIL={}T235959Z", date.format("%Y%m%d")))
        }
    }

    Ok(format!(
        "DTSTART:{}T000000Z\nRRULE:{}",
        start.format("%Y%m%d"),
        parts.join(";")
    ))
}

/// Encodes `config` into the rule string plus its structured mirror.
pub fn encode(config: &RecurrenceConfig, start: NaiveDate) -> Result<EncodedRule, CoreError> {
    let rrule = generate(config, start)?;

    let days_of_week = config.days_of_week.as_ref().map(|days| {
        let mut sorted = days.clone();
        sorted.sort_unstable();
        sorted.dedup();
        sorted
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",")
    });

    Ok(EncodedRule {
        rrule,
        start_date: start,
        frequency: config.frequency,
        interval: config.interval as i64,
        days_of_week,
        day_of_month: config.day_of_month.map(i64::from),
        week_of_month: config.week_of_month.map(i64::from),
        day_of_week_for_month: config.day_of_week_for_month.map(i64::from),
        month_of_year: config.month_of_year.map(i64::from),
        end_type: config.end.end_type(),
        end_count: config.end.end_count().map(i64::from),
        end_date: config.end.end_date(),
        timezone: config.timezone.clone(),
    })
}

/// Decodes a rule string back into a configuration in `timezone`.
///
/// Frequency, interval and the end condition always round-trip. Weekday
/// lists and relative days round-trip for strings produced by [`generate`];
/// a hand-written `BYDAY` with several ordinal entries keeps only the first,
/// and ordinal entries on a weekly rule are dropped. Patterns the config
/// cannot represent at all are rejected.
pub fn parse(rule: &str, timezone: &str) -> Result<RecurrenceConfig, CoreError> {
    let body = rrule_body(rule)?;

    let mut frequency = None;
    let mut interval = 1u32;
    let mut by_day: Vec<(Option<i8>, u8)> = Vec::new();
    let mut day_of_month = None;
    let mut month_of_year = None;
    let mut end = EndCondition::Never;

    for part in body.split(';').filter(|p| !p.trim().is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| CoreError::InvalidRRule(format!("malformed part '{}'", part)))?;
        let value = value.trim();
        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => {
                frequency = Some(match value.to_ascii_uppercase().as_str() {
                    "DAILY" => Frequency::Daily,
                    "WEEKLY" => Frequency::Weekly,
                    "MONTHLY" => Frequency::Monthly,
                    "YEARLY" => Frequency::Yearly,
                    other => {
                        return Err(CoreError::Validation(format!(
                            "unsupported frequency '{}'",
                            other
                        )))
                    }
                });
            }
            "INTERVAL" => interval = parse_number(key, value)?,
            "BYDAY" => {
                for token in value.split(',') {
                    by_day.push(parse_weekday_token(token)?);
                }
            }
            "BYMONTHDAY" => day_of_month = Some(parse_number(key, value)?),
            "BYMONTH" => month_of_year = Some(parse_number(key, value)?),
            "COUNT" => end = EndCondition::Count(parse_number(key, value)?),
            "UNTIL" => end = EndCondition::Until(parse_rule_date(value)?),
            "WKST" => {}
            other => {
                return Err(CoreError::Validation(format!(
                    "unsupported rule part '{}'",
                    other
                )))
            }
        }
    }

    let frequency =
        frequency.ok_or_else(|| CoreError::InvalidRRule("missing FREQ".to_string()))?;

    let mut config = RecurrenceConfig::new(frequency, interval).with_timezone(timezone);
    config.day_of_month = day_of_month;
    config.month_of_year = month_of_year;
    config.end = end;

    match frequency {
        Frequency::Weekly => {
            let plain: Vec<u8> = by_day
                .iter()
                .filter(|(ordinal, _)| ordinal.is_none())
                .map(|(_, day)| *day)
                .collect();
            if !plain.is_empty() {
                config.days_of_week = Some(plain);
            }
        }
        _ => {
            if let Some((ordinal, weekday)) = by_day.iter().find(|(o, _)| o.is_some()) {
                config.week_of_month = *ordinal;
                config.day_of_week_for_month = Some(*weekday);
            } else if !by_day.is_empty() {
                return Err(CoreError::Validation(format!(
                    "weekday lists are not supported on {} patterns",
                    frequency
                )));
            }
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Recovers the anchor date from a rule's `DTSTART` line.
pub fn start_date(rule: &str) -> Result<NaiveDate, CoreError> {
    rule.lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("DTSTART"))
        .and_then(|rest| rest.rsplit(':').next())
        .ok_or_else(|| CoreError::InvalidRRule(format!("no DTSTART in '{}'", rule)))
        .and_then(parse_rule_date)
}

/// Returns a copy of `rule` with its end condition replaced.
pub fn with_end(rule: &str, timezone: &str, end: EndCondition) -> Result<EncodedRule, CoreError> {
    let start = start_date(rule)?;
    let config = parse(rule, timezone)?.with_end(end);
    encode(&config, start)
}

fn rrule_body(rule: &str) -> Result<&str, CoreError> {
    rule.lines()
        .map(str::trim)
        .find_map(|line| {
            line.strip_prefix("RRULE:")
                .or_else(|| line.starts_with("FREQ=").then_some(line))
        })
        .ok_or_else(|| CoreError::InvalidRRule(format!("no RRULE in '{}'", rule)))
}

fn weekday_code(day: u8) -> &'static str {
    WEEKDAY_CODES[(day.clamp(1, 7) - 1) as usize]
}

fn parse_weekday_token(token: &str) -> Result<(Option<i8>, u8), CoreError> {
    let token = token.trim().to_ascii_uppercase();
    if token.len() < 2 || !token.is_ascii() {
        return Err(CoreError::InvalidRRule(format!("bad BYDAY entry '{}'", token)));
    }
    let (ordinal, code) = token.split_at(token.len() - 2);
    let day = WEEKDAY_CODES
        .iter()
        .position(|c| *c == code)
        .ok_or_else(|| CoreError::InvalidRRule(format!("unknown weekday '{}'", code)))?;
    let ordinal = if ordinal.is_empty() {
        None
    } else {
        Some(ordinal.trim_start_matches('+').parse::<i8>().map_err(|_| {
            CoreError::InvalidRRule(format!("bad ordinal in BYDAY entry '{}'", token))
        })?)
    };
    Ok((ordinal, day as u8 + 1))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CoreError> {
    value
        .parse()
        .map_err(|_| CoreError::InvalidRRule(format!("{} has a bad value '{}'", key, value)))
}

fn parse_rule_date(value: &str) -> Result<NaiveDate, CoreError> {
    let digits = value.get(..8).unwrap_or(value);
    NaiveDate::parse_from_str(digits, "%Y%m%d")
        .map_err(|_| CoreError::InvalidRRule(format!("bad date '{}'", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_generate_weekly_with_days() {
        let config = RecurrenceConfig::new(Frequency::Weekly, 1)
            .with_days_of_week([5, 1, 3])
            .with_end(EndCondition::Count(6));
        let rule = generate(&config, date(2025, 1, 6)).unwrap();
        assert_eq!(
            rule,
            "DTSTART:20250106T000000Z\nRRULE:FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE,FR;COUNT=6"
        );
    }

    #[test]
    fn test_generate_relative_monthly() {
        let config = RecurrenceConfig::new(Frequency::Monthly, 1).with_relative_day(-1, 5);
        let rule = generate(&config, date(2025, 1, 1)).unwrap();
        assert!(rule.ends_with("RRULE:FREQ=MONTHLY;INTERVAL=1;BYDAY=-1FR"));
    }

    #[test]
    fn test_generate_yearly_until() {
        let config = RecurrenceConfig::new(Frequency::Yearly, 1)
            .with_month(3)
            .with_day_of_month(15)
            .with_end(EndCondition::Until(date(2030, 12, 31)));
        let rule = generate(&config, date(2025, 3, 15)).unwrap();
        assert!(rule.contains("BYMONTHDAY=15;BYMONTH=3;UNTIL=20301231T235959Z"));
    }

    #[test]
    fn test_generate_never_omits_bounds() {
        let rule = generate(&RecurrenceConfig::new(Frequency::Daily, 3), date(2025, 1, 1)).unwrap();
        assert!(!rule.contains("COUNT"));
        assert!(!rule.contains("UNTIL"));
        assert!(rule.contains("INTERVAL=3"));
    }

    #[rstest]
    #[case(RecurrenceConfig::new(Frequency::Daily, 1).with_end(EndCondition::Count(10)))]
    #[case(RecurrenceConfig::new(Frequency::Daily, 4).with_end(EndCondition::Until(date(2025, 6, 30))))]
    #[case(RecurrenceConfig::new(Frequency::Monthly, 1).with_day_of_month(15).with_end(EndCondition::Count(12)))]
    #[case(RecurrenceConfig::new(Frequency::Monthly, 2).with_day_of_month(31).with_end(EndCondition::Until(date(2026, 1, 31))))]
    #[case(RecurrenceConfig::new(Frequency::Monthly, 1).with_relative_day(2, 2).with_end(EndCondition::Count(3)))]
    #[case(RecurrenceConfig::new(Frequency::Weekly, 2).with_days_of_week([2, 4]).with_end(EndCondition::Count(8)))]
    #[case(RecurrenceConfig::new(Frequency::Yearly, 1).with_month(9).with_relative_day(1, 1))]
    fn test_round_trip(#[case] config: RecurrenceConfig) {
        let config = config.with_timezone("Europe/Berlin");
        let rule = generate(&config, date(2025, 1, 1)).unwrap();
        let parsed = parse(&rule, "Europe/Berlin").unwrap();
        assert_eq!(parsed, config);
    }

    #[rstest]
    #[case::zero_interval(RecurrenceConfig::new(Frequency::Daily, 0))]
    #[case::monthly_without_day(RecurrenceConfig::new(Frequency::Monthly, 1))]
    #[case::days_on_daily(RecurrenceConfig::new(Frequency::Daily, 1).with_days_of_week([1]))]
    #[case::weekday_out_of_range(RecurrenceConfig::new(Frequency::Weekly, 1).with_days_of_week([0, 8]))]
    #[case::bad_ordinal(RecurrenceConfig::new(Frequency::Monthly, 1).with_relative_day(5, 1))]
    #[case::both_day_kinds(RecurrenceConfig::new(Frequency::Monthly, 1).with_day_of_month(3).with_relative_day(1, 1))]
    #[case::month_on_monthly(RecurrenceConfig::new(Frequency::Monthly, 1).with_day_of_month(3).with_month(2))]
    #[case::yearly_day_without_month(RecurrenceConfig::new(Frequency::Yearly, 1).with_day_of_month(3))]
    #[case::february_thirtieth(RecurrenceConfig::new(Frequency::Yearly, 1).with_month(2).with_day_of_month(30))]
    #[case::zero_count(RecurrenceConfig::new(Frequency::Daily, 1).with_end(EndCondition::Count(0)))]
    #[case::until_before_start(RecurrenceConfig::new(Frequency::Daily, 1).with_end(EndCondition::Until(date(2024, 12, 31))))]
    fn test_validation_errors(#[case] config: RecurrenceConfig) {
        let result = generate(&config, date(2025, 1, 1));
        assert!(matches!(result, Err(CoreError::Validation(_))), "{:?}", result);
    }

    #[test]
    fn test_week_of_month_without_weekday() {
        let mut config = RecurrenceConfig::new(Frequency::Monthly, 1);
        config.week_of_month = Some(1);
        assert!(matches!(validate(&config), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_invalid_timezone() {
        let config = RecurrenceConfig::new(Frequency::Daily, 1).with_timezone("Mars/Olympus");
        assert!(matches!(validate(&config), Err(CoreError::InvalidTimezone(_))));
    }

    #[test]
    fn test_parse_bare_rrule_line() {
        let config = parse("FREQ=DAILY;INTERVAL=2;COUNT=5", "UTC").unwrap();
        assert_eq!(config.frequency, Frequency::Daily);
        assert_eq!(config.interval, 2);
        assert_eq!(config.end, EndCondition::Count(5));
    }

    #[test]
    fn test_parse_defaults_interval() {
        let config = parse("RRULE:FREQ=WEEKLY;BYDAY=SA,SU", "UTC").unwrap();
        assert_eq!(config.interval, 1);
        assert_eq!(config.days_of_week, Some(vec![6, 7]));
    }

    #[test]
    fn test_parse_keeps_first_ordinal_day() {
        let config = parse("RRULE:FREQ=MONTHLY;BYDAY=1MO,-1FR", "UTC").unwrap();
        assert_eq!(config.week_of_month, Some(1));
        assert_eq!(config.day_of_week_for_month, Some(1));
    }

    #[test]
    fn test_parse_rejects_unrepresentable() {
        assert!(matches!(
            parse("RRULE:FREQ=MONTHLY;BYDAY=MO", "UTC"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            parse("RRULE:FREQ=HOURLY", "UTC"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            parse("RRULE:FREQ=DAILY;BYSETPOS=1", "UTC"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(parse("garbage", "UTC"), Err(CoreError::InvalidRRule(_))));
    }

    #[test]
    fn test_start_date() {
        let rule = "DTSTART:20250106T000000Z\nRRULE:FREQ=DAILY;INTERVAL=1";
        assert_eq!(start_date(rule).unwrap(), date(2025, 1, 6));
        let tz_rule = "DTSTART;TZID=Europe/Paris:20250301T090000\nRRULE:FREQ=DAILY";
        assert_eq!(start_date(tz_rule).unwrap(), date(2025, 3, 1));
        assert!(start_date("RRULE:FREQ=DAILY").is_err());
    }

    #[test]
    fn test_encode_mirrors_config() {
        let config = RecurrenceConfig::new(Frequency::Weekly, 1)
            .with_days_of_week([5, 1, 3, 3])
            .with_end(EndCondition::Until(date(2025, 12, 31)));
        let encoded = encode(&config, date(2025, 1, 6)).unwrap();
        assert_eq!(encoded.days_of_week.as_deref(), Some("1,3,5"));
        assert_eq!(encoded.end_type, EndType::Until);
        assert_eq!(encoded.end_date, Some(date(2025, 12, 31)));
        assert_eq!(encoded.end_count, None);
        assert_eq!(encoded.rrule, generate(&config, date(2025, 1, 6)).unwrap());
    }

    #[test]
    fn test_with_end_keeps_pattern() {
        let config = RecurrenceConfig::new(Frequency::Weekly, 1).with_days_of_week([2]);
        let rule = generate(&config, date(2025, 1, 7)).unwrap();
        let bounded = with_end(&rule, "UTC", EndCondition::Until(date(2025, 2, 1))).unwrap();
        assert_eq!(bounded.start_date, date(2025, 1, 7));
        assert!(bounded.rrule.contains("BYDAY=TU;UNTIL=20250201T235959Z"));
    }
}
