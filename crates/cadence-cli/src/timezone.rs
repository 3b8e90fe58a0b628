use cadence_core::error::CoreError;
use cadence_core::timezone::validate_timezone;

/// Detect system timezone, falling back to UTC
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if !tz.is_empty() && validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(tz) = std::fs::read_to_string("/etc/timezone") {
            let tz = tz.trim();
            if validate_timezone(tz).is_ok() {
                return tz.to_string();
            }
        }
    }

    if let Ok(tz) = iana_time_zone::get_timezone() {
        if validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    "UTC".to_string()
}

fn common_timezones() -> &'static [&'static str] {
    &[
        "UTC",
        "America/New_York",
        "America/Chicago",
        "America/Denver",
        "America/Los_Angeles",
        "America/Toronto",
        "America/Sao_Paulo",
        "Europe/London",
        "Europe/Paris",
        "Europe/Berlin",
        "Europe/Madrid",
        "Europe/Stockholm",
        "Asia/Tokyo",
        "Asia/Seoul",
        "Asia/Shanghai",
        "Asia/Singapore",
        "Asia/Kolkata",
        "Asia/Dubai",
        "Australia/Sydney",
        "Pacific/Auckland",
    ]
}

/// Common zones whose name contains `invalid` (or one of its city parts)
pub fn suggest_timezone(invalid: &str) -> Vec<&'static str> {
    let needle = invalid.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<_> = common_timezones()
        .iter()
        .copied()
        .filter(|tz| {
            let tz_lower = tz.to_lowercase();
            tz_lower.contains(&needle) || tz.split('/').any(|part| needle.contains(&part.to_lowercase()))
        })
        .collect();
    matches.truncate(5);
    matches
}

/// Convert user-friendly timezone input to an IANA name
pub fn normalize_timezone_input(input: &str) -> Result<String, CoreError> {
    let input = input.trim();

    // Aliases win over chrono-tz's legacy abbreviations such as "EST".
    let normalized = match input.to_lowercase().as_str() {
        "est" | "eastern" => "America/New_York",
        "cst" | "central" => "America/Chicago",
        "mst" | "mountain" => "America/Denver",
        "pst" | "pacific" => "America/Los_Angeles",
        "gmt" | "utc" | "z" => "UTC",
        "bst" | "london" => "Europe/London",
        "cet" | "paris" => "Europe/Paris",
        "jst" | "tokyo" => "Asia/Tokyo",
        _ if validate_timezone(input).is_ok() => input,
        _ => {
            let suggestions = suggest_timezone(input);
            return Err(if suggestions.is_empty() {
                CoreError::InvalidTimezone(format!(
                    "'{}'. Use IANA names like 'America/New_York'",
                    input
                ))
            } else {
                CoreError::InvalidTimezone(format!(
                    "'{}'. Did you mean: {}?",
                    input,
                    suggestions.join(", ")
                ))
            });
        }
    };

    Ok(normalized.to_string())
}
