use chrono::NaiveDate;
use rrule::RRuleSet;
use std::collections::HashSet;

use crate::codec;
use crate::error::CoreError;

/// OccurrenceExpander: turns a stored rule string into concrete dates.
///
/// Responsibilities:
/// 1. Parse and validate the rule once
/// 2. Produce ascending occurrence dates, honouring the rule's own COUNT/UNTIL
/// 3. Skip caller-supplied exclusion dates (exceptions, tombstones, dates
///    already materialized)
///
/// Expansion is pure: the same rule and arguments always give the same
/// dates, which is what makes instance generation safe to retry.
#[derive(Debug, Clone)]
pub struct OccurrenceExpander {
    rrule_set: RRuleSet,
    start: NaiveDate,
}

impl OccurrenceExpander {
    /// Creates an expander for a rule produced by [`codec::generate`].
    ///
    /// # Arguments
    /// * `rule` - Rule string including its `DTSTART` line
    ///
    /// # Returns
    /// * `Result<Self, CoreError>` - Expander or `InvalidRRule`
    pub fn new(rule: &str) -> Result<Self, CoreError> {
        let start = codec::start_date(rule)?;
        let rrule_set = rule
            .parse::<RRuleSet>()
            .map_err(|e| CoreError::InvalidRRule(format!("Failed to parse RRULE '{}': {}", rule, e)))?;

        Ok(Self { rrule_set, start })
    }

    /// The date the rule is anchored at.
    pub fn start_date(&self) -> NaiveDate {
        self.start
    }

    fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let mut last = None;
        (&self.rrule_set)
            .into_iter()
            .map(|dt| dt.date_naive())
            .filter(move |date| {
                // Dates must be strictly increasing
                let fresh = last.map_or(true, |prev| *date > prev);
                if fresh {
                    last = Some(*date);
                }
                fresh
            })
    }

    /// Finds up to `max_count` occurrences on or after `from`.
    ///
    /// # Arguments
    /// * `from` - First date to consider (inclusive)
    /// * `max_count` - Upper bound on the number of dates returned
    /// * `exclude` - Dates that must never be returned
    ///
    /// # Behavior
    /// - Output is strictly ascending
    /// - The rule's COUNT is counted from the anchor, not from `from`, so a
    ///   bounded rule never yields more than its COUNT in total
    /// - Excluded dates are skipped without consuming `max_count`
    pub fn next_occurrences(
        &self,
        from: NaiveDate,
        max_count: usize,
        exclude: &HashSet<NaiveDate>,
    ) -> Vec<NaiveDate> {
        if max_count == 0 {
            return Vec::new();
        }

        self.dates()
            .skip_while(|date| *date < from)
            .filter(|date| !exclude.contains(date))
            .take(max_count)
            .collect()
    }

    /// Finds the first occurrence on or after `after` that is not excluded.
    ///
    /// Returns `None` once the rule is exhausted.
    pub fn next_occurrence(
        &self,
        after: NaiveDate,
        exclude: &HashSet<NaiveDate>,
    ) -> Option<NaiveDate> {
        self.next_occurrences(after, 1, exclude).into_iter().next()
    }

    /// Returns true iff the rule itself produces `candidate`.
    pub fn is_valid_occurrence(&self, candidate: NaiveDate) -> bool {
        if candidate < self.start {
            return false;
        }
        self.dates()
            .take_while(|date| *date <= candidate)
            .any(|date| date == candidate)
    }

    /// All non-excluded occurrences in `[start, end]`.
    pub fn occurrences_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exclude: &HashSet<NaiveDate>,
    ) -> Vec<NaiveDate> {
        self.dates()
            .skip_while(|date| *date < start)
            .take_while(|date| *date <= end)
            .filter(|date| !exclude.contains(date))
            .collect()
    }
}

/// Next `max_count` occurrences of `rule` on or after `from`, skipping `exclude`.
pub fn next_occurrences(
    rule: &str,
    from: NaiveDate,
    max_count: usize,
    exclude: &HashSet<NaiveDate>,
) -> Result<Vec<NaiveDate>, CoreError> {
    Ok(OccurrenceExpander::new(rule)?.next_occurrences(from, max_count, exclude))
}

/// Single next occurrence of `rule` on or after `after`, or `None` when exhausted.
pub fn next_occurrence(
    rule: &str,
    after: NaiveDate,
    exclude: &HashSet<NaiveDate>,
) -> Result<Option<NaiveDate>, CoreError> {
    Ok(OccurrenceExpander::new(rule)?.next_occurrence(after, exclude))
}

/// Whether `rule` would itself produce `candidate`.
pub fn is_valid_occurrence(rule: &str, candidate: NaiveDate) -> Result<bool, CoreError> {
    Ok(OccurrenceExpander::new(rule)?.is_valid_occurrence(candidate))
}
