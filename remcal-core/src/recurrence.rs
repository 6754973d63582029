//! RRULE expansion.
//!
//! Remind has no notion of an occurrence count, so a COUNT-bounded rule is
//! expanded here and its last occurrence becomes the script's UNTIL date.

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use rrule::RRuleSet;

use crate::error::{RemcalError, RemcalResult};
use crate::event::RecurrenceRule;

/// Build an iCalendar-format rule string for the rrule crate parser.
///
/// Times are wall-clock; they are passed as UTC so no zone shifts apply.
fn build_rrule_string(start: NaiveDateTime, rule: &RecurrenceRule) -> String {
    let mut parts = vec![
        format!("FREQ={}", rule.frequency.as_ics_str()),
        format!("INTERVAL={}", rule.interval),
    ];
    if let Some(count) = rule.count {
        parts.push(format!("COUNT={count}"));
    }
    if !rule.by_day.is_empty() {
        let days: Vec<String> = rule
            .by_day
            .iter()
            .map(|d| match d.ordinal {
                Some(n) => format!("{n}{}", weekday_code(d.weekday)),
                None => weekday_code(d.weekday).to_string(),
            })
            .collect();
        parts.push(format!("BYDAY={}", days.join(",")));
    }
    for (key, value) in &rule.other_parts {
        parts.push(format!("{key}={value}"));
    }

    format!(
        "DTSTART:{}Z\nRRULE:{}",
        start.format("%Y%m%dT%H%M%S"),
        parts.join(";")
    )
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

/// Expand at most `limit` occurrences of `rule` starting at `start`.
///
/// UNTIL is ignored; callers bound the rule by COUNT or by `limit`.
pub fn expand(
    start: NaiveDateTime,
    rule: &RecurrenceRule,
    limit: u16,
) -> RemcalResult<Vec<NaiveDateTime>> {
    let rrule_str = build_rrule_string(start, rule);
    let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
        RemcalError::UnsupportedRecurrence(format!("Failed to expand RRULE '{}': {}", rule, e))
    })?;

    Ok(rrule_set
        .all(limit)
        .dates
        .iter()
        .map(|dt| dt.naive_utc())
        .collect())
}

/// Date of the last occurrence of a COUNT-bounded rule, `None` without COUNT.
pub fn last_occurrence(
    start: NaiveDateTime,
    rule: &RecurrenceRule,
) -> RemcalResult<Option<NaiveDate>> {
    let Some(count) = rule.count else {
        return Ok(None);
    };
    let limit = u16::try_from(count).map_err(|_| {
        RemcalError::UnsupportedRecurrence(format!("COUNT={count} in '{rule}' is too large"))
    })?;
    let dates = expand(start, rule, limit)?;
    Ok(dates.last().map(|dt| dt.date()))
}
