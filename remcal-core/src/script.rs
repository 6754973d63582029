//! Calendar events to Remind script lines.
//!
//! Every VEVENT becomes one `REM` line. The line is built from clauses in the
//! order Remind expects them:
//!
//! ```text
//! REM <date> [*N [SKIP OMIT days] [UNTIL date]] [AT hh:mm [DURATION h:mm]] [PRIORITY n] MSG ...
//! ```

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use chrono_tz::Tz;

use crate::error::{RemcalError, RemcalResult};
use crate::event::{EventEnd, EventTime, Frequency, LocalTime, Recurrence, RecurrenceRule, VEventView};
use crate::ics::is_contiguous_run;
use crate::ics::parse::parse_events;
use crate::recurrence;

/// RRULE parts that can be dropped without changing which days match.
const IGNORED_RULE_PARTS: &[&str] = &["WKST"];

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Settings that shape generated script lines.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    /// Zone that event times are converted to before rendering.
    pub timezone: Tz,
    /// Prefix placed before every message.
    pub label: Option<String>,
    pub priority: Option<u32>,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        ScriptOptions {
            timezone: chrono_tz::UTC,
            label: None,
            priority: None,
        }
    }
}

/// Encode every VEVENT in an iCalendar document, one line each.
pub fn encode_calendar(text: &str, options: &ScriptOptions) -> RemcalResult<Vec<String>> {
    let events = parse_events(text)?;
    if events.is_empty() {
        return Err(RemcalError::IcsParse("No VEVENT found".to_string()));
    }
    events.iter().map(|e| encode_event(e, options)).collect()
}

/// Encode a single event as a script line (without trailing newline).
pub fn encode_event(event: &VEventView, options: &ScriptOptions) -> RemcalResult<String> {
    let summary = event
        .summary
        .as_deref()
        .ok_or(RemcalError::MissingProperty("SUMMARY"))?;

    let tz = options.timezone;
    let start = event.start.to_local(tz);
    let duration = event_duration(event, start, tz);

    let mut clauses = vec!["REM".to_string(), format_date(start.date())];
    let mut trailer = None;

    match &event.recurrence {
        Recurrence::Explicit { rule: Some(rule), dates } => {
            if !dates.is_empty() {
                return Err(RemcalError::UnsupportedRecurrence(
                    "RRULE combined with RDATE".to_string(),
                ));
            }
            clauses.extend(rule_clauses(rule, start, tz)?);
        }
        Recurrence::Explicit { rule: None, dates } => {
            clauses.extend(date_list_clauses(start, dates, tz)?);
        }
        Recurrence::Once | Recurrence::ContiguousRange => {
            if start.is_timed() && duration >= Duration::hours(24) {
                let end = start
                    .naive()
                    .checked_add_signed(duration)
                    .ok_or_else(|| out_of_range(duration))?;
                clauses.push("*1".to_string());
                clauses.push(format!("UNTIL {}", format_date(end.date())));
                trailer = Some(format!(
                    "START {} END {}",
                    format_datetime(start.naive()),
                    format_datetime(end)
                ));
            } else if !start.is_timed() && duration > Duration::days(1) {
                let last = start
                    .date()
                    .checked_add_signed(Duration::days(duration.num_days() - 1))
                    .ok_or_else(|| out_of_range(duration))?;
                clauses.push("*1".to_string());
                clauses.push(format!("UNTIL {}", format_date(last)));
            }
        }
    }

    if let LocalTime::DateTime(dt) = start {
        if trailer.is_none() {
            clauses.push(format!("AT {}", dt.format("%H:%M")));
            if duration > Duration::zero() {
                let minutes = duration.num_minutes();
                clauses.push(format!("DURATION {}:{:02}", minutes / 60, minutes % 60));
            }
        }
    }

    if let Some(priority) = options.priority {
        clauses.push(format!("PRIORITY {priority}"));
    }

    clauses.push("MSG".to_string());
    if let Some(ref label) = options.label {
        clauses.push(label.clone());
    }
    clauses.push(single_line(summary));
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        clauses.push(format!("at {}", single_line(location)));
    }
    if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
        clauses.push(single_line(description));
    }
    if let Some(trailer) = trailer {
        clauses.push(trailer);
    }

    Ok(clauses.join(" "))
}

fn out_of_range(duration: Duration) -> RemcalError {
    RemcalError::IcsParse(format!(
        "event length of {} days is out of range",
        duration.num_days()
    ))
}

/// Length of the event in local wall-clock terms.
///
/// Without DTEND or DURATION an all-day event lasts one day and a timed
/// event has no length.
fn event_duration(event: &VEventView, start: LocalTime, tz: Tz) -> Duration {
    match &event.end {
        EventEnd::At(end) => end.to_local(tz).naive() - start.naive(),
        EventEnd::Duration(duration) => *duration,
        EventEnd::Unspecified if start.is_timed() => Duration::zero(),
        EventEnd::Unspecified => Duration::days(1),
    }
}

/// Repeat, skip and until clauses for an RRULE.
fn rule_clauses(rule: &RecurrenceRule, start: LocalTime, tz: Tz) -> RemcalResult<Vec<String>> {
    for (key, value) in &rule.other_parts {
        if IGNORED_RULE_PARTS.contains(&key.as_str()) {
            tracing::warn!(part = %key, %value, "dropping RRULE part");
        } else {
            return Err(RemcalError::UnsupportedRecurrence(format!(
                "RRULE part {key}={value} in '{rule}'"
            )));
        }
    }
    if rule.by_day.iter().any(|d| d.ordinal.is_some()) {
        return Err(RemcalError::UnsupportedRecurrence(format!(
            "ordinal BYDAY in '{rule}'"
        )));
    }

    let period = match rule.frequency {
        Frequency::Daily => 1,
        Frequency::Weekly => 7,
        other => {
            return Err(RemcalError::UnsupportedRecurrence(format!(
                "{} frequency in '{rule}'",
                other.as_ics_str()
            )));
        }
    };

    let mut days: Vec<Weekday> = rule.by_day.iter().map(|d| d.weekday).collect();
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    let start_day = start.date().weekday();
    let restricts_days = !days.is_empty() && days != [start_day];

    // A weekly repeat only ever lands on the start's weekday.
    if rule.frequency == Frequency::Weekly && !days.is_empty() && !days.contains(&start_day) {
        return Err(RemcalError::UnsupportedRecurrence(format!(
            "BYDAY in '{rule}' leaves out {start_day}, the weekday of DTSTART"
        )));
    }

    let mut clauses = Vec::new();
    if days.len() == WEEK.len() && rule.interval == 1 {
        clauses.push("*1".to_string());
    } else {
        if restricts_days && days.len() > 1 && rule.interval > 1 {
            return Err(RemcalError::UnsupportedRecurrence(format!(
                "INTERVAL with several BYDAY entries in '{rule}'"
            )));
        }
        clauses.push(format!("*{}", period * rule.interval));
        if restricts_days {
            let omitted: Vec<String> = WEEK
                .iter()
                .filter(|d| !days.contains(d))
                .map(|d| d.to_string())
                .collect();
            clauses.push(format!("SKIP OMIT {}", omitted.join(" ")));
        }
    }

    if let Some(ref until) = rule.until {
        clauses.push(format!("UNTIL {}", format_date(until.to_local(tz).date())));
    } else if let Some(last) = recurrence::last_occurrence(start.naive(), rule)? {
        clauses.push(format!("UNTIL {}", format_date(last)));
    }

    Ok(clauses)
}

/// An explicit date list is only expressible when it extends the start into
/// one run of consecutive days.
fn date_list_clauses(
    start: LocalTime,
    dates: &[EventTime],
    tz: Tz,
) -> RemcalResult<Vec<String>> {
    let locals: Vec<LocalTime> = dates.iter().map(|d| d.to_local(tz)).collect();
    // One AT clause covers every occurrence.
    let clock = |t: &LocalTime| t.is_timed().then(|| t.naive().time());
    if locals.iter().any(|t| clock(t) != clock(&start)) {
        return Err(RemcalError::UnsupportedRecurrence(
            "RDATE at a different time of day than DTSTART".to_string(),
        ));
    }

    let mut days: Vec<NaiveDate> = locals.iter().map(LocalTime::date).collect();
    days.push(start.date());
    days.sort_unstable();
    days.dedup();

    if days[0] != start.date() || !is_contiguous_run(&days) {
        return Err(RemcalError::UnsupportedRecurrence(
            "RDATE list is not a run of consecutive days from DTSTART".to_string(),
        ));
    }

    match days.last() {
        Some(last) if days.len() > 1 => {
            Ok(vec!["*1".to_string(), format!("UNTIL {}", format_date(*last))])
        }
        _ => Ok(Vec::new()),
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%b %d %Y").to_string()
}

fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%b %d %Y %H:%M").to_string()
}

/// Script lines cannot contain line breaks.
fn single_line(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}
