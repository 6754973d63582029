//! Parsing of Remind's occurrence listing.
//!
//! With `-l -s` Remind prints one record per occurrence: a marker line naming
//! the source position, followed by a simple-calendar line:
//!
//! ```text
//! # fileinfo 3 /home/me/bills.txt
//! 2024/03/10 * * * * Pay rent
//! # fileinfo 7 /home/me/work.rem
//! 2024/03/11 * * 60 540 09:00-10:00 Standup
//! ```
//!
//! The simple-calendar fields are date, passthrough, tag, duration and time;
//! a timed entry starts its body with the time specification.

use std::path::PathBuf;

use chrono::{Days, NaiveDate, NaiveTime};

use crate::error::{RemcalError, RemcalResult};

pub const RECORD_MARKER: &str = "# fileinfo ";

/// Clock times of a timed occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Days between the start date and the end date.
    pub end_day_offset: u64,
}

impl TimeRange {
    pub fn end_date(&self, start: NaiveDate) -> NaiveDate {
        start
            .checked_add_days(Days::new(self.end_day_offset))
            .unwrap_or(start)
    }
}

/// One evaluated occurrence of a source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOccurrence {
    pub source_file: PathBuf,
    /// 1-based
    pub source_line: usize,
    pub date: NaiveDate,
    pub time_range: Option<TimeRange>,
    pub text: String,
}

impl RawOccurrence {
    pub fn location(&self) -> String {
        format!("{}:{}", self.source_file.display(), self.source_line)
    }
}

/// Parse a complete listing into occurrences, in output order.
pub fn parse_occurrences(output: &str) -> RemcalResult<Vec<RawOccurrence>> {
    let mut occurrences = Vec::new();
    let mut pending: Option<(PathBuf, usize, String)> = None;

    for (index, line) in output.lines().enumerate() {
        if let Some(header) = line.strip_prefix(RECORD_MARKER) {
            if let Some((file, number, location)) = pending.take() {
                return Err(malformed(
                    location,
                    format!("no occurrence line for {}:{}", file.display(), number),
                ));
            }
            let (file, number) = parse_header(header).ok_or_else(|| {
                malformed(format!("output line {}", index + 1), "invalid record marker")
            })?;
            let location = format!("{}:{}", file.display(), number);
            pending = Some((file, number, location));
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        let Some((file, number, location)) = pending.take() else {
            return Err(malformed(
                format!("output line {}", index + 1),
                "occurrence without a record marker",
            ));
        };
        let occurrence =
            parse_body(file, number, line).map_err(|reason| malformed(location, reason))?;
        occurrences.push(occurrence);
    }

    if let Some((_, _, location)) = pending {
        return Err(malformed(location, "listing ends inside a record"));
    }

    Ok(occurrences)
}

fn malformed(location: impl Into<String>, reason: impl Into<String>) -> RemcalError {
    RemcalError::MalformedOccurrence {
        location: location.into(),
        reason: reason.into(),
    }
}

/// `<line> <path>`; the path may contain spaces.
fn parse_header(header: &str) -> Option<(PathBuf, usize)> {
    let (number, path) = header.trim_end().split_once(' ')?;
    let number: usize = number.parse().ok().filter(|n| *n > 0)?;
    if path.is_empty() {
        return None;
    }
    Some((PathBuf::from(path), number))
}

fn parse_body(
    source_file: PathBuf,
    source_line: usize,
    body: &str,
) -> Result<RawOccurrence, String> {
    let mut rest = body;
    let date = next_field(&mut rest, "date")?;
    let date = NaiveDate::parse_from_str(date, "%Y/%m/%d")
        .map_err(|_| format!("invalid date '{date}'"))?;
    next_field(&mut rest, "passthrough")?;
    next_field(&mut rest, "tag")?;
    next_field(&mut rest, "duration")?;
    let time = next_field(&mut rest, "time")?;

    let time_range = if time == "*" {
        None
    } else {
        time.parse::<u32>()
            .map_err(|_| format!("invalid time field '{time}'"))?;
        let spec = next_field(&mut rest, "time specification")?;
        Some(parse_time_spec(spec)?)
    };

    Ok(RawOccurrence {
        source_file,
        source_line,
        date,
        time_range,
        text: unescape(rest),
    })
}

/// Split the next space-delimited field off `rest`.
fn next_field<'a>(rest: &mut &'a str, name: &str) -> Result<&'a str, String> {
    let current: &'a str = rest;
    let (value, tail) = current.split_once(' ').unwrap_or((current, ""));
    if value.is_empty() {
        return Err(format!("missing {name} field"));
    }
    *rest = tail;
    Ok(value)
}

/// `HH:MM`, `HH:MM-HH:MM` or `HH:MM-HH:MM+N`.
pub fn parse_time_spec(spec: &str) -> Result<TimeRange, String> {
    let invalid = || format!("invalid time specification '{spec}'");

    let Some((start, end)) = spec.split_once('-') else {
        let start = parse_clock(spec).ok_or_else(invalid)?;
        return Ok(TimeRange {
            start,
            end: start,
            end_day_offset: 0,
        });
    };

    let (end, end_day_offset) = match end.split_once('+') {
        Some((end, days)) => (end, days.parse().map_err(|_| invalid())?),
        None => (end, 0),
    };

    Ok(TimeRange {
        start: parse_clock(start).ok_or_else(invalid)?,
        end: parse_clock(end).ok_or_else(invalid)?,
        end_day_offset,
    })
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    let (h, m) = s.split_once(':')?;
    NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)
}

/// Undo Remind's literal escapes: `\\`, `\w` (space) and `\"`.
fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => result.push('\\'),
            Some('w') => result.push(' '),
            Some('"') => result.push('"'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
