//! TUI rendering for remcal types.
//!
//! Extension traits and helpers that add colored terminal output to
//! remcal-core types using owo_colors.

use chrono::{Datelike, NaiveDate};
use owo_colors::OwoColorize;
use remcal_core::RemoveOutcome;
use remcal_core::occurrence::TimeRange;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for RemoveOutcome {
    fn render(&self) -> String {
        match self {
            RemoveOutcome::Removed => "removed".red().to_string(),
            RemoveOutcome::IdentityMismatch => {
                format!("{} {}", "unchanged".yellow(), "(line edited or gone)".dimmed())
            }
        }
    }
}

impl Render for Option<TimeRange> {
    fn render(&self) -> String {
        format_time(self.as_ref())
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        _ if date.year() == today.year() => date.format("%a %b %-d").to_string(),
        _ => date.format("%a %b %-d %Y").to_string(),
    }
}

/// Format the time portion of an event (e.g. "15:00-16:00" or "all-day")
pub fn format_time(time: Option<&TimeRange>) -> String {
    match time {
        None => format!("{:>11}", "all-day"),
        Some(range) if range.start == range.end && range.end_day_offset == 0 => {
            format!("{:>11}", range.start.format("%H:%M"))
        }
        Some(range) => format!(
            "{:>11}",
            format!("{}-{}", range.start.format("%H:%M"), range.end.format("%H:%M"))
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_labels() {
        let today = date(2024, 3, 10);
        assert_eq!(format_date_label(date(2024, 3, 10), today), "Today");
        assert_eq!(format_date_label(date(2024, 3, 11), today), "Tomorrow");
        assert_eq!(format_date_label(date(2024, 3, 9), today), "Yesterday");
        assert_eq!(format_date_label(date(2024, 3, 20), today), "Wed Mar 20");
        assert_eq!(format_date_label(date(2025, 1, 1), today), "Wed Jan 1 2025");
    }

    #[test]
    fn test_times() {
        let clock = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(format_time(None).trim(), "all-day");
        let point = TimeRange {
            start: clock(12, 0),
            end: clock(12, 0),
            end_day_offset: 0,
        };
        assert_eq!(format_time(Some(&point)).trim(), "12:00");
        let span = TimeRange {
            start: clock(9, 0),
            end: clock(10, 30),
            end_day_offset: 0,
        };
        assert_eq!(format_time(Some(&span)).trim(), "09:00-10:30");
    }
}
