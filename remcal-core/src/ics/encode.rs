//! Logical events to calendar events.
//!
//! Remind does not report how an event repeats, only when it occurs, so the
//! recurrence is rebuilt from the list of dates:
//!
//! - timed events keep the first occurrence as DTSTART/DTEND and list the
//!   others as RDATEs;
//! - all-day events whose dates form one run of consecutive days collapse
//!   into a single multi-day span;
//! - any other all-day event keeps its first day and lists the rest as RDATEs.

use std::path::Path;

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::aggregate::LogicalEvent;
use crate::event::{EventEnd, EventTime, Recurrence, Reminder, VEventView};

/// Minutes before a timed event its display alarm fires.
pub const ALARM_MINUTES: i64 = 10;

/// What the encoder needs besides the event itself.
#[derive(Debug, Clone)]
pub struct EncodeContext<'a> {
    /// The configured script; decides the UID form.
    pub source: &'a Path,
    /// TZID attached to timed events.
    pub tzid: &'a str,
    /// Modification time of the file the event came from.
    pub updated: Option<DateTime<Utc>>,
}

pub fn encode_event(event: &LogicalEvent, ctx: &EncodeContext) -> VEventView {
    let (start, end, recurrence, reminders) = match event.time {
        Some(time) => {
            let zoned = |date: NaiveDate, clock| EventTime::DateTimeZoned {
                datetime: date.and_time(clock),
                tzid: ctx.tzid.to_string(),
            };
            let first = event.first_date();
            let rdates: Vec<EventTime> = event.dates[1..]
                .iter()
                .map(|d| zoned(*d, time.start))
                .collect();
            let recurrence = if rdates.is_empty() {
                Recurrence::Once
            } else {
                Recurrence::Explicit {
                    rule: None,
                    dates: rdates,
                }
            };
            (
                zoned(first, time.start),
                EventEnd::At(zoned(time.end_date(first), time.end)),
                recurrence,
                vec![Reminder {
                    minutes: ALARM_MINUTES,
                }],
            )
        }
        None => {
            let (start, end, recurrence) = all_day_span(&event.dates);
            (
                EventTime::Date(start),
                EventEnd::At(EventTime::Date(end)),
                recurrence,
                Vec::new(),
            )
        }
    };

    VEventView {
        uid: Some(event.identity.uid(ctx.source)),
        start,
        end,
        recurrence,
        summary: Some(event.text.clone()),
        location: None,
        description: None,
        reminders,
        updated: ctx.updated,
    }
}

/// DTSTART, exclusive DTEND and recurrence for a sorted list of days.
fn all_day_span(dates: &[NaiveDate]) -> (NaiveDate, NaiveDate, Recurrence) {
    let first = dates[0];
    let last = dates[dates.len() - 1];

    if dates.len() == 1 {
        return (first, next_day(first), Recurrence::Once);
    }

    if is_contiguous_run(dates) {
        return (first, next_day(last), Recurrence::ContiguousRange);
    }

    let rdates = dates[1..].iter().map(|d| EventTime::Date(*d)).collect();
    (
        first,
        next_day(first),
        Recurrence::Explicit {
            rule: None,
            dates: rdates,
        },
    )
}

/// Each day directly follows the previous one.
pub fn is_contiguous_run(dates: &[NaiveDate]) -> bool {
    dates.windows(2).all(|pair| (pair[1] - pair[0]).num_days() == 1)
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::occurrence::TimeRange;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(dates: Vec<NaiveDate>, time: Option<TimeRange>) -> LogicalEvent {
        LogicalEvent {
            identity: Identity::new("bills.txt", 3, "REM Mar 10 MSG Pay rent"),
            dates,
            time,
            text: "Pay rent".to_string(),
        }
    }

    fn ctx() -> EncodeContext<'static> {
        EncodeContext {
            source: Path::new("bills.txt"),
            tzid: "Europe/Berlin",
            updated: None,
        }
    }

    #[test]
    fn test_single_all_day() {
        let view = encode_event(&event(vec![date(2024, 3, 10)], None), &ctx());

        assert_eq!(view.start, EventTime::Date(date(2024, 3, 10)));
        assert_eq!(view.end, EventEnd::At(EventTime::Date(date(2024, 3, 11))));
        assert_eq!(view.recurrence, Recurrence::Once);
        assert_eq!(view.summary.as_deref(), Some("Pay rent"));
        assert!(view.uid.unwrap().starts_with("3:"));
        assert!(view.reminders.is_empty());
    }

    #[test]
    fn test_consecutive_days_collapse() {
        let view = encode_event(
            &event(vec![date(2024, 1, 1), date(2024, 1, 2)], None),
            &ctx(),
        );

        assert_eq!(view.start, EventTime::Date(date(2024, 1, 1)));
        assert_eq!(view.end, EventEnd::At(EventTime::Date(date(2024, 1, 3))));
        assert_eq!(view.recurrence, Recurrence::ContiguousRange);
    }

    #[test]
    fn test_gaps_become_rdates() {
        let view = encode_event(
            &event(vec![date(2024, 1, 1), date(2024, 1, 8)], None),
            &ctx(),
        );

        assert_eq!(view.start, EventTime::Date(date(2024, 1, 1)));
        assert_eq!(view.end, EventEnd::At(EventTime::Date(date(2024, 1, 2))));
        assert_eq!(
            view.recurrence,
            Recurrence::Explicit {
                rule: None,
                dates: vec![EventTime::Date(date(2024, 1, 8))]
            }
        );
    }

    #[test]
    fn test_month_boundary_is_contiguous() {
        assert!(is_contiguous_run(&[date(2024, 2, 28), date(2024, 2, 29), date(2024, 3, 1)]));
        assert!(!is_contiguous_run(&[date(2023, 2, 28), date(2023, 3, 2)]));
    }

    #[test]
    fn test_timed_event_uses_zone_rdates_and_alarm() {
        let time = TimeRange {
            start: NaiveTime::from_hms_opt(21, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            end_day_offset: 1,
        };
        let view = encode_event(
            &event(vec![date(2024, 1, 1), date(2024, 1, 2)], Some(time)),
            &ctx(),
        );

        let zoned = |y, m, d, h, min| EventTime::DateTimeZoned {
            datetime: date(y, m, d).and_hms_opt(h, min, 0).unwrap(),
            tzid: "Europe/Berlin".to_string(),
        };
        assert_eq!(view.start, zoned(2024, 1, 1, 21, 30));
        assert_eq!(view.end, EventEnd::At(zoned(2024, 1, 2, 1, 0)));
        // Consecutive timed occurrences are never collapsed.
        assert_eq!(
            view.recurrence,
            Recurrence::Explicit {
                rule: None,
                dates: vec![zoned(2024, 1, 2, 21, 30)]
            }
        );
        assert_eq!(view.reminders, vec![Reminder { minutes: 10 }]);
    }
}
