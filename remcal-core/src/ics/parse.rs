//! ICS parsing using the icalendar crate's parser.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{RemcalError, RemcalResult};
use crate::event::{EventEnd, EventTime, Recurrence, RecurrenceRule, Reminder, VEventView};

/// Parse every VEVENT in `content`, in document order.
pub fn parse_events(content: &str) -> RemcalResult<Vec<VEventView>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| RemcalError::IcsParse(e.to_string()))?;

    calendar
        .components
        .iter()
        .flat_map(vevents)
        .map(parse_vevent)
        .collect()
}

/// Parse the first VEVENT in `content`.
pub fn parse_event(content: &str) -> RemcalResult<VEventView> {
    parse_events(content)?
        .into_iter()
        .next()
        .ok_or_else(|| RemcalError::IcsParse("No VEVENT found".to_string()))
}

/// VEVENTs at the top level or nested in a VCALENDAR.
fn vevents<'a, 'c>(component: &'c Component<'a>) -> Vec<&'c Component<'a>> {
    if component.name == "VEVENT" {
        vec![component]
    } else {
        component
            .components
            .iter()
            .filter(|c| c.name == "VEVENT")
            .collect()
    }
}

fn parse_vevent(vevent: &Component) -> RemcalResult<VEventView> {
    let start = vevent
        .find_prop("DTSTART")
        .ok_or(RemcalError::MissingProperty("DTSTART"))?;
    let start = DatePerhapsTime::try_from(start)
        .map(to_event_time)
        .map_err(|_| RemcalError::IcsParse(format!("Invalid DTSTART '{}'", start.val)))?;

    let end = if let Some(prop) = vevent.find_prop("DTEND") {
        EventEnd::At(
            DatePerhapsTime::try_from(prop)
                .map(to_event_time)
                .map_err(|_| RemcalError::IcsParse(format!("Invalid DTEND '{}'", prop.val)))?,
        )
    } else if let Some(prop) = vevent.find_prop("DURATION") {
        EventEnd::Duration(parse_duration(prop.val.as_ref())?)
    } else {
        EventEnd::Unspecified
    };

    let rule = vevent
        .find_prop("RRULE")
        .map(|p| p.val.as_ref().parse::<RecurrenceRule>())
        .transpose()?;
    let dates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "RDATE")
        .flat_map(parse_date_list_property)
        .collect();

    let recurrence = if rule.is_some() || !dates.is_empty() {
        Recurrence::Explicit { rule, dates }
    } else if spans_several_days(&start, &end) {
        Recurrence::ContiguousRange
    } else {
        Recurrence::Once
    };

    let text = |name: &str| vevent.find_prop(name).map(|p| unescape_text(p.val.as_ref()));

    let reminders: Vec<Reminder> = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| {
            let trigger = alarm.find_prop("TRIGGER")?.val.as_ref();
            let minutes = parse_trigger_minutes(trigger)?;
            Some(Reminder { minutes })
        })
        .collect();

    Ok(VEventView {
        uid: vevent.find_prop("UID").map(|p| p.val.to_string()),
        start,
        end,
        recurrence,
        summary: text("SUMMARY"),
        location: text("LOCATION"),
        description: text("DESCRIPTION"),
        reminders,
        updated: None,
    })
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// An all-day DTSTART/DTEND pair covering more than one day.
fn spans_several_days(start: &EventTime, end: &EventEnd) -> bool {
    match (start, end) {
        (EventTime::Date(start), EventEnd::At(EventTime::Date(end))) => {
            (*end - *start).num_days() > 1
        }
        (EventTime::Date(_), EventEnd::Duration(duration)) => duration.num_days() > 1,
        _ => false,
    }
}

/// Parse an RDATE property into a list of EventTime values.
///
/// Handles:
/// - TZID parameter: `RDATE;TZID=America/New_York:20240108T100000`
/// - VALUE=DATE: `RDATE;VALUE=DATE:20240108`
/// - UTC: `RDATE:20240108T100000Z`
/// - Floating: `RDATE:20240108T100000`
/// - Comma-separated values: `RDATE;VALUE=DATE:20240108,20240115`
fn parse_date_list_property(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            // A bare 8-digit value is a date even without VALUE=DATE.
            if is_date || s.len() == 8 {
                NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(EventTime::Date)
            } else if let Some(ref tz) = tzid {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    })
            } else if let Some(utc) = s.strip_suffix('Z') {
                NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
            } else {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}

/// DURATION value (`P1D`, `PT1H30M`, `-PT15M`).
fn parse_duration(value: &str) -> RemcalResult<Duration> {
    let negative = value.starts_with('-');
    let trimmed = value.trim_start_matches(['-', '+']);
    let parsed = iso8601::duration(trimmed)
        .map_err(|_| RemcalError::IcsParse(format!("Invalid DURATION '{value}'")))?;
    let std_duration: std::time::Duration = parsed.into();
    let duration = i64::try_from(std_duration.as_secs())
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| RemcalError::IcsParse(format!("DURATION '{value}' out of range")))?;
    Ok(if negative { -duration } else { duration })
}

/// Parse TRIGGER value to minutes before event (-PT30M, -P1D, etc.)
fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let minutes = (std_duration.as_secs() / 60) as i64;

    Some(if is_before { minutes } else { -minutes })
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => result.push('\n'),
            Some(other @ (',' | ';' | '\\')) => result.push(other),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result
}
