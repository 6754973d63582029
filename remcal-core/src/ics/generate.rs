//! ICS text generation.

use chrono::Duration;
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger, ValueType};

use crate::event::{EventEnd, EventTime, Recurrence, VEventView};

pub const PRODID: &str = "-//remcal//remind bridge//EN";

/// Custom property carrying the object name under which an event is served.
pub const NAME_PROPERTY: &str = "X-REMCAL-NAME";

/// Generate a VCALENDAR holding a single event.
pub fn generate_ics(event: &VEventView) -> String {
    generate_calendar(std::slice::from_ref(event))
}

/// Generate one VCALENDAR holding all `events`.
pub fn generate_calendar(events: &[VEventView]) -> String {
    let mut cal = Calendar::new();
    for event in events {
        cal.push(build_event(event));
    }
    let cal = cal.done();

    strip_ics_bloat(&cal.to_string())
}

fn build_event(event: &VEventView) -> icalendar::Event {
    let mut ics_event = icalendar::Event::new();

    if let Some(ref uid) = event.uid {
        ics_event.uid(uid);
        ics_event.add_property(NAME_PROPERTY, uid);
    }

    // Stamp with the source mtime so unchanged scripts produce identical output.
    if let Some(updated) = event.updated {
        let stamp = updated.format("%Y%m%dT%H%M%SZ").to_string();
        ics_event.add_property("DTSTAMP", &stamp);
        ics_event.add_property("LAST-MODIFIED", &stamp);
    }

    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    match &event.end {
        EventEnd::At(end) => add_datetime_property(&mut ics_event, "DTEND", end),
        EventEnd::Duration(duration) => {
            ics_event.add_property("DURATION", format_duration(*duration));
        }
        EventEnd::Unspecified => {}
    }

    if let Some(ref summary) = event.summary {
        ics_event.summary(summary);
    }
    if let Some(ref location) = event.location {
        ics_event.location(location);
    }
    if let Some(ref description) = event.description {
        ics_event.description(description);
    }

    if let Recurrence::Explicit { rule, dates } = &event.recurrence {
        if let Some(rule) = rule {
            ics_event.add_property("RRULE", rule.to_string());
        }
        for date in dates {
            add_rdate_property(&mut ics_event, date);
        }
    }

    for reminder in &event.reminders {
        let trigger = Trigger::before_start(Duration::minutes(reminder.minutes));
        let text = event.summary.as_deref().unwrap_or("Reminder");
        ics_event.alarm(Alarm::display(text, trigger));
    }

    ics_event.done()
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with our own
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
fn strip_ics_bloat(ics: &str) -> String {
    let mut result = String::with_capacity(ics.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:");
            result.push_str(PRODID);
            result.push_str("\r\n");
            continue;
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn datetime_property(name: &str, time: &EventTime) -> Property {
    let mut prop = Property::new(name, time.to_ics_string());
    match time {
        EventTime::Date(_) => {
            prop.append_parameter(ValueType::Date);
        }
        EventTime::DateTimeZoned { tzid, .. } => {
            prop.add_parameter("TZID", tzid);
        }
        EventTime::DateTimeUtc(_) | EventTime::DateTimeFloating(_) => {}
    }
    prop
}

fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    ics_event.append_property(datetime_property(name, time));
}

/// One RDATE property per date.
fn add_rdate_property(ics_event: &mut icalendar::Event, time: &EventTime) {
    ics_event.append_multi_property(datetime_property("RDATE", time));
}

/// ISO 8601 duration as used by DURATION, e.g. `P1D`, `PT1H30M`.
fn format_duration(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let total = duration.num_seconds().abs();
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, minutes, seconds) = (rest / 3600, rest % 3600 / 60, rest % 60);

    let mut out = format!("{sign}P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if rest > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if seconds > 0 || rest == 0 {
            out.push_str(&format!("{seconds}S"));
        }
    }
    out
}
