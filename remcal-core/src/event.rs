//! Calendar-facing event types.
//!
//! [`VEventView`] is the shape exchanged with the calendar layer: the encoder
//! produces it from aggregated Remind occurrences, and the decoder builds it
//! from incoming iCalendar text before it is turned into a script line.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{RemcalError, RemcalResult};

/// A calendar event as seen by the calendar layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VEventView {
    pub uid: Option<String>,
    pub start: EventTime,
    pub end: EventEnd,
    pub recurrence: Recurrence,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub reminders: Vec<Reminder>,
    /// Last modification of the data behind this event (DTSTAMP / LAST-MODIFIED)
    pub updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned {
        datetime: NaiveDateTime,
        tzid: String,
    },
}

/// Wall-clock position of an [`EventTime`] in a given zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LocalTime {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl LocalTime {
    pub fn date(&self) -> NaiveDate {
        match self {
            LocalTime::Date(d) => *d,
            LocalTime::DateTime(dt) => dt.date(),
        }
    }

    pub fn is_timed(&self) -> bool {
        matches!(self, LocalTime::DateTime(_))
    }

    /// Midnight for dates, the datetime itself otherwise.
    pub fn naive(&self) -> NaiveDateTime {
        match self {
            LocalTime::Date(d) => d.and_time(chrono::NaiveTime::MIN),
            LocalTime::DateTime(dt) => *dt,
        }
    }
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Resolve to wall-clock time in `tz`.
    ///
    /// Floating times are taken as already local. A zoned time whose TZID is
    /// not a known IANA zone is treated as floating.
    pub fn to_local(&self, tz: Tz) -> LocalTime {
        match self {
            EventTime::Date(d) => LocalTime::Date(*d),
            EventTime::DateTimeUtc(dt) => LocalTime::DateTime(dt.with_timezone(&tz).naive_local()),
            EventTime::DateTimeFloating(dt) => LocalTime::DateTime(*dt),
            EventTime::DateTimeZoned { datetime, tzid } => match tzid.parse::<Tz>() {
                Ok(source_tz) => match source_tz.from_local_datetime(datetime).earliest() {
                    Some(zoned) => LocalTime::DateTime(zoned.with_timezone(&tz).naive_local()),
                    None => LocalTime::DateTime(*datetime),
                },
                Err(_) => {
                    tracing::warn!(tzid = %tzid, "unknown TZID, treating time as floating");
                    LocalTime::DateTime(*datetime)
                }
            },
        }
    }

    /// ICS value string (without parameters).
    pub fn to_ics_string(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::DateTimeUtc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::DateTimeFloating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
            EventTime::DateTimeZoned { datetime, .. } => {
                datetime.format("%Y%m%dT%H%M%S").to_string()
            }
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} {}", datetime.format("%Y-%m-%d %H:%M"), tzid)
            }
        }
    }
}

/// How the end of an event is expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventEnd {
    /// DTEND
    At(EventTime),
    /// DURATION
    Duration(#[serde(with = "duration_seconds")] Duration),
    /// Neither DTEND nor DURATION was present.
    Unspecified,
}

/// How an event repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Recurrence {
    /// A single occurrence.
    Once,
    /// An all-day run of consecutive days expressed as one DTSTART/DTEND span.
    ContiguousRange,
    /// An RRULE and/or an explicit RDATE list.
    Explicit {
        rule: Option<RecurrenceRule>,
        dates: Vec<EventTime>,
    },
}

impl Recurrence {
    pub fn is_recurring(&self) -> bool {
        matches!(self, Recurrence::Explicit { .. })
    }
}

/// A reminder/alarm for an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Minutes before the event to trigger
    pub minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_ics_str(&self) -> &'static str {
        match self {
            Frequency::Secondly => "SECONDLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Hourly => "HOURLY",
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    pub fn from_ics_str(s: &str) -> Option<Self> {
        match s {
            "SECONDLY" => Some(Frequency::Secondly),
            "MINUTELY" => Some(Frequency::Minutely),
            "HOURLY" => Some(Frequency::Hourly),
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// One BYDAY entry, e.g. `MO` or `-1FR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByDay {
    pub ordinal: Option<i32>,
    pub weekday: Weekday,
}

/// A parsed RRULE value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    pub by_day: Vec<ByDay>,
    pub until: Option<EventTime>,
    pub count: Option<u32>,
    /// Parts this model does not interpret (BYMONTH, BYSETPOS, ...), kept verbatim.
    pub other_parts: Vec<(String, String)>,
    /// The RRULE value as received.
    pub raw: String,
}

impl FromStr for RecurrenceRule {
    type Err = RemcalError;

    fn from_str(value: &str) -> RemcalResult<Self> {
        let mut frequency = None;
        let mut interval = 1;
        let mut by_day = Vec::new();
        let mut until = None;
        let mut count = None;
        let mut other_parts = Vec::new();

        for part in value.split(';').filter(|p| !p.is_empty()) {
            let (key, val) = part
                .split_once('=')
                .ok_or_else(|| RemcalError::IcsParse(format!("Invalid RRULE part '{part}'")))?;
            match key.to_ascii_uppercase().as_str() {
                "FREQ" => {
                    frequency = Some(Frequency::from_ics_str(&val.to_ascii_uppercase()).ok_or_else(
                        || RemcalError::IcsParse(format!("Unknown RRULE frequency '{val}'")),
                    )?);
                }
                "INTERVAL" => {
                    interval = val
                        .parse()
                        .ok()
                        .filter(|i| *i > 0)
                        .ok_or_else(|| RemcalError::IcsParse(format!("Invalid INTERVAL '{val}'")))?;
                }
                "COUNT" => {
                    count = Some(
                        val.parse()
                            .map_err(|_| RemcalError::IcsParse(format!("Invalid COUNT '{val}'")))?,
                    );
                }
                "UNTIL" => {
                    until = Some(parse_until(val)?);
                }
                "BYDAY" => {
                    by_day = val
                        .split(',')
                        .map(parse_by_day)
                        .collect::<RemcalResult<Vec<_>>>()?;
                }
                other => other_parts.push((other.to_string(), val.to_string())),
            }
        }

        let frequency = frequency
            .ok_or_else(|| RemcalError::IcsParse(format!("RRULE without FREQ: '{value}'")))?;

        Ok(RecurrenceRule {
            frequency,
            interval,
            by_day,
            until,
            count,
            other_parts,
            raw: value.to_string(),
        })
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

mod duration_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::seconds(i64::deserialize(deserializer)?))
    }
}

fn parse_until(val: &str) -> RemcalResult<EventTime> {
    if let Ok(d) = NaiveDate::parse_from_str(val, "%Y%m%d") {
        return Ok(EventTime::Date(d));
    }
    if let Some(utc) = val.strip_suffix('Z') {
        if let Ok(dt) = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S") {
            return Ok(EventTime::DateTimeUtc(dt.and_utc()));
        }
    }
    NaiveDateTime::parse_from_str(val, "%Y%m%dT%H%M%S")
        .map(EventTime::DateTimeFloating)
        .map_err(|_| RemcalError::IcsParse(format!("Invalid UNTIL '{val}'")))
}

fn parse_by_day(entry: &str) -> RemcalResult<ByDay> {
    let entry = entry.trim();
    if entry.len() < 2 {
        return Err(RemcalError::IcsParse(format!("Invalid BYDAY '{entry}'")));
    }
    let (ordinal, day) = entry.split_at(entry.len() - 2);
    let weekday = match day.to_ascii_uppercase().as_str() {
        "MO" => Weekday::Mon,
        "TU" => Weekday::Tue,
        "WE" => Weekday::Wed,
        "TH" => Weekday::Thu,
        "FR" => Weekday::Fri,
        "SA" => Weekday::Sat,
        "SU" => Weekday::Sun,
        _ => return Err(RemcalError::IcsParse(format!("Invalid BYDAY '{entry}'"))),
    };
    let ordinal = if ordinal.is_empty() {
        None
    } else {
        Some(
            ordinal
                .trim_start_matches('+')
                .parse()
                .map_err(|_| RemcalError::IcsParse(format!("Invalid BYDAY '{entry}'")))?,
        )
    };
    Ok(ByDay { ordinal, weekday })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weekly_rule_with_weekdays() {
        let rule: RecurrenceRule = "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR;UNTIL=20240331T235959Z"
            .parse()
            .unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.by_day.len(), 5);
        assert!(rule.by_day.iter().all(|d| d.ordinal.is_none()));
        assert!(matches!(rule.until, Some(EventTime::DateTimeUtc(_))));
        assert_eq!(rule.to_string(), "FREQ=WEEKLY;BYDAY=MO,TU,WE,TH,FR;UNTIL=20240331T235959Z");
    }

    #[test]
    fn test_parse_rule_with_ordinal_and_extra_parts() {
        let rule: RecurrenceRule = "FREQ=MONTHLY;BYDAY=-1FR;BYMONTH=3;COUNT=4".parse().unwrap();
        assert_eq!(rule.frequency, Frequency::Monthly);
        assert_eq!(
            rule.by_day,
            vec![ByDay {
                ordinal: Some(-1),
                weekday: Weekday::Fri
            }]
        );
        assert_eq!(rule.count, Some(4));
        assert_eq!(rule.other_parts, vec![("BYMONTH".to_string(), "3".to_string())]);
    }

    #[test]
    fn test_parse_rule_requires_freq() {
        assert!("INTERVAL=2".parse::<RecurrenceRule>().is_err());
        assert!("FREQ=FORTNIGHTLY".parse::<RecurrenceRule>().is_err());
    }

    #[test]
    fn test_zoned_time_converts_between_zones() {
        let time = EventTime::DateTimeZoned {
            datetime: NaiveDate::from_ymd_opt(2024, 7, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            tzid: "America/New_York".to_string(),
        };
        let local = time.to_local(chrono_tz::Europe::Berlin);
        assert_eq!(
            local,
            LocalTime::DateTime(
                NaiveDate::from_ymd_opt(2024, 7, 1)
                    .unwrap()
                    .and_hms_opt(15, 0, 0)
                    .unwrap()
            )
        );
    }

    #[test]
    fn test_unknown_tzid_is_floating() {
        let naive = NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let time = EventTime::DateTimeZoned {
            datetime: naive,
            tzid: "Custom Zone".to_string(),
        };
        assert_eq!(time.to_local(chrono_tz::UTC), LocalTime::DateTime(naive));
    }
}
