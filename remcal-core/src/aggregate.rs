//! Grouping of occurrences into logical events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{RemcalError, RemcalResult};
use crate::identity::Identity;
use crate::occurrence::{RawOccurrence, TimeRange};
use crate::source::SourceFileRecord;

/// All occurrences of one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalEvent {
    pub identity: Identity,
    /// Ascending, de-duplicated, never empty.
    pub dates: Vec<NaiveDate>,
    /// Clock times, taken from the first occurrence. `None` for all-day events.
    pub time: Option<TimeRange>,
    pub text: String,
}

impl LogicalEvent {
    pub fn is_timed(&self) -> bool {
        self.time.is_some()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.dates[0]
    }
}

/// Group occurrences by the identity of the line that produced them.
///
/// `files` must hold a snapshot of every file the occurrences point into.
/// Events come out in order of their first occurrence.
pub fn aggregate(
    occurrences: &[RawOccurrence],
    files: &HashMap<PathBuf, SourceFileRecord>,
    source: &Path,
) -> RemcalResult<Vec<LogicalEvent>> {
    let mut events: Vec<LogicalEvent> = Vec::new();
    let mut index: HashMap<Identity, usize> = HashMap::new();

    for occurrence in occurrences {
        let identity = identity_of(occurrence, files)?;

        match index.get(&identity) {
            Some(&i) => {
                let event = &mut events[i];
                if event.time.is_some() != occurrence.time_range.is_some() {
                    return Err(RemcalError::InconsistentOccurrence {
                        uid: identity.uid(source),
                    });
                }
                event.dates.push(occurrence.date);
            }
            None => {
                index.insert(identity.clone(), events.len());
                events.push(LogicalEvent {
                    identity,
                    dates: vec![occurrence.date],
                    time: occurrence.time_range,
                    text: occurrence.text.clone(),
                });
            }
        }
    }

    for event in &mut events {
        event.dates.sort_unstable();
        event.dates.dedup();
    }

    Ok(events)
}

fn identity_of(
    occurrence: &RawOccurrence,
    files: &HashMap<PathBuf, SourceFileRecord>,
) -> RemcalResult<Identity> {
    let record = files.get(&occurrence.source_file).ok_or_else(|| {
        RemcalError::MalformedOccurrence {
            location: occurrence.location(),
            reason: "source file was not loaded".to_string(),
        }
    })?;

    let text = record
        .line(occurrence.source_line)
        .ok_or_else(|| RemcalError::MalformedOccurrence {
            location: occurrence.location(),
            reason: format!("file has only {} lines", record.line_count()),
        })?;

    Ok(Identity::new(&occurrence.source_file, occurrence.source_line, text))
}
