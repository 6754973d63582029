//! Modification-time keyed cache of computed calendars.
//!
//! Evaluating a script is slow, so the result is kept per source path
//! together with a snapshot of every file that contributed to it. A read
//! checks the recorded mtimes and only re-runs the evaluator when one of the
//! files has changed since. Recomputation replaces the whole entry at once.
//! A failed recomputation is returned to the caller that triggered it; the
//! previous entry stays in place, still stale, and the next read tries again.
//!
//! One mutex guards evaluation, the cached state, and writes to the script.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::aggregate::{LogicalEvent, aggregate};
use crate::config::RemcalConfig;
use crate::deletion::{RemoveOutcome, remove_line_if_matches};
use crate::error::RemcalResult;
use crate::evaluator::{Evaluator, RemindEvaluator, lookback_start};
use crate::event::VEventView;
use crate::ics::{EncodeContext, encode_event, generate_calendar, generate_ics};
use crate::identity::ParsedUid;
use crate::occurrence::parse_occurrences;
use crate::script::{ScriptOptions, encode_calendar};
use crate::source::{SourceFileRecord, append_lines};

/// One event of a source, ready to be served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarObject {
    /// Object name; equal to the UID.
    pub name: String,
    pub event: VEventView,
    /// Standalone VCALENDAR holding just this event.
    pub text: String,
    pub last_modified: DateTime<Utc>,
}

/// Everything computed from one source script.
#[derive(Debug)]
struct CacheEntry {
    files: HashMap<PathBuf, SourceFileRecord>,
    events: Vec<LogicalEvent>,
    objects: Vec<CalendarObject>,
    calendar: String,
    /// Forces the next read to recompute. Set after writing to the script
    /// ourselves, since file timestamps are coarse enough that a write right
    /// after a read can keep the recorded mtime, and when an included file
    /// changed while the evaluator was running.
    dirty: bool,
}

impl CacheEntry {
    fn is_stale(&self) -> bool {
        self.dirty || self.files.values().any(SourceFileRecord::is_stale)
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.files.values().map(SourceFileRecord::modified_utc).max()
    }
}

pub struct SourceCache {
    evaluator: Box<dyn Evaluator>,
    options: ScriptOptions,
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl SourceCache {
    pub fn new(evaluator: impl Evaluator + 'static, options: ScriptOptions) -> Self {
        SourceCache {
            evaluator: Box::new(evaluator),
            options,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A cache running the configured Remind binary.
    pub fn from_config(config: &RemcalConfig) -> RemcalResult<Self> {
        Ok(SourceCache::new(
            RemindEvaluator::new(&config.evaluator),
            config.script_options()?,
        ))
    }

    pub fn options(&self) -> &ScriptOptions {
        &self.options
    }

    /// Calendar events of `source`.
    pub fn read(&self, source: &Path) -> RemcalResult<Vec<VEventView>> {
        let mut entries = self.lock();
        let entry = self.fresh_entry(&mut entries, source)?;
        Ok(entry.objects.iter().map(|o| o.event.clone()).collect())
    }

    /// Events of `source` with the dates Remind reported for them.
    pub fn events(&self, source: &Path) -> RemcalResult<Vec<LogicalEvent>> {
        let mut entries = self.lock();
        Ok(self.fresh_entry(&mut entries, source)?.events.clone())
    }

    pub fn objects(&self, source: &Path) -> RemcalResult<Vec<CalendarObject>> {
        let mut entries = self.lock();
        Ok(self.fresh_entry(&mut entries, source)?.objects.clone())
    }

    /// One VCALENDAR holding every event of `source`.
    pub fn calendar_text(&self, source: &Path) -> RemcalResult<String> {
        let mut entries = self.lock();
        Ok(self.fresh_entry(&mut entries, source)?.calendar.clone())
    }

    /// Newest mtime among the files behind `source`.
    pub fn last_modified(&self, source: &Path) -> RemcalResult<DateTime<Utc>> {
        let mut entries = self.lock();
        let entry = self.fresh_entry(&mut entries, source)?;
        // The source itself is always tracked.
        Ok(entry.last_modified().unwrap_or(DateTime::UNIX_EPOCH))
    }

    /// Convert the events of an iCalendar document and append them to
    /// `source`. Returns the lines written.
    ///
    /// Nothing is recomputed here; the next read picks the change up.
    pub fn append(&self, source: &Path, text: &str) -> RemcalResult<Vec<String>> {
        let lines = encode_calendar(text, &self.options)?;

        let mut entries = self.lock();
        append_lines(source, &lines)?;
        mark_dirty(&mut entries, source);
        tracing::info!(source = %source.display(), lines = lines.len(), "appended events");

        Ok(lines)
    }

    /// Remove the line behind `uid` if it has not changed since the UID was
    /// handed out.
    pub fn remove(&self, source: &Path, uid: &str) -> RemcalResult<RemoveOutcome> {
        let parsed = ParsedUid::parse(uid)?;

        let mut entries = self.lock();
        self.remove_locked(&mut entries, source, uid, &parsed)
    }

    /// Remove the line behind `uid`, then append `text`.
    ///
    /// `text` is converted before anything is removed, so an event that
    /// cannot be expressed as a script line leaves the file untouched.
    pub fn replace(
        &self,
        source: &Path,
        uid: &str,
        text: &str,
    ) -> RemcalResult<(RemoveOutcome, Vec<String>)> {
        let parsed = ParsedUid::parse(uid)?;
        let lines = encode_calendar(text, &self.options)?;

        let mut entries = self.lock();
        let outcome = self.remove_locked(&mut entries, source, uid, &parsed)?;
        append_lines(source, &lines)?;
        mark_dirty(&mut entries, source);
        tracing::info!(source = %source.display(), %uid, ?outcome, "replaced event");

        Ok((outcome, lines))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        // Entries are replaced whole, so a panicking holder cannot leave one
        // half-written.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_locked(
        &self,
        entries: &mut HashMap<PathBuf, CacheEntry>,
        source: &Path,
        uid: &str,
        parsed: &ParsedUid,
    ) -> RemcalResult<RemoveOutcome> {
        let target = match parsed.file_token {
            None => Some(source.to_path_buf()),
            Some(_) => {
                // Included files are only known from a previous evaluation.
                if !entries.contains_key(source) {
                    self.fresh_entry(entries, source)?;
                }
                entries.get(source).and_then(|entry| {
                    entry
                        .files
                        .keys()
                        .find(|file| parsed.refers_to(file, source))
                        .cloned()
                })
            }
        };

        let outcome = match target {
            Some(path) => remove_line_if_matches(&path, parsed.line, parsed.hash)?,
            None => RemoveOutcome::IdentityMismatch,
        };

        match outcome {
            RemoveOutcome::Removed => {
                mark_dirty(entries, source);
                tracing::info!(source = %source.display(), %uid, "removed event");
            }
            RemoveOutcome::IdentityMismatch => {
                tracing::warn!(source = %source.display(), %uid, "line changed or gone, nothing removed");
            }
        }

        Ok(outcome)
    }

    /// The entry for `source`, recomputed first if missing or stale.
    fn fresh_entry<'a>(
        &self,
        entries: &'a mut HashMap<PathBuf, CacheEntry>,
        source: &Path,
    ) -> RemcalResult<&'a CacheEntry> {
        match entries.entry(source.to_path_buf()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_stale() {
                    tracing::debug!(source = %source.display(), "source changed, recomputing");
                    let tracked: Vec<PathBuf> = occupied.get().files.keys().cloned().collect();
                    match self.compute(source, &tracked) {
                        Ok(entry) => {
                            occupied.insert(entry);
                        }
                        Err(e) => {
                            // The entry stays stale, so the next read retries.
                            tracing::warn!(
                                source = %source.display(),
                                error = %e,
                                "recomputation failed, keeping previous calendar"
                            );
                            return Err(e);
                        }
                    }
                } else {
                    tracing::debug!(source = %source.display(), "cache hit");
                }
                Ok(occupied.into_mut())
            }
            Entry::Vacant(vacant) => {
                tracing::debug!(source = %source.display(), "first read, computing");
                Ok(vacant.insert(self.compute(source, &[])?))
            }
        }
    }

    /// Evaluate `source` into a new entry.
    ///
    /// The source and every file in `tracked` are snapshotted before the
    /// evaluator runs, so an edit made while it runs leaves them stale.
    /// Files seen for the first time can only be read afterwards; the entry
    /// is marked dirty when one of those changed after evaluation started.
    fn compute(&self, source: &Path, tracked: &[PathBuf]) -> RemcalResult<CacheEntry> {
        let mut files = HashMap::new();
        files.insert(source.to_path_buf(), SourceFileRecord::load(source)?);
        let mut snapshots: HashMap<PathBuf, SourceFileRecord> = tracked
            .iter()
            .filter(|path| path.as_path() != source)
            .filter_map(|path| {
                SourceFileRecord::load(path)
                    .ok()
                    .map(|record| (path.clone(), record))
            })
            .collect();

        let started = SystemTime::now();
        let output = self.evaluator.evaluate(source, lookback_start())?;
        let occurrences = parse_occurrences(&output)?;

        let mut dirty = false;
        for occurrence in &occurrences {
            if files.contains_key(&occurrence.source_file) {
                continue;
            }
            let record = match snapshots.remove(&occurrence.source_file) {
                Some(record) => record,
                None => {
                    let record = SourceFileRecord::load(&occurrence.source_file)?;
                    dirty |= record.modified >= started;
                    record
                }
            };
            files.insert(occurrence.source_file.clone(), record);
        }

        let events = aggregate(&occurrences, &files, source)?;

        let tzid = self.options.timezone.name();
        let objects: Vec<CalendarObject> = events
            .iter()
            .map(|event| {
                let last_modified = files
                    .get(&event.identity.file)
                    .map(SourceFileRecord::modified_utc)
                    .unwrap_or(DateTime::UNIX_EPOCH);
                let ctx = EncodeContext {
                    source,
                    tzid,
                    updated: Some(last_modified),
                };
                let view = encode_event(event, &ctx);
                CalendarObject {
                    name: view.uid.clone().unwrap_or_default(),
                    text: generate_ics(&view),
                    event: view,
                    last_modified,
                }
            })
            .collect();

        let views: Vec<VEventView> = objects.iter().map(|o| o.event.clone()).collect();
        let calendar = generate_calendar(&views);

        tracing::debug!(
            source = %source.display(),
            files = files.len(),
            occurrences = occurrences.len(),
            events = events.len(),
            "computed calendar"
        );

        Ok(CacheEntry {
            files,
            events,
            objects,
            calendar,
            dirty,
        })
    }
}

fn mark_dirty(entries: &mut HashMap<PathBuf, CacheEntry>, source: &Path) {
    if let Some(entry) = entries.get_mut(source) {
        entry.dirty = true;
    }
}
