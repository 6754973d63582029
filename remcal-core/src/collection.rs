//! Collection interface for calendar servers.
//!
//! A server routes requests to named collections and only needs a list of
//! objects plus a few mutations. [`RemindCollection`] exposes one Remind
//! script through that interface.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::{CalendarObject, SourceCache};
use crate::deletion::RemoveOutcome;
use crate::error::RemcalResult;

pub trait Collection: Send + Sync {
    fn objects(&self) -> RemcalResult<Vec<CalendarObject>>;

    /// The whole collection as one document.
    fn text(&self) -> RemcalResult<String>;

    /// Add the objects in `text`, returning what was written.
    fn append(&self, text: &str) -> RemcalResult<Vec<String>>;

    fn remove(&self, name: &str) -> RemcalResult<RemoveOutcome>;

    fn replace(&self, name: &str, text: &str) -> RemcalResult<RemoveOutcome>;

    fn last_modified(&self) -> RemcalResult<DateTime<Utc>>;

    fn get(&self, name: &str) -> RemcalResult<Option<CalendarObject>> {
        Ok(self.objects()?.into_iter().find(|o| o.name == name))
    }
}

/// One Remind script served through a shared cache.
#[derive(Clone)]
pub struct RemindCollection {
    cache: Arc<SourceCache>,
    source: PathBuf,
}

impl RemindCollection {
    pub fn new(cache: Arc<SourceCache>, source: impl Into<PathBuf>) -> Self {
        RemindCollection {
            cache,
            source: source.into(),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Collection for RemindCollection {
    fn objects(&self) -> RemcalResult<Vec<CalendarObject>> {
        self.cache.objects(&self.source)
    }

    fn text(&self) -> RemcalResult<String> {
        self.cache.calendar_text(&self.source)
    }

    fn append(&self, text: &str) -> RemcalResult<Vec<String>> {
        self.cache.append(&self.source, text)
    }

    fn remove(&self, name: &str) -> RemcalResult<RemoveOutcome> {
        self.cache.remove(&self.source, name)
    }

    fn replace(&self, name: &str, text: &str) -> RemcalResult<RemoveOutcome> {
        self.cache
            .replace(&self.source, name, text)
            .map(|(outcome, _)| outcome)
    }

    fn last_modified(&self) -> RemcalResult<DateTime<Utc>> {
        self.cache.last_modified(&self.source)
    }
}
