//! Snapshots of Remind source files.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};

use crate::error::RemcalResult;

/// One file that contributed occurrences, as it looked when events were computed.
#[derive(Debug, Clone)]
pub struct SourceFileRecord {
    pub path: PathBuf,
    pub modified: SystemTime,
    lines: Vec<String>,
}

impl SourceFileRecord {
    /// Read the file, taking the mtime before the content so a concurrent
    /// write is never hidden behind the recorded mtime.
    pub fn load(path: &Path) -> RemcalResult<Self> {
        let modified = modified_time(path)?;
        let content = std::fs::read_to_string(path)?;

        Ok(SourceFileRecord {
            path: path.to_path_buf(),
            modified,
            lines: content.lines().map(str::to_string).collect(),
        })
    }

    /// Text of a 1-based line.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// True when the file on disk is newer than this snapshot, or gone.
    pub fn is_stale(&self) -> bool {
        match modified_time(&self.path) {
            Ok(live) => live > self.modified,
            Err(_) => true,
        }
    }

    pub fn modified_utc(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.modified)
    }
}

pub fn modified_time(path: &Path) -> RemcalResult<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

/// Append script lines, starting on a fresh line if the file lacks a
/// trailing newline.
pub fn append_lines(path: &Path, lines: &[String]) -> RemcalResult<()> {
    let needs_newline = match std::fs::read(path) {
        Ok(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    if needs_newline {
        content.push('\n');
    }
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
