//! Stable identities for Remind source lines.
//!
//! An [`Identity`] pins an event to the exact text of the line that produced
//! it. It is rendered as the calendar UID, and the deletion path re-derives it
//! from the file to make sure the line it is about to drop is still the line
//! the client saw.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{RemcalError, RemcalResult};

/// Hash of the exact text of one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(u64);

impl ContentHash {
    pub fn of_line(text: &str) -> Self {
        let digest = blake3::hash(text.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest.as_bytes()[..8]);
        ContentHash(u64::from_be_bytes(prefix))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl std::str::FromStr for ContentHash {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(ContentHash)
    }
}

/// Position and content fingerprint of the line behind an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub file: PathBuf,
    /// 1-based
    pub line: usize,
    pub hash: ContentHash,
}

impl Identity {
    pub fn new(file: impl Into<PathBuf>, line: usize, text: &str) -> Self {
        Identity {
            file: file.into(),
            line,
            hash: ContentHash::of_line(text),
        }
    }

    /// Render as a UID.
    ///
    /// Lines of the `source` script itself render as `{line}:{hash}`; lines of
    /// included files carry a file token in front.
    pub fn uid(&self, source: &Path) -> String {
        if same_file(&self.file, source) {
            format!("{}:{}", self.line, self.hash)
        } else {
            format!("{}:{}:{}", file_token(&self.file), self.line, self.hash)
        }
    }
}

/// A UID taken apart again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUid {
    /// `None` for lines of the source script itself.
    pub file_token: Option<String>,
    pub line: usize,
    pub hash: ContentHash,
}

impl ParsedUid {
    pub fn parse(uid: &str) -> RemcalResult<Self> {
        let invalid = || RemcalError::InvalidUid(uid.to_string());

        // File tokens may not contain ':' on their own, but be lenient and
        // split from the right.
        let mut parts = uid.rsplitn(3, ':');
        let hash = parts.next().ok_or_else(invalid)?;
        let line = parts.next().ok_or_else(invalid)?;
        let file_token = parts.next().map(str::to_string);

        let line: usize = line.parse().map_err(|_| invalid())?;
        if line == 0 {
            return Err(invalid());
        }
        let hash = hash.parse().map_err(|_| invalid())?;

        Ok(ParsedUid {
            file_token,
            line,
            hash,
        })
    }

    /// Whether this UID points into `file`, given the configured `source`.
    pub fn refers_to(&self, file: &Path, source: &Path) -> bool {
        match &self.file_token {
            None => same_file(file, source),
            Some(token) => *token == file_token(file),
        }
    }
}

/// Path with separators replaced so it can live inside a UID.
pub fn file_token(path: &Path) -> String {
    path.to_string_lossy().replace(['/', '\\'], "-")
}

/// Path equality, falling back to canonical paths.
pub fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
