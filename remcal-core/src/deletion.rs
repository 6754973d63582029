//! Conditional removal of script lines.

use std::path::Path;

use serde::Serialize;

use crate::error::RemcalResult;
use crate::identity::ContentHash;

/// What a gated removal did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemoveOutcome {
    Removed,
    /// The line no longer matches the identity the caller holds (edited,
    /// shifted, or already removed). Nothing was touched.
    IdentityMismatch,
}

/// Remove 1-based `line` from `path` only if its current text still hashes
/// to `expected`.
pub fn remove_line_if_matches(
    path: &Path,
    line: usize,
    expected: ContentHash,
) -> RemcalResult<RemoveOutcome> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(RemoveOutcome::IdentityMismatch);
        }
        Err(e) => return Err(e.into()),
    };

    let mut lines: Vec<&str> = content.split_inclusive('\n').collect();
    let Some(index) = line.checked_sub(1).filter(|i| *i < lines.len()) else {
        return Ok(RemoveOutcome::IdentityMismatch);
    };

    let current = lines[index]
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(lines[index]);
    if ContentHash::of_line(current) != expected {
        return Ok(RemoveOutcome::IdentityMismatch);
    }

    lines.remove(index);
    write_atomically(path, &lines.concat())?;
    Ok(RemoveOutcome::Removed)
}

fn write_atomically(path: &Path, content: &str) -> RemcalResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content)?;
    if let Ok(metadata) = std::fs::metadata(path) {
        std::fs::set_permissions(&temp, metadata.permissions())?;
    }
    std::fs::rename(&temp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "# bills\nREM Mar 10 MSG Pay rent\nREM Apr 1 MSG Taxes\n";

    #[test]
    fn test_removes_matching_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bills.txt");
        std::fs::write(&path, SCRIPT).unwrap();

        let outcome =
            remove_line_if_matches(&path, 2, ContentHash::of_line("REM Mar 10 MSG Pay rent"))
                .unwrap();

        assert_eq!(outcome, RemoveOutcome::Removed);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# bills\nREM Apr 1 MSG Taxes\n"
        );
    }

    #[test]
    fn test_edited_line_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bills.txt");
        std::fs::write(&path, SCRIPT).unwrap();

        let outcome =
            remove_line_if_matches(&path, 2, ContentHash::of_line("REM Mar 11 MSG Pay rent"))
                .unwrap();

        assert_eq!(outcome, RemoveOutcome::IdentityMismatch);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), SCRIPT);
    }

    #[test]
    fn test_second_removal_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bills.txt");
        std::fs::write(&path, SCRIPT).unwrap();
        let hash = ContentHash::of_line("REM Apr 1 MSG Taxes");

        assert_eq!(
            remove_line_if_matches(&path, 3, hash).unwrap(),
            RemoveOutcome::Removed
        );
        assert_eq!(
            remove_line_if_matches(&path, 3, hash).unwrap(),
            RemoveOutcome::IdentityMismatch
        );
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# bills\nREM Mar 10 MSG Pay rent\n"
        );
    }

    #[test]
    fn test_crlf_and_missing_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bills.txt");
        std::fs::write(&path, "REM Mar 10 MSG Pay rent\r\nREM Apr 1 MSG Taxes").unwrap();

        assert_eq!(
            remove_line_if_matches(&path, 2, ContentHash::of_line("REM Apr 1 MSG Taxes")).unwrap(),
            RemoveOutcome::Removed
        );
        assert_eq!(
            remove_line_if_matches(&path, 1, ContentHash::of_line("REM Mar 10 MSG Pay rent"))
                .unwrap(),
            RemoveOutcome::Removed
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_missing_file_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        assert_eq!(
            remove_line_if_matches(&path, 1, ContentHash::of_line("x")).unwrap(),
            RemoveOutcome::IdentityMismatch
        );
    }
}
