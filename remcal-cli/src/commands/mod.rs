pub mod append;
pub mod ics;
pub mod last_modified;
pub mod list;
pub mod remove;
pub mod to_remind;

use std::io::Read;

use anyhow::{Context, Result};

/// Read an iCalendar document from stdin.
fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read iCalendar from stdin")?;
    if text.trim().is_empty() {
        anyhow::bail!("Expected an iCalendar document on stdin");
    }
    Ok(text)
}
