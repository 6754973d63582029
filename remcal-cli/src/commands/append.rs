use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use remcal_core::{RemcalConfig, SourceCache};

pub fn run(config: &RemcalConfig, source: &Path) -> Result<()> {
    let text = super::read_stdin()?;
    let cache = SourceCache::from_config(config)?;
    let lines = cache.append(source, &text)?;

    for line in &lines {
        println!("{} {}", "+".green(), line);
    }
    println!(
        "{}",
        format!("Appended {} to {}", pluralize(lines.len()), source.display()).dimmed()
    );
    Ok(())
}

fn pluralize(count: usize) -> String {
    if count == 1 {
        "1 line".to_string()
    } else {
        format!("{} lines", count)
    }
}
