use std::io::Write;
use std::path::Path;

use anyhow::Result;
use remcal_core::{RemcalConfig, SourceCache};

pub fn run(config: &RemcalConfig, source: &Path) -> Result<()> {
    let cache = SourceCache::from_config(config)?;
    let text = cache.calendar_text(source)?;

    std::io::stdout().write_all(text.as_bytes())?;
    Ok(())
}
