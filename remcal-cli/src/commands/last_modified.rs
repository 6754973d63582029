use std::path::Path;

use anyhow::Result;
use remcal_core::{RemcalConfig, SourceCache};

pub fn run(config: &RemcalConfig, source: &Path) -> Result<()> {
    let cache = SourceCache::from_config(config)?;
    let modified = cache.last_modified(source)?;

    println!("{}", modified.to_rfc2822());
    Ok(())
}
