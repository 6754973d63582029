use std::path::Path;

use anyhow::Result;
use remcal_core::{RemcalConfig, SourceCache};

use crate::render::Render;

pub fn run(config: &RemcalConfig, source: &Path, uid: &str) -> Result<()> {
    let cache = SourceCache::from_config(config)?;
    let outcome = cache.remove(source, uid)?;

    println!("{} {}", outcome.render(), uid);
    Ok(())
}
