use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use owo_colors::OwoColorize;
use remcal_core::occurrence::TimeRange;
use remcal_core::{RemcalConfig, SourceCache};

use crate::render::{Render, format_date_label};

pub fn run(config: &RemcalConfig, source: &Path, json: bool) -> Result<()> {
    let cache = SourceCache::from_config(config)?;

    if json {
        let objects = cache.objects(source)?;
        println!("{}", serde_json::to_string_pretty(&objects)?);
        return Ok(());
    }

    let events = cache.events(source)?;

    // One row per occurrence
    let mut rows: Vec<(NaiveDate, Option<TimeRange>, String, String)> = events
        .iter()
        .flat_map(|event| {
            let uid = event.identity.uid(source);
            event
                .dates
                .iter()
                .map(move |date| (*date, event.time, event.text.clone(), uid.clone()))
        })
        .collect();

    // All-day entries first within a day
    rows.sort_by_key(|(date, time, _, _)| (*date, time.map(|t| t.start)));

    if rows.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    let mut current_date: Option<NaiveDate> = None;

    for (date, time, text, uid) in &rows {
        if current_date != Some(*date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(*date, today).bold());
            current_date = Some(*date);
        }

        println!("  {} {} {}", time.render(), text, uid.dimmed());
    }

    Ok(())
}
