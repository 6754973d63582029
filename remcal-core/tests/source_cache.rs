use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use remcal_core::{
    Collection, Evaluator, RemcalError, RemcalResult, RemindCollection, RemoveOutcome,
    ScriptOptions, SourceCache,
};

#[derive(Default)]
struct Switches {
    calls: AtomicUsize,
    fail: AtomicBool,
}

/// Lists every `REM <Mon DD YYYY> ... MSG <text>` line as a single untimed
/// occurrence and follows `INCLUDE <path>` lines.
struct ScriptEvaluator(Arc<Switches>);

impl Evaluator for ScriptEvaluator {
    fn evaluate(&self, source: &Path, _start: NaiveDate) -> RemcalResult<String> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail.load(Ordering::SeqCst) {
            return Err(RemcalError::EvaluatorUnavailable("switched off".to_string()));
        }
        let mut output = String::new();
        list_file(source, &mut output)?;
        Ok(output)
    }
}

fn list_file(path: &Path, output: &mut String) -> RemcalResult<()> {
    let content = std::fs::read_to_string(path)?;
    for (index, line) in content.lines().enumerate() {
        if let Some(included) = line.strip_prefix("INCLUDE ") {
            list_file(Path::new(included.trim()), output)?;
            continue;
        }
        let Some(rest) = line.strip_prefix("REM ") else {
            continue;
        };
        let (when, text) = rest.split_once(" MSG ").unwrap_or((rest, ""));
        let date: Vec<&str> = when.split_whitespace().take(3).collect();
        let date = NaiveDate::parse_from_str(&date.join(" "), "%b %d %Y")
            .unwrap_or(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        output.push_str(&format!(
            "# fileinfo {} {}\n{} * * * * {}\n",
            index + 1,
            path.display(),
            date.format("%Y/%m/%d"),
            text
        ));
    }
    Ok(())
}

struct Fixture {
    _dir: tempfile::TempDir,
    dir: PathBuf,
    source: PathBuf,
    switches: Arc<Switches>,
    cache: Arc<SourceCache>,
}

impl Fixture {
    fn new(script: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let source = path.join("main.rem");
        std::fs::write(&source, script).unwrap();

        let switches = Arc::new(Switches::default());
        let options = ScriptOptions {
            timezone: chrono_tz::Europe::Berlin,
            ..ScriptOptions::default()
        };
        let cache = SourceCache::new(ScriptEvaluator(switches.clone()), options);

        Fixture {
            _dir: dir,
            dir: path,
            source,
            switches,
            cache: Arc::new(cache),
        }
    }

    fn calls(&self) -> usize {
        self.switches.calls.load(Ordering::SeqCst)
    }

    fn script(&self) -> String {
        std::fs::read_to_string(&self.source).unwrap()
    }

    fn summaries(&self) -> Vec<String> {
        self.cache
            .read(&self.source)
            .unwrap()
            .into_iter()
            .filter_map(|e| e.summary)
            .collect()
    }
}

fn touch(path: &Path) {
    let modified = std::fs::metadata(path).unwrap().modified().unwrap();
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(modified + Duration::from_secs(5)).unwrap();
}

const EVENT: &str = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\n\
BEGIN:VEVENT\r\nUID:abc\r\nDTSTART;VALUE=DATE:20240320\r\nSUMMARY:Dinner\r\nEND:VEVENT\r\n\
END:VCALENDAR\r\n";

#[test]
fn touching_a_file_recomputes_exactly_once() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");

    assert_eq!(fx.summaries(), vec!["Pay rent"]);
    assert_eq!(fx.summaries(), vec!["Pay rent"]);
    assert_eq!(fx.calls(), 1);

    touch(&fx.source);
    assert_eq!(fx.summaries(), vec!["Pay rent"]);
    assert_eq!(fx.summaries(), vec!["Pay rent"]);
    assert_eq!(fx.calls(), 2);
}

#[test]
fn appended_events_show_up_on_next_read() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent");
    assert_eq!(fx.summaries(), vec!["Pay rent"]);

    let lines = fx.cache.append(&fx.source, EVENT).unwrap();

    assert_eq!(lines, vec!["REM Mar 20 2024 MSG Dinner"]);
    assert_eq!(
        fx.script(),
        "REM Mar 10 2024 MSG Pay rent\nREM Mar 20 2024 MSG Dinner\n"
    );
    assert_eq!(fx.summaries(), vec!["Pay rent", "Dinner"]);
    assert_eq!(fx.calls(), 2);
}

#[test]
fn unsupported_events_are_not_appended() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");
    let monthly = EVENT.replace("SUMMARY", "RRULE:FREQ=MONTHLY\r\nSUMMARY");

    let err = fx.cache.append(&fx.source, &monthly).unwrap_err();

    assert!(matches!(err, RemcalError::UnsupportedRecurrence(_)), "got {err:?}");
    assert_eq!(fx.script(), "REM Mar 10 2024 MSG Pay rent\n");
}

#[test]
fn second_remove_is_a_no_op() {
    let fx = Fixture::new("# bills\nREM Mar 10 2024 MSG Pay rent\nREM Apr 01 2024 MSG Taxes\n");
    let objects = fx.cache.objects(&fx.source).unwrap();
    let rent = &objects[0].name;
    assert!(rent.starts_with("2:"), "{rent}");

    assert_eq!(fx.cache.remove(&fx.source, rent).unwrap(), RemoveOutcome::Removed);
    assert_eq!(fx.script(), "# bills\nREM Apr 01 2024 MSG Taxes\n");

    assert_eq!(
        fx.cache.remove(&fx.source, rent).unwrap(),
        RemoveOutcome::IdentityMismatch
    );
    assert_eq!(fx.script(), "# bills\nREM Apr 01 2024 MSG Taxes\n");
    assert_eq!(fx.summaries(), vec!["Taxes"]);
}

#[test]
fn edited_lines_are_not_removed() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");
    let uid = fx.cache.objects(&fx.source).unwrap()[0].name.clone();

    std::fs::write(&fx.source, "REM Mar 11 2024 MSG Pay rent\n").unwrap();

    assert_eq!(
        fx.cache.remove(&fx.source, &uid).unwrap(),
        RemoveOutcome::IdentityMismatch
    );
    assert_eq!(fx.script(), "REM Mar 11 2024 MSG Pay rent\n");
}

#[test]
fn lines_of_included_files_can_be_removed() {
    let fx = Fixture::new("");
    let birthdays = fx.dir.join("birthdays.rem");
    std::fs::write(&birthdays, "REM Jun 01 2024 MSG Alice\n").unwrap();
    std::fs::write(
        &fx.source,
        format!("INCLUDE {}\nREM Mar 10 2024 MSG Pay rent\n", birthdays.display()),
    )
    .unwrap();

    let objects = fx.cache.objects(&fx.source).unwrap();
    assert_eq!(objects.len(), 2);
    let alice = objects
        .iter()
        .find(|o| o.event.summary.as_deref() == Some("Alice"))
        .unwrap();
    assert!(alice.name.contains("birthdays.rem:1:"), "{}", alice.name);

    assert_eq!(
        fx.cache.remove(&fx.source, &alice.name).unwrap(),
        RemoveOutcome::Removed
    );
    assert_eq!(std::fs::read_to_string(&birthdays).unwrap(), "");

    // Edits to the included file invalidate the source.
    std::fs::write(&birthdays, "REM Jun 02 2024 MSG Bob\n").unwrap();
    touch(&birthdays);
    let mut summaries = fx.summaries();
    summaries.sort();
    assert_eq!(summaries, vec!["Bob", "Pay rent"]);
}

#[test]
fn evaluator_failure_on_stale_source_is_reported_and_retried() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");
    assert_eq!(fx.summaries(), vec!["Pay rent"]);

    std::fs::write(&fx.source, "REM Mar 10 2024 MSG Pay the rent\n").unwrap();
    touch(&fx.source);
    fx.switches.fail.store(true, Ordering::SeqCst);

    let err = fx.cache.read(&fx.source).unwrap_err();
    assert!(matches!(err, RemcalError::EvaluatorUnavailable(_)), "got {err:?}");
    assert_eq!(fx.calls(), 2);
    assert_eq!(fx.script(), "REM Mar 10 2024 MSG Pay the rent\n");

    // Still stale, so every read retries until the evaluator is back.
    assert!(fx.cache.objects(&fx.source).is_err());
    assert_eq!(fx.calls(), 3);

    fx.switches.fail.store(false, Ordering::SeqCst);
    assert_eq!(fx.summaries(), vec!["Pay the rent"]);
    assert_eq!(fx.calls(), 4);
    assert_eq!(fx.summaries(), vec!["Pay the rent"]);
    assert_eq!(fx.calls(), 4);
}

#[test]
fn first_computation_reports_evaluator_failure() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");
    fx.switches.fail.store(true, Ordering::SeqCst);

    let err = fx.cache.read(&fx.source).unwrap_err();
    assert!(matches!(err, RemcalError::EvaluatorUnavailable(_)), "got {err:?}");
}

#[test]
fn concurrent_readers_share_one_computation() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = fx.cache.clone();
            let source = fx.source.clone();
            std::thread::spawn(move || cache.read(&source).unwrap().len())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(fx.calls(), 1);
}

#[test]
fn collection_adapter() {
    let fx = Fixture::new("REM Mar 10 2024 MSG Pay rent\n");
    let collection = RemindCollection::new(fx.cache.clone(), &fx.source);

    let text = collection.text().unwrap();
    assert!(text.starts_with("BEGIN:VCALENDAR\r\n"), "{text}");
    assert!(text.contains("SUMMARY:Pay rent"), "{text}");

    let modified = std::fs::metadata(&fx.source).unwrap().modified().unwrap();
    assert_eq!(collection.last_modified().unwrap(), chrono::DateTime::<chrono::Utc>::from(modified));

    let name = collection.objects().unwrap()[0].name.clone();
    assert!(collection.get(&name).unwrap().is_some());

    assert_eq!(collection.replace(&name, EVENT).unwrap(), RemoveOutcome::Removed);
    assert_eq!(fx.script(), "REM Mar 20 2024 MSG Dinner\n");

    let objects = collection.objects().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].event.summary.as_deref(), Some("Dinner"));
    assert!(collection.get(&name).unwrap().is_none());
}
