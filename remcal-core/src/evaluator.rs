//! Remind subprocess invocation.
//!
//! Remind is run in list mode over a source script and its textual output is
//! handed to the occurrence parser. The [`Evaluator`] trait keeps the rest of
//! the pipeline independent of how that text is produced.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{Days, Local, NaiveDate};

use crate::error::{RemcalError, RemcalResult};

/// How far back occurrences are evaluated (12 weeks).
pub const LOOKBACK_DAYS: u64 = 84;

/// Produces occurrence listings for a source script.
pub trait Evaluator: Send + Sync {
    /// Evaluate `source` starting at `start` and return the raw listing.
    fn evaluate(&self, source: &Path, start: NaiveDate) -> RemcalResult<String>;
}

/// First day of the evaluation window relative to today.
pub fn lookback_start() -> NaiveDate {
    let today = Local::now().date_naive();
    today.checked_sub_days(Days::new(LOOKBACK_DAYS)).unwrap_or(today)
}

/// Runs the `remind` binary.
#[derive(Clone, Debug)]
pub struct RemindEvaluator {
    binary: String,
}

impl RemindEvaluator {
    pub fn new(binary: &str) -> Self {
        RemindEvaluator {
            binary: binary.to_string(),
        }
    }

    fn binary_path(&self) -> RemcalResult<PathBuf> {
        which::which(&self.binary).map_err(|_| {
            RemcalError::EvaluatorUnavailable(format!(
                "'{}' not found. Install remind or set `evaluator` in the config",
                self.binary
            ))
        })
    }

    /// Arguments: list mode with file info, a 15 month simple calendar,
    /// 24 hour times, RUN disabled.
    fn args(source: &Path, start: NaiveDate) -> Vec<String> {
        vec![
            "-l".to_string(),
            "-s15".to_string(),
            "-b1".to_string(),
            "-r".to_string(),
            source.to_string_lossy().into_owned(),
            start.format("%Y-%m-%d").to_string(),
        ]
    }
}

impl Default for RemindEvaluator {
    fn default() -> Self {
        RemindEvaluator::new("remind")
    }
}

impl Evaluator for RemindEvaluator {
    fn evaluate(&self, source: &Path, start: NaiveDate) -> RemcalResult<String> {
        let binary_path = self.binary_path()?;
        tracing::debug!(
            binary = %binary_path.display(),
            source = %source.display(),
            %start,
            "running evaluator"
        );

        let output = Command::new(&binary_path)
            .args(Self::args(source, start))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    RemcalError::EvaluatorUnavailable(format!(
                        "Failed to spawn {}: {}",
                        binary_path.display(),
                        e
                    ))
                }
                _ => RemcalError::EvaluatorIo(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RemcalError::EvaluatorUnavailable(format!(
                "{} exited with status {}: {}",
                binary_path.display(),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| {
            RemcalError::EvaluatorIo(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}
