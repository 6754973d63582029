//! remcal configuration.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{RemcalError, RemcalResult};
use crate::script::ScriptOptions;

static DEFAULT_SOURCE_PATH: &str = "~/.reminders";
static DEFAULT_EVALUATOR: &str = "remind";

/// Highest PRIORITY Remind accepts.
pub const MAX_PRIORITY: u32 = 9999;

fn default_source_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_PATH)
}

fn default_evaluator() -> String {
    DEFAULT_EVALUATOR.to_string()
}

fn default_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Configuration at ~/.config/remcal/config.toml
///
/// Every key can also be set through a `REMCAL_<KEY>` environment variable.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RemcalConfig {
    /// The Remind script exposed as a calendar.
    #[serde(default = "default_source_path")]
    pub source: PathBuf,

    /// IANA zone used for timed events in both directions.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Prefix inserted before every message written back to the script.
    #[serde(default)]
    pub label: Option<String>,

    /// Priority clause attached to every line written back to the script.
    #[serde(default)]
    pub priority: Option<u32>,

    /// Name or path of the Remind binary.
    #[serde(default = "default_evaluator")]
    pub evaluator: String,
}

impl Default for RemcalConfig {
    fn default() -> Self {
        RemcalConfig {
            source: default_source_path(),
            timezone: default_timezone(),
            label: None,
            priority: None,
            evaluator: default_evaluator(),
        }
    }
}

impl RemcalConfig {
    pub fn config_path() -> RemcalResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RemcalError::Config("Could not determine config directory".into()))?
            .join("remcal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the default config file, creating a commented template first if
    /// it does not exist yet.
    pub fn load() -> RemcalResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::from_file(&config_path)
    }

    /// Load a specific config file layered with `REMCAL_*` environment variables.
    pub fn from_file(path: &Path) -> RemcalResult<Self> {
        let config: RemcalConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("REMCAL"))
            .build()
            .map_err(|e| RemcalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| RemcalError::Config(e.to_string()))?;

        config.tz()?;
        config.check_priority()?;
        Ok(config)
    }

    /// The source script with `~` expanded.
    pub fn source_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.source.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    pub fn tz(&self) -> RemcalResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| RemcalError::Config(format!("Unknown time zone '{}'", self.timezone)))
    }

    fn check_priority(&self) -> RemcalResult<()> {
        match self.priority {
            Some(priority) if priority > MAX_PRIORITY => Err(RemcalError::Config(format!(
                "priority {priority} is outside 0 to {MAX_PRIORITY}"
            ))),
            _ => Ok(()),
        }
    }

    pub fn script_options(&self) -> RemcalResult<ScriptOptions> {
        self.check_priority()?;
        Ok(ScriptOptions {
            timezone: self.tz()?,
            label: self.label.clone(),
            priority: self.priority,
        })
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> RemcalResult<()> {
        let contents = format!(
            "\
# remcal configuration

# Remind script exposed as a calendar:
# source = \"{}\"

# Time zone for timed events (defaults to the system zone):
# timezone = \"Europe/Berlin\"

# Prefix for messages written back to the script:
# label = \"[cal]\"

# Priority (0 to 9999) for lines written back to the script:
# priority = 5000

# Remind binary:
# evaluator = \"{}\"
",
            DEFAULT_SOURCE_PATH, DEFAULT_EVALUATOR
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RemcalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RemcalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_reads_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "source = \"/tmp/reminders.rem\"\ntimezone = \"Europe/Berlin\"\nlabel = \"[cal]\"\npriority = 5000\n",
        )
        .unwrap();

        let config = RemcalConfig::from_file(&path).unwrap();
        assert_eq!(config.source_path(), PathBuf::from("/tmp/reminders.rem"));
        assert_eq!(config.tz().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(config.label.as_deref(), Some("[cal]"));
        assert_eq!(config.priority, Some(5000));
        assert_eq!(config.evaluator, "remind");
    }

    #[test]
    fn test_from_file_rejects_unknown_timezone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timezone = \"Mars/Olympus\"\n").unwrap();

        let err = RemcalConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, RemcalError::Config(_)), "got {err:?}");
    }

    #[test]
    fn test_priority_must_fit_remind_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timezone = \"UTC\"\npriority = 10000\n").unwrap();

        let err = RemcalConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, RemcalError::Config(_)), "got {err:?}");

        let config = RemcalConfig {
            priority: Some(MAX_PRIORITY + 1),
            ..RemcalConfig::default()
        };
        assert!(config.script_options().is_err());

        std::fs::write(&path, "timezone = \"UTC\"\npriority = 9999\n").unwrap();
        assert_eq!(RemcalConfig::from_file(&path).unwrap().priority, Some(9999));
    }

    #[test]
    fn test_default_config_template_is_loadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        RemcalConfig::create_default_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# source = \"~/.reminders\""));

        let config = RemcalConfig::from_file(&path).unwrap();
        assert_eq!(config.source, PathBuf::from("~/.reminders"));
    }
}
