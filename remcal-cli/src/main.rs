mod commands;
mod render;

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use remcal_core::RemcalConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "remcal")]
#[command(about = "Read and write a Remind script as iCalendar events")]
struct Cli {
    /// Config file to use instead of ~/.config/remcal/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Remind script to operate on (overrides `source` from the config)
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List events of the script, grouped by day
    List {
        /// Print calendar objects as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the whole script as one iCalendar document
    Ics,
    /// Convert iCalendar from stdin to Remind lines without touching the script
    ToRemind {
        /// Prefix for every message
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Append the events of an iCalendar document on stdin to the script
    Append,
    /// Remove the line behind an event UID, if it is unchanged
    Remove { uid: String },
    /// Print when any file behind the script last changed
    LastModified,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => RemcalConfig::from_file(path)?,
        None => RemcalConfig::load()?,
    };
    let source = cli.source.unwrap_or_else(|| config.source_path());
    tracing::debug!(source = %source.display(), timezone = %config.timezone, "using script");

    match cli.command {
        Commands::List { json } => {
            require_source(&source)?;
            commands::list::run(&config, &source, json)
        }
        Commands::Ics => {
            require_source(&source)?;
            commands::ics::run(&config, &source)
        }
        Commands::ToRemind { label } => commands::to_remind::run(&config, label),
        Commands::Append => commands::append::run(&config, &source),
        Commands::Remove { uid } => {
            require_source(&source)?;
            commands::remove::run(&config, &source, &uid)
        }
        Commands::LastModified => {
            require_source(&source)?;
            commands::last_modified::run(&config, &source)
        }
    }
}

fn require_source(source: &Path) -> Result<()> {
    if !source.exists() {
        anyhow::bail!(
            "Remind script not found at {}\n\nSet `source` in {} or pass --source.",
            source.display(),
            RemcalConfig::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "the config file".to_string())
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("REMCAL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "remcal=debug,remcal_core=debug,info"
        } else {
            "remcal=info,remcal_core=info,warn"
        })
    });

    let format = env::var("REMCAL_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}
