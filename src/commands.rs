use anyhow::{ Context, Result };
use chrono::{ DateTime, Utc };
use std::path::{ Path, PathBuf };
use thiserror::Error;

use crate::report::Report;

/// Chat commands understood by the plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the plugin version
    Version,

    /// Rebuild the stand menu for an airport
    Menu(String),

    /// Change the stand service base URL
    Url(String),

    /// Write the last report to a JSON file
    Dump,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("plugin is not initialized")]
    NotInitialized,

    #[error("no stand menu available for {0}")]
    MenuUnavailable(String),

    #[error("no report has been sent yet")]
    NoReport,

    #[error("failed to write report dump: {0}")]
    Dump(String),
}

impl Command {
    pub fn parse(name: &str, args: &[String]) -> Result<Self, CommandError> {
        match name.to_ascii_lowercase().as_str() {
            "version" => Ok(Command::Version),
            "menu" =>
                match args {
                    [icao] if !icao.trim().is_empty() => Ok(Command::Menu(icao.trim().to_uppercase())),
                    _ => Err(CommandError::Usage("menu <ICAO>")),
                }
            "url" =>
                match args {
                    [url] if !url.trim().is_empty() => Ok(Command::Url(url.trim().to_string())),
                    _ => Err(CommandError::Usage("url <host or URL>")),
                }
            "dump" => Ok(Command::Dump),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Write `report` as pretty JSON into `dir`, named after the time it was sent
pub fn write_report_dump(dir: &Path, sent_at: DateTime<Utc>, report: &Report) -> Result<PathBuf> {
    std::fs
        ::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(format!("rampagent_report_{}.json", sent_at.format("%Y%m%d_%H%M%S")));
    let contents = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(path)
}
