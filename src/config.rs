use anyhow::{ Context, Result };
use notify::{ Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher };
use serde::{ Deserialize, Serialize };
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::ReconciliationEngine;
use crate::types::Rgb;

/// Name of the settings file inside the plugin directory
pub const CONFIG_FILE_NAME: &str = "rampagent.toml";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub colors: ColorConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Base URL of the stand service, endpoint paths are appended to it
    #[serde(default = "default_api_url")]
    pub api_base_url: String,

    #[serde(default = "default_report_path")]
    pub report_path: String,

    #[serde(default = "default_occupancy_path")]
    pub occupancy_path: String,

    /// `{icao}` is replaced with the airport code
    #[serde(default = "default_stands_path")]
    pub stands_path: String,

    #[serde(default = "default_assign_path")]
    pub assign_path: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for a whole request, keeps a poll inside its interval
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret shared with the stand service, hashed into every request token
    #[serde(default)]
    pub shared_secret: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Sync every N ticks of the one second timer
    #[serde(default = "default_sync_interval")]
    pub sync_interval_ticks: u64,

    /// Airborne traffic is reported only when inbound to an airport with one of these prefixes
    #[serde(default = "default_destination_prefixes")]
    pub destination_prefixes: Vec<String>,

    /// Airborne traffic above this altitude (feet) is not reported
    #[serde(default = "default_max_airborne_altitude")]
    pub max_airborne_altitude_ft: i32,

    /// Where the `dump` command writes the last report
    #[serde(default = "default_dump_dir")]
    pub dump_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ColorConfig {
    /// Stand tag colour when the assignment did not change (hex)
    #[serde(default = "default_neutral_color")]
    pub neutral: String,

    /// Stand tag colour for a new or changed assignment (hex)
    #[serde(default = "default_highlight_color")]
    pub highlight: String,
}

// Default value functions
fn default_api_url() -> String {
    "https://pintade.vatsim.fr/rampagent/api".to_string()
}
fn default_report_path() -> String {
    "/report".to_string()
}
fn default_occupancy_path() -> String {
    "/occupancy/".to_string()
}
fn default_stands_path() -> String {
    "/airports/{icao}/stands".to_string()
}
fn default_assign_path() -> String {
    "/assign".to_string()
}
fn default_connect_timeout() -> u64 {
    2
}
fn default_request_timeout() -> u64 {
    5
}
fn default_user_agent() -> String {
    format!("NeoRampAgent/{}", crate::VERSION)
}

fn default_sync_interval() -> u64 {
    10
}
fn default_destination_prefixes() -> Vec<String> {
    vec!["LF".to_string()]
}
fn default_max_airborne_altitude() -> i32 {
    20_000
}
fn default_dump_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_neutral_color() -> String {
    "#FFFFFF".to_string()
}
fn default_highlight_color() -> String {
    "#FFDC03".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_url(),
            report_path: default_report_path(),
            occupancy_path: default_occupancy_path(),
            stands_path: default_stands_path(),
            assign_path: default_assign_path(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sync_interval_ticks: default_sync_interval(),
            destination_prefixes: default_destination_prefixes(),
            max_airborne_altitude_ft: default_max_airborne_altitude(),
            dump_dir: default_dump_dir(),
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            neutral: default_neutral_color(),
            highlight: default_highlight_color(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            report: ReportConfig::default(),
            colors: ColorConfig::default(),
        }
    }
}

impl ColorConfig {
    pub fn neutral_rgb(&self) -> Rgb {
        parse_color(&self.neutral).unwrap_or(Rgb::WHITE)
    }

    pub fn highlight_rgb(&self) -> Rgb {
        parse_color(&self.highlight).unwrap_or(Rgb::YELLOW)
    }
}

/// Parse a `#RRGGBB` colour string
pub fn parse_color(hex: &str) -> Option<Rgb> {
    let hex = hex.trim_start_matches('#');

    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb(r, g, b))
}

/// Get the config file path inside the plugin directory
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Read and parse an existing configuration file
pub fn read_config(path: &Path) -> Result<AgentConfig> {
    let contents = std::fs
        ::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load configuration from file or create default
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if path.exists() {
        read_config(path)
    } else {
        tracing::warn!("{} not found, creating default configuration", path.display());
        let config = AgentConfig::default();
        save_config(path, &config)?;
        Ok(config)
    }
}

/// Save configuration to file
pub fn save_config(path: &Path, config: &AgentConfig) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;

    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}

/// Configuration file watcher with hot-reload
pub struct ConfigWatcher {
    path: PathBuf,
    engine: Arc<ReconciliationEngine>,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf, engine: Arc<ReconciliationEngine>) -> Self {
        Self { path, engine }
    }

    /// Watch the config file until cancelled, applying every successful reload to the engine.
    ///
    /// The parent directory is watched so that editors saving through a rename keep reloading.
    pub async fn watch(self, shutdown: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel(16);

        let mut watcher = RecommendedWatcher::new(move |res| {
            let _ = tx.blocking_send(res);
        }, NotifyConfig::default())?;

        let dir = self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        tracing::info!("Config file watcher started on {}", self.path.display());

        loop {
            let res = tokio::select! {
                _ = shutdown.cancelled() => break,
                res = rx.recv() => match res {
                    Some(res) => res,
                    None => break,
                },
            };

            match res {
                Ok(event) if is_config_event(&event, &self.path) => {
                    tracing::debug!("Config file event: {:?}", event);

                    // editors write in several steps
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    self.reload();
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }

        tracing::debug!("Config file watcher stopped");
        Ok(())
    }

    fn reload(&self) {
        if !self.path.exists() {
            tracing::debug!("{} is gone, keeping the current configuration", self.path.display());
            return;
        }

        match read_config(&self.path) {
            Ok(config) => {
                self.engine.apply_config(config);
                tracing::info!("Configuration reloaded successfully");
            }
            Err(e) => {
                tracing::error!("Failed to reload config: {:#}", e);
            }
        }
    }
}

/// Whether a directory event touches the config file
fn is_config_event(event: &Event, path: &Path) -> bool {
    let Some(name) = path.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}
