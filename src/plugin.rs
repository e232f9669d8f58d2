use anyhow::{ Context, Result };
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::commands::{ write_report_dump, Command, CommandError };
use crate::config::{ self, AgentConfig, ConfigWatcher };
use crate::engine::{ PluginEvents, ReconciliationEngine };
use crate::host::Host;
use crate::network::{ RemoteClient, StandAuthority };
use crate::ticker::{ self, TICK_PERIOD };

/// Descriptor reported to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginMetadata {
    pub name: &'static str,
    pub version: &'static str,
    pub author: &'static str,
}

/// Everything that only exists between a successful initialize and shutdown
struct Running {
    runtime: Runtime,
    engine: Arc<ReconciliationEngine>,
    shutdown: CancellationToken,
    ticker: JoinHandle<()>,
    watcher: Option<JoinHandle<()>>,
}

/// Plugin entry point called by the host.
///
/// A failed initialization is logged and leaves the plugin inert; every callback is then a no-op.
#[derive(Default)]
pub struct RampAgent {
    running: Option<Running>,
}

impl RampAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata() -> PluginMetadata {
        PluginMetadata {
            name: crate::PLUGIN_NAME,
            version: crate::VERSION,
            author: "French vACC",
        }
    }

    /// Load settings from `plugin_dir` and start syncing against the configured service
    pub fn initialize(&mut self, host: Host, plugin_dir: &Path) {
        crate::init_tracing();

        let path = config::config_path(plugin_dir);
        let started = config
            ::load_config(&path)
            .and_then(|config| {
                let client = RemoteClient::new(&config.network).context("Failed to create HTTP client")?;
                Ok((config, Arc::new(client) as Arc<dyn StandAuthority>))
            })
            .and_then(|(config, authority)| Self::start(host.clone(), config, authority, Some(path)));

        self.finish_initialize(&host, started);
    }

    /// Start with an explicit configuration and authority, without watching a settings file
    pub fn initialize_with(&mut self, host: Host, config: AgentConfig, authority: Arc<dyn StandAuthority>) {
        crate::init_tracing();

        let started = Self::start(host.clone(), config, authority, None);
        self.finish_initialize(&host, started);
    }

    fn finish_initialize(&mut self, host: &Host, started: Result<Running>) {
        match started {
            Ok(running) => {
                tracing::info!("{} {} initialized", crate::PLUGIN_NAME, crate::VERSION);
                self.running = Some(running);
            }
            Err(e) => {
                tracing::error!("Failed to initialize {}: {:#}", crate::PLUGIN_NAME, e);
                host.chat.display_message(&format!("Failed to initialize: {}", e));
            }
        }
    }

    fn start(
        host: Host,
        config: AgentConfig,
        authority: Arc<dyn StandAuthority>,
        config_path: Option<PathBuf>
    ) -> Result<Running> {
        if config.auth.shared_secret.is_empty() {
            tracing::warn!("No shared secret configured, the stand service will reject requests");
        }

        // Create Tokio runtime for the ticker and network calls
        let runtime = tokio::runtime::Builder
            ::new_multi_thread()
            .worker_threads(2)
            .thread_name("rampagent")
            .enable_all()
            .build()
            .context("Failed to create async runtime")?;

        let engine = Arc::new(ReconciliationEngine::new(host, authority, config));
        runtime.block_on(engine.on_connection_change());

        let shutdown = CancellationToken::new();

        let ticker = runtime.spawn(ticker::run(engine.clone(), TICK_PERIOD, shutdown.clone()));

        // Start config file watcher
        let watcher = config_path.map(|path| {
            let config_watcher = ConfigWatcher::new(path, engine.clone());
            let token = shutdown.clone();
            runtime.spawn(async move {
                if let Err(e) = config_watcher.watch(token).await {
                    tracing::error!("Config watcher error: {:#}", e);
                }
            })
        });

        Ok(Running { runtime, engine, shutdown, ticker, watcher })
    }

    pub fn is_initialized(&self) -> bool {
        self.running.is_some()
    }

    pub fn engine(&self) -> Option<Arc<ReconciliationEngine>> {
        self.running.as_ref().map(|running| running.engine.clone())
    }

    /// Stop the ticker and wait for its last iteration
    pub fn shutdown(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let Running { runtime, shutdown, ticker, watcher, .. } = running;

        shutdown.cancel();
        runtime.block_on(async {
            if let Err(e) = ticker.await {
                tracing::warn!("Ticker ended abnormally: {}", e);
            }
            if let Some(watcher) = watcher {
                let _ = watcher.await;
            }
        });
        runtime.shutdown_timeout(Duration::from_secs(1));

        tracing::info!("{} shutdown complete", crate::PLUGIN_NAME);
    }

    // Host events

    pub fn on_connection_change(&self) {
        if let Some(running) = &self.running {
            running.runtime.block_on(running.engine.on_connection_change());
        }
    }

    pub fn on_tag_dropdown_open(&self, callsign: &str) {
        if let Some(running) = &self.running {
            running.runtime.block_on(running.engine.on_dropdown_open(callsign));
        }
    }

    pub fn on_tag_dropdown_action(&self, callsign: &str, component_id: &str, user_input: Option<&str>) {
        if let Some(running) = &self.running {
            running.runtime.block_on(running.engine.on_dropdown_select(callsign, component_id, user_input));
        }
    }

    /// Run a chat command, returning the line to show the operator
    pub fn execute_command(&self, name: &str, args: &[String]) -> Result<String, CommandError> {
        let command = Command::parse(name, args)?;
        let running = self.running.as_ref().ok_or(CommandError::NotInitialized)?;
        let engine = &running.engine;

        match command {
            Command::Version => Ok(format!("{} {}", crate::PLUGIN_NAME, crate::VERSION)),
            Command::Menu(icao) => {
                running.runtime
                    .block_on(engine.refresh_menu(&icao))
                    .map(|menu| format!("Stand menu for {} updated ({} entries)", icao, menu.entries.len()))
                    .ok_or(CommandError::MenuUnavailable(icao))
            }
            Command::Url(url) => {
                let url = engine.set_base_url(&url);
                Ok(format!("API URL set to {}", url))
            }
            Command::Dump => {
                let (sent_at, report) = running.runtime
                    .block_on(engine.last_report())
                    .ok_or(CommandError::NoReport)?;
                let dir = engine.config().report.dump_dir;

                write_report_dump(&dir, sent_at, &report)
                    .map(|path| format!("Report written to {}", path.display()))
                    .map_err(|e| CommandError::Dump(format!("{:#}", e)))
            }
        }
    }
}

impl Drop for RampAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}
