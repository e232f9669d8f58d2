//! Stand assignment plugin core for radar clients.
//!
//! Reports ground traffic to a remote stand allocation service, mirrors the service's stand
//! assignments into aircraft tags and forwards manual stand selections.

pub mod commands;
pub mod config;
pub mod engine;
pub mod host;
pub mod network;
pub mod plugin;
pub mod report;
pub mod stand;
pub mod state;
pub mod ticker;
pub mod token;
pub mod types;

use tracing_subscriber::{ layer::SubscriberExt, util::SubscriberInitExt };

pub use crate::config::AgentConfig;
pub use crate::engine::{ OverrideOutcome, PassOutcome, PluginEvents, ReconciliationEngine };
pub use crate::host::Host;
pub use crate::network::{ RemoteClient, StandAuthority, SyncError };
pub use crate::plugin::RampAgent;

pub const PLUGIN_NAME: &str = "NeoRampAgent";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the log subscriber; a no-op when the host process already has one
pub fn init_tracing() {
    let _ = tracing_subscriber
        ::registry()
        .with(
            tracing_subscriber::EnvFilter
                ::try_from_default_env()
                .unwrap_or_else(|_| "ramp_agent=debug,info".into())
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
