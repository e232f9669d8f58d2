//! Stand reconciliation engine.
//!
//! Every sync pass fetches the service's occupancy view (pushing a report first when the session
//! controls traffic), diffs it against what the stand tags currently show and sends the minimal
//! set of tag updates to the host. Manual assignments go through the same service and the same
//! state lock.

use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{ debug, error, info, warn };

use crate::config::{ AgentConfig, ColorConfig };
use crate::host::Host;
use crate::network::{ StandAuthority, SyncError };
use crate::report::{ build_report, Report };
use crate::stand::available_stands;
use crate::state::{ AgentState, TagUpdate };
use crate::token::generate_token;
use crate::types::{
    AssignOutcome,
    AssignRequest,
    MenuEntry,
    MenuEntryKind,
    Session,
    Stand,
    StandMenu,
    StandTag,
};

/// Menu entry asking the service to release the aircraft's stand
pub const NONE_ENTRY: &str = "None";

/// Menu entry carrying a typed stand name in the selection's user input
pub const FREE_TEXT_ENTRY: &str = "MANUAL";

const MENU_TITLE: &str = "STAND";

/// Host events the plugin reacts to
#[async_trait]
pub trait PluginEvents: Send + Sync {
    /// One second timer, `counter` starts at 1
    async fn on_tick(&self, counter: u64);

    async fn on_connection_change(&self);

    /// The stand dropdown is about to open for `callsign`
    async fn on_dropdown_open(&self, callsign: &str);

    async fn on_dropdown_select(&self, callsign: &str, component_id: &str, user_input: Option<&str>);
}

/// Result of one sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Preconditions not met, nothing was sent
    Skipped,

    /// Tags reconciled against a fresh occupancy result
    Synced {
        updates: usize,
    },

    /// No data from the service, all stand tags were blanked
    Failed {
        cleared: usize,
    },
}

/// Result of a manual stand selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideOutcome {
    /// Not a controlling session, no flight plan, no stand given or the session changed meanwhile
    Skipped,

    /// The menu airport is not the aircraft's destination
    DestinationMismatch,

    Assigned,
    Freed,
    Rejected(String),

    /// The service could not be reached or answered garbage
    Failed,
}

pub struct ReconciliationEngine {
    host: Host,
    authority: Arc<dyn StandAuthority>,

    /// Configuration (hot-reloadable)
    config: RwLock<AgentConfig>,

    /// Session identity, refreshed on connection changes
    session: RwLock<Session>,

    state: Mutex<AgentState>,
}

impl ReconciliationEngine {
    pub fn new(host: Host, authority: Arc<dyn StandAuthority>, config: AgentConfig) -> Self {
        Self {
            host,
            authority,
            config: RwLock::new(config),
            session: RwLock::new(Session::default()),
            state: Mutex::new(AgentState::new()),
        }
    }

    // Configuration

    pub fn config(&self) -> AgentConfig {
        self.config.read().clone()
    }

    /// Swap in a reloaded configuration
    pub fn apply_config(&self, config: AgentConfig) {
        let mut current = self.config.write();
        if current.network.api_base_url != config.network.api_base_url {
            self.authority.set_base_url(&config.network.api_base_url);
        }
        *current = config;
    }

    /// Point the engine at another stand service until the next config reload
    pub fn set_base_url(&self, url: &str) -> String {
        self.authority.set_base_url(url);
        let url = self.authority.base_url();
        self.config.write().network.api_base_url = url.clone();
        url
    }

    // Session

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    fn token(&self, session: &Session) -> String {
        let secret = self.config.read().auth.shared_secret.clone();
        generate_token(&secret, &session.callsign, &session.cid)
    }

    // State snapshots

    pub async fn assignments(&self) -> BTreeMap<String, String> {
        self.state.lock().await.assignments()
    }

    pub async fn last_report(&self) -> Option<(DateTime<Utc>, Report)> {
        self.state.lock().await.last_report.clone()
    }

    /// Run one reconciliation pass, regardless of the tick gate
    pub async fn sync(&self) -> PassOutcome {
        let session = self.session();
        if !session.connected {
            return PassOutcome::Skipped;
        }
        let config = self.config();
        let token = self.token(&session);

        let mut state = self.state.lock().await;
        if self.session() != session {
            debug!("Session changed while waiting for the state lock, skipping pass");
            return PassOutcome::Skipped;
        }

        let result = if session.authoritative {
            let Some(report) = build_report(
                self.host.aircraft.as_ref(),
                self.host.flightplans.as_ref(),
                &session,
                &config.report
            ) else {
                return PassOutcome::Skipped;
            };

            if report.is_empty() {
                debug!("No traffic to report, pushing an empty report for occupancy");
            } else {
                debug!(
                    on_ground = report.aircrafts.on_ground.len(),
                    airborne = report.aircrafts.airborne.len(),
                    "Pushing stand report"
                );
            }
            let result = self.authority.push_report(&report, &token).await;
            state.last_report = Some((Utc::now(), report));
            result
        } else {
            self.authority.pull_occupancy(Some(&token)).await
        };

        let failure = match result {
            Ok(Some(occupancy)) => {
                if state.sync_failures.record_success() {
                    info!("Stand service reachable again");
                    self.host.chat.display_message("Stand service connection restored");
                }

                let aircraft = &self.host.aircraft;
                let updates = state.reconcile(&occupancy, |callsign| aircraft.by_callsign(callsign).is_some());
                state.last_occupancy = Some(occupancy);

                self.emit(&updates, &config.colors);
                return PassOutcome::Synced { updates: updates.len() };
            }
            Ok(None) => "no stand data received".to_string(),
            Err(e) => describe_failure(&e),
        };

        if state.sync_failures.record_failure() {
            warn!(reason = %failure, "Stand sync failed, clearing stand tags");
            self.host.chat.display_message(&format!("Stand sync failed: {}", failure));
        } else {
            debug!(reason = %failure, "Stand sync still failing");
        }

        let updates = state.clear_all();
        self.emit(&updates, &config.colors);
        PassOutcome::Failed { cleared: updates.len() }
    }

    /// Ask the service to assign (or release) `stand` for `callsign`
    pub async fn manual_override(&self, callsign: &str, stand: &str) -> OverrideOutcome {
        let session = self.session();
        if !session.connected || !session.authoritative {
            debug!(callsign, "Ignoring manual stand assignment, not connected as controller");
            return OverrideOutcome::Skipped;
        }

        let stand = stand.trim();
        if stand.is_empty() {
            return OverrideOutcome::Skipped;
        }

        let Some(flight_plan) = self.host.flightplans.by_callsign(callsign) else {
            debug!(callsign, "No flight plan, ignoring manual stand assignment");
            return OverrideOutcome::Skipped;
        };
        let destination = flight_plan.destination.to_uppercase();

        let config = self.config();
        let token = self.token(&session);

        let mut state = self.state.lock().await;
        if self.session() != session {
            debug!(callsign, "Session changed while waiting for the state lock, ignoring manual stand");
            return OverrideOutcome::Skipped;
        }

        let icao = state.menu_icao.clone().unwrap_or_else(|| destination.clone());
        if !icao.eq_ignore_ascii_case(&destination) {
            warn!(callsign, stand, icao = %icao, destination = %destination, "Stand airport does not match flight plan destination");
            self.host.chat.display_message(
                &format!("Stand {} at {} does not match destination {} of {}", stand, icao, destination, callsign)
            );
            return OverrideOutcome::DestinationMismatch;
        }

        info!(callsign, stand, icao = %destination, "Requesting manual stand assignment");
        let request = AssignRequest {
            stand: stand.to_string(),
            icao: destination,
            callsign: callsign.to_string(),
            token,
            client: session.callsign.clone(),
        };

        match self.authority.request_assign(&request).await {
            Ok(AssignOutcome::Assigned) => {
                info!(callsign, stand, "Manual stand assignment accepted");
                let update = state.assign(callsign, stand);
                self.emit(&[update], &config.colors);
                OverrideOutcome::Assigned
            }
            Ok(AssignOutcome::Freed) => {
                info!(callsign, "Stand released");
                let update = state.free(callsign);
                self.emit(&[update], &config.colors);
                OverrideOutcome::Freed
            }
            Ok(AssignOutcome::Rejected(reason)) => {
                info!(callsign, stand, reason = %reason, "Manual stand rejected");
                self.host.chat.display_message(&format!("Manual stand rejected: {}", reason));
                OverrideOutcome::Rejected(reason)
            }
            Err(e) => {
                error!(callsign, stand, status = e.status(), "Manual stand assignment failed: {}", e);
                self.host.chat.display_message(
                    &format!("Manual stand assignment failed for {} to {}", callsign, stand)
                );
                OverrideOutcome::Failed
            }
        }
    }

    /// Rebuild the stand dropdown with the available stands of `icao`
    pub async fn refresh_menu(&self, icao: &str) -> Option<StandMenu> {
        let session = self.session();
        if !session.connected || !session.authoritative {
            return None;
        }

        let icao = icao.trim().to_uppercase();
        if icao.is_empty() {
            return None;
        }
        let token = self.token(&session);

        let mut state = self.state.lock().await;
        if self.session() != session {
            return None;
        }

        let failure = match self.authority.pull_stands_for_airport(&icao).await {
            Ok(inventory) if !inventory.is_empty() => {
                if state.menu_failures.record_success() {
                    info!("Stand inventory available again");
                }

                if state.last_occupancy.is_none() {
                    match self.authority.pull_occupancy(Some(&token)).await {
                        Ok(occupancy) => {
                            state.last_occupancy = occupancy;
                        }
                        Err(e) => debug!(icao = %icao, "No occupancy for stand menu: {}", e),
                    }
                }

                let occupancy = state.last_occupancy.clone().unwrap_or_default();
                let stands = available_stands(&icao, &inventory, &occupancy);
                let menu = stand_menu(&icao, &stands);

                info!(icao = %icao, available = stands.len(), "Stand menu updated");
                state.menu_icao = Some(icao);
                self.host.tags.update_stand_menu(&menu);
                return Some(menu);
            }
            Ok(_) => format!("no stands data received for airport {}", icao),
            Err(e) => describe_failure(&e),
        };

        if state.menu_failures.record_failure() {
            error!(icao = %icao, reason = %failure, "Failed to get stands information");
        } else {
            debug!(icao = %icao, reason = %failure, "Stand inventory still unavailable");
        }
        None
    }

    /// Send tag updates to the host
    fn emit(&self, updates: &[TagUpdate], colors: &ColorConfig) {
        let neutral = colors.neutral_rgb();
        let highlight = colors.highlight_rgb();

        for update in updates {
            let tag = match update {
                TagUpdate::Unchanged { stand, remark, .. } =>
                    StandTag { stand: stand.clone(), remark: remark.clone(), colour: neutral },
                TagUpdate::Changed { stand, remark, .. } =>
                    StandTag { stand: stand.clone(), remark: remark.clone(), colour: highlight },
                TagUpdate::Cleared { .. } =>
                    StandTag { stand: String::new(), remark: String::new(), colour: neutral },
            };
            self.host.tags.update_tag(update.callsign(), &tag);
        }
    }
}

#[async_trait]
impl PluginEvents for ReconciliationEngine {
    async fn on_tick(&self, counter: u64) {
        let interval = self.config.read().report.sync_interval_ticks.max(1);
        if counter % interval != 0 || !self.session().connected {
            return;
        }
        self.sync().await;
    }

    async fn on_connection_change(&self) {
        let previous = self.session();
        let session = Session::from_connection(self.host.connection.connection().as_ref());
        *self.session.write() = session.clone();

        if session != previous {
            info!(
                callsign = %session.callsign,
                connected = session.connected,
                authoritative = session.authoritative,
                "Session changed"
            );
        }

        if previous.connected && !session.connected {
            let colors = self.config().colors;
            let mut state = self.state.lock().await;
            let updates = state.clear_all();
            state.last_occupancy = None;
            state.menu_icao = None;
            self.emit(&updates, &colors);
        }
    }

    async fn on_dropdown_open(&self, callsign: &str) {
        let Some(flight_plan) = self.host.flightplans.by_callsign(callsign) else {
            return;
        };
        self.refresh_menu(&flight_plan.destination).await;
    }

    async fn on_dropdown_select(&self, callsign: &str, component_id: &str, user_input: Option<&str>) {
        let stand = if component_id == FREE_TEXT_ENTRY { user_input.unwrap_or_default() } else { component_id };
        self.manual_override(callsign, stand).await;
    }
}

/// Dropdown with a release entry, the available stands and a free text field
pub fn stand_menu(icao: &str, stands: &[Stand]) -> StandMenu {
    let button = |name: &str| MenuEntry {
        id: name.to_string(),
        label: name.to_string(),
        kind: MenuEntryKind::Button,
    };

    let mut entries = Vec::with_capacity(stands.len() + 2);
    entries.push(button(NONE_ENTRY));
    entries.extend(stands.iter().map(|stand| button(&stand.name)));
    entries.push(MenuEntry {
        id: FREE_TEXT_ENTRY.to_string(),
        label: "Other...".to_string(),
        kind: MenuEntryKind::Input,
    });

    StandMenu {
        icao: icao.to_string(),
        title: MENU_TITLE.to_string(),
        entries,
    }
}

fn describe_failure(e: &SyncError) -> String {
    match e {
        SyncError::Malformed(_) => format!("unreadable response from stand service ({})", e),
        _ => format!("stand service request failed, HTTP status {} ({})", e.status(), e),
    }
}
