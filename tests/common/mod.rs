#![allow(unused)]

// in-memory host and stand service used by the integration tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{ HashMap, VecDeque };
use std::sync::Arc;
use tokio::sync::Notify;

use ramp_agent::config::AgentConfig;
use ramp_agent::host::{ AircraftProvider, ChatSink, ConnectionProvider, FlightplanProvider, Host, TagSink };
use ramp_agent::report::Report;
use ramp_agent::types::{
    Aircraft,
    AssignOutcome,
    AssignRequest,
    ConnectionInfo,
    Facility,
    FlightPlan,
    OccupancyResult,
    Position,
    Rgb,
    StandMenu,
    StandRecord,
    StandTag,
};
use ramp_agent::{ StandAuthority, SyncError };

pub const NEUTRAL: Rgb = Rgb::WHITE;
pub const HIGHLIGHT: Rgb = Rgb::YELLOW;

#[derive(Default)]
pub struct FakeHost {
    pub aircraft: Mutex<Vec<Aircraft>>,
    pub flightplans: Mutex<HashMap<String, FlightPlan>>,
    pub connection: Mutex<Option<ConnectionInfo>>,
    pub tags: Mutex<Vec<(String, StandTag)>>,
    pub menus: Mutex<Vec<StandMenu>>,
    pub chat: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn host(self: &Arc<Self>) -> Host {
        Host {
            aircraft: self.clone(),
            flightplans: self.clone(),
            connection: self.clone(),
            tags: self.clone(),
            chat: self.clone(),
        }
    }

    pub fn connect(&self, callsign: &str, facility: Facility) {
        *self.connection.lock() = Some(ConnectionInfo {
            callsign: callsign.to_string(),
            cid: "1234567".to_string(),
            facility,
        });
    }

    pub fn disconnect(&self) {
        *self.connection.lock() = None;
    }

    pub fn add_aircraft(&self, callsign: &str, ground_speed: u32, destination: Option<&str>) {
        self.aircraft.lock().push(Aircraft {
            callsign: callsign.to_string(),
            position: Position {
                latitude: 49.0097,
                longitude: 2.5479,
                altitude: if ground_speed == 0 { 392 } else { 3_000 },
                ground_speed,
                on_ground: ground_speed == 0,
            },
        });
        if let Some(destination) = destination {
            self.flightplans.lock().insert(callsign.to_string(), FlightPlan {
                origin: "EGLL".to_string(),
                destination: destination.to_string(),
                aircraft_type: "A320".to_string(),
            });
        }
    }

    pub fn remove_aircraft(&self, callsign: &str) {
        self.aircraft.lock().retain(|ac| ac.callsign != callsign);
    }

    /// Tag updates received since the last call
    pub fn take_tags(&self) -> Vec<(String, StandTag)> {
        std::mem::take(&mut *self.tags.lock())
    }

    pub fn take_chat(&self) -> Vec<String> {
        std::mem::take(&mut *self.chat.lock())
    }
}

impl AircraftProvider for FakeHost {
    fn all(&self) -> Vec<Aircraft> {
        self.aircraft.lock().clone()
    }

    fn by_callsign(&self, callsign: &str) -> Option<Aircraft> {
        self.aircraft
            .lock()
            .iter()
            .find(|ac| ac.callsign == callsign)
            .cloned()
    }

    fn distance_to_destination(&self, _callsign: &str) -> Option<f64> {
        None
    }
}

impl FlightplanProvider for FakeHost {
    fn by_callsign(&self, callsign: &str) -> Option<FlightPlan> {
        self.flightplans.lock().get(callsign).cloned()
    }
}

impl ConnectionProvider for FakeHost {
    fn connection(&self) -> Option<ConnectionInfo> {
        self.connection.lock().clone()
    }
}

impl TagSink for FakeHost {
    fn update_tag(&self, callsign: &str, tag: &StandTag) {
        self.tags.lock().push((callsign.to_string(), tag.clone()));
    }

    fn update_stand_menu(&self, menu: &StandMenu) {
        self.menus.lock().push(menu.clone());
    }
}

impl ChatSink for FakeHost {
    fn display_message(&self, message: &str) {
        self.chat.lock().push(message.to_string());
    }
}

/// Scripted answer of the fake service
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    Status(u16),
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, SyncError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Status(status) => Err(SyncError::Status(status)),
        }
    }
}

/// Stand service double: answers from queues, records every request
pub struct FakeAuthority {
    pub occupancy: Mutex<VecDeque<Reply<Option<OccupancyResult>>>>,
    pub stands: Mutex<Reply<Vec<String>>>,
    pub assign: Mutex<VecDeque<Reply<AssignOutcome>>>,

    pub pushed: Mutex<Vec<(Report, String)>>,
    pub pulls: Mutex<Vec<Option<String>>>,
    pub assign_requests: Mutex<Vec<AssignRequest>>,
    pub base_url: Mutex<String>,

    /// When set, assign requests wait for a notification before answering
    pub assign_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAuthority {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            occupancy: Mutex::new(VecDeque::new()),
            stands: Mutex::new(Reply::Ok(Vec::new())),
            assign: Mutex::new(VecDeque::new()),
            pushed: Mutex::new(Vec::new()),
            pulls: Mutex::new(Vec::new()),
            assign_requests: Mutex::new(Vec::new()),
            base_url: Mutex::new("https://stands.test".to_string()),
            assign_gate: Mutex::new(None),
        })
    }

    pub fn answer_occupancy(&self, reply: Reply<Option<OccupancyResult>>) {
        self.occupancy.lock().push_back(reply);
    }

    pub fn answer_assign(&self, reply: Reply<AssignOutcome>) {
        self.assign.lock().push_back(reply);
    }

    /// Hold every assign request until the returned gate is notified
    pub fn hold_assign(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.assign_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn set_stands(&self, names: &[&str]) {
        *self.stands.lock() = Reply::Ok(names.iter().map(|n| n.to_string()).collect());
    }

    fn next_occupancy(&self) -> Result<Option<OccupancyResult>, SyncError> {
        self.occupancy
            .lock()
            .pop_front()
            .unwrap_or(Reply::Status(503))
            .into_result()
    }
}

#[async_trait]
impl StandAuthority for FakeAuthority {
    async fn push_report(&self, report: &Report, token: &str) -> Result<Option<OccupancyResult>, SyncError> {
        self.pushed.lock().push((report.clone(), token.to_string()));
        self.next_occupancy()
    }

    async fn pull_occupancy(&self, token: Option<&str>) -> Result<Option<OccupancyResult>, SyncError> {
        self.pulls.lock().push(token.map(str::to_string));
        self.next_occupancy()
    }

    async fn pull_stands_for_airport(&self, _icao: &str) -> Result<Vec<String>, SyncError> {
        self.stands.lock().clone().into_result()
    }

    async fn request_assign(&self, request: &AssignRequest) -> Result<AssignOutcome, SyncError> {
        self.assign_requests.lock().push(request.clone());
        let gate = self.assign_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.assign
            .lock()
            .pop_front()
            .unwrap_or(Reply::Status(503))
            .into_result()
    }

    fn base_url(&self) -> String {
        self.base_url.lock().clone()
    }

    fn set_base_url(&self, url: &str) {
        *self.base_url.lock() = url.to_string();
    }
}

pub fn record(name: &str, callsign: &str) -> StandRecord {
    StandRecord {
        name: name.to_string(),
        callsign: callsign.to_string(),
        remark: None,
    }
}

pub fn assigned(records: &[(&str, &str)]) -> OccupancyResult {
    OccupancyResult {
        assigned: records
            .iter()
            .map(|(callsign, stand)| record(stand, callsign))
            .collect(),
        ..OccupancyResult::default()
    }
}

pub fn test_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.auth.shared_secret = "test-secret".to_string();
    config
}

pub fn tag(stand: &str, colour: Rgb) -> StandTag {
    StandTag {
        stand: stand.to_string(),
        remark: String::new(),
        colour,
    }
}

pub fn blank() -> StandTag {
    tag("", NEUTRAL)
}
