use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;

/// Callsign to stand name, i.e. what the stand tag currently shows for each aircraft
pub type AssignmentMap = BTreeMap<String, String>;

/// Live position of an aircraft as reported by the radar client
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,

    /// Altitude in feet
    pub altitude: i32,

    /// Ground speed in knots
    pub ground_speed: u32,

    pub on_ground: bool,
}

/// Aircraft currently visible on the scope
#[derive(Debug, Clone, PartialEq)]
pub struct Aircraft {
    pub callsign: String,
    pub position: Position,
}

/// Filed flight plan of an aircraft
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlightPlan {
    /// Departure airport ICAO
    pub origin: String,

    /// Arrival airport ICAO
    pub destination: String,

    /// ICAO aircraft type designator (e.g. "A320")
    pub aircraft_type: String,
}

/// Network facility of the connected session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facility {
    Observer,
    FlightService,
    Delivery,
    Ground,
    Tower,
    Approach,
    Centre,
}

impl Facility {
    /// Whether this facility controls traffic and may push ground truth to the service
    pub fn is_controlling(self) -> bool {
        matches!(
            self,
            Facility::Delivery |
                Facility::Ground |
                Facility::Tower |
                Facility::Approach |
                Facility::Centre
        )
    }
}

/// Connection details as exposed by the radar client
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionInfo {
    pub callsign: String,
    pub cid: String,
    pub facility: Facility,
}

/// Identity of the local session, recomputed on every connection state change
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    pub callsign: String,
    pub cid: String,

    /// Controlling position allowed to report and override stands
    pub authoritative: bool,

    pub connected: bool,
}

impl Session {
    pub fn from_connection(connection: Option<&ConnectionInfo>) -> Self {
        match connection {
            Some(info) =>
                Self {
                    callsign: info.callsign.clone(),
                    cid: info.cid.clone(),
                    authoritative: info.facility.is_controlling(),
                    connected: true,
                },
            None => Self::default(),
        }
    }
}

/// One stand entry in an occupancy response
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StandRecord {
    /// Stand name (e.g. "48B")
    pub name: String,

    /// Aircraft on or assigned to the stand; empty for blocked stands
    #[serde(default)]
    pub callsign: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// The service's current view of stand usage
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct OccupancyResult {
    /// Stands actively assigned by the service
    #[serde(default, rename = "assignedStands")]
    pub assigned: Vec<StandRecord>,

    /// Stands detected as physically occupied
    #[serde(default, rename = "occupiedStands")]
    pub occupied: Vec<StandRecord>,

    /// Stands excluded from availability
    #[serde(default, rename = "blockedStands")]
    pub blocked: Vec<StandRecord>,
}

impl OccupancyResult {
    /// Assigned and occupied records; both are displayed the same way
    pub fn displayed_records(&self) -> impl Iterator<Item = &StandRecord> {
        self.assigned.iter().chain(self.occupied.iter())
    }

    /// Whether the stand is assigned, occupied or blocked
    pub fn is_unavailable(&self, stand: &str) -> bool {
        self.assigned
            .iter()
            .chain(self.occupied.iter())
            .chain(self.blocked.iter())
            .any(|record| record.name == stand)
    }
}

/// A stand at an airport, built when computing the manual assignment menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stand {
    pub name: String,
    pub icao: String,
    pub occupied: bool,
}

/// Parameters of a manual assign/free request
#[derive(Debug, Clone, PartialEq)]
pub struct AssignRequest {
    pub stand: String,
    pub icao: String,
    pub callsign: String,
    pub token: String,

    /// Callsign of the controller issuing the request
    pub client: String,
}

/// Decision of the service on a manual request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    Assigned,
    Freed,
    Rejected(String),
}

/// RGB colour of a tag value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const YELLOW: Rgb = Rgb(255, 220, 3);
}

/// Values written to the STAND and REMARK tag items of one aircraft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandTag {
    pub stand: String,
    pub remark: String,
    pub colour: Rgb,
}

/// Kind of dropdown entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntryKind {
    Button,

    /// Free text field, the typed value is delivered with the selection event
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub id: String,
    pub label: String,
    pub kind: MenuEntryKind,
}

/// Stand selection dropdown for one airport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandMenu {
    pub icao: String,
    pub title: String,
    pub entries: Vec<MenuEntry>,
}
