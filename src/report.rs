use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::ReportConfig;
use crate::host::{ AircraftProvider, FlightplanProvider };
use crate::types::{ Aircraft, FlightPlan, Session };

/// Origin reported when the aircraft has no flight plan
pub const UNKNOWN_AIRPORT: &str = "N/A";

/// Aircraft type reported when the aircraft has no flight plan
pub const UNKNOWN_AIRCRAFT_TYPE: &str = "ZZZZ";

/// Distance reported when the host cannot compute one
pub const UNKNOWN_DISTANCE: f64 = -1.0;

/// Occupancy report pushed to the stand service by controlling positions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Callsign of the reporting controller
    pub client: String,

    pub aircrafts: ReportedTraffic,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReportedTraffic {
    /// Stationary aircraft by upper-case callsign
    #[serde(rename = "onGround")]
    pub on_ground: BTreeMap<String, GroundAircraft>,

    /// Inbound aircraft by upper-case callsign
    pub airborne: BTreeMap<String, AirborneAircraft>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroundAircraft {
    pub origin: String,

    #[serde(rename = "aircraftType")]
    pub aircraft_type: String,

    pub position: GroundPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundPosition {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AirborneAircraft {
    pub origin: String,
    pub destination: String,

    #[serde(rename = "aircraftType")]
    pub aircraft_type: String,

    pub position: AirbornePosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AirbornePosition {
    pub lat: f64,
    pub lon: f64,
    pub alt: i32,

    /// Distance to destination in nautical miles, `-1` when unknown
    pub dist: f64,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.aircrafts.on_ground.is_empty() && self.aircrafts.airborne.is_empty()
    }
}

/// Snapshot the scope into a report.
///
/// Returns `None` when the session is not connected; nothing should be sent then.
pub fn build_report(
    aircraft: &dyn AircraftProvider,
    flightplans: &dyn FlightplanProvider,
    session: &Session,
    filter: &ReportConfig
) -> Option<Report> {
    if !session.connected {
        return None;
    }

    let mut traffic = ReportedTraffic::default();

    for ac in aircraft.all() {
        let flight_plan = flightplans.by_callsign(&ac.callsign);
        let callsign = ac.callsign.to_uppercase();

        if ac.position.ground_speed == 0 {
            traffic.on_ground.insert(callsign, ground_entry(&ac, flight_plan.as_ref()));
            continue;
        }

        let Some(fp) = flight_plan else {
            continue;
        };
        if !is_reportable_inbound(&ac, &fp, filter) {
            continue;
        }

        let dist = aircraft.distance_to_destination(&ac.callsign).unwrap_or(UNKNOWN_DISTANCE);
        traffic.airborne.insert(callsign, AirborneAircraft {
            origin: fp.origin.to_uppercase(),
            destination: fp.destination.to_uppercase(),
            aircraft_type: fp.aircraft_type.to_uppercase(),
            position: AirbornePosition {
                lat: ac.position.latitude,
                lon: ac.position.longitude,
                alt: ac.position.altitude,
                dist,
            },
        });
    }

    Some(Report {
        client: session.callsign.clone(),
        aircrafts: traffic,
    })
}

fn ground_entry(ac: &Aircraft, flight_plan: Option<&FlightPlan>) -> GroundAircraft {
    let (origin, aircraft_type) = match flight_plan {
        Some(fp) => (fp.origin.to_uppercase(), fp.aircraft_type.to_uppercase()),
        None => (UNKNOWN_AIRPORT.to_string(), UNKNOWN_AIRCRAFT_TYPE.to_string()),
    };

    GroundAircraft {
        origin,
        aircraft_type,
        position: GroundPosition {
            lat: ac.position.latitude,
            lon: ac.position.longitude,
        },
    }
}

fn is_reportable_inbound(ac: &Aircraft, fp: &FlightPlan, filter: &ReportConfig) -> bool {
    if ac.position.altitude > filter.max_airborne_altitude_ft {
        return false;
    }

    let destination = fp.destination.to_uppercase();
    filter.destination_prefixes
        .iter()
        .any(|prefix| destination.starts_with(&prefix.to_uppercase()))
}
