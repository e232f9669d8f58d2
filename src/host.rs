//! Interfaces implemented by the radar client hosting the plugin.

use std::sync::Arc;

use crate::types::{ Aircraft, ConnectionInfo, FlightPlan, StandMenu, StandTag };

/// Aircraft currently known to the scope
pub trait AircraftProvider: Send + Sync {
    fn all(&self) -> Vec<Aircraft>;

    fn by_callsign(&self, callsign: &str) -> Option<Aircraft>;

    /// Remaining distance to destination in nautical miles, when the host can compute it
    fn distance_to_destination(&self, callsign: &str) -> Option<f64>;
}

pub trait FlightplanProvider: Send + Sync {
    fn by_callsign(&self, callsign: &str) -> Option<FlightPlan>;
}

pub trait ConnectionProvider: Send + Sync {
    /// `None` while the client is not connected to the network
    fn connection(&self) -> Option<ConnectionInfo>;
}

/// Tag items and the stand dropdown registered with the host
pub trait TagSink: Send + Sync {
    fn update_tag(&self, callsign: &str, tag: &StandTag);

    fn update_stand_menu(&self, menu: &StandMenu);
}

/// Operator-visible chat channel of the plugin
pub trait ChatSink: Send + Sync {
    fn display_message(&self, message: &str);
}

/// Bundle of host interfaces handed to the plugin at initialization
#[derive(Clone)]
pub struct Host {
    pub aircraft: Arc<dyn AircraftProvider>,
    pub flightplans: Arc<dyn FlightplanProvider>,
    pub connection: Arc<dyn ConnectionProvider>,
    pub tags: Arc<dyn TagSink>,
    pub chat: Arc<dyn ChatSink>,
}
