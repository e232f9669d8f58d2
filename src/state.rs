use chrono::{ DateTime, Utc };
use std::collections::BTreeMap;

use crate::report::Report;
use crate::types::{ AssignmentMap, OccupancyResult };

/// Change to apply to one aircraft's stand tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagUpdate {
    /// Same stand as displayed before, value refresh in the neutral colour
    Unchanged {
        callsign: String,
        stand: String,
        remark: String,
    },

    /// New or different stand, highlighted so the controller notices
    Changed {
        callsign: String,
        stand: String,
        remark: String,
    },

    /// Stand no longer known for this aircraft
    Cleared {
        callsign: String,
    },
}

impl TagUpdate {
    pub fn callsign(&self) -> &str {
        match self {
            TagUpdate::Unchanged { callsign, .. } |
            TagUpdate::Changed { callsign, .. } |
            TagUpdate::Cleared { callsign } => callsign,
        }
    }
}

/// Edge-triggered failure flag.
///
/// Only the first failure of a streak and the first success after it are worth telling the
/// operator about; the poll loop fails at its own rate otherwise.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailureLatch {
    failing: bool,
}

impl FailureLatch {
    /// Record a failure, true when it starts a new streak
    pub fn record_failure(&mut self) -> bool {
        !std::mem::replace(&mut self.failing, true)
    }

    /// Record a success, true when it ends a streak
    pub fn record_success(&mut self) -> bool {
        std::mem::replace(&mut self.failing, false)
    }
}

/// Mutable state shared by the poll loop and manual overrides, always accessed under one lock
#[derive(Debug, Default)]
pub struct AgentState {
    /// Stand currently displayed per callsign
    pub assignments: AssignmentMap,

    /// Last successful occupancy result, reused to build stand menus between polls
    pub last_occupancy: Option<OccupancyResult>,

    /// Last report pushed, kept for the dump command
    pub last_report: Option<(DateTime<Utc>, Report)>,

    /// Airport of the most recently built stand menu
    pub menu_icao: Option<String>,

    /// Poll failures
    pub sync_failures: FailureLatch,

    /// Stand inventory fetch failures
    pub menu_failures: FailureLatch,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a fresh occupancy result against the displayed assignments.
    ///
    /// Records whose aircraft is not on scope are skipped. The first record seen for a callsign
    /// wins, assigned before occupied. Every callsign dropped from the map gets a clear.
    pub fn reconcile<F>(&mut self, occupancy: &OccupancyResult, is_on_scope: F) -> Vec<TagUpdate>
        where F: Fn(&str) -> bool
    {
        let mut fresh = AssignmentMap::new();
        let mut updates = Vec::new();

        for record in occupancy.displayed_records() {
            if record.callsign.is_empty() || fresh.contains_key(&record.callsign) {
                continue;
            }
            if !is_on_scope(&record.callsign) {
                continue;
            }

            let callsign = record.callsign.clone();
            let stand = record.name.clone();
            let remark = record.remark.clone().unwrap_or_default();

            let update = if self.assignments.get(&callsign) == Some(&stand) {
                TagUpdate::Unchanged { callsign: callsign.clone(), stand: stand.clone(), remark }
            } else {
                TagUpdate::Changed { callsign: callsign.clone(), stand: stand.clone(), remark }
            };
            updates.push(update);
            fresh.insert(callsign, stand);
        }

        for callsign in self.assignments.keys() {
            if !fresh.contains_key(callsign) {
                updates.push(TagUpdate::Cleared { callsign: callsign.clone() });
            }
        }

        self.assignments = fresh;
        updates
    }

    /// Blank every displayed stand
    pub fn clear_all(&mut self) -> Vec<TagUpdate> {
        std::mem::take(&mut self.assignments)
            .into_keys()
            .map(|callsign| TagUpdate::Cleared { callsign })
            .collect()
    }

    /// Apply a manual assignment accepted by the service
    pub fn assign(&mut self, callsign: &str, stand: &str) -> TagUpdate {
        self.assignments.insert(callsign.to_string(), stand.to_string());
        TagUpdate::Changed {
            callsign: callsign.to_string(),
            stand: stand.to_string(),
            remark: String::new(),
        }
    }

    /// Apply a manual release accepted by the service
    pub fn free(&mut self, callsign: &str) -> TagUpdate {
        self.assignments.remove(callsign);
        TagUpdate::Cleared { callsign: callsign.to_string() }
    }

    /// Snapshot of the displayed assignments
    pub fn assignments(&self) -> BTreeMap<String, String> {
        self.assignments.clone()
    }
}
