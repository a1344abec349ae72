use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::types::delivery_status::{DeliveryStatus, StatusUpdate};

/// Role of a waypoint on a delivery route.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WaypointRole {
    /// W0: the store/launch point.
    Pickup,
    /// W2: the customer's delivery point.
    Delivery,
    Return,
    Unspecified,
}

/// An immutable route waypoint read from a backend snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Waypoint {
    pub coordinate: Coordinate,
    pub role: WaypointRole,
}

/// A point-in-time read of backend truth about one delivery. Produced by a
/// REST fetch or by translating a pushed event; never mutated, only
/// superseded by a newer snapshot.
#[derive(Debug, Clone)]
pub struct DeliverySnapshot {
    pub delivery_id: String,
    pub order_id: Option<String>,
    pub drone_id: Option<String>,
    /// Raw (unsanitized) current position, if the source carried one.
    pub current_position: Option<Coordinate>,
    /// Raw (unsanitized) destination, if the source carried one.
    pub destination: Option<Coordinate>,
    pub status: StatusUpdate,
    pub eta_seconds: Option<i64>,
    pub progress_percent: Option<f64>,
}

/// The single authoritative in-memory record of what the UI should show for
/// one delivery. Owned exclusively by one tracking state machine instance;
/// consumers only ever receive copies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalTrackingState {
    pub status: DeliveryStatus,
    pub drone_position: Option<Coordinate>,
    pub destination: Option<Coordinate>,
    pub eta_seconds: Option<i64>,
    pub arriving_soon: bool,
    pub arrived: bool,
    /// True when the displayed position comes from the motion simulator
    /// rather than live telemetry.
    pub simulated: bool,
}

impl Default for CanonicalTrackingState {
    fn default() -> Self {
        Self {
            status: DeliveryStatus::Created,
            drone_position: None,
            destination: None,
            eta_seconds: None,
            arriving_soon: false,
            arrived: false,
            simulated: false,
        }
    }
}
