use actix::prelude::*;

use crate::geo::Coordinate;
use crate::types::dtos::CanonicalTrackingState;

/// Ask a tracker for a copy of its current canonical state.
#[derive(Message)]
#[rtype(result = "CanonicalTrackingState")]
pub struct GetTrackingState;

/// Start the periodic REST reconciliation loop.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartPolling;

/// Stop the periodic REST reconciliation loop.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StopPolling;

/// Start a simulated flight. Endpoints default to the last known position
/// (or the demo route) when not given.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartSimulation {
    pub from: Option<Coordinate>,
    pub to: Option<Coordinate>,
}

/// Cancel a running simulation without touching the rest of the state.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CancelSimulation;

/// Stop tracking entirely: cancel timers, withdraw subscriptions, stop.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Shutdown;

/// Outbound notifications a tracker sends its consumer. `Arrived` and
/// `ArrivingSoon` fire at most once per delivery; `StateUpdated` fires on
/// every observable change.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub enum TrackingNotice {
    StateUpdated(CanonicalTrackingState),
    ArrivingSoon,
    Arrived,
    /// Tracking is running without backend truth (REST unreachable and no
    /// cached snapshot). Sent at most once per degradation episode.
    Degraded(String),
}
