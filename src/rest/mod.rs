//! REST reconciliation source: response shapes for the backend's delivery
//! endpoints and the translation into [`DeliverySnapshot`]s.
//!
//! The primary source is `GET /deliveries/{id}/track`; when that response
//! carries no usable coordinates the poll falls back to
//! `GET /deliveries/{id}/detail` and reads the route waypoints instead.

pub mod http;

use std::collections::HashMap;
use std::future::Future;

use serde::Deserialize;
use thiserror::Error;

use crate::constants::DRONE_SPEED_KMH;
use crate::geo::{haversine_km, Coordinate};
use crate::types::delivery_status::{DeliveryStatus, StatusUpdate};
use crate::types::dtos::{DeliverySnapshot, Waypoint, WaypointRole};

pub use http::HttpDeliveryApi;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned status {0}")]
    Status(u16),
}

/// `GET /deliveries/{id}/track` response. Every field is optional: the
/// backend omits coordinates while the drone is unassigned.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub drone_id: Option<String>,
    #[serde(default)]
    pub current_lat: Option<f64>,
    #[serde(default)]
    pub current_lng: Option<f64>,
    #[serde(default)]
    pub destination_lat: Option<f64>,
    #[serde(default)]
    pub destination_lng: Option<f64>,
    #[serde(default)]
    pub estimated_minutes_remaining: Option<i64>,
    #[serde(default)]
    pub delivery_status: Option<String>,
}

/// `GET /deliveries/{id}/detail` response. Waypoints are keyed `W0`, `W2`...
/// and each value is a `[lat, lng]` pair.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailResponse {
    #[serde(default)]
    pub current_position: Option<Vec<f64>>,
    #[serde(default)]
    pub waypoints: HashMap<String, Vec<f64>>,
    #[serde(default)]
    pub eta_sec: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// `GET /orders/{id}` response; only the status matters here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(default)]
    pub status: Option<String>,
}

/// Backend HTTP surface the tracker polls. Abstracted so tests can drive the
/// poll loop without a server.
pub trait DeliveryApi: Clone + Unpin + 'static {
    fn fetch_track(
        &self,
        delivery_id: &str,
    ) -> impl Future<Output = Result<TrackResponse, RestError>> + Send;

    fn fetch_detail(
        &self,
        delivery_id: &str,
    ) -> impl Future<Output = Result<DetailResponse, RestError>> + Send;

    fn fetch_order(
        &self,
        order_id: &str,
    ) -> impl Future<Output = Result<OrderResponse, RestError>> + Send;
}

/// Straight-line flight time at cruise speed, in whole seconds.
pub fn estimate_eta_seconds(from: Coordinate, to: Coordinate) -> i64 {
    (haversine_km(from, to) / DRONE_SPEED_KMH * 3600.0).round() as i64
}

fn pair_to_coordinate(pair: &[f64]) -> Option<Coordinate> {
    match pair {
        [lat, lng, ..] => Some(Coordinate::new(*lat, *lng)),
        _ => None,
    }
}

fn role_of(key: &str) -> WaypointRole {
    match key {
        "W0" => WaypointRole::Pickup,
        "W2" => WaypointRole::Delivery,
        "W3" => WaypointRole::Return,
        _ => WaypointRole::Unspecified,
    }
}

/// Read the detail response's waypoint map into typed waypoints.
pub fn waypoints_of(detail: &DetailResponse) -> Vec<Waypoint> {
    detail
        .waypoints
        .iter()
        .filter_map(|(key, pair)| {
            pair_to_coordinate(pair).map(|coordinate| Waypoint {
                coordinate,
                role: role_of(key),
            })
        })
        .collect()
}

fn status_of(raw: Option<&str>) -> StatusUpdate {
    match raw {
        Some(raw) => DeliveryStatus::from_backend(raw),
        // `Created` is the progression floor, so this proposal never moves
        // the canonical status.
        None => StatusUpdate::Progress(DeliveryStatus::Created),
    }
}

pub fn snapshot_from_track(delivery_id: &str, track: &TrackResponse) -> DeliverySnapshot {
    let current_position = match (track.current_lat, track.current_lng) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
        _ => None,
    };
    let destination = match (track.destination_lat, track.destination_lng) {
        (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
        _ => None,
    };
    let eta_seconds = track
        .estimated_minutes_remaining
        .map(|minutes| minutes * 60)
        .or_else(|| match (current_position, destination) {
            (Some(from), Some(to)) => Some(estimate_eta_seconds(from, to)),
            _ => None,
        });
    DeliverySnapshot {
        delivery_id: delivery_id.to_string(),
        order_id: track.order_id.clone(),
        drone_id: track.drone_id.clone(),
        current_position,
        destination,
        status: status_of(track.delivery_status.as_deref()),
        eta_seconds,
        progress_percent: None,
    }
}

pub fn snapshot_from_detail(delivery_id: &str, detail: &DetailResponse) -> DeliverySnapshot {
    let waypoints = waypoints_of(detail);
    let find_role = |role: WaypointRole| {
        waypoints
            .iter()
            .find(|w| w.role == role)
            .map(|w| w.coordinate)
    };
    let destination = find_role(WaypointRole::Delivery);
    // No live position in the detail payload means the drone is still at the
    // launch point.
    let current_position = detail
        .current_position
        .as_deref()
        .and_then(pair_to_coordinate)
        .or_else(|| find_role(WaypointRole::Pickup));
    DeliverySnapshot {
        delivery_id: delivery_id.to_string(),
        order_id: None,
        drone_id: None,
        current_position,
        destination,
        status: status_of(detail.status.as_deref()),
        eta_seconds: detail.eta_sec,
        progress_percent: None,
    }
}

/// One reconciliation fetch: `/track` first, `/detail` as coordinate
/// fallback, `/orders/{id}` for a status when `/track` carries none.
pub async fn poll_snapshot<A: DeliveryApi>(
    api: &A,
    delivery_id: &str,
) -> Result<DeliverySnapshot, RestError> {
    let track = api.fetch_track(delivery_id).await?;
    let mut snapshot = snapshot_from_track(delivery_id, &track);

    if snapshot.current_position.is_none() || snapshot.destination.is_none() {
        if let Ok(detail) = api.fetch_detail(delivery_id).await {
            let fallback = snapshot_from_detail(delivery_id, &detail);
            if snapshot.current_position.is_none() {
                snapshot.current_position = fallback.current_position;
            }
            if snapshot.destination.is_none() {
                snapshot.destination = fallback.destination;
            }
            if snapshot.eta_seconds.is_none() {
                snapshot.eta_seconds = fallback.eta_seconds;
            }
        }
    }

    if track.delivery_status.is_none() {
        if let Some(order_id) = snapshot.order_id.clone() {
            if let Ok(order) = api.fetch_order(&order_id).await {
                if let Some(raw) = order.status.as_deref() {
                    snapshot.status = DeliveryStatus::from_backend(raw);
                }
            }
        }
    }

    Ok(snapshot)
}
