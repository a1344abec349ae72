use actix::prelude::*;
use serde::{Deserialize, Serialize};

pub const TOPIC_DRONE_GPS: &str = "/topic/drone/gps";
pub const TOPIC_DRONE_STATE: &str = "/topic/drone/state";
pub const TOPIC_DELIVERY_ETA: &str = "/topic/delivery/eta";

/// Per-order envelope topic, e.g. `/topic/orders/42`.
pub fn order_topic(order_id: &str) -> String {
    format!("/topic/orders/{}", order_id)
}

/// Wire frame exchanged with the broker, one JSON object per line.
///
/// `Subscribe`/`Unsubscribe`/`Send` flow outward; `Message` flows inward.
/// The message body is an opaque string so a malformed payload can still be
/// handed to subscribers instead of being dropped at the transport.
#[derive(Serialize, Deserialize, Debug, Message, Clone)]
#[serde(tag = "type")]
#[rtype(result = "()")]
pub enum Frame {
    /// Register interest in a topic with the broker. `id` identifies the
    /// individual subscription so duplicate subscriptions to one topic stay
    /// independent.
    Subscribe { id: String, topic: String },
    /// Withdraw one subscription by its id.
    Unsubscribe { id: String },
    /// Publish a payload to a topic.
    Send { topic: String, body: String },
    /// A broker-delivered message for a topic.
    Message { topic: String, body: String },
}

/// Pushed GPS telemetry for a drone on `/topic/drone/gps`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DroneGpsUpdate {
    pub drone_id: String,
    pub delivery_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub current_segment: Option<String>,
    #[serde(default)]
    pub eta_seconds: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Pushed drone state transition on `/topic/drone/state`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DroneStateChange {
    pub drone_id: String,
    pub delivery_id: String,
    #[serde(default)]
    pub old_status: Option<String>,
    pub new_status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Pushed ETA/progress update on `/topic/delivery/eta`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEtaUpdate {
    pub delivery_id: String,
    pub eta_seconds: i64,
    #[serde(default)]
    pub progress_percent: Option<f64>,
    #[serde(default)]
    pub current_segment: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Generic envelope pushed on the per-order topic.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// GPS payload inside an `OrderEnvelope` of kind `GPS_UPDATE`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeGpsPayload {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub eta_minutes: Option<i64>,
}
