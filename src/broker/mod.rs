pub mod connection;
pub mod manager;

use actix::prelude::*;
use serde::de::DeserializeOwned;
use uuid::Uuid;

pub use manager::{
    BrokerManager, ConnectionDown, ConnectionUp, IsConnected, Publish, SetEnabled, Subscribe,
    Teardown, Unsubscribe,
};

/// Payload delivered to a subscriber: parsed JSON when the body parses, the
/// raw body otherwise. A malformed message degrades instead of disappearing,
/// so the subscriber decides what to do with it.
#[derive(Debug, Clone)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(String),
}

impl Payload {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(body.to_string()),
        }
    }

    /// Try to decode the payload into a concrete message type.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Payload::Json(value) => serde_json::from_value(value.clone()).ok(),
            Payload::Raw(body) => serde_json::from_str(body).ok(),
        }
    }
}

/// A broker message delivered to one subscription.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct BrokerEvent {
    pub topic: String,
    pub payload: Payload,
}

/// Opaque token for one subscription. The caller owns its lifetime (calls
/// [`Unsubscribe`] to end it); the manager keeps a non-owning registry entry
/// under the same id so it can resubscribe across reconnects without the
/// caller's involvement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: Uuid,
    pub topic: String,
}

impl SubscriptionHandle {
    pub(crate) fn new(topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
        }
    }

    pub(crate) fn wire_id(&self) -> String {
        self.id.to_string()
    }
}

/// Connection lifecycle events surfaced to an interested consumer. These are
/// the only way transport trouble is reported; the manager never panics or
/// errors out of its public API.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub enum BrokerStatus {
    Connected,
    Disconnected,
    ProtocolError(String),
}
