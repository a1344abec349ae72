//! Subscription Manager: a stable subscribe/unsubscribe/publish API over an
//! unstable broker connection.
//!
//! Subscribe intent is durable: a handle registered while disconnected (or
//! orphaned by a dropped connection) is promoted to live on the next
//! successful connect, in registration order, until the caller explicitly
//! unsubscribes. Publish is deliberately weaker: best-effort, at-most-once,
//! silently dropped while disconnected, because replaying a stale command
//! after reconnect could duplicate a state transition.

use actix::fut::wrap_future;
use actix::prelude::*;
use colored::Color;
use std::time::Duration;

use crate::broker::connection::{connect_endpoint, BrokerConnection};
use crate::broker::{BrokerEvent, BrokerStatus, Payload, SubscriptionHandle};
use crate::constants::RECONNECT_DELAY_MILLIS;
use crate::logger::Logger;
use crate::messages::broker_messages::Frame;

struct SubscriptionEntry {
    handle: SubscriptionHandle,
    subscriber: Recipient<BrokerEvent>,
    live: bool,
    canceled: bool,
}

pub struct BrokerManager {
    endpoint: String,
    enabled: bool,
    /// Registration-ordered registry; promotion on reconnect walks it front
    /// to back.
    registry: Vec<SubscriptionEntry>,
    outbound: Option<Recipient<Frame>>,
    connection: Option<Addr<BrokerConnection>>,
    connected: bool,
    status_listener: Option<Recipient<BrokerStatus>>,
    logger: Logger,
}

impl BrokerManager {
    pub fn new(
        endpoint: impl Into<String>,
        enabled: bool,
        status_listener: Option<Recipient<BrokerStatus>>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            enabled,
            registry: Vec::new(),
            outbound: None,
            connection: None,
            connected: false,
            status_listener,
            logger: Logger::new("Broker", Color::Cyan),
        }
    }

    fn notify_status(&self, status: BrokerStatus) {
        if let Some(listener) = &self.status_listener {
            listener.do_send(status);
        }
    }

    fn send_frame(&self, frame: Frame) {
        if let Some(outbound) = &self.outbound {
            outbound.do_send(frame);
        }
    }

    /// Attach a fresh connection and promote every registered, non-canceled,
    /// non-live handle in registration order.
    fn attach(&mut self, outbound: Recipient<Frame>) {
        self.connected = true;
        for entry in &mut self.registry {
            if !entry.canceled && !entry.live {
                outbound.do_send(Frame::Subscribe {
                    id: entry.handle.wire_id(),
                    topic: entry.handle.topic.clone(),
                });
                entry.live = true;
            }
        }
        self.outbound = Some(outbound);
        self.logger.info(format!(
            "connected to {}, {} subscription(s) live",
            self.endpoint,
            self.registry.iter().filter(|e| e.live).count()
        ));
        self.notify_status(BrokerStatus::Connected);
    }

    /// Drop all live state. Runs on disconnect and on teardown; after this no
    /// subscriber callback fires until a new connection attaches.
    fn detach(&mut self) {
        self.connected = false;
        self.outbound = None;
        self.connection = None;
        for entry in &mut self.registry {
            entry.live = false;
        }
    }

    fn schedule_reconnect(&self, ctx: &mut Context<Self>) {
        if !self.enabled {
            return;
        }
        ctx.run_later(Duration::from_millis(RECONNECT_DELAY_MILLIS), |_, ctx| {
            ctx.notify(TryConnect);
        });
    }
}

impl Actor for BrokerManager {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        if self.enabled {
            ctx.notify(TryConnect);
        }
    }
}

/// Register a subscription. Always answered synchronously: when connected the
/// handle goes live immediately, otherwise it is registered pending and
/// promoted on the next connect. No de-duplication across calls.
#[derive(Message)]
#[rtype(result = "SubscriptionHandle")]
pub struct Subscribe {
    pub topic: String,
    pub subscriber: Recipient<BrokerEvent>,
}

impl Handler<Subscribe> for BrokerManager {
    type Result = MessageResult<Subscribe>;

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Self::Context) -> Self::Result {
        let handle = SubscriptionHandle::new(msg.topic);
        let live = self.connected;
        if live {
            self.send_frame(Frame::Subscribe {
                id: handle.wire_id(),
                topic: handle.topic.clone(),
            });
        }
        self.registry.push(SubscriptionEntry {
            handle: handle.clone(),
            subscriber: msg.subscriber,
            live,
            canceled: false,
        });
        MessageResult(handle)
    }
}

/// Cancel a subscription. Idempotent: a second call for the same handle (or a
/// call for a still-pending handle) is a no-op.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe(pub SubscriptionHandle);

impl Handler<Unsubscribe> for BrokerManager {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _ctx: &mut Self::Context) -> Self::Result {
        let Some(index) = self.registry.iter().position(|e| e.handle == msg.0) else {
            return;
        };
        let mut entry = self.registry.remove(index);
        entry.canceled = true;
        if entry.live && self.connected {
            self.send_frame(Frame::Unsubscribe {
                id: entry.handle.wire_id(),
            });
        }
    }
}

/// Best-effort publish: serialized and sent when connected, silently dropped
/// otherwise (no send queue).
#[derive(Message)]
#[rtype(result = "()")]
pub struct Publish {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl Handler<Publish> for BrokerManager {
    type Result = ();

    fn handle(&mut self, msg: Publish, _ctx: &mut Self::Context) -> Self::Result {
        if !self.connected {
            self.logger
                .debug(format!("dropping publish to {} while disconnected", msg.topic));
            return;
        }
        self.send_frame(Frame::Send {
            topic: msg.topic,
            body: msg.payload.to_string(),
        });
    }
}

/// Feature-flag kill switch. Disabling deactivates any existing connection
/// and clears live state; enabling starts connecting.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SetEnabled(pub bool);

impl Handler<SetEnabled> for BrokerManager {
    type Result = ();

    fn handle(&mut self, msg: SetEnabled, ctx: &mut Self::Context) -> Self::Result {
        self.enabled = msg.0;
        if self.enabled {
            if !self.connected {
                ctx.notify(TryConnect);
            }
        } else {
            // Kill switch: deactivate, not merely "don't auto-connect".
            if let Some(connection) = self.connection.take() {
                connection.do_send(crate::broker::connection::CloseConnection);
            }
            self.detach();
            self.logger.info("broker disabled, live state cleared");
        }
    }
}

/// A transport attached successfully. Sent by the production connection actor
/// on start; tests drive it directly with a mock outbound recipient.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ConnectionUp {
    pub outbound: Recipient<Frame>,
}

impl Handler<ConnectionUp> for BrokerManager {
    type Result = ();

    fn handle(&mut self, msg: ConnectionUp, _ctx: &mut Self::Context) -> Self::Result {
        self.attach(msg.outbound);
    }
}

/// The transport dropped. All live flags clear; a reconnect is scheduled with
/// the fixed retry delay when enabled.
#[derive(Message)]
#[rtype(result = "()")]
pub struct ConnectionDown;

impl Handler<ConnectionDown> for BrokerManager {
    type Result = ();

    fn handle(&mut self, _msg: ConnectionDown, ctx: &mut Self::Context) -> Self::Result {
        if !self.connected && self.connection.is_none() {
            return;
        }
        self.detach();
        self.logger.warn("broker connection lost");
        self.notify_status(BrokerStatus::Disconnected);
        self.schedule_reconnect(ctx);
    }
}

/// Inbound wire frames from the transport. Only `Message` frames are
/// expected here; anything else is a protocol error, reported and ignored.
impl Handler<Frame> for BrokerManager {
    type Result = ();

    fn handle(&mut self, msg: Frame, _ctx: &mut Self::Context) -> Self::Result {
        match msg {
            Frame::Message { topic, body } => {
                let payload = Payload::from_body(&body);
                if matches!(payload, Payload::Raw(_)) {
                    self.logger
                        .warn(format!("unparseable payload on {}, passing raw body", topic));
                }
                for entry in &self.registry {
                    if entry.live && !entry.canceled && entry.handle.topic == topic {
                        entry.subscriber.do_send(BrokerEvent {
                            topic: topic.clone(),
                            payload: payload.clone(),
                        });
                    }
                }
            }
            other => {
                let report = format!("unexpected inbound frame: {:?}", other);
                self.logger.warn(&report);
                self.notify_status(BrokerStatus::ProtocolError(report));
            }
        }
    }
}

struct TryConnect;

impl Message for TryConnect {
    type Result = ();
}

impl Handler<TryConnect> for BrokerManager {
    type Result = ();

    fn handle(&mut self, _msg: TryConnect, ctx: &mut Self::Context) -> Self::Result {
        if !self.enabled || self.connected {
            return;
        }
        let endpoint = self.endpoint.clone();
        let manager = ctx.address();
        let logger = self.logger.clone();
        ctx.spawn(
            wrap_future(async move { connect_endpoint(&endpoint).await }).map(
                move |stream, act: &mut Self, ctx| match stream {
                    Some(stream) => {
                        let connection = BrokerConnection::new(stream, manager).start();
                        act.connection = Some(connection);
                        // The connection actor reports ConnectionUp itself
                        // once its halves are wired.
                    }
                    None => {
                        logger.warn("broker connect failed, retrying");
                        act.schedule_reconnect(ctx);
                    }
                },
            ),
        );
    }
}

/// Query the connection flag; this is the only shape in which transport
/// health is exposed.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsConnected;

impl Handler<IsConnected> for BrokerManager {
    type Result = bool;

    fn handle(&mut self, _msg: IsConnected, _ctx: &mut Self::Context) -> Self::Result {
        self.connected
    }
}

/// Synchronous teardown: detaches every live subscription before the manager
/// stops so no callback fires into a dead consumer.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Teardown;

impl Handler<Teardown> for BrokerManager {
    type Result = ();

    fn handle(&mut self, _msg: Teardown, ctx: &mut Self::Context) -> Self::Result {
        if let Some(connection) = self.connection.take() {
            connection.do_send(crate::broker::connection::CloseConnection);
        }
        self.detach();
        self.registry.clear();
        ctx.stop();
    }
}
