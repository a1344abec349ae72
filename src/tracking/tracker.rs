//! Per-delivery tracking actor.
//!
//! One `DeliveryTracker` owns one [`TrackingStateMachine`] and feeds it from
//! every source: broker pushes (GPS, state, ETA, per-order envelopes), the
//! periodic REST poll, and the motion simulator. The consumer registers a
//! [`TrackingNotice`] recipient and otherwise only reads state copies via
//! [`GetTrackingState`].

use actix::fut::wrap_future;
use actix::prelude::*;
use colored::Color;
use std::time::{Duration, Instant};

use crate::broker::{BrokerEvent, BrokerManager, Payload, Subscribe, SubscriptionHandle, Unsubscribe};
use crate::config::TrackingConfig;
use crate::constants::{DEMO_CUSTOMER, DEMO_DRONE, POLL_INTERVAL_MILLIS, SIMULATION_TICK_MILLIS};
use crate::geo::Coordinate;
use crate::logger::Logger;
use crate::messages::broker_messages::{
    order_topic, DeliveryEtaUpdate, DroneGpsUpdate, DroneStateChange, EnvelopeGpsPayload,
    OrderEnvelope, TOPIC_DELIVERY_ETA, TOPIC_DRONE_GPS, TOPIC_DRONE_STATE,
};
use crate::messages::tracking_messages::{
    CancelSimulation, GetTrackingState, Shutdown, StartPolling, StartSimulation, StopPolling,
    TrackingNotice,
};
use crate::rest::{poll_snapshot, DeliveryApi};
use crate::simulator::MotionSimulator;
use crate::tracking::state_machine::{TrackingEffect, TrackingStateMachine};
use crate::types::delivery_status::DeliveryStatus;

pub struct DeliveryTracker<A: DeliveryApi> {
    delivery_id: String,
    order_id: Option<String>,
    api: A,
    broker: Addr<BrokerManager>,
    consumer: Option<Recipient<TrackingNotice>>,
    simulate: bool,
    auto_arrival_seconds: u64,
    machine: TrackingStateMachine,
    handles: Vec<SubscriptionHandle>,
    simulator: Option<MotionSimulator>,
    sim_timer: Option<SpawnHandle>,
    poll_timer: Option<SpawnHandle>,
    /// True once any REST snapshot landed; gates the degraded notice.
    have_snapshot: bool,
    degraded_reported: bool,
    logger: Logger,
}

impl<A: DeliveryApi> DeliveryTracker<A> {
    pub fn new(
        delivery_id: impl Into<String>,
        order_id: Option<String>,
        api: A,
        broker: Addr<BrokerManager>,
        consumer: Option<Recipient<TrackingNotice>>,
        config: &TrackingConfig,
    ) -> Self {
        Self {
            delivery_id: delivery_id.into(),
            order_id,
            api,
            broker,
            consumer,
            simulate: config.simulate,
            auto_arrival_seconds: config.auto_arrival_seconds,
            machine: TrackingStateMachine::new(),
            handles: Vec::new(),
            simulator: None,
            sim_timer: None,
            poll_timer: None,
            have_snapshot: false,
            degraded_reported: false,
            logger: Logger::new("Tracker", Color::Green),
        }
    }

    fn notify(&self, notice: TrackingNotice) {
        if let Some(consumer) = &self.consumer {
            consumer.do_send(notice);
        }
    }

    fn dispatch(&mut self, effects: Vec<TrackingEffect>, ctx: &mut Context<Self>) {
        for effect in effects {
            match effect {
                TrackingEffect::Changed => {
                    self.notify(TrackingNotice::StateUpdated(self.machine.state().clone()));
                }
                TrackingEffect::ArrivingSoon => {
                    self.logger.info(format!("{} arriving soon", self.delivery_id));
                    self.notify(TrackingNotice::ArrivingSoon);
                }
                TrackingEffect::Arrived => {
                    self.logger.info(format!("{} arrived", self.delivery_id));
                    self.notify(TrackingNotice::Arrived);
                    self.stop_simulation(ctx);
                    self.stop_polling(ctx);
                }
            }
        }
    }

    /// The subscribe round-trip runs detached from the actor's lifetime: if
    /// the tracker is gone by the time the handle comes back, the handle is
    /// withdrawn on the spot instead of leaking a live registry entry.
    fn subscribe_topic(&self, topic: String, ctx: &mut Context<Self>) {
        let broker = self.broker.clone();
        let subscriber = ctx.address().recipient();
        let tracker = ctx.address();
        actix::spawn(async move {
            if let Ok(handle) = broker.send(Subscribe { topic, subscriber }).await {
                if tracker.send(RecordSubscription(handle.clone())).await.is_err() {
                    broker.do_send(Unsubscribe(handle));
                }
            }
        });
    }

    /// Simulate only while a drone should be flying and no live telemetry
    /// has claimed the position.
    fn maybe_start_simulation(&mut self, ctx: &mut Context<Self>) {
        if !self.simulate || self.simulator.is_some() {
            return;
        }
        let state = self.machine.state();
        if state.arrived || state.status != DeliveryStatus::Delivering {
            return;
        }
        if state.drone_position.is_some() && !state.simulated {
            return;
        }
        self.start_simulation(None, None, ctx);
    }

    fn start_simulation(
        &mut self,
        from: Option<Coordinate>,
        to: Option<Coordinate>,
        ctx: &mut Context<Self>,
    ) {
        self.stop_simulation(ctx);
        let state = self.machine.state();
        let from = from.or(state.drone_position).unwrap_or(DEMO_DRONE);
        let to = to.or(state.destination).unwrap_or(DEMO_CUSTOMER);
        self.logger.info(format!(
            "simulating flight for {} ({:.4},{:.4}) -> ({:.4},{:.4})",
            self.delivery_id, from.lat, from.lng, to.lat, to.lng
        ));
        self.simulator = Some(MotionSimulator::start(
            from,
            to,
            self.auto_arrival_seconds * 1000,
        ));
        self.sim_timer = Some(ctx.run_interval(
            Duration::from_millis(SIMULATION_TICK_MILLIS),
            |act, ctx| {
                let Some(simulator) = &act.simulator else {
                    return;
                };
                let sample = simulator.sample(Instant::now());
                let effects = act.machine.apply_simulated_sample(&sample);
                let arrived = sample.arrived;
                act.dispatch(effects, ctx);
                if arrived {
                    act.stop_simulation(ctx);
                }
            },
        ));
    }

    fn stop_simulation(&mut self, ctx: &mut Context<Self>) {
        if let Some(timer) = self.sim_timer.take() {
            ctx.cancel_future(timer);
        }
        self.simulator = None;
    }

    fn stop_polling(&mut self, ctx: &mut Context<Self>) {
        if let Some(timer) = self.poll_timer.take() {
            ctx.cancel_future(timer);
        }
    }

    fn apply_order_envelope(&mut self, envelope: OrderEnvelope, ctx: &mut Context<Self>) {
        match envelope.kind.as_str() {
            "ORDER_STATUS_CHANGED" => {
                if let Some(raw) = envelope.payload.get("status").and_then(|v| v.as_str()) {
                    let effects = self.machine.apply_status(DeliveryStatus::from_backend(raw));
                    self.dispatch(effects, ctx);
                    self.maybe_start_simulation(ctx);
                }
            }
            "GPS_UPDATE" => {
                if let Ok(gps) = serde_json::from_value::<EnvelopeGpsPayload>(envelope.payload) {
                    self.stop_simulation(ctx);
                    let effects = self.machine.apply_live_gps(
                        gps.lat,
                        gps.lng,
                        gps.eta_minutes.map(|m| m * 60),
                    );
                    self.dispatch(effects, ctx);
                }
            }
            "DELIVERY_ARRIVING" => {
                let effects = self.machine.apply_arriving_hint();
                self.dispatch(effects, ctx);
            }
            other => {
                self.logger
                    .debug(format!("ignoring order envelope of type {}", other));
            }
        }
    }
}

impl<A: DeliveryApi> Actor for DeliveryTracker<A> {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.subscribe_topic(TOPIC_DRONE_GPS.to_string(), ctx);
        self.subscribe_topic(TOPIC_DRONE_STATE.to_string(), ctx);
        self.subscribe_topic(TOPIC_DELIVERY_ETA.to_string(), ctx);
        if let Some(order_id) = &self.order_id {
            self.subscribe_topic(order_topic(order_id), ctx);
        }
    }

    /// Every timer and subscription has a guaranteed-run disposer here, so
    /// nothing mutates state or fires callbacks after the tracker is gone.
    fn stopping(&mut self, ctx: &mut Self::Context) -> Running {
        self.stop_simulation(ctx);
        self.stop_polling(ctx);
        for handle in self.handles.drain(..) {
            self.broker.do_send(Unsubscribe(handle));
        }
        Running::Stop
    }
}

impl<A: DeliveryApi> Handler<BrokerEvent> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, msg: BrokerEvent, ctx: &mut Self::Context) -> Self::Result {
        if let Payload::Raw(body) = &msg.payload {
            self.logger
                .warn(format!("raw payload on {}: {}", msg.topic, body));
            return;
        }
        match msg.topic.as_str() {
            TOPIC_DRONE_GPS => {
                let Some(gps) = msg.payload.decode::<DroneGpsUpdate>() else {
                    return;
                };
                if gps.delivery_id != self.delivery_id {
                    return;
                }
                // Live telemetry supersedes any running simulation.
                self.stop_simulation(ctx);
                let mut effects =
                    self.machine
                        .apply_live_gps(gps.latitude, gps.longitude, gps.eta_seconds);
                if let Some(raw) = gps.status.as_deref() {
                    effects.extend(self.machine.apply_status(DeliveryStatus::from_backend(raw)));
                }
                self.dispatch(effects, ctx);
            }
            TOPIC_DRONE_STATE => {
                let Some(change) = msg.payload.decode::<DroneStateChange>() else {
                    return;
                };
                if change.delivery_id != self.delivery_id {
                    return;
                }
                let effects = self
                    .machine
                    .apply_status(DeliveryStatus::from_backend(&change.new_status));
                self.dispatch(effects, ctx);
                self.maybe_start_simulation(ctx);
            }
            TOPIC_DELIVERY_ETA => {
                let Some(eta) = msg.payload.decode::<DeliveryEtaUpdate>() else {
                    return;
                };
                if eta.delivery_id != self.delivery_id {
                    return;
                }
                let effects = self.machine.apply_eta(eta.eta_seconds, eta.progress_percent);
                self.dispatch(effects, ctx);
            }
            _ => {
                if let Some(envelope) = msg.payload.decode::<OrderEnvelope>() {
                    self.apply_order_envelope(envelope, ctx);
                }
            }
        }
    }
}

struct RecordSubscription(SubscriptionHandle);

impl Message for RecordSubscription {
    type Result = ();
}

impl<A: DeliveryApi> Handler<RecordSubscription> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, msg: RecordSubscription, _ctx: &mut Self::Context) -> Self::Result {
        self.handles.push(msg.0);
    }
}

struct PollTick;

impl Message for PollTick {
    type Result = ();
}

impl<A: DeliveryApi> Handler<PollTick> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, _msg: PollTick, ctx: &mut Self::Context) -> Self::Result {
        let api = self.api.clone();
        let delivery_id = self.delivery_id.clone();
        ctx.spawn(
            wrap_future(async move { poll_snapshot(&api, &delivery_id).await }).map(
                |result, act: &mut Self, ctx| match result {
                    Ok(snapshot) => {
                        act.have_snapshot = true;
                        act.degraded_reported = false;
                        if act.order_id.is_none() {
                            act.order_id = snapshot.order_id.clone();
                        }
                        let effects = act.machine.apply_snapshot(&snapshot);
                        // A polled fix is live telemetry too; the machine
                        // clears `simulated` only when it accepted one.
                        let state = act.machine.state();
                        if state.drone_position.is_some() && !state.simulated {
                            act.stop_simulation(ctx);
                        }
                        act.dispatch(effects, ctx);
                        act.maybe_start_simulation(ctx);
                    }
                    Err(err) => {
                        act.logger.warn(format!("poll failed: {}", err));
                        // Without any cached snapshot there is no truth to
                        // fall back on; tell the consumer once.
                        if !act.have_snapshot && !act.degraded_reported {
                            act.degraded_reported = true;
                            act.notify(TrackingNotice::Degraded(format!(
                                "showing fallback route, backend unreachable: {}",
                                err
                            )));
                            act.maybe_start_simulation(ctx);
                        }
                    }
                },
            ),
        );
    }
}

impl<A: DeliveryApi> Handler<StartPolling> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, _msg: StartPolling, ctx: &mut Self::Context) -> Self::Result {
        self.stop_polling(ctx);
        ctx.notify(PollTick);
        self.poll_timer = Some(ctx.run_interval(
            Duration::from_millis(POLL_INTERVAL_MILLIS),
            |_act, ctx| {
                ctx.notify(PollTick);
            },
        ));
    }
}

impl<A: DeliveryApi> Handler<StopPolling> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, _msg: StopPolling, ctx: &mut Self::Context) -> Self::Result {
        self.stop_polling(ctx);
    }
}

impl<A: DeliveryApi> Handler<StartSimulation> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, msg: StartSimulation, ctx: &mut Self::Context) -> Self::Result {
        self.start_simulation(msg.from, msg.to, ctx);
    }
}

impl<A: DeliveryApi> Handler<CancelSimulation> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, _msg: CancelSimulation, ctx: &mut Self::Context) -> Self::Result {
        self.stop_simulation(ctx);
    }
}

impl<A: DeliveryApi> Handler<GetTrackingState> for DeliveryTracker<A> {
    type Result = MessageResult<GetTrackingState>;

    fn handle(&mut self, _msg: GetTrackingState, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.machine.state().clone())
    }
}

impl<A: DeliveryApi> Handler<Shutdown> for DeliveryTracker<A> {
    type Result = ();

    fn handle(&mut self, _msg: Shutdown, ctx: &mut Self::Context) -> Self::Result {
        ctx.stop();
    }
}
