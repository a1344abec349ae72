//! Offline tracking demo: polls a (probably absent) backend, degrades to the
//! fallback route, and flies a simulated delivery to completion.

use actix::prelude::*;
use colored::Color;
use std::time::Duration;

use dronetrack::broker::{BrokerManager, Teardown};
use dronetrack::config::TrackingConfig;
use dronetrack::constants::{DEMO_CUSTOMER, DEMO_DRONE, DEMO_STORE};
use dronetrack::logger::Logger;
use dronetrack::messages::tracking_messages::{
    GetTrackingState, Shutdown, StartPolling, StartSimulation, TrackingNotice,
};
use dronetrack::rest::HttpDeliveryApi;
use dronetrack::tracking::DeliveryTracker;

struct ConsoleConsumer {
    logger: Logger,
}

impl Actor for ConsoleConsumer {
    type Context = Context<Self>;
}

impl Handler<TrackingNotice> for ConsoleConsumer {
    type Result = ();

    fn handle(&mut self, msg: TrackingNotice, _ctx: &mut Self::Context) -> Self::Result {
        match msg {
            TrackingNotice::StateUpdated(state) => {
                if let Some(position) = state.drone_position {
                    self.logger.info(format!(
                        "{} at ({:.4},{:.4}) eta={:?}s{}",
                        state.status,
                        position.lat,
                        position.lng,
                        state.eta_seconds,
                        if state.simulated { " [simulated]" } else { "" }
                    ));
                } else {
                    self.logger.info(format!("{}", state.status));
                }
            }
            TrackingNotice::ArrivingSoon => self.logger.info("drone arriving soon"),
            TrackingNotice::Arrived => self.logger.info("package delivered"),
            TrackingNotice::Degraded(reason) => self.logger.warn(reason),
        }
    }
}

#[actix::main]
async fn main() {
    let logger = Logger::new("Demo", Color::Magenta);
    let config = TrackingConfig {
        enabled: false,
        simulate: true,
        ..TrackingConfig::default()
    };
    logger.info(format!(
        "tracking demo starting, broker endpoint {} (disabled)",
        config.broker_endpoint()
    ));
    logger.info(format!(
        "store at ({:.4},{:.4}), customer at ({:.4},{:.4})",
        DEMO_STORE.lat, DEMO_STORE.lng, DEMO_CUSTOMER.lat, DEMO_CUSTOMER.lng
    ));

    let broker = BrokerManager::new(config.broker_endpoint(), config.enabled, None).start();
    let api = HttpDeliveryApi::new(config.base_url.clone());
    let consumer = ConsoleConsumer {
        logger: Logger::new("Tracking", Color::Yellow),
    }
    .start();
    let tracker = DeliveryTracker::new(
        "demo-delivery",
        Some("demo-order".to_string()),
        api,
        broker.clone(),
        Some(consumer.recipient()),
        &config,
    )
    .start();

    tracker.do_send(StartPolling);
    tracker.do_send(StartSimulation {
        from: Some(DEMO_DRONE),
        to: Some(DEMO_CUSTOMER),
    });

    tokio::time::sleep(Duration::from_secs(config.auto_arrival_seconds + 2)).await;

    let state = tracker
        .send(GetTrackingState)
        .await
        .expect("tracker stopped before the flight finished");
    logger.info(format!(
        "final state: {} arrived={} position={:?}",
        state.status, state.arrived, state.drone_position
    ));

    tracker.send(Shutdown).await.ok();
    broker.send(Teardown).await.ok();
}
