use crate::geo::Coordinate;

/// Center of the service area (Ho Chi Minh City, near Ben Thanh Market).
pub const SERVICE_CENTER: Coordinate = Coordinate {
    lat: 10.776,
    lng: 106.700,
};

pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Every displayed coordinate is kept within this radius of [`SERVICE_CENTER`].
pub const MAX_RADIUS_KM: f64 = 2.0;

/// Drone counts as arrived within this distance of the destination (~50 m).
pub const ARRIVAL_THRESHOLD_KM: f64 = 0.05;
/// "Arriving soon" distance trigger (~100 m).
pub const ARRIVING_SOON_DISTANCE_KM: f64 = 0.1;
/// "Arriving soon" when the remaining ETA fraction drops to this share.
pub const ARRIVING_SOON_ETA_FRACTION: f64 = 0.15;

/// Assumed drone cruise speed for ETA estimation when the backend gives none.
pub const DRONE_SPEED_KMH: f64 = 30.0;

pub const SIMULATION_TICK_MILLIS: u64 = 200;
pub const DEFAULT_AUTO_ARRIVAL_SECONDS: u64 = 10;
pub const POLL_INTERVAL_MILLIS: u64 = 10_000;
pub const RECONNECT_DELAY_MILLIS: u64 = 5_000;

/// Demo fallbacks; never render at (0,0) or NaN.
pub const DEMO_DRONE: Coordinate = Coordinate {
    lat: 10.8331,
    lng: 106.6197,
};
pub const DEMO_CUSTOMER: Coordinate = Coordinate {
    lat: 10.8231,
    lng: 106.6297,
};
pub const DEMO_STORE: Coordinate = Coordinate {
    lat: 10.7761,
    lng: 106.7000,
};

/// Path suffix appended to the base URL to reach the broker endpoint.
pub const BROKER_PATH_SUFFIX: &str = "/api/ws";
