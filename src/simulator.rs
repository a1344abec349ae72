//! Time-driven linear motion between two coordinates, used when no live
//! telemetry exists. Sampling is a pure function of elapsed time: given the
//! same endpoints, duration and clock, the emitted sequence is fully
//! deterministic.

use std::time::{Duration, Instant};

use crate::constants::{ARRIVING_SOON_DISTANCE_KM, ARRIVING_SOON_ETA_FRACTION};
use crate::geo::{haversine_km, Coordinate};

/// Simulated flights shorter than this are stretched to it.
const MIN_DURATION_MILLIS: u64 = 1_000;

#[derive(Debug, Clone)]
pub struct MotionSimulator {
    from: Coordinate,
    to: Coordinate,
    started_at: Instant,
    duration: Duration,
}

/// One sampled point of a simulation run. The `arriving_soon`/`arrived`
/// flags are level-triggered; one-shot notification is the consumer's job.
#[derive(Debug, Clone, Copy)]
pub struct MotionSample {
    pub position: Coordinate,
    pub fraction: f64,
    pub arriving_soon: bool,
    pub arrived: bool,
}

impl MotionSimulator {
    /// Start a run at `started_at`; tests inject the clock here.
    pub fn new(from: Coordinate, to: Coordinate, duration_ms: u64, started_at: Instant) -> Self {
        Self {
            from,
            to,
            started_at,
            duration: Duration::from_millis(duration_ms.max(MIN_DURATION_MILLIS)),
        }
    }

    pub fn start(from: Coordinate, to: Coordinate, duration_ms: u64) -> Self {
        Self::new(from, to, duration_ms, Instant::now())
    }

    pub fn destination(&self) -> Coordinate {
        self.to
    }

    pub fn sample(&self, now: Instant) -> MotionSample {
        let elapsed = now.saturating_duration_since(self.started_at);
        let fraction = (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0);
        // At completion report the endpoint exactly, not a float neighbor.
        let position = if fraction >= 1.0 {
            self.to
        } else {
            Coordinate {
                lat: self.from.lat + (self.to.lat - self.from.lat) * fraction,
                lng: self.from.lng + (self.to.lng - self.from.lng) * fraction,
            }
        };
        let remaining = 1.0 - fraction;
        let distance_km = haversine_km(position, self.to);
        MotionSample {
            position,
            fraction,
            arriving_soon: remaining <= ARRIVING_SOON_ETA_FRACTION
                || distance_km <= ARRIVING_SOON_DISTANCE_KM,
            arrived: fraction >= 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_run() -> MotionSimulator {
        MotionSimulator::new(
            Coordinate::new(10.8331, 106.6197),
            Coordinate::new(10.8231, 106.6297),
            10_000,
            Instant::now(),
        )
    }

    fn at(sim: &MotionSimulator, millis: u64) -> MotionSample {
        sim.sample(sim.started_at + Duration::from_millis(millis))
    }

    #[test]
    fn starts_at_origin() {
        let sim = demo_run();
        let s = at(&sim, 0);
        assert_eq!(s.position, Coordinate::new(10.8331, 106.6197));
        assert!(!s.arrived);
    }

    #[test]
    fn midpoint_at_half_duration() {
        let sim = demo_run();
        let s = at(&sim, 5_000);
        assert!((s.position.lat - 10.8281).abs() < 1e-9);
        assert!((s.position.lng - 106.6247).abs() < 1e-9);
        assert!(!s.arrived);
        assert!(!s.arriving_soon);
    }

    #[test]
    fn position_is_proportional_to_elapsed_time() {
        let sim = demo_run();
        let s = at(&sim, 2_500);
        assert!((s.fraction - 0.25).abs() < 1e-9);
        let expected_lat = 10.8331 + (10.8231 - 10.8331) * 0.25;
        assert!((s.position.lat - expected_lat).abs() < 1e-9);
    }

    #[test]
    fn arriving_soon_in_final_fifteen_percent() {
        let sim = demo_run();
        assert!(!at(&sim, 8_400).arriving_soon);
        assert!(at(&sim, 8_600).arriving_soon);
        assert!(at(&sim, 9_900).arriving_soon);
    }

    #[test]
    fn arrives_exactly_at_destination() {
        let sim = demo_run();
        let s = at(&sim, 10_000);
        assert!(s.arrived);
        assert_eq!(s.position, Coordinate::new(10.8231, 106.6297));
        // Late samples stay pinned at the destination.
        let late = at(&sim, 60_000);
        assert!(late.arrived);
        assert_eq!(late.position, Coordinate::new(10.8231, 106.6297));
    }

    #[test]
    fn sub_second_duration_is_stretched() {
        let sim = MotionSimulator::new(
            Coordinate::new(10.83, 106.62),
            Coordinate::new(10.82, 106.63),
            10,
            Instant::now(),
        );
        assert!(!at(&sim, 500).arrived);
        assert!(at(&sim, 1_000).arrived);
    }
}
