//! Pure reconciliation core for one tracked delivery.
//!
//! Every input channel (REST snapshots, pushed GPS, pushed status, pushed
//! ETA, simulated motion) funnels into one [`TrackingStateMachine`], which
//! owns the canonical state and merges updates under two rules: status only
//! moves forward (cancellation being the single allowed regression), and
//! arrival/arriving-soon are one-shot latches no later input can unset.

use crate::constants::{ARRIVING_SOON_DISTANCE_KM, ARRIVING_SOON_ETA_FRACTION};
use crate::geo::{haversine_km, sanitize_pair, too_close_to_distinguish};
use crate::simulator::MotionSample;
use crate::types::delivery_status::{DeliveryStatus, StatusUpdate};
use crate::types::dtos::{CanonicalTrackingState, DeliverySnapshot};

/// What a merge step asks the surrounding actor to do. `Changed` means the
/// canonical state differs from before the step; the notice variants each
/// fire at most once over the machine's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingEffect {
    Changed,
    ArrivingSoon,
    Arrived,
}

pub struct TrackingStateMachine {
    state: CanonicalTrackingState,
    /// First ETA ever observed; baseline for the "remaining fraction" trigger.
    initial_eta_seconds: Option<i64>,
}

impl TrackingStateMachine {
    pub fn new() -> Self {
        Self {
            state: CanonicalTrackingState::default(),
            initial_eta_seconds: None,
        }
    }

    pub fn state(&self) -> &CanonicalTrackingState {
        &self.state
    }

    /// Merge a backend snapshot. Positions are sanitized; a snapshot that
    /// carries no usable coordinate leaves the last known good one in place.
    pub fn apply_snapshot(&mut self, snapshot: &DeliverySnapshot) -> Vec<TrackingEffect> {
        let before = self.state.clone();
        if let Some(dest) = snapshot.destination {
            if let Some(clean) = sanitize_pair(dest.lat, dest.lng) {
                self.state.destination = Some(clean);
            }
        }
        if let Some(pos) = snapshot.current_position {
            if let Some(clean) = sanitize_pair(pos.lat, pos.lng) {
                self.state.drone_position = Some(clean);
                self.state.simulated = false;
            }
        }
        self.merge_status(snapshot.status);
        if let Some(eta) = snapshot.eta_seconds {
            self.record_eta(eta);
        }
        self.finish(before)
    }

    /// Merge a pushed GPS fix. Live telemetry always supersedes simulation,
    /// and a drone reporting positions mid-flight is at least `Delivering`.
    pub fn apply_live_gps(&mut self, lat: f64, lng: f64, eta_seconds: Option<i64>) -> Vec<TrackingEffect> {
        let before = self.state.clone();
        if let Some(clean) = sanitize_pair(lat, lng) {
            self.state.drone_position = Some(clean);
            self.state.simulated = false;
            if eta_seconds.is_none_or(|eta| eta > 0) {
                self.merge_status(StatusUpdate::Progress(DeliveryStatus::Delivering));
            }
        }
        if let Some(eta) = eta_seconds {
            self.record_eta(eta);
        }
        self.finish(before)
    }

    pub fn apply_status(&mut self, update: StatusUpdate) -> Vec<TrackingEffect> {
        let before = self.state.clone();
        self.merge_status(update);
        self.finish(before)
    }

    pub fn apply_eta(&mut self, eta_seconds: i64, progress_percent: Option<f64>) -> Vec<TrackingEffect> {
        let before = self.state.clone();
        self.record_eta(eta_seconds);
        if let Some(progress) = progress_percent {
            if progress >= (1.0 - ARRIVING_SOON_ETA_FRACTION) * 100.0 {
                self.state.arriving_soon = true;
            }
        }
        self.finish(before)
    }

    /// Merge a simulated motion sample. Simulated positions are produced
    /// between trusted endpoints and are deliberately not re-sanitized, so
    /// reported positions interpolate exactly.
    pub fn apply_simulated_sample(&mut self, sample: &MotionSample) -> Vec<TrackingEffect> {
        let before = self.state.clone();
        self.state.drone_position = Some(sample.position);
        self.state.simulated = true;
        if sample.arriving_soon {
            self.state.arriving_soon = true;
        }
        if sample.arrived {
            self.mark_arrived();
        }
        self.finish(before)
    }

    /// An upstream "arriving" hint with no coordinates attached.
    pub fn apply_arriving_hint(&mut self) -> Vec<TrackingEffect> {
        let before = self.state.clone();
        self.state.arriving_soon = true;
        self.finish(before)
    }

    fn merge_status(&mut self, update: StatusUpdate) {
        match update {
            StatusUpdate::Progress(next) => {
                if next > self.state.status {
                    self.state.status = next;
                }
            }
            StatusUpdate::Cancellation => {
                // The one permitted regression; a delivery that already
                // arrived stays arrived.
                if !self.state.arrived {
                    self.state.status = DeliveryStatus::Confirmed;
                }
            }
        }
    }

    fn record_eta(&mut self, eta_seconds: i64) {
        let eta = eta_seconds.max(0);
        self.state.eta_seconds = Some(eta);
        if self.initial_eta_seconds.is_none() && eta > 0 {
            self.initial_eta_seconds = Some(eta);
        }
    }

    fn mark_arrived(&mut self) {
        self.state.arrived = true;
        self.state.eta_seconds = Some(0);
        if DeliveryStatus::Delivered > self.state.status {
            self.state.status = DeliveryStatus::Delivered;
        }
    }

    /// Re-evaluate proximity/ETA triggers, then diff against `before` to
    /// decide which effects this step produced.
    fn finish(&mut self, before: CanonicalTrackingState) -> Vec<TrackingEffect> {
        if let (Some(pos), Some(dest)) = (self.state.drone_position, self.state.destination) {
            // The drone and destination markers merging is the arrival signal.
            if too_close_to_distinguish(pos, dest) {
                self.mark_arrived();
            } else if haversine_km(pos, dest) <= ARRIVING_SOON_DISTANCE_KM {
                self.state.arriving_soon = true;
            }
        }
        if let (Some(eta), Some(initial)) = (self.state.eta_seconds, self.initial_eta_seconds) {
            if initial > 0 && (eta as f64 / initial as f64) <= ARRIVING_SOON_ETA_FRACTION {
                self.state.arriving_soon = true;
            }
        }
        if self.state.eta_seconds == Some(0) {
            self.mark_arrived();
        }
        if self.state.status.is_terminal() {
            self.mark_arrived();
        }

        let mut effects = Vec::new();
        if self.state != before {
            effects.push(TrackingEffect::Changed);
        }
        if self.state.arriving_soon && !before.arriving_soon && !self.state.arrived {
            effects.push(TrackingEffect::ArrivingSoon);
        }
        if self.state.arrived && !before.arrived {
            effects.push(TrackingEffect::Arrived);
        }
        effects
    }
}

impl Default for TrackingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::geo::Coordinate;
    use crate::simulator::MotionSimulator;

    fn snapshot(status: StatusUpdate) -> DeliverySnapshot {
        DeliverySnapshot {
            delivery_id: "d-1".into(),
            order_id: Some("o-1".into()),
            drone_id: None,
            current_position: None,
            destination: None,
            status,
            eta_seconds: None,
            progress_percent: None,
        }
    }

    #[test]
    fn status_never_regresses_on_stale_snapshot() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_status(StatusUpdate::Progress(DeliveryStatus::Delivering));
        let effects = sm.apply_snapshot(&snapshot(StatusUpdate::Progress(DeliveryStatus::Preparing)));
        assert_eq!(sm.state().status, DeliveryStatus::Delivering);
        assert!(effects.is_empty());
    }

    #[test]
    fn status_advances_forward() {
        let mut sm = TrackingStateMachine::new();
        let effects = sm.apply_status(StatusUpdate::Progress(DeliveryStatus::Preparing));
        assert_eq!(effects, vec![TrackingEffect::Changed]);
        assert_eq!(sm.state().status, DeliveryStatus::Preparing);
    }

    #[test]
    fn cancellation_regresses_to_confirmed() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_status(StatusUpdate::Progress(DeliveryStatus::Delivering));
        sm.apply_status(StatusUpdate::Cancellation);
        assert_eq!(sm.state().status, DeliveryStatus::Confirmed);
    }

    #[test]
    fn cancellation_after_arrival_is_ignored() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_status(StatusUpdate::Progress(DeliveryStatus::Delivered));
        assert!(sm.state().arrived);
        sm.apply_status(StatusUpdate::Cancellation);
        assert_eq!(sm.state().status, DeliveryStatus::Delivered);
        assert!(sm.state().arrived);
    }

    #[test]
    fn arrival_fires_once_across_all_signals() {
        let mut sm = TrackingStateMachine::new();
        // Proximity arrival: destination set, then a fix within 50 m.
        sm.apply_snapshot(&DeliverySnapshot {
            destination: Some(Coordinate::new(10.7800, 106.7050)),
            ..snapshot(StatusUpdate::Progress(DeliveryStatus::Delivering))
        });
        let effects = sm.apply_live_gps(10.78001, 106.70501, None);
        assert!(effects.contains(&TrackingEffect::Arrived));
        assert!(sm.state().arrived);
        assert_eq!(sm.state().eta_seconds, Some(0));

        // Delivered status and a completed simulation must not refire.
        let effects = sm.apply_status(StatusUpdate::Progress(DeliveryStatus::Delivered));
        assert!(!effects.contains(&TrackingEffect::Arrived));
        let sim = MotionSimulator::new(
            Coordinate::new(10.7800, 106.7050),
            Coordinate::new(10.7800, 106.7050),
            1_000,
            Instant::now(),
        );
        let done = sim.sample(Instant::now() + Duration::from_secs(2));
        let effects = sm.apply_simulated_sample(&done);
        assert!(!effects.contains(&TrackingEffect::Arrived));
    }

    #[test]
    fn arriving_soon_fires_once_and_latches() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_snapshot(&DeliverySnapshot {
            destination: Some(Coordinate::new(10.7800, 106.7050)),
            ..snapshot(StatusUpdate::Progress(DeliveryStatus::Delivering))
        });
        // ~90 m out: inside the arriving-soon ring, outside the arrival one.
        let effects = sm.apply_live_gps(10.7808, 106.7050, None);
        assert!(effects.contains(&TrackingEffect::ArrivingSoon));
        let effects = sm.apply_live_gps(10.78078, 106.7050, None);
        assert!(!effects.contains(&TrackingEffect::ArrivingSoon));
        assert!(sm.state().arriving_soon);
    }

    #[test]
    fn eta_fraction_triggers_arriving_soon() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_eta(600, None);
        assert!(!sm.state().arriving_soon);
        let effects = sm.apply_eta(80, None);
        assert!(effects.contains(&TrackingEffect::ArrivingSoon));
    }

    #[test]
    fn eta_zero_is_an_arrival_signal() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_eta(300, None);
        let effects = sm.apply_eta(0, None);
        assert!(effects.contains(&TrackingEffect::Arrived));
        assert!(sm.state().arrived);
    }

    #[test]
    fn progress_percent_triggers_arriving_soon() {
        let mut sm = TrackingStateMachine::new();
        let effects = sm.apply_eta(300, Some(90.0));
        assert!(effects.contains(&TrackingEffect::ArrivingSoon));
    }

    #[test]
    fn transposed_gps_is_repaired_not_dropped() {
        let mut sm = TrackingStateMachine::new();
        let effects = sm.apply_live_gps(106.705, 10.78, None);
        assert!(effects.contains(&TrackingEffect::Changed));
        let pos = sm.state().drone_position.unwrap();
        assert!((pos.lat - 10.78).abs() < 1e-9);
        assert!((pos.lng - 106.705).abs() < 1e-9);
        assert!(!sm.state().simulated);
    }

    #[test]
    fn garbage_gps_keeps_last_known_good() {
        let mut sm = TrackingStateMachine::new();
        sm.apply_live_gps(10.78, 106.705, None);
        let good = sm.state().drone_position;
        let effects = sm.apply_live_gps(f64::NAN, 106.705, None);
        assert!(effects.is_empty());
        assert_eq!(sm.state().drone_position, good);
        sm.apply_live_gps(0.0, 0.0, None);
        assert_eq!(sm.state().drone_position, good);
    }

    #[test]
    fn live_gps_supersedes_simulated_flag() {
        let mut sm = TrackingStateMachine::new();
        let sim = MotionSimulator::new(
            Coordinate::new(10.78, 106.70),
            Coordinate::new(10.79, 106.71),
            60_000,
            Instant::now(),
        );
        sm.apply_simulated_sample(&sim.sample(Instant::now()));
        assert!(sm.state().simulated);
        sm.apply_live_gps(10.781, 106.701, None);
        assert!(!sm.state().simulated);
    }

    #[test]
    fn arriving_hint_sets_the_latch() {
        let mut sm = TrackingStateMachine::new();
        let effects = sm.apply_arriving_hint();
        assert_eq!(
            effects,
            vec![TrackingEffect::Changed, TrackingEffect::ArrivingSoon]
        );
    }

    #[test]
    fn snapshot_with_same_state_reports_no_change() {
        let mut sm = TrackingStateMachine::new();
        let snap = snapshot(StatusUpdate::Progress(DeliveryStatus::Created));
        sm.apply_snapshot(&snap);
        assert!(sm.apply_snapshot(&snap).is_empty());
    }
}
