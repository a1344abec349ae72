//! Geographic helpers for coordinate validation, normalization and
//! geofence clamping around the service area.
//!
//! Everything here is a pure function. Bad input yields `None`, never a
//! panic, so callers can fall back to a last-known-good or demo coordinate.

use serde::{Deserialize, Serialize};

use crate::constants::{ARRIVAL_THRESHOLD_KM, EARTH_RADIUS_KM, MAX_RADIUS_KM, SERVICE_CENTER};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A coordinate is valid when both components are finite and it is not the
/// `(0,0)` sentinel the backend uses for "no position".
pub fn is_valid(coord: Coordinate) -> bool {
    coord.lat.is_finite() && coord.lng.is_finite() && !(coord.lat == 0.0 && coord.lng == 0.0)
}

/// Normalize a raw pair of ambiguous order into a coordinate.
///
/// If the first value is outside latitude range but the second fits in
/// longitude range, the pair is assumed transposed and swapped. This is a
/// heuristic: a transposed pair where both components are <= 90 in magnitude
/// passes through misordered, which is known and preserved behavior.
pub fn normalize_pair(a: f64, b: f64) -> Option<Coordinate> {
    if !a.is_finite() || !b.is_finite() {
        return None;
    }
    if a == 0.0 && b == 0.0 {
        return None;
    }
    if a.abs() > 90.0 && b.abs() <= 180.0 {
        return Some(Coordinate { lat: b, lng: a });
    }
    Some(Coordinate { lat: a, lng: b })
}

fn to_rad(deg: f64) -> f64 {
    deg.to_radians()
}

/// Great-circle distance in kilometers between two coordinates.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = to_rad(b.lat - a.lat);
    let d_lng = to_rad(b.lng - a.lng);
    let la1 = to_rad(a.lat);
    let la2 = to_rad(b.lat);
    let h = (d_lat / 2.0).sin().powi(2) + la1.cos() * la2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Clamp a coordinate into the service circle around [`SERVICE_CENTER`].
///
/// Points inside the circle pass through unchanged. Points outside are pulled
/// radially inward to the boundary: the initial bearing from the center to
/// the point is computed, then the point at exactly `MAX_RADIUS_KM` along
/// that bearing (spherical forward projection). Idempotent.
pub fn clamp_to_service_radius(coord: Coordinate) -> Option<Coordinate> {
    if !is_valid(coord) {
        return None;
    }
    let dist = haversine_km(SERVICE_CENTER, coord);
    if dist <= MAX_RADIUS_KM {
        return Some(coord);
    }

    let lat1 = to_rad(SERVICE_CENTER.lat);
    let lng1 = to_rad(SERVICE_CENTER.lng);
    let lat2 = to_rad(coord.lat);
    let lng2 = to_rad(coord.lng);
    let d_lng = lng2 - lng1;
    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();
    let bearing = y.atan2(x);

    let angular_distance = MAX_RADIUS_KM / EARTH_RADIUS_KM;
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();
    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();

    let lat_clamped = (sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing.cos()).asin();
    let lng_clamped = lng1
        + (bearing.sin() * sin_ad * cos_lat1).atan2(cos_ad - sin_lat1 * lat_clamped.sin());

    Some(Coordinate {
        lat: lat_clamped.to_degrees(),
        lng: lng_clamped.to_degrees(),
    })
}

/// Two points within ~50 m render as one marker; the same threshold counts
/// as arrival at the destination.
pub fn too_close_to_distinguish(a: Coordinate, b: Coordinate) -> bool {
    haversine_km(a, b) <= ARRIVAL_THRESHOLD_KM
}

/// Sanitize a raw pair end to end: normalize ordering, then geofence-clamp.
pub fn sanitize_pair(a: f64, b: f64) -> Option<Coordinate> {
    normalize_pair(a, b).and_then(clamp_to_service_radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_coordinate_within_range() {
        assert!(is_valid(Coordinate::new(10.776, 106.700)));
    }

    #[test]
    fn zero_zero_is_sentinel_not_location() {
        assert!(!is_valid(Coordinate::new(0.0, 0.0)));
    }

    #[test]
    fn non_finite_components_are_invalid() {
        assert!(!is_valid(Coordinate::new(f64::NAN, 106.7)));
        assert!(!is_valid(Coordinate::new(10.7, f64::INFINITY)));
    }

    #[test]
    fn normalize_passes_ordered_pair_through() {
        let c = normalize_pair(10.77, 106.7).unwrap();
        assert_eq!(c.lat, 10.77);
        assert_eq!(c.lng, 106.7);
    }

    #[test]
    fn normalize_swaps_transposed_pair() {
        // First value outside latitude range, second fits longitude: swapped.
        let c = normalize_pair(106.7, 10.77).unwrap();
        assert_eq!(c.lat, 10.77);
        assert_eq!(c.lng, 106.7);
    }

    #[test]
    fn normalize_keeps_misordered_small_pair() {
        // Both <= 90 in magnitude: heuristic cannot detect transposition.
        let c = normalize_pair(45.0, 30.0).unwrap();
        assert_eq!(c.lat, 45.0);
        assert_eq!(c.lng, 30.0);
    }

    #[test]
    fn normalize_rejects_bad_input() {
        assert!(normalize_pair(f64::NAN, 106.7).is_none());
        assert!(normalize_pair(10.77, f64::NEG_INFINITY).is_none());
        assert!(normalize_pair(0.0, 0.0).is_none());
    }

    #[test]
    fn haversine_of_identical_points_is_zero() {
        let p = Coordinate::new(10.8231, 106.6297);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn haversine_demo_route_is_about_1_5_km() {
        let from = Coordinate::new(10.8331, 106.6197);
        let to = Coordinate::new(10.8231, 106.6297);
        let d = haversine_km(from, to);
        assert!(d > 1.4 && d < 1.7, "got {d}");
    }

    #[test]
    fn clamp_is_identity_inside_circle() {
        let p = Coordinate::new(10.78, 106.705);
        assert_eq!(clamp_to_service_radius(p), Some(p));
    }

    #[test]
    fn clamp_pulls_far_point_to_boundary() {
        let far = Coordinate::new(10.9, 107.0);
        let clamped = clamp_to_service_radius(far).unwrap();
        let d = haversine_km(SERVICE_CENTER, clamped);
        assert!((d - MAX_RADIUS_KM).abs() < 1e-6, "distance {d}");
    }

    #[test]
    fn clamp_is_idempotent() {
        let far = Coordinate::new(11.2, 106.1);
        let once = clamp_to_service_radius(far).unwrap();
        let twice = clamp_to_service_radius(once).unwrap();
        assert!((once.lat - twice.lat).abs() < 1e-9);
        assert!((once.lng - twice.lng).abs() < 1e-9);
    }

    #[test]
    fn clamp_rejects_invalid_input() {
        assert!(clamp_to_service_radius(Coordinate::new(0.0, 0.0)).is_none());
        assert!(clamp_to_service_radius(Coordinate::new(f64::NAN, 1.0)).is_none());
    }

    #[test]
    fn overlap_threshold_is_about_fifty_meters() {
        let a = Coordinate::new(10.7800, 106.7050);
        // ~33 m north: same marker. ~89 m north: distinct.
        assert!(too_close_to_distinguish(a, Coordinate::new(10.7803, 106.7050)));
        assert!(!too_close_to_distinguish(a, Coordinate::new(10.7808, 106.7050)));
    }

    #[test]
    fn sanitize_transposed_gps_never_renders_far_away() {
        // latitude=108, longitude=10.77: heuristic swaps, then the geofence
        // pulls the (still bogus) longitude back to the service boundary.
        let fixed = sanitize_pair(108.0, 10.77).unwrap();
        assert!(haversine_km(SERVICE_CENTER, fixed) <= MAX_RADIUS_KM + 1e-6);
    }
}
