//! # Geographic Utilities
//!
//! Great-circle distances and route reductions used by every report.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance_km`] | Haversine distance between two GPS points |
//! | [`route_distances`] | Per-segment distances of an ordered route plus their total |
//! | [`polyline_length_km`] | Total length of an ordered route |
//! | [`distances_since_previous`] | Distance of every point from its predecessor (first is 0) |
//! | [`cumulative_distances`] | Running total at every point (first is 0) |
//!
//! ## Example
//!
//! ```rust
//! use timeline_analyzer::{GpsPoint, geo_utils};
//!
//! let route = vec![
//!     GpsPoint::new(52.3660, 13.4110),
//!     GpsPoint::new(52.3700, 13.4150),
//!     GpsPoint::new(52.3800, 13.4200),
//! ];
//!
//! let (segments, total) = geo_utils::route_distances(&route);
//! assert_eq!(segments.len(), 2);
//! assert!((segments.iter().sum::<f64>() - total).abs() < 1e-9);
//! ```
//!
//! ## Algorithm Notes
//!
//! The haversine formula assumes a spherical Earth. The radius is fixed at
//! 6371 km so report distances stay comparable between runs and tools;
//! `geo::Haversine` uses the 6371.0088 km mean radius instead.
//!
//! Reference: [Haversine formula (Wikipedia)](https://en.wikipedia.org/wiki/Haversine_formula)

use crate::GpsPoint;

/// Earth radius used for all distance calculations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points in kilometers.
///
/// # Example
///
/// ```rust
/// use timeline_analyzer::{GpsPoint, geo_utils};
///
/// let berlin = GpsPoint::new(52.5200, 13.4050);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::distance_km(&berlin, &paris);
/// assert!((distance - 878.0).abs() < 8.78); // within 1%
/// ```
#[inline]
pub fn distance_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let phi1 = p1.latitude.to_radians();
    let phi2 = p2.latitude.to_radians();
    let d_phi = (p2.latitude - p1.latitude).to_radians();
    let d_lambda = (p2.longitude - p1.longitude).to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Per-segment distances and total length of an ordered route.
///
/// Segment `i` is the distance between `points[i]` and `points[i + 1]`, so
/// callers can index the result to report cumulative distance per stop.
/// Routes with fewer than two points yield `(vec![], 0.0)`.
pub fn route_distances(points: &[GpsPoint]) -> (Vec<f64>, f64) {
    if points.len() < 2 {
        return (Vec::new(), 0.0);
    }

    let segments: Vec<f64> = points
        .windows(2)
        .map(|w| distance_km(&w[0], &w[1]))
        .collect();
    let total = segments.iter().sum();

    (segments, total)
}

/// Total length of an ordered route in kilometers.
pub fn polyline_length_km(points: &[GpsPoint]) -> f64 {
    route_distances(points).1
}

/// Distance of each point from the previous one; the first point gets 0.
///
/// Same length as the input.
pub fn distances_since_previous(points: &[GpsPoint]) -> Vec<f64> {
    if points.is_empty() {
        return Vec::new();
    }
    let (segments, _) = route_distances(points);
    std::iter::once(0.0).chain(segments).collect()
}

/// Running distance total at each point; the first point gets 0.
///
/// Same length as the input.
pub fn cumulative_distances(points: &[GpsPoint]) -> Vec<f64> {
    let mut total = 0.0;
    distances_since_previous(points)
        .into_iter()
        .map(|d| {
            total += d;
            total
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
