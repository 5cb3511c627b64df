//! Significant-movement filtering.
//!
//! Location exports over-sample stationary periods: a parked car or an office
//! visit produces many points within a few meters of each other. Reporting each
//! of them would create phantom stops, so routes are reduced to the points that
//! actually moved.

use crate::geo_utils::distance_km;
use crate::TimedPoint;

/// Default minimum movement between kept points (100 m).
pub const DEFAULT_MIN_MOVEMENT_KM: f64 = 0.1;

/// Reduce a time-ordered route to its significant movements.
///
/// Greedy and order preserving:
/// - routes of two points or fewer are returned unchanged
/// - the first point is always kept
/// - a later point is kept when it is at least `min_movement_km` away from the
///   most recently kept point
/// - the last point is always kept, appended if the rule above dropped it
///
/// # Example
/// ```
/// use chrono::DateTime;
/// use timeline_analyzer::{filter_significant_movements, GpsPoint, TimedPoint};
///
/// let t = DateTime::parse_from_rfc3339("2024-03-05T08:00:00+01:00").unwrap();
/// let at = |lat: f64| TimedPoint::new(GpsPoint::new(lat, 13.4), t, t.date_naive());
///
/// // Second point moved ~1m, third ~1.1km
/// let route = vec![at(52.0), at(52.00001), at(52.01)];
/// let kept = filter_significant_movements(&route, 0.1);
/// assert_eq!(kept.len(), 2);
/// ```
pub fn filter_significant_movements(points: &[TimedPoint], min_movement_km: f64) -> Vec<TimedPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut kept_indices = vec![0usize];
    for (i, current) in points.iter().enumerate().skip(1) {
        let last_kept = &points[kept_indices[kept_indices.len() - 1]];
        if distance_km(&last_kept.point, &current.point) >= min_movement_km {
            kept_indices.push(i);
        }
    }

    let last = points.len() - 1;
    if kept_indices[kept_indices.len() - 1] != last {
        kept_indices.push(last);
    }

    kept_indices.into_iter().map(|i| points[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpsPoint;
    use chrono::{DateTime, Duration};

    fn route(lats: &[f64]) -> Vec<TimedPoint> {
        let start = DateTime::parse_from_rfc3339("2024-03-05T08:00:00+01:00").unwrap();
        lats.iter()
            .enumerate()
            .map(|(i, &lat)| {
                let t = start + Duration::minutes(i as i64);
                TimedPoint::new(GpsPoint::new(lat, 13.4), t, t.date_naive())
            })
            .collect()
    }

    #[test]
    fn test_short_routes_unchanged() {
        assert!(filter_significant_movements(&[], 0.1).is_empty());

        let one = route(&[52.0]);
        assert_eq!(filter_significant_movements(&one, 0.1), one);

        // Two identical points are still returned as-is
        let two = route(&[52.0, 52.0]);
        assert_eq!(filter_significant_movements(&two, 0.1), two);
    }

    #[test]
    fn test_stationary_cluster_collapses() {
        // 0.0001 deg latitude is ~11m
        let points = route(&[52.0, 52.0001, 52.0002, 52.0003, 52.0004]);
        let kept = filter_significant_movements(&points, 0.1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0], points[0]);
        assert_eq!(kept[1], points[4]);
    }

    #[test]
    fn test_distance_measured_from_last_kept_point() {
        // Each step ~67m: individually below threshold, cumulatively not
        let points = route(&[52.0, 52.0006, 52.0012, 52.0018, 52.0024]);
        let kept = filter_significant_movements(&points, 0.1);
        let kept_lats: Vec<f64> = kept.iter().map(|p| p.point.latitude).collect();
        assert_eq!(kept_lats, vec![52.0, 52.0012, 52.0024]);
    }

    #[test]
    fn test_last_point_not_duplicated() {
        let points = route(&[52.0, 52.01, 52.02]);
        let kept = filter_significant_movements(&points, 0.1);
        assert_eq!(kept, points);
    }

    #[test]
    fn test_invariants_on_mixed_route() {
        let points = route(&[52.0, 52.0001, 52.005, 52.0051, 52.0052, 52.02, 52.0201]);
        let threshold = 0.1;
        let kept = filter_significant_movements(&points, threshold);

        assert_eq!(kept.first(), points.first());
        assert_eq!(kept.last(), points.last());

        // Every consecutive kept pair except the forced final point honors the threshold
        for pair in kept[..kept.len() - 1].windows(2) {
            assert!(distance_km(&pair[0].point, &pair[1].point) >= threshold);
        }

        // Order preserved
        for pair in kept.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }
}
