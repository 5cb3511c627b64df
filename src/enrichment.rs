//! Address enrichment for trip-log routes.
//!
//! Reverse geocoding is slow and rate limited, so only a few points per route
//! get an address. A [`WaypointSelector`] decides which ones.

use std::collections::BTreeSet;

use chrono::Duration;
use log::debug;

use crate::geocode::ReverseGeocoder;
use crate::TimedPoint;

/// Chooses the route points that receive an address lookup.
pub trait WaypointSelector {
    /// Indices into `points`, ascending and unique.
    fn select(&self, points: &[TimedPoint]) -> Vec<usize>;
}

/// Start and end of the route only.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndpointSelector;

impl WaypointSelector for EndpointSelector {
    fn select(&self, points: &[TimedPoint]) -> Vec<usize> {
        match points.len() {
            0 => Vec::new(),
            1 => vec![0],
            n => vec![0, n - 1],
        }
    }
}

/// Start, end, and the points where the route paused longest.
///
/// A point qualifies when the time until the next point exceeds `min_gap`.
/// Qualifying points are taken largest gap first (later index first on ties)
/// until `max_lookups` points are selected.
#[derive(Debug, Clone, Copy)]
pub struct LongestStopSelector {
    pub max_lookups: usize,
    pub min_gap: Duration,
}

impl LongestStopSelector {
    pub fn new(max_lookups: usize, min_gap: Duration) -> Self {
        Self {
            max_lookups,
            min_gap,
        }
    }
}

impl Default for LongestStopSelector {
    fn default() -> Self {
        Self::new(5, Duration::minutes(30))
    }
}

impl WaypointSelector for LongestStopSelector {
    fn select(&self, points: &[TimedPoint]) -> Vec<usize> {
        let mut selected: BTreeSet<usize> = EndpointSelector.select(points).into_iter().collect();

        if points.len() > 2 {
            let mut gaps: Vec<(Duration, usize)> = points
                .windows(2)
                .enumerate()
                .map(|(i, w)| (w[1].time - w[0].time, i))
                .filter(|(gap, _)| *gap > self.min_gap)
                .collect();
            gaps.sort_by(|a, b| b.cmp(a));

            for (gap, idx) in gaps {
                if selected.len() >= self.max_lookups {
                    break;
                }
                if selected.insert(idx) {
                    debug!("[Enrichment] Stop at index {} ({} min)", idx, gap.num_minutes());
                }
            }
        }

        selected.into_iter().collect()
    }
}

/// Resolve addresses for the selected points of a route.
///
/// Points that already carry an address are left alone. A failed lookup, or one
/// that resolves to an empty label, stores the coordinate fallback label.
/// Returns the number of geocoder calls made.
pub async fn enrich_addresses<S, G>(points: &mut [TimedPoint], selector: &S, geocoder: &G) -> usize
where
    S: WaypointSelector + ?Sized,
    G: ReverseGeocoder,
{
    let mut lookups = 0;

    for idx in selector.select(points) {
        let Some(point) = points.get_mut(idx) else {
            continue;
        };
        if point.address.is_some() {
            continue;
        }

        lookups += 1;
        let label = geocoder
            .reverse_geocode(point.point)
            .await
            .map(|address| address.label())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| point.point.coordinate_label());
        point.address = Some(label);
    }

    lookups
}
