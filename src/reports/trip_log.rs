//! Trip log for mileage recordkeeping.
//!
//! A day enters the log when any of its coordinates falls inside a point of
//! interest. All of that day's coordinates then form its route, which is
//! reduced to significant movements, partially enriched with addresses and
//! measured.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use log::{debug, info};

use crate::config::AnalyzerConfig;
use crate::enrichment::{enrich_addresses, WaypointSelector};
use crate::geo_utils::{cumulative_distances, distances_since_previous};
use crate::geocode::ReverseGeocoder;
use crate::movement::filter_significant_movements;
use crate::relevance::DayReasons;
use crate::reports::CsvRow;
use crate::timeline::{extract_timed_coordinates, Timeline};
use crate::{GpsPoint, TimedPoint};

const UNKNOWN_ADDRESS: &str = "Unbekannt";

/// One logged day.
#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    pub date: NaiveDate,
    pub reason: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub start_address: Option<String>,
    pub end_address: Option<String>,
    pub total_km: f64,
    pub waypoint_count: usize,
}

impl CsvRow for TripSummary {
    const HEADERS: &'static [&'static str] = &[
        "Date",
        "Reason",
        "Start-time",
        "End-time",
        "Start-address",
        "End-address",
        "Total-distance-km",
        "Waypoint-count",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.reason.clone(),
            self.start_time.format("%H:%M:%S").to_string(),
            self.end_time.format("%H:%M:%S").to_string(),
            self.start_address.as_deref().unwrap_or(UNKNOWN_ADDRESS).to_string(),
            self.end_address.as_deref().unwrap_or(UNKNOWN_ADDRESS).to_string(),
            format!("{:.2}", self.total_km),
            self.waypoint_count.to_string(),
        ]
    }
}

/// One waypoint of a logged day.
#[derive(Debug, Clone, PartialEq)]
pub struct TripDetailRow {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub point: GpsPoint,
    pub address: Option<String>,
    /// Distance from the previous waypoint; 0 for the first.
    pub segment_km: f64,
    pub cumulative_km: f64,
    pub reason: String,
}

impl CsvRow for TripDetailRow {
    const HEADERS: &'static [&'static str] = &[
        "Date",
        "Time",
        "Lat",
        "Lon",
        "Address",
        "Segment-distance-km",
        "Cumulative-distance-km",
        "Reason",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.date.format("%Y-%m-%d").to_string(),
            self.time.format("%H:%M:%S").to_string(),
            format!("{:.6}", self.point.latitude),
            format!("{:.6}", self.point.longitude),
            self.address.clone().unwrap_or_default(),
            format!("{:.3}", self.segment_km),
            format!("{:.3}", self.cumulative_km),
            self.reason.clone(),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripLog {
    pub summaries: Vec<TripSummary>,
    pub details: Vec<TripDetailRow>,
    /// Relevant days left out because too little movement remained.
    pub skipped_days: Vec<NaiveDate>,
}

impl TripLog {
    pub fn total_distance_km(&self) -> f64 {
        self.summaries.iter().map(|s| s.total_km).sum()
    }

    /// Mean distance per logged day; 0 when nothing was logged.
    pub fn average_per_day(&self) -> f64 {
        if self.summaries.is_empty() {
            0.0
        } else {
            self.total_distance_km() / self.summaries.len() as f64
        }
    }
}

/// Build the trip log for `config.year`.
pub async fn build_trip_log<S, G>(
    timeline: &Timeline,
    config: &AnalyzerConfig,
    selector: &S,
    geocoder: &G,
) -> TripLog
where
    S: WaypointSelector + ?Sized,
    G: ReverseGeocoder,
{
    let reasons = DayReasons::resolve(
        timeline.segments_in_year(config.year),
        &config.points_of_interest,
        &config.reason_priority,
    );
    info!("[TripLog] {} relevant days in {}", reasons.len(), config.year);
    for (date, reason) in reasons.iter() {
        debug!("[TripLog]   {}: {}", date, reason);
    }

    let mut routes: BTreeMap<NaiveDate, Vec<TimedPoint>> = BTreeMap::new();
    for (segment, start) in timeline.segments_in_year(config.year) {
        for (point, time) in extract_timed_coordinates(segment) {
            // Path points after midnight belong to the next day's route
            let timed = TimedPoint::at(point, time.unwrap_or(start));
            let Some(reason) = reasons.reason(timed.date) else {
                continue;
            };
            routes.entry(timed.date).or_default().push(timed.with_reason(reason));
        }
    }

    let mut log = TripLog::default();
    for (date, mut points) in routes {
        let reason = reasons.reason(date).unwrap_or_default().to_string();

        points.sort_by_key(|p| p.time);
        let mut route = filter_significant_movements(&points, config.min_movement_km);
        if route.len() < 2 {
            info!("[TripLog] {} ({}): skipped, {} points", date, reason, route.len());
            log.skipped_days.push(date);
            continue;
        }

        let lookups = enrich_addresses(&mut route, selector, geocoder).await;

        let coords: Vec<GpsPoint> = route.iter().map(|p| p.point).collect();
        let segments = distances_since_previous(&coords);
        let cumulative = cumulative_distances(&coords);
        let total_km = cumulative.last().copied().unwrap_or(0.0);

        let first = &route[0];
        let last = &route[route.len() - 1];
        log.summaries.push(TripSummary {
            date,
            reason: reason.clone(),
            start_time: first.time.time(),
            end_time: last.time.time(),
            start_address: first.address.clone(),
            end_address: last.address.clone(),
            total_km,
            waypoint_count: route.len(),
        });

        info!(
            "[TripLog] {} ({}): {} points, {} after filtering, {} lookups, {:.2} km",
            date,
            reason,
            points.len(),
            route.len(),
            lookups,
            total_km
        );

        log.details.extend(
            route
                .into_iter()
                .zip(segments.into_iter().zip(cumulative))
                .map(|(p, (segment_km, cumulative_km))| TripDetailRow {
                    date,
                    time: p.time.time(),
                    point: p.point,
                    address: p.address,
                    segment_km,
                    cumulative_km,
                    reason: reason.clone(),
                }),
        );
    }

    log
}
