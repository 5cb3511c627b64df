//! Visits near the target area.
//!
//! Every in-year coordinate within the target radius is looked up once per
//! rounded position. With a target postcode configured, only points whose
//! resolved address carries that postcode are kept.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime};
use log::{debug, info};

use crate::config::AnalyzerConfig;
use crate::geo_utils::distances_since_previous;
use crate::geocode::{Address, ReverseGeocoder};
use crate::reports::CsvRow;
use crate::timeline::{extract_timed_coordinates, Timeline};
use crate::{CoordKey, GpsPoint, TimedPoint};

const NOT_AVAILABLE: &str = "N/A";

/// A point near the target that passed the postcode check.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRecord {
    pub point: TimedPoint,
    pub address: Option<Address>,
    pub distance_from_target_km: f64,
}

impl VisitRecord {
    pub fn locality(&self) -> &str {
        self.address
            .as_ref()
            .and_then(Address::locality)
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn street(&self) -> &str {
        self.address
            .as_ref()
            .and_then(|a| a.road.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn postcode(&self) -> &str {
        self.address
            .as_ref()
            .and_then(|a| a.postcode.as_deref())
            .filter(|s| !s.is_empty())
            .unwrap_or(NOT_AVAILABLE)
    }
}

/// Collect visits near `config.target`, sorted by time.
pub async fn collect_visits<G: ReverseGeocoder>(
    timeline: &Timeline,
    config: &AnalyzerConfig,
    geocoder: &G,
) -> Vec<VisitRecord> {
    let target = &config.target;
    let mut processed: HashSet<CoordKey> = HashSet::new();
    let mut visits = Vec::new();
    let mut in_radius = 0usize;
    let mut rejected = 0usize;

    for (segment, start) in timeline.segments_in_year(config.year) {
        for (point, time) in extract_timed_coordinates(segment) {
            let time = time.unwrap_or(start);
            if time.year() != config.year {
                continue;
            }
            let Some(distance) = target.distance_if_inside(&point) else {
                continue;
            };
            in_radius += 1;

            // Repeated positions are looked up once, whatever the outcome
            if !processed.insert(point.rounded_key()) {
                continue;
            }

            let address = geocoder.reverse_geocode(point).await;
            if let Some(wanted) = &target.postcode {
                let postcode = address.as_ref().and_then(|a| a.postcode.as_deref());
                if postcode != Some(wanted.as_str()) {
                    debug!("[Visits] {} rejected, postcode {:?}", point, postcode);
                    rejected += 1;
                    continue;
                }
            }

            visits.push(VisitRecord {
                point: TimedPoint::at(point, time),
                address,
                distance_from_target_km: distance,
            });
        }
    }

    visits.sort_by_key(|v| v.point.time);

    info!(
        "[Visits] {} visits in {} ({} points in radius, {} unique, {} rejected by postcode)",
        visits.len(),
        config.year,
        in_radius,
        processed.len(),
        rejected
    );
    visits
}

/// One line of the visit report.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRow {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub locality: String,
    pub street: String,
    pub postcode: String,
    pub distance_since_previous_km: f64,
}

impl CsvRow for VisitRow {
    const HEADERS: &'static [&'static str] = &[
        "Visit-date",
        "Time",
        "Locality",
        "Street",
        "Postcode",
        "Distance-since-previous-km",
    ];

    fn fields(&self) -> Vec<String> {
        vec![
            self.date.format("%d.%m.%Y").to_string(),
            self.time.format("%H:%M:%S").to_string(),
            self.locality.clone(),
            self.street.clone(),
            self.postcode.clone(),
            format!("{:.3}", self.distance_since_previous_km),
        ]
    }
}

/// Report rows for time-sorted visits.
pub fn visit_rows(visits: &[VisitRecord]) -> Vec<VisitRow> {
    let points: Vec<GpsPoint> = visits.iter().map(|v| v.point.point).collect();

    visits
        .iter()
        .zip(distances_since_previous(&points))
        .map(|(visit, distance)| VisitRow {
            date: visit.point.date,
            time: visit.point.time.time(),
            locality: visit.locality().to_string(),
            street: visit.street().to_string(),
            postcode: visit.postcode().to_string(),
            distance_since_previous_km: distance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::OfflineGeocoder;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Postcode 15831 north of the target center, 15827 south of it.
    struct SplitGeocoder {
        calls: AtomicU32,
    }

    impl ReverseGeocoder for SplitGeocoder {
        async fn reverse_geocode(&self, point: GpsPoint) -> Option<Address> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let north = point.latitude >= 52.3660644;
            Some(Address {
                road: north.then(|| "Kirschenhof".to_string()),
                postcode: Some(if north { "15831" } else { "15827" }.to_string()),
                village: Some("Mahlow".to_string()),
                ..Default::default()
            })
        }
    }

    fn export() -> Timeline {
        Timeline::from_json_str(
            r#"{ "semanticSegments": [
                { "startTime": "2024-05-01T08:00:00.000+02:00",
                  "visit": { "topCandidate": { "placeLocation": { "latLng": "52.3660644°, 13.4110777°" } } } },
                { "startTime": "2024-05-02T17:00:00.000+02:00",
                  "timelinePath": [
                    { "point": "52.3700000°, 13.4110777°", "time": "2024-05-02T17:05:00.000+02:00" },
                    { "point": "52.3660644°, 13.4110777°", "time": "2024-05-02T17:10:00.000+02:00" },
                    { "point": "52.3600000°, 13.4110777°", "time": "2024-05-02T17:15:00.000+02:00" },
                    { "point": "52.5200000°, 13.4050000°", "time": "2024-05-02T17:20:00.000+02:00" }
                  ] },
                { "startTime": "2023-12-31T08:00:00.000+01:00",
                  "visit": { "topCandidate": { "placeLocation": { "latLng": "52.3680000°, 13.4110777°" } } } }
            ] }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_postcode_filter_and_dedup() {
        let config = AnalyzerConfig::default();
        let geocoder = SplitGeocoder {
            calls: AtomicU32::new(0),
        };

        let visits = collect_visits(&export(), &config, &geocoder).await;

        // Berlin is out of radius, the 2023 visit is out of year, the path
        // repeats the home visit and the southern point has the wrong postcode
        assert_eq!(geocoder.calls.load(Ordering::Relaxed), 3);
        let lats: Vec<f64> = visits.iter().map(|v| v.point.point.latitude).collect();
        assert_eq!(lats, vec![52.3660644, 52.37]);
        assert_eq!(visits[0].point.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[tokio::test]
    async fn test_without_postcode_keeps_unresolved_points() {
        let mut config = AnalyzerConfig::default();
        config.target.postcode = None;

        let visits = collect_visits(&export(), &config, &OfflineGeocoder).await;
        assert_eq!(visits.len(), 3);
        assert!(visits.iter().all(|v| v.address.is_none()));
        assert!(visits.windows(2).all(|w| w[0].point.time <= w[1].point.time));

        let rows = visit_rows(&visits);
        assert_eq!(rows[0].locality, "N/A");
        assert_eq!(rows[0].street, "N/A");
        assert_eq!(rows[0].distance_since_previous_km, 0.0);
    }

    #[tokio::test]
    async fn test_postcode_without_address_is_dropped() {
        let config = AnalyzerConfig::default();
        let visits = collect_visits(&export(), &config, &OfflineGeocoder).await;
        assert!(visits.is_empty());
    }

    #[tokio::test]
    async fn test_path_points_dated_by_their_own_time() {
        let timeline = Timeline::from_json_str(
            r#"{ "semanticSegments": [
                { "startTime": "2024-05-02T23:50:00.000+02:00",
                  "timelinePath": [
                    { "point": "52.3660644°, 13.4110777°", "time": "2024-05-02T23:55:00.000+02:00" },
                    { "point": "52.3700000°, 13.4110777°", "time": "2024-05-03T00:05:00.000+02:00" }
                  ] },
                { "startTime": "2024-12-31T23:50:00.000+01:00",
                  "timelinePath": [
                    { "point": "52.3680000°, 13.4110777°", "time": "2025-01-01T00:10:00.000+01:00" }
                  ] }
            ] }"#,
        )
        .unwrap();
        let mut config = AnalyzerConfig::default();
        config.target.postcode = None;

        let visits = collect_visits(&timeline, &config, &OfflineGeocoder).await;
        // The New Year's point belongs to 2025
        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].point.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(visits[1].point.date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
        assert_eq!(visit_rows(&visits)[1].fields()[0], "03.05.2024");
    }

    #[tokio::test]
    async fn test_visit_row_formatting() {
        let config = AnalyzerConfig::default();
        let geocoder = SplitGeocoder {
            calls: AtomicU32::new(0),
        };
        let visits = collect_visits(&export(), &config, &geocoder).await;
        let rows = visit_rows(&visits);

        assert_eq!(
            rows[0].fields(),
            vec!["01.05.2024", "08:00:00", "Mahlow", "Kirschenhof", "15831", "0.000"]
        );
        // 52.3660644 -> 52.37 is ~0.438km
        let second = rows[1].fields();
        assert_eq!(second[0], "02.05.2024");
        assert_eq!(second[1], "17:05:00");
        assert_eq!(second[5], "0.438");
    }
}
