//! End-to-end tests: export file in, CSV reports out.

use std::fs;
use std::path::Path;

use timeline_analyzer::reports::{
    build_trip_log, collect_visits, daily_distances, visit_rows, write_csv, ReportWriter,
};
use timeline_analyzer::{
    filter_significant_movements, load_timeline, Address, AnalyzerConfig, AnalyzerError,
    CachingGeocoder, GpsPoint, OfflineGeocoder, PointOfInterest, ReverseGeocoder, TimedPoint,
};

/// Resolves everything to the same street in 15831.
struct StreetGeocoder;

impl ReverseGeocoder for StreetGeocoder {
    async fn reverse_geocode(&self, _point: GpsPoint) -> Option<Address> {
        Some(Address {
            road: Some("Kirschenhof".to_string()),
            postcode: Some("15831".to_string()),
            village: Some("Mahlow".to_string()),
            ..Default::default()
        })
    }
}

const EXPORT: &str = r#"{
  "semanticSegments": [
    {
      "startTime": "2024-06-03T07:30:00.000+02:00",
      "endTime": "2024-06-03T08:00:00.000+02:00",
      "visit": { "topCandidate": {
        "placeId": "ChIJhome",
        "semanticType": "HOME",
        "placeLocation": { "latLng": "52.3660644°, 13.4110777°" } } }
    },
    {
      "startTime": "2024-06-03T08:00:00.000+02:00",
      "endTime": "2024-06-03T10:30:00.000+02:00",
      "timelinePath": [
        { "point": "52.3700000°, 13.4100000°", "time": "2024-06-03T08:05:00.000+02:00" },
        { "point": "52.3700100°, 13.4100000°", "time": "2024-06-03T08:06:00.000+02:00" },
        { "point": "52.0000000°, 12.9000000°", "time": "2024-06-03T09:00:00.000+02:00" },
        { "point": "51.3601066°, 12.3689064°", "time": "2024-06-03T10:30:00.000+02:00" }
      ]
    },
    {
      "startTime": "2024-06-03T18:00:00.000+02:00",
      "activity": {
        "start": { "latLng": "51.3601066°, 12.3689064°" },
        "end": { "latLng": "52.3660644°, 13.4110777°" },
        "distanceMeters": 152000.0,
        "topCandidate": { "type": "IN_PASSENGER_VEHICLE" } }
    },
    {
      "startTime": "2024-06-04T09:00:00.000+02:00",
      "visit": { "topCandidate": { "placeLocation": { "latLng": "48.1351000°, 11.5820000°" } } }
    },
    {
      "startTime": "2024-06-04T12:00:00.000+02:00",
      "timelinePath": [
        { "point": "48.1400000°, 11.5900000°", "time": "2024-06-04T12:10:00.000+02:00" },
        { "point": "48.1500000°, 11.6000000°", "time": "2024-06-04T12:20:00.000+02:00" }
      ]
    },
    { "startTime": "not a timestamp", "visit": {} },
    42
  ]
}"#;

fn write_export(dir: &Path) -> AnalyzerConfig {
    let input = dir.join("Zeitachse.json");
    fs::write(&input, EXPORT).unwrap();
    AnalyzerConfig {
        input_path: input,
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_one_relevant_day_one_summary_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_export(dir.path());
    let timeline = load_timeline(&config.input_path).unwrap();
    assert_eq!(timeline.skipped_entries, 1);

    let geocoder = CachingGeocoder::new(StreetGeocoder);
    let log = build_trip_log(&timeline, &config, &config.waypoint_selector(), &geocoder).await;

    assert_eq!(log.summaries.len(), 1);
    let day = &log.summaries[0];
    assert_eq!(day.date.to_string(), "2024-06-03");
    assert_eq!(day.reason, "Blankenfelde-Mahlow");

    // Recompute the expected post-filter route independently
    let mut points: Vec<TimedPoint> = Vec::new();
    for (segment, start) in timeline.segments_in_year(2024) {
        for (point, time) in timeline_analyzer::timeline::extract_timed_coordinates(segment) {
            let timed = TimedPoint::at(point, time.unwrap_or(start));
            if timed.date == day.date {
                points.push(timed);
            }
        }
    }
    points.sort_by_key(|p| p.time);
    let filtered = filter_significant_movements(&points, config.min_movement_km);

    assert_eq!(day.waypoint_count, filtered.len());
    assert_eq!(log.details.len(), filtered.len());
    assert_eq!(day.start_address.as_deref(), Some("Kirschenhof, 15831 Mahlow"));
    assert!((log.total_distance_km() - day.total_km).abs() < 1e-9);
}

#[tokio::test]
async fn test_priority_changes_reason() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_export(dir.path());
    config.reason_priority = vec!["Leipzig Geschäftsbereich".to_string()];
    let timeline = load_timeline(&config.input_path).unwrap();

    let log = build_trip_log(&timeline, &config, &config.waypoint_selector(), &OfflineGeocoder).await;
    assert_eq!(log.summaries[0].reason, "Leipzig Geschäftsbereich");
    assert!(log.details.iter().all(|d| d.reason == "Leipzig Geschäftsbereich"));
}

#[tokio::test]
async fn test_trip_log_csv_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_export(dir.path());
    let timeline = load_timeline(&config.input_path).unwrap();

    let log = build_trip_log(&timeline, &config, &config.waypoint_selector(), &OfflineGeocoder).await;
    write_csv(&config.trip_summary_path(), &log.summaries).unwrap();
    write_csv(&config.trip_detail_path(), &log.details).unwrap();

    let summary = fs::read_to_string(dir.path().join("trip_log_summary_2024.csv")).unwrap();
    let mut lines = summary.lines();
    assert_eq!(
        lines.next(),
        Some("Date,Reason,Start-time,End-time,Start-address,End-address,Total-distance-km,Waypoint-count")
    );
    let row = lines.next().unwrap();
    assert!(row.starts_with("2024-06-03,Blankenfelde-Mahlow,07:30:00,18:00:00,"));
    assert!(row.contains("\"Koordinate (52.36606, 13.41108)\""));
    assert_eq!(lines.next(), None);

    let detail = fs::read_to_string(dir.path().join("trip_log_detail_2024.csv")).unwrap();
    let mut lines = detail.lines();
    assert_eq!(
        lines.next(),
        Some("Date,Time,Lat,Lon,Address,Segment-distance-km,Cumulative-distance-km,Reason")
    );
    let first = lines.next().unwrap();
    assert!(first.starts_with("2024-06-03,07:30:00,52.366064,13.411078,"));
    assert!(first.ends_with(",0.000,0.000,Blankenfelde-Mahlow"));
}

#[tokio::test]
async fn test_visit_and_daily_distance_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_export(dir.path());
    let timeline = load_timeline(&config.input_path).unwrap();

    let visits = collect_visits(&timeline, &config, &StreetGeocoder).await;
    // Home visit and two nearby path points; the activity end repeats home
    assert_eq!(visits.len(), 3);

    write_csv(&config.visits_report_path(), &visit_rows(&visits)).unwrap();
    write_csv(&config.daily_distance_report_path(), &daily_distances(&visits)).unwrap();

    let report = fs::read_to_string(dir.path().join("visits_2024_15831.csv")).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(
        lines[0],
        "Visit-date,Time,Locality,Street,Postcode,Distance-since-previous-km"
    );
    assert_eq!(lines[1], "03.06.2024,07:30:00,Mahlow,Kirschenhof,15831,0.000");
    assert!(lines[2].starts_with("03.06.2024,08:05:00,Mahlow,Kirschenhof,15831,0.4"));
    assert_eq!(lines[3], "03.06.2024,08:06:00,Mahlow,Kirschenhof,15831,0.001");

    let daily = fs::read_to_string(dir.path().join("daily_distance_2024_15831.csv")).unwrap();
    let lines: Vec<&str> = daily.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("03.06.2024,0.4"));
}

#[tokio::test]
async fn test_custom_points_of_interest() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = write_export(dir.path());
    config.points_of_interest = vec![PointOfInterest::new(
        "Munich office",
        GpsPoint::new(48.1351, 11.5820),
        5.0,
    )];
    let timeline = load_timeline(&config.input_path).unwrap();

    let log = build_trip_log(&timeline, &config, &config.waypoint_selector(), &OfflineGeocoder).await;
    assert_eq!(log.summaries.len(), 1);
    assert_eq!(log.summaries[0].date.to_string(), "2024-06-04");
    assert_eq!(log.summaries[0].waypoint_count, 3);
}

#[tokio::test]
async fn test_failed_report_does_not_block_the_next() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_export(dir.path());
    let timeline = load_timeline(&config.input_path).unwrap();
    let log = build_trip_log(&timeline, &config, &config.waypoint_selector(), &OfflineGeocoder).await;

    // The summary lands below the export file, which is not a directory
    let summary_path = config.input_path.join("trip_log_summary_2024.csv");
    let detail_path = dir.path().join("out").join("trip_log_detail_2024.csv");

    let mut writer = ReportWriter::new();
    writer.write(&summary_path, &log.summaries);
    writer.write(&detail_path, &log.details);

    assert_eq!(writer.failed(), 1);
    assert!(matches!(writer.failures()[0], AnalyzerError::ReportWrite { .. }));
    assert!(!summary_path.exists());
    let detail = fs::read_to_string(&detail_path).unwrap();
    assert_eq!(detail.lines().count(), log.details.len() + 1);
}

#[test]
fn test_missing_and_malformed_input() {
    let dir = tempfile::tempdir().unwrap();

    let missing = load_timeline(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, AnalyzerError::InputNotFound { .. }));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ \"semanticSegments\": [").unwrap();
    let malformed = load_timeline(&broken).unwrap_err();
    assert!(matches!(malformed, AnalyzerError::InputMalformed { .. }));
    assert!(malformed.is_input_error());

    let not_object = dir.path().join("array.json");
    fs::write(&not_object, "[]").unwrap();
    assert!(load_timeline(&not_object).is_err());

    let empty = dir.path().join("empty.json");
    fs::write(&empty, "{}").unwrap();
    assert!(load_timeline(&empty).unwrap().segments.is_empty());
}
