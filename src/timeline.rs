//! Location-history export model and coordinate extraction.
//!
//! The export is a JSON object with a `semanticSegments` array. Each segment has
//! a start time and one of three payloads: a `visit` (best candidate place), an
//! `activity` (start and end point) or a `timelinePath` (sampled points).
//!
//! Parsing is lenient below the segment level: any sub-field that is missing,
//! `null` or of the wrong JSON type is treated as absent, and coordinate strings
//! that do not parse are dropped. Only a document that is not JSON, or whose top
//! level is not an object, is rejected.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{AnalyzerError, Result};
use crate::{GpsPoint, Timestamp};

// ============================================================================
// Public model
// ============================================================================

/// Best-candidate place of a visit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Visit {
    pub location: Option<GpsPoint>,
    pub semantic_type: Option<String>,
    pub place_id: Option<String>,
}

/// A movement between two places.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub start: Option<GpsPoint>,
    pub end: Option<GpsPoint>,
    /// e.g. `IN_PASSENGER_VEHICLE`
    pub activity_type: Option<String>,
    pub distance_meters: Option<f64>,
}

/// One sample of a timeline path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathPoint {
    pub point: Option<GpsPoint>,
    pub time: Option<Timestamp>,
}

/// Segment payload.
///
/// Well-formed exports carry exactly one payload per segment. Malformed ones
/// can populate several keys at once, and every populated one is kept.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Visit(Visit),
    Activity(Activity),
    Path(Vec<PathPoint>),
}

/// Coarse segment classification used in diagnostics output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Visit,
    Activity,
    Timeline,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Visit => "visit",
            SegmentKind::Activity => "activity",
            SegmentKind::Timeline => "timeline",
        }
    }
}

/// One dated record of the export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    /// `None` when missing or unparsable; such segments are skipped by every report.
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// In extraction order: visit, activity, path.
    pub payloads: Vec<Payload>,
}

impl Segment {
    /// Calendar day of the start time, in the offset the export recorded.
    pub fn date(&self) -> Option<NaiveDate> {
        self.start_time.map(|t| t.date_naive())
    }

    pub fn kind(&self) -> SegmentKind {
        match self.payloads.first() {
            Some(Payload::Visit(_)) => SegmentKind::Visit,
            Some(Payload::Activity(_)) => SegmentKind::Activity,
            Some(Payload::Path(_)) | None => SegmentKind::Timeline,
        }
    }
}

/// A loaded export.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub segments: Vec<Segment>,
    /// Entries of `semanticSegments` that were not JSON objects.
    pub skipped_entries: usize,
}

impl Timeline {
    /// Parse an export from a JSON string.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        // A map only deserializes from a JSON object
        let mut root: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let entries = match root.remove("semanticSegments") {
            Some(serde_json::Value::Array(entries)) => entries,
            _ => Vec::new(),
        };

        let mut segments = Vec::with_capacity(entries.len());
        let mut skipped_entries = 0;
        for entry in entries {
            if !entry.is_object() {
                skipped_entries += 1;
                continue;
            }
            match serde_json::from_value::<RawSegment>(entry) {
                Ok(seg) => segments.push(Segment::from(seg)),
                Err(_) => skipped_entries += 1,
            }
        }

        Ok(Self {
            segments,
            skipped_entries,
        })
    }

    /// Segments whose start time falls in `year`, paired with that start time.
    pub fn segments_in_year(&self, year: i32) -> impl Iterator<Item = (&Segment, Timestamp)> {
        self.segments.iter().filter_map(move |seg| {
            let start = seg.start_time?;
            (start.year() == year).then_some((seg, start))
        })
    }
}

/// Load and parse an export file.
pub fn load_timeline(path: &Path) -> Result<Timeline> {
    let contents = fs::read_to_string(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            AnalyzerError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            AnalyzerError::InputRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let timeline = Timeline::from_json_str(&contents).map_err(|source| {
        AnalyzerError::InputMalformed {
            path: path.to_path_buf(),
            source,
        }
    })?;

    info!(
        "[Timeline] Loaded {} segments from {} ({} unusable entries)",
        timeline.segments.len(),
        path.display(),
        timeline.skipped_entries
    );
    Ok(timeline)
}

// ============================================================================
// Extraction
// ============================================================================

/// All coordinates of a segment, in order: visit place, activity start and
/// end, then every path point.
///
/// # Example
/// ```
/// use timeline_analyzer::{extract_coordinates, GpsPoint, Payload, Segment};
/// use timeline_analyzer::timeline::Activity;
///
/// let segment = Segment {
///     payloads: vec![Payload::Activity(Activity {
///         start: Some(GpsPoint::new(52.36, 13.41)),
///         end: Some(GpsPoint::new(51.36, 12.37)),
///         ..Default::default()
///     })],
///     ..Default::default()
/// };
/// assert_eq!(extract_coordinates(&segment).len(), 2);
/// ```
pub fn extract_coordinates(segment: &Segment) -> Vec<GpsPoint> {
    extract_timed_coordinates(segment)
        .into_iter()
        .map(|(point, _)| point)
        .collect()
}

/// Like [`extract_coordinates`], with the path point's own timestamp where the
/// export has one.
pub fn extract_timed_coordinates(segment: &Segment) -> Vec<(GpsPoint, Option<Timestamp>)> {
    let mut coords = Vec::new();

    for payload in &segment.payloads {
        match payload {
            Payload::Visit(visit) => {
                coords.extend(visit.location.map(|p| (p, None)));
            }
            Payload::Activity(activity) => {
                coords.extend(activity.start.map(|p| (p, None)));
                coords.extend(activity.end.map(|p| (p, None)));
            }
            Payload::Path(points) => {
                coords.extend(points.iter().filter_map(|pp| pp.point.map(|p| (p, pp.time))));
            }
        }
    }

    coords
}

/// Parse an export timestamp.
///
/// Accepts RFC 3339 (`2024-03-05T08:15:00.000+01:00`), naive date-times (read
/// as UTC) and bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }

    let utc = FixedOffset::east_opt(0)?;
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    utc.from_local_datetime(&naive).single()
}

fn parse_point(raw: Option<String>) -> Option<GpsPoint> {
    let raw = raw?;
    match raw.parse() {
        Ok(p) => Some(p),
        Err(e) => {
            debug!("[Timeline] Dropping coordinate {:?}: {}", raw, e);
            None
        }
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSegment {
    #[serde(default, deserialize_with = "lenient")]
    start_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    end_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    visit: Option<RawVisit>,
    #[serde(default, deserialize_with = "lenient")]
    activity: Option<RawActivity>,
    #[serde(default, deserialize_with = "lenient_vec")]
    timeline_path: Option<Vec<RawPathPoint>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVisit {
    #[serde(default, deserialize_with = "lenient")]
    top_candidate: Option<RawPlaceCandidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlaceCandidate {
    #[serde(default, deserialize_with = "lenient")]
    place_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    semantic_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    place_location: Option<RawLocation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLocation {
    #[serde(default, deserialize_with = "lenient")]
    lat_lng: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawActivity {
    #[serde(default, deserialize_with = "lenient")]
    start: Option<RawLocation>,
    #[serde(default, deserialize_with = "lenient")]
    end: Option<RawLocation>,
    #[serde(default, deserialize_with = "lenient")]
    distance_meters: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    top_candidate: Option<RawActivityCandidate>,
}

#[derive(Debug, Default, Deserialize)]
struct RawActivityCandidate {
    #[serde(default, rename = "type", deserialize_with = "lenient")]
    activity_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPathPoint {
    #[serde(default, deserialize_with = "lenient")]
    point: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    time: Option<String>,
}

/// Deserialize a field, mapping any shape mismatch to `None`.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Deserialize an array field, dropping elements of the wrong shape.
fn lenient_vec<'de, D, T>(deserializer: D) -> std::result::Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

impl From<RawSegment> for Segment {
    fn from(raw: RawSegment) -> Self {
        let mut payloads = Vec::new();

        if let Some(visit) = raw.visit {
            let candidate = visit.top_candidate.unwrap_or_default();
            payloads.push(Payload::Visit(Visit {
                location: parse_point(candidate.place_location.and_then(|l| l.lat_lng)),
                semantic_type: candidate.semantic_type,
                place_id: candidate.place_id,
            }));
        }

        if let Some(activity) = raw.activity {
            payloads.push(Payload::Activity(Activity {
                start: parse_point(activity.start.and_then(|l| l.lat_lng)),
                end: parse_point(activity.end.and_then(|l| l.lat_lng)),
                activity_type: activity.top_candidate.and_then(|c| c.activity_type),
                distance_meters: activity.distance_meters,
            }));
        }

        if let Some(path) = raw.timeline_path {
            payloads.push(Payload::Path(
                path.into_iter()
                    .map(|pp| PathPoint {
                        point: parse_point(pp.point),
                        time: pp.time.as_deref().and_then(parse_timestamp),
                    })
                    .collect(),
            ));
        }

        Segment {
            start_time: raw.start_time.as_deref().and_then(parse_timestamp),
            end_time: raw.end_time.as_deref().and_then(parse_timestamp),
            payloads,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
