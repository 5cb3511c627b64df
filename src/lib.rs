//! # Timeline Analyzer
//!
//! Visit extraction, daily travel distances and trip logs from a personal
//! location-history export (Google Timeline `semanticSegments` JSON).
//!
//! This library provides:
//! - Lenient parsing of semantic segments into typed visits, activities and paths
//! - Haversine distances and per-segment route distances
//! - Significant-movement filtering of noisy coordinate sequences
//! - Point-of-interest classification with day-level reasons
//! - Bounded reverse-geocoding enrichment with a rate-limited client
//! - CSV reports: visits near a target, daily distance, trip log
//!
//! ## Features
//!
//! - **`http`** (default) - Enable the Nominatim reverse-geocoding client
//!
//! ## Quick Start
//!
//! ```rust
//! use timeline_analyzer::{geo_utils, GpsPoint};
//!
//! let berlin: GpsPoint = "52.5200°, 13.4050°".parse().unwrap();
//! let paris = GpsPoint::new(48.8566, 2.3522);
//!
//! let km = geo_utils::distance_km(&berlin, &paris);
//! assert!((km - 878.0).abs() < 9.0);
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub use error::{AnalyzerError, CoordinateParseError, Result};

// Input model and coordinate extraction
pub mod timeline;
pub use timeline::{extract_coordinates, load_timeline, Payload, Segment, Timeline};

// Distances
pub mod geo_utils;

// Significant-movement filtering
pub mod movement;
pub use movement::filter_significant_movements;

// Point-of-interest classification
pub mod relevance;
pub use relevance::{classify, DayReasons, PointOfInterest};

// Reverse geocoding
pub mod geocode;
pub use geocode::{Address, CachingGeocoder, OfflineGeocoder, ReverseGeocoder};

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::NominatimClient;

// Which route points get an address
pub mod enrichment;
pub use enrichment::{EndpointSelector, LongestStopSelector, WaypointSelector};

pub mod config;
pub use config::{AnalyzerConfig, GeocoderConfig, TargetArea};

// Report pipelines and CSV output
pub mod reports;

// Coverage summary around the target area
pub mod diagnostics;

/// Timestamp as carried by the export (local time with its UTC offset).
pub type Timestamp = DateTime<FixedOffset>;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude in decimal degrees.
///
/// # Example
/// ```
/// use timeline_analyzer::GpsPoint;
/// let point = GpsPoint::new(52.3660644, 13.4110777);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Coordinate rounded to six decimals, used for deduplication and caching.
pub type CoordKey = (i64, i64);

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Key of this point rounded to six decimal places (~0.1m).
    pub fn rounded_key(&self) -> CoordKey {
        (
            (self.latitude * 1e6).round() as i64,
            (self.longitude * 1e6).round() as i64,
        )
    }

    /// Fallback label used in reports when no address is known.
    pub fn coordinate_label(&self) -> String {
        format!("Koordinate ({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

impl fmt::Display for GpsPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°, {}°", self.latitude, self.longitude)
    }
}

/// Parses the export encoding `"52.3660644°, 13.4110777°"`.
impl FromStr for GpsPoint {
    type Err = CoordinateParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once("°, ")
            .ok_or_else(|| CoordinateParseError::Shape(s.to_string()))?;
        if lon.contains("°, ") {
            return Err(CoordinateParseError::Shape(s.to_string()));
        }

        let point = GpsPoint::new(parse_degrees(lat)?, parse_degrees(lon)?);
        if !point.is_valid() {
            return Err(CoordinateParseError::OutOfRange {
                latitude: point.latitude,
                longitude: point.longitude,
            });
        }
        Ok(point)
    }
}

fn parse_degrees(raw: &str) -> std::result::Result<f64, CoordinateParseError> {
    raw.replace('°', "")
        .trim()
        .parse::<f64>()
        .map_err(|_| CoordinateParseError::InvalidNumber(raw.to_string()))
}

/// Interop with `geo` algorithms; `geo` stores `x = longitude`.
impl From<GpsPoint> for geo::Point<f64> {
    fn from(p: GpsPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

impl From<geo::Point<f64>> for GpsPoint {
    fn from(p: geo::Point<f64>) -> Self {
        GpsPoint::new(p.y(), p.x())
    }
}

/// A coordinate observed at a point in time, as it flows through the report
/// pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedPoint {
    pub point: GpsPoint,
    /// Path point time when the export has one, otherwise the segment start.
    pub time: Timestamp,
    /// Calendar day of `time`.
    pub date: NaiveDate,
    /// Resolved address label, filled in for a bounded subset of points.
    pub address: Option<String>,
    /// Point-of-interest label inherited from the day.
    pub reason: Option<String>,
}

impl TimedPoint {
    pub fn new(point: GpsPoint, time: Timestamp, date: NaiveDate) -> Self {
        Self {
            point,
            time,
            date,
            address: None,
            reason: None,
        }
    }

    /// A point dated by its own timestamp.
    pub fn at(point: GpsPoint, time: Timestamp) -> Self {
        Self::new(point, time, time.date_naive())
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
