//! Analyzer configuration.
//!
//! Every pipeline receives an [`AnalyzerConfig`] explicitly. Defaults describe
//! the reference setup (target around Kirschenhof, Blankenfelde-Mahlow, plus a
//! Leipzig business area); a JSON file can override any subset of fields.
//!
//! ```json
//! {
//!   "year": 2023,
//!   "target": { "postcode": null, "radiusKm": 5.0 },
//!   "pointsOfInterest": [
//!     { "name": "Office", "latitude": 52.52, "longitude": 13.405, "radiusKm": 1.0 }
//!   ],
//!   "geocoder": { "minIntervalMs": 1500 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::enrichment::LongestStopSelector;
use crate::error::{AnalyzerError, Result};
use crate::geo_utils::distance_km;
use crate::movement::DEFAULT_MIN_MOVEMENT_KM;
use crate::relevance::PointOfInterest;
use crate::GpsPoint;

/// Lowest permitted spacing between geocoding requests.
pub const MIN_GEOCODER_INTERVAL_MS: u64 = 500;
/// Highest permitted spacing between geocoding requests (one hour).
pub const MAX_GEOCODER_INTERVAL_MS: u64 = 60 * 60 * 1000;
pub const MAX_GEOCODER_TIMEOUT_SECS: u64 = 300;
pub const MAX_GEOCODER_RETRIES: u32 = 10;
/// Longest stop gap worth configuring (one week).
pub const MAX_STOP_GAP_MINUTES: i64 = 7 * 24 * 60;

/// Area the visit report looks at.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetArea {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    /// When set, only visits whose resolved address has this postcode count.
    pub postcode: Option<String>,
}

impl Default for TargetArea {
    fn default() -> Self {
        Self {
            latitude: 52.3660644,
            longitude: 13.4110777,
            radius_km: 2.0,
            postcode: Some("15831".to_string()),
        }
    }
}

impl TargetArea {
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Distance of `point` from the center when it lies inside the radius.
    pub fn distance_if_inside(&self, point: &GpsPoint) -> Option<f64> {
        let d = distance_km(&self.center(), point);
        (d <= self.radius_km).then_some(d)
    }
}

/// Reverse-geocoding client settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeocoderConfig {
    /// `false` runs offline: no lookups, every address is unknown.
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
    /// Spacing between request starts. Nominatim allows one request per second.
    pub min_interval_ms: u64,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "Timeline-Analysis-Script for Personal Use".to_string(),
            min_interval_ms: 1000,
            timeout_secs: 10,
            max_retries: 3,
        }
    }
}

/// Configuration for all report pipelines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerConfig {
    /// Location-history export to read.
    pub input_path: PathBuf,
    /// Directory the CSV reports are written to.
    pub output_dir: PathBuf,
    /// Only segments starting in this year are analyzed.
    pub year: i32,
    pub target: TargetArea,
    /// Checked in order; the first containing circle names the reason.
    pub points_of_interest: Vec<PointOfInterest>,
    /// Reason labels, highest priority first. A day's reason is replaced only
    /// by a label ranked strictly higher than the current one.
    pub reason_priority: Vec<String>,
    /// Minimum distance between kept trip-log points.
    pub min_movement_km: f64,
    /// Upper bound on address lookups per trip-log day.
    pub max_address_lookups: usize,
    /// Time gaps longer than this mark a stop worth an address.
    pub min_stop_gap_minutes: i64,
    pub geocoder: GeocoderConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("Zeitachse.json"),
            output_dir: PathBuf::from("."),
            year: 2024,
            target: TargetArea::default(),
            points_of_interest: vec![
                PointOfInterest {
                    name: "Blankenfelde-Mahlow".to_string(),
                    latitude: 52.3660644,
                    longitude: 13.4110777,
                    radius_km: 2.0,
                    address: Some("Kirschenhof 2, 15831 Blankenfelde-Mahlow".to_string()),
                },
                PointOfInterest {
                    name: "Leipzig Geschäftsbereich".to_string(),
                    latitude: 51.36010668944128,
                    longitude: 12.368906495788186,
                    radius_km: 20.0,
                    address: Some("Leipzig (Geschäftsbereich)".to_string()),
                },
            ],
            reason_priority: Vec::new(),
            min_movement_km: DEFAULT_MIN_MOVEMENT_KM,
            max_address_lookups: 5,
            min_stop_gap_minutes: 30,
            geocoder: GeocoderConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load a configuration file; fields it omits keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AnalyzerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            AnalyzerError::Config(format!("cannot parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipelines cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(AnalyzerError::Config(msg));

        if !self.target.center().is_valid() {
            return invalid(format!(
                "target center {} is not a valid coordinate",
                self.target.center()
            ));
        }
        if !(self.target.radius_km > 0.0 && self.target.radius_km.is_finite()) {
            return invalid(format!("target radius must be positive, got {}", self.target.radius_km));
        }

        for poi in &self.points_of_interest {
            if poi.name.trim().is_empty() {
                return invalid("point of interest without a name".to_string());
            }
            if !poi.center().is_valid() {
                return invalid(format!("point of interest {:?} has an invalid center", poi.name));
            }
            if !(poi.radius_km > 0.0 && poi.radius_km.is_finite()) {
                return invalid(format!(
                    "point of interest {:?} needs a positive radius, got {}",
                    poi.name, poi.radius_km
                ));
            }
        }

        if !(self.min_movement_km > 0.0 && self.min_movement_km.is_finite()) {
            return invalid(format!("minMovementKm must be positive, got {}", self.min_movement_km));
        }
        if self.max_address_lookups < 2 {
            return invalid(format!(
                "maxAddressLookups must cover at least start and end, got {}",
                self.max_address_lookups
            ));
        }
        if !(0..=MAX_STOP_GAP_MINUTES).contains(&self.min_stop_gap_minutes) {
            return invalid(format!(
                "minStopGapMinutes must be between 0 and {}, got {}",
                MAX_STOP_GAP_MINUTES, self.min_stop_gap_minutes
            ));
        }

        if self.geocoder.enabled {
            let interval = self.geocoder.min_interval_ms;
            if !(MIN_GEOCODER_INTERVAL_MS..=MAX_GEOCODER_INTERVAL_MS).contains(&interval) {
                return invalid(format!(
                    "geocoder.minIntervalMs must be between {} and {}, got {}",
                    MIN_GEOCODER_INTERVAL_MS, MAX_GEOCODER_INTERVAL_MS, interval
                ));
            }
            if !(1..=MAX_GEOCODER_TIMEOUT_SECS).contains(&self.geocoder.timeout_secs) {
                return invalid(format!(
                    "geocoder.timeoutSecs must be between 1 and {}, got {}",
                    MAX_GEOCODER_TIMEOUT_SECS, self.geocoder.timeout_secs
                ));
            }
            if self.geocoder.max_retries > MAX_GEOCODER_RETRIES {
                return invalid(format!(
                    "geocoder.maxRetries must be at most {}, got {}",
                    MAX_GEOCODER_RETRIES, self.geocoder.max_retries
                ));
            }
        }

        Ok(())
    }

    /// Address selection policy for trip-log days.
    ///
    /// Out-of-range gaps are clamped; `validate` reports them.
    pub fn waypoint_selector(&self) -> LongestStopSelector {
        let gap = self.min_stop_gap_minutes.clamp(0, MAX_STOP_GAP_MINUTES);
        LongestStopSelector::new(self.max_address_lookups, chrono::Duration::minutes(gap))
    }

    fn postcode_suffix(&self) -> String {
        match &self.target.postcode {
            Some(postcode) => format!("_{}", postcode),
            None => String::new(),
        }
    }

    pub fn visits_report_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("visits_{}{}.csv", self.year, self.postcode_suffix()))
    }

    pub fn daily_distance_report_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("daily_distance_{}{}.csv", self.year, self.postcode_suffix()))
    }

    pub fn trip_summary_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("trip_log_summary_{}.csv", self.year))
    }

    pub fn trip_detail_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("trip_log_detail_{}.csv", self.year))
    }
}
