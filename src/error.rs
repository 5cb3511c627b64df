//! Unified error type for the analyzer.
//!
//! Only input problems and report-write failures surface as errors. Record-level
//! data quality issues are skipped silently and gateway failures degrade to
//! "no address", so neither has a variant here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while loading input, configuration or writing reports.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// The input export does not exist.
    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The input export exists but could not be read.
    #[error("failed to read input file {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not a valid timeline document.
    #[error("input file {} is not a valid timeline document: {source}", path.display())]
    InputMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A report could not be written.
    #[error("failed to write report {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The configuration file is unreadable or contains invalid values.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The geocoding client could not be constructed.
    #[error("geocoder setup failed: {0}")]
    Geocoder(String),
}

impl AnalyzerError {
    /// True for errors that mean the input could not be used at all.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. } | Self::InputRead { .. } | Self::InputMalformed { .. }
        )
    }
}

/// Why a textual `"lat°, lon°"` coordinate was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateParseError {
    #[error("expected `lat°, lon°`, got {0:?}")]
    Shape(String),

    #[error("not a number: {0:?}")]
    InvalidNumber(String),

    #[error("coordinate out of range: {latitude}, {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, AnalyzerError>;
