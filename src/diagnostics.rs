//! Coverage summary around the target area.
//!
//! Answers "why is my visit report empty?": how many in-year segments and
//! coordinates the export has, how many fall inside the target radius, and
//! what each day with in-radius data looks like.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::config::AnalyzerConfig;
use crate::geo_utils::polyline_length_km;
use crate::timeline::{extract_timed_coordinates, SegmentKind, Timeline};
use crate::{GpsPoint, Timestamp};

/// Points shown at each end of a day before eliding the middle.
const PREVIEW_POINTS: usize = 3;

/// An in-radius coordinate and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledPoint {
    pub time: Timestamp,
    pub point: GpsPoint,
    pub distance_from_target_km: f64,
    pub kind: SegmentKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayDiagnostics {
    pub date: NaiveDate,
    /// Sorted by time.
    pub points: Vec<SampledPoint>,
    /// Sequential distance over `points`.
    pub distance_km: f64,
}

impl DayDiagnostics {
    pub fn first(&self) -> Option<&SampledPoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&SampledPoint> {
        self.points.last()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagnosticReport {
    pub year: i32,
    pub total_segments: usize,
    pub segments_in_year: usize,
    pub coordinates_found: usize,
    pub coordinates_in_radius: usize,
    /// Days with at least one in-radius coordinate, oldest first.
    pub days: Vec<DayDiagnostics>,
}

/// Summarize coverage of `config.target` in `config.year`.
pub fn diagnose(timeline: &Timeline, config: &AnalyzerConfig) -> DiagnosticReport {
    let mut report = DiagnosticReport {
        year: config.year,
        total_segments: timeline.segments.len(),
        ..Default::default()
    };
    let mut by_day: BTreeMap<NaiveDate, Vec<SampledPoint>> = BTreeMap::new();

    for (segment, start) in timeline.segments_in_year(config.year) {
        report.segments_in_year += 1;
        let coords = extract_timed_coordinates(segment);
        report.coordinates_found += coords.len();

        for (point, time) in coords {
            let time = time.unwrap_or(start);
            if time.year() != config.year {
                continue;
            }
            let Some(distance) = config.target.distance_if_inside(&point) else {
                continue;
            };
            report.coordinates_in_radius += 1;
            by_day.entry(time.date_naive()).or_default().push(SampledPoint {
                time,
                point,
                distance_from_target_km: distance,
                kind: segment.kind(),
            });
        }
    }

    report.days = by_day
        .into_iter()
        .map(|(date, mut points)| {
            points.sort_by_key(|p| p.time);
            let route: Vec<GpsPoint> = points.iter().map(|p| p.point).collect();
            DayDiagnostics {
                date,
                distance_km: polyline_length_km(&route),
                points,
            }
        })
        .collect();

    report
}

impl fmt::Display for SampledPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ({:.6}, {:.6}) - {}",
            self.time.format("%H:%M:%S"),
            self.point.latitude,
            self.point.longitude,
            self.kind.as_str()
        )
    }
}

impl fmt::Display for DayDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {} coordinates", self.date.format("%d.%m.%Y"), self.points.len())?;
        writeln!(f, "  Day distance: {:.3} km", self.distance_km)?;
        if let (Some(first), Some(last)) = (self.first(), self.last()) {
            writeln!(f, "  First: {} ({})", first.time.format("%H:%M:%S"), first.kind.as_str())?;
            writeln!(f, "  Last:  {} ({})", last.time.format("%H:%M:%S"), last.kind.as_str())?;
        }

        let n = self.points.len();
        if n > 2 * PREVIEW_POINTS {
            for p in &self.points[..PREVIEW_POINTS] {
                writeln!(f, "    {}", p)?;
            }
            writeln!(f, "    ...")?;
            for p in &self.points[n - PREVIEW_POINTS..] {
                writeln!(f, "    {}", p)?;
            }
        } else {
            for p in &self.points {
                writeln!(f, "    {}", p)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for DiagnosticReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Segments total:        {}", self.total_segments)?;
        writeln!(f, "Segments in {}:      {}", self.year, self.segments_in_year)?;
        writeln!(f, "Coordinates found:     {}", self.coordinates_found)?;
        writeln!(f, "Coordinates in radius: {}", self.coordinates_in_radius)?;
        writeln!(f, "Days with data:        {}", self.days.len())?;
        for day in &self.days {
            writeln!(f)?;
            write!(f, "{}", day)?;
        }
        Ok(())
    }
}
