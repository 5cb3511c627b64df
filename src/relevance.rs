//! Point-of-interest classification.
//!
//! A coordinate belongs to the first configured point of interest whose circle
//! contains it. Relevance is decided per day: one matching coordinate makes the
//! whole day relevant, and every point of that day carries the day's reason.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::geo_utils::distance_km;
use crate::timeline::{extract_coordinates, Segment};
use crate::{GpsPoint, Timestamp};

/// A named reference location with an inclusion radius.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfInterest {
    /// Label used as the trip reason
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    /// Display address, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl PointOfInterest {
    pub fn new(name: impl Into<String>, center: GpsPoint, radius_km: f64) -> Self {
        Self {
            name: name.into(),
            latitude: center.latitude,
            longitude: center.longitude,
            radius_km,
            address: None,
        }
    }

    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// True if `point` lies within the radius (boundary inclusive).
    pub fn contains(&self, point: &GpsPoint) -> bool {
        distance_km(&self.center(), point) <= self.radius_km
    }
}

/// First point of interest containing `point`, in configured order.
pub fn classify<'a>(point: &GpsPoint, pois: &'a [PointOfInterest]) -> Option<&'a PointOfInterest> {
    pois.iter().find(|poi| poi.contains(point))
}

/// Position of `label` in the priority list; unlisted labels rank last.
fn priority_rank(label: &str, priority: &[String]) -> usize {
    priority
        .iter()
        .position(|p| p == label)
        .unwrap_or(priority.len())
}

/// Relevant days and the reason resolved for each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayReasons {
    reasons: BTreeMap<NaiveDate, String>,
}

impl DayReasons {
    /// Resolve day reasons over dated segments.
    ///
    /// Only the first matching coordinate of each segment counts. The first
    /// reason seen for a day stands unless a later one ranks strictly higher in
    /// `priority`.
    pub fn resolve<'a, I>(segments: I, pois: &[PointOfInterest], priority: &[String]) -> Self
    where
        I: IntoIterator<Item = (&'a Segment, Timestamp)>,
    {
        let mut day_reasons = Self::default();

        for (segment, start) in segments {
            let date = start.date_naive();
            let matched = extract_coordinates(segment)
                .iter()
                .find_map(|p| classify(p, pois));
            if let Some(poi) = matched {
                day_reasons.record(date, &poi.name, priority);
            }
        }

        day_reasons
    }

    /// Record `reason` for `date`, honoring the priority rule.
    pub fn record(&mut self, date: NaiveDate, reason: &str, priority: &[String]) {
        match self.reasons.get_mut(&date) {
            None => {
                debug!("[DayReasons] {} relevant: {}", date, reason);
                self.reasons.insert(date, reason.to_string());
            }
            Some(current) => {
                if priority_rank(reason, priority) < priority_rank(current, priority) {
                    debug!("[DayReasons] {} reason {} replaced by {}", date, current, reason);
                    *current = reason.to_string();
                }
            }
        }
    }

    pub fn reason(&self, date: NaiveDate) -> Option<&str> {
        self.reasons.get(&date).map(String::as_str)
    }

    pub fn is_relevant(&self, date: NaiveDate) -> bool {
        self.reasons.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.reasons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Days in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &str)> {
        self.reasons.iter().map(|(d, r)| (*d, r.as_str()))
    }
}
