//! Distance covered per day between visits near the target.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::geo_utils::polyline_length_km;
use crate::reports::{CsvRow, VisitRecord};
use crate::{GpsPoint, TimedPoint};

#[derive(Debug, Clone, PartialEq)]
pub struct DailyDistance {
    pub date: NaiveDate,
    pub total_km: f64,
}

impl CsvRow for DailyDistance {
    const HEADERS: &'static [&'static str] = &["Date", "Total-distance-km"];

    fn fields(&self) -> Vec<String> {
        vec![
            self.date.format("%d.%m.%Y").to_string(),
            format!("{:.3}", self.total_km),
        ]
    }
}

/// Sum of consecutive distances per visit date, oldest day first.
///
/// Days with a single visit report `0.0`.
pub fn daily_distances(visits: &[VisitRecord]) -> Vec<DailyDistance> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&TimedPoint>> = BTreeMap::new();
    for visit in visits {
        by_day.entry(visit.point.date).or_default().push(&visit.point);
    }

    by_day
        .into_iter()
        .map(|(date, mut points)| {
            points.sort_by_key(|p| p.time);
            let route: Vec<GpsPoint> = points.iter().map(|p| p.point).collect();
            DailyDistance {
                date,
                total_km: polyline_length_km(&route),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::distance_km;
    use chrono::DateTime;

    fn visit(ts: &str, lat: f64) -> VisitRecord {
        let time = DateTime::parse_from_rfc3339(ts).unwrap();
        VisitRecord {
            point: TimedPoint::new(GpsPoint::new(lat, 13.4110777), time, time.date_naive()),
            address: None,
            distance_from_target_km: 0.0,
        }
    }

    #[test]
    fn test_grouped_and_sorted_by_day() {
        let visits = vec![
            visit("2024-05-02T10:00:00+02:00", 52.3700),
            visit("2024-05-01T18:00:00+02:00", 52.3600),
            visit("2024-05-01T08:00:00+02:00", 52.3660),
            visit("2024-05-01T12:00:00+02:00", 52.3700),
        ];

        let days = daily_distances(&visits);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(days[1].total_km, 0.0);

        // 08:00 -> 12:00 -> 18:00
        let a = GpsPoint::new(52.3660, 13.4110777);
        let b = GpsPoint::new(52.3700, 13.4110777);
        let c = GpsPoint::new(52.3600, 13.4110777);
        let expected = distance_km(&a, &b) + distance_km(&b, &c);
        assert!((days[0].total_km - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_visits_no_days() {
        assert!(daily_distances(&[]).is_empty());
    }

    #[test]
    fn test_row_format() {
        let row = DailyDistance {
            date: NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(),
            total_km: 12.34567,
        };
        assert_eq!(row.fields(), vec!["09.01.2024", "12.346"]);
    }
}
