//! Report pipelines.
//!
//! | Report | Builder | Row type |
//! |--------|---------|----------|
//! | Visits near the target | [`collect_visits`] | [`VisitRow`] |
//! | Daily distance | [`daily_distances`] | [`DailyDistance`] |
//! | Trip log | [`build_trip_log`] | [`TripSummary`], [`TripDetailRow`] |
//!
//! Builders return plain rows; [`write_csv`] turns any of them into a file and
//! [`ReportWriter`] writes a run's reports, carrying on past failures.

pub mod csv_out;
pub mod daily_distance;
pub mod proximity;
pub mod trip_log;

pub use csv_out::{write_csv, write_rows, CsvRow, ReportWriter};
pub use daily_distance::{daily_distances, DailyDistance};
pub use proximity::{collect_visits, visit_rows, VisitRecord, VisitRow};
pub use trip_log::{build_trip_log, TripDetailRow, TripLog, TripSummary};
