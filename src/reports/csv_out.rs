//! CSV output shared by all reports.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::error::{AnalyzerError, Result};

/// A report row with a fixed column layout.
pub trait CsvRow {
    const HEADERS: &'static [&'static str];

    /// Formatted cells, in `HEADERS` order.
    fn fields(&self) -> Vec<String>;
}

/// Write a header row followed by `rows`.
pub fn write_rows<W: Write, R: CsvRow>(writer: W, rows: &[R]) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(R::HEADERS)?;
    for row in rows {
        wtr.write_record(row.fields())?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write `rows` to `path`, replacing any existing file.
pub fn write_csv<R: CsvRow>(path: &Path, rows: &[R]) -> Result<()> {
    let to_error = |source: csv::Error| AnalyzerError::ReportWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::create(path).map_err(|e| to_error(e.into()))?;
    write_rows(file, rows).map_err(to_error)?;

    info!("[Reports] Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Writes a run's reports one after another.
///
/// A failed write is logged and counted; later writes still happen.
#[derive(Debug, Default)]
pub struct ReportWriter {
    written: Vec<(PathBuf, usize)>,
    failures: Vec<AnalyzerError>,
}

impl ReportWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the parent directory if needed and write `rows` to `path`.
    /// Returns whether the file was written.
    pub fn write<R: CsvRow>(&mut self, path: &Path, rows: &[R]) -> bool {
        match create_parent(path).and_then(|()| write_csv(path, rows)) {
            Ok(()) => {
                self.written.push((path.to_path_buf(), rows.len()));
                true
            }
            Err(e) => {
                error!("[Reports] {}", e);
                self.failures.push(e);
                false
            }
        }
    }

    /// Files written so far, with their row counts.
    pub fn written(&self) -> &[(PathBuf, usize)] {
        &self.written
    }

    pub fn failures(&self) -> &[AnalyzerError] {
        &self.failures
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

fn create_parent(path: &Path) -> Result<()> {
    match path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        Some(dir) => std::fs::create_dir_all(dir).map_err(|e| AnalyzerError::ReportWrite {
            path: path.to_path_buf(),
            source: e.into(),
        }),
        None => Ok(()),
    }
}
