//! CSV output, one row per duplicate file, streamed.
//!
//! # Columns
//!
//! - `set_id`: identifier shared by the members of a set
//! - `checksum`: content digest (hexadecimal)
//! - `algorithm`: checksum algorithm
//! - `path`: file path
//! - `size`: size in bytes
//! - `mtime`: modification time (RFC 3339)
//! - `is_original`: whether this file is the set's original
//! - `twin_count`: number of other files in the set

use std::io::Write;

use serde::Serialize;

use super::{FirstError, OutputError, Report};
use crate::emitter::{LintElement, LintSubscriber, RunOutcome};

#[derive(Debug, Serialize)]
struct CsvRow {
    set_id: usize,
    checksum: String,
    algorithm: &'static str,
    path: String,
    size: u64,
    mtime: String,
    is_original: bool,
    twin_count: usize,
}

impl From<&LintElement> for CsvRow {
    fn from(element: &LintElement) -> Self {
        let mtime: chrono::DateTime<chrono::Utc> = element.modified().into();
        Self {
            set_id: element.set_id(),
            checksum: element.digest().to_hex(),
            algorithm: element.digest().algorithm().name(),
            path: element.path().to_string_lossy().into_owned(),
            size: element.size(),
            mtime: mtime.to_rfc3339(),
            is_original: element.is_original(),
            twin_count: element.twin_count(),
        }
    }
}

/// Streaming CSV report.
pub struct CsvReport<W: Write> {
    writer: csv::Writer<W>,
    error: FirstError,
}

impl<W: Write> std::fmt::Debug for CsvReport<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvReport").finish_non_exhaustive()
    }
}

impl<W: Write> CsvReport<W> {
    /// Report to `out`. The header row is written with the first element.
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
            error: FirstError::default(),
        }
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_inner(self) -> Result<W, OutputError> {
        self.writer
            .into_inner()
            .map_err(|e| OutputError::Io(e.into_error()))
    }
}

impl<W: Write + Send> LintSubscriber for CsvReport<W> {
    fn on_element_added(&mut self, element: &LintElement) {
        if self.error.is_set() {
            return;
        }
        let result = self.writer.serialize(CsvRow::from(element));
        self.error.record(result);
    }

    fn on_finished(&mut self, _outcome: &RunOutcome) {
        let result = self.writer.flush();
        self.error.record(result);
    }
}

impl<W: Write + Send> Report for CsvReport<W> {
    fn finish(&mut self) -> Result<(), OutputError> {
        self.error.take()
    }
}
