//! JSON output.
//!
//! Elements are collected while the run streams and written as one
//! document when it finishes:
//!
//! ```json
//! {
//!   "header": { "program": "dupelint", "version": "0.1.0", "algorithm": "blake3", ... },
//!   "elements": [
//!     { "set_id": 0, "path": "/a", "size": 12, "is_original": true, "twin_count": 1, ... }
//!   ],
//!   "directories": [ { "digest_count": 2, "file_count": 2, "directories": ["/r/a", "/r/b"] } ],
//!   "footer": { "duplicates": 1, "duplicate_sets": 1, "total_files": 3, "warnings": [], ... }
//! }
//! ```
//!
//! Elements are ordered by set id, then by position in the set, so the
//! document does not depend on hashing order. Nothing is written for a
//! failed run; the error is reported on stderr instead.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{FirstError, OutputError, Report};
use crate::duplicates::{DirectoryGroup, RunSummary};
use crate::emitter::{LintElement, LintRecord, LintSubscriber, RunOutcome};
use crate::error::ExitCode;
use crate::scanner::Warning;

/// Run metadata.
#[derive(Debug, Clone, Serialize)]
pub struct JsonHeader {
    /// Always "dupelint"
    pub program: &'static str,
    /// Crate version
    pub version: &'static str,
    /// Checksum algorithm of every digest in the document
    pub algorithm: String,
    /// Walked roots
    pub roots: Vec<PathBuf>,
    /// When the document was written
    pub generated_at: DateTime<Utc>,
}

/// Run totals.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFooter {
    /// Duplicate files, excluding originals
    pub duplicates: usize,
    /// Duplicate sets
    pub duplicate_sets: usize,
    /// Files considered
    pub total_files: usize,
    /// Bytes considered
    pub total_size: u64,
    /// Bytes held by duplicates
    pub reclaimable_space: u64,
    /// Files dropped because their size was unique
    pub eliminated_by_size: usize,
    /// Files dropped after the prefix stage
    pub eliminated_by_prefix: usize,
    /// Bytes read for hashing
    pub bytes_hashed: u64,
    /// Groups of equal directories
    pub directory_groups: usize,
    /// Wall time in milliseconds
    pub duration_ms: u64,
    /// Non-fatal problems
    pub warnings: Vec<Warning>,
    /// Exit code of the binary for this run
    pub exit_code: i32,
    /// Machine-readable exit code name (e.g. "DL000")
    pub exit_code_name: &'static str,
}

impl JsonFooter {
    /// Build the footer of a completed run.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        let exit_code = ExitCode::from_summary(summary);
        Self {
            duplicates: summary.duplicate_files,
            duplicate_sets: summary.duplicate_sets,
            total_files: summary.total_files,
            total_size: summary.total_size,
            reclaimable_space: summary.reclaimable_space,
            eliminated_by_size: summary.eliminated_by_size,
            eliminated_by_prefix: summary.eliminated_by_prefix,
            bytes_hashed: summary.bytes_hashed,
            directory_groups: summary.directory_groups,
            duration_ms: u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            warnings: summary.warnings.clone(),
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix(),
        }
    }
}

/// Complete JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDocument {
    /// Run metadata
    pub header: JsonHeader,
    /// One record per duplicate file
    pub elements: Vec<LintRecord>,
    /// Groups of equal directories
    pub directories: Vec<DirectoryGroup>,
    /// Run totals
    pub footer: JsonFooter,
}

/// Collecting JSON report.
#[derive(Debug)]
pub struct JsonReport<W: Write> {
    out: W,
    pretty: bool,
    elements: Vec<LintRecord>,
    directories: Vec<DirectoryGroup>,
    error: FirstError,
}

impl<W: Write> JsonReport<W> {
    /// Pretty-printed report to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            pretty: true,
            elements: Vec::new(),
            directories: Vec::new(),
            error: FirstError::default(),
        }
    }

    /// Write the document on a single line.
    #[must_use]
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Assemble the document for a completed run.
    ///
    /// Consumes the collected elements and directories.
    pub fn document(&mut self, summary: &RunSummary) -> JsonDocument {
        let mut elements = std::mem::take(&mut self.elements);
        // stable: members of one set keep their order
        elements.sort_by_key(|record| record.set_id);
        JsonDocument {
            header: JsonHeader {
                program: env!("CARGO_PKG_NAME"),
                version: env!("CARGO_PKG_VERSION"),
                algorithm: summary.algorithm.to_string(),
                roots: summary.roots.clone(),
                generated_at: Utc::now(),
            },
            elements,
            directories: std::mem::take(&mut self.directories),
            footer: JsonFooter::from_summary(summary),
        }
    }

    fn write_document(&mut self, summary: &RunSummary) -> Result<(), OutputError> {
        let document = self.document(summary);
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, &document)?;
        } else {
            serde_json::to_writer(&mut self.out, &document)?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> LintSubscriber for JsonReport<W> {
    fn on_element_added(&mut self, element: &LintElement) {
        self.elements.push(element.to_record());
    }

    fn on_directory_group(&mut self, group: &DirectoryGroup) {
        self.directories.push(group.clone());
    }

    fn on_finished(&mut self, outcome: &RunOutcome) {
        if let Ok(summary) = outcome {
            let result = self.write_document(summary);
            self.error.record(result);
        }
    }
}

impl<W: Write + Send> Report for JsonReport<W> {
    fn finish(&mut self) -> Result<(), OutputError> {
        self.error.take()
    }
}
