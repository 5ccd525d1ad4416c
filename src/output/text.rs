//! Human-readable output.
//!
//! Every set is printed as soon as it is resolved:
//!
//! ```text
//! # 3 files of 12 B (blake3 9f86d081884c7d65)
//!   original /data/a.txt
//!   twin     /data/b.txt
//!   twin     /backup/a.txt
//! ```
//!
//! Duplicate directories follow, then a one-line summary and the
//! warnings of the run. Colors come from yansi and follow its global
//! switch.

use std::io::Write;

use bytesize::ByteSize;
use yansi::Paint;

use super::{FirstError, OutputError, Report};
use crate::duplicates::DirectoryGroup;
use crate::emitter::{LintElement, LintSubscriber, RunOutcome};

/// Streaming text report.
#[derive(Debug)]
pub struct TextReport<W: Write> {
    out: W,
    show_summary: bool,
    error: FirstError,
}

impl<W: Write> TextReport<W> {
    /// Report to `out`, with a summary footer.
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_summary: true,
            error: FirstError::default(),
        }
    }

    /// Leave out the footer (sets and directories only).
    #[must_use]
    pub fn without_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_element(&mut self, element: &LintElement) -> std::io::Result<()> {
        let path = element.path().display().to_string();
        if element.is_original() {
            writeln!(self.out, "  {} {}", "original".green(), path.bold())
        } else {
            writeln!(self.out, "  {}     {}", "twin".yellow(), path)
        }
    }

    fn write_set(&mut self, elements: &[LintElement]) -> std::io::Result<()> {
        let Some(first) = elements.first() else {
            return Ok(());
        };
        let hex = first.digest().to_hex();
        let short = &hex[..hex.len().min(16)];
        writeln!(
            self.out,
            "{} {} files of {} ({} {})",
            "#".dim(),
            elements.len(),
            ByteSize(first.size()),
            first.digest().algorithm(),
            short.dim()
        )?;
        for element in elements {
            self.write_element(element)?;
        }
        Ok(())
    }

    fn write_directory_group(&mut self, group: &DirectoryGroup) -> std::io::Result<()> {
        writeln!(
            self.out,
            "{} {} equal directories, {} files each",
            "#".dim(),
            group.directories.len(),
            group.file_count
        )?;
        for dir in &group.directories {
            writeln!(self.out, "  {}  {}", "dir".cyan(), dir.display())?;
        }
        Ok(())
    }

    fn write_footer(&mut self, outcome: &RunOutcome) -> std::io::Result<()> {
        let Ok(summary) = outcome else {
            return Ok(());
        };
        writeln!(self.out)?;
        writeln!(self.out, "{}", summary.message().bold())?;
        for warning in &summary.warnings {
            writeln!(self.out, "{} {}", "warning:".yellow().bold(), warning)?;
        }
        Ok(())
    }
}

impl<W: Write + Send> LintSubscriber for TextReport<W> {
    fn on_element_added(&mut self, element: &LintElement) {
        if self.error.is_set() {
            return;
        }
        let result = self.write_element(element);
        self.error.record(result);
    }

    fn on_set_resolved(&mut self, elements: &[LintElement]) {
        if self.error.is_set() {
            return;
        }
        let result = self.write_set(elements);
        self.error.record(result);
    }

    fn on_directory_group(&mut self, group: &DirectoryGroup) {
        if self.error.is_set() {
            return;
        }
        let result = self.write_directory_group(group);
        self.error.record(result);
    }

    fn on_finished(&mut self, outcome: &RunOutcome) {
        if self.show_summary && !self.error.is_set() {
            let result = self.write_footer(outcome);
            self.error.record(result);
        }
        let result = self.out.flush();
        self.error.record(result);
    }
}

impl<W: Write + Send> Report for TextReport<W> {
    fn finish(&mut self) -> Result<(), OutputError> {
        self.error.take()
    }
}
