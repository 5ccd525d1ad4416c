//! Result writers used by the `dupelint` binary.
//!
//! Each format is a [`LintSubscriber`] over any [`std::io::Write`]:
//!
//! - [`TextReport`]: human-readable, streamed as sets are resolved
//! - [`JsonReport`]: one document written when the run finishes
//! - [`CsvReport`]: one row per element, streamed
//!
//! Subscriber callbacks cannot fail, so write errors are kept and
//! returned by [`Report::finish`].
//!
//! # Example
//!
//! ```no_run
//! use dupelint::duplicates::DuplicateFinder;
//! use dupelint::emitter::Emitter;
//! use dupelint::output::JsonReport;
//! use std::path::PathBuf;
//!
//! let emitter = Emitter::new().with_subscriber(JsonReport::new(std::io::stdout()));
//! DuplicateFinder::default().run(vec![PathBuf::from(".")], &emitter).unwrap();
//! ```

pub mod csv;
pub mod json;
pub mod text;

use std::io;

use crate::emitter::LintSubscriber;

pub use self::csv::CsvReport;
pub use self::json::JsonReport;
pub use self::text::TextReport;

/// Errors raised while writing a report.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// The destination could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
}

/// A subscriber that writes somewhere and can fail doing so.
pub trait Report: LintSubscriber {
    /// Flush and return the first error met while writing.
    ///
    /// # Errors
    ///
    /// Returns the first [`OutputError`] recorded by any callback.
    fn finish(&mut self) -> Result<(), OutputError>;
}

/// Keep the first error of a sequence of writes.
#[derive(Debug, Default)]
struct FirstError(Option<OutputError>);

impl FirstError {
    fn record<E: Into<OutputError>>(&mut self, result: Result<(), E>) {
        if let Err(e) = result {
            if self.0.is_none() {
                let e = e.into();
                log::error!("Failed to write report: {}", e);
                self.0 = Some(e);
            }
        }
    }

    fn is_set(&self) -> bool {
        self.0.is_some()
    }

    fn take(&mut self) -> Result<(), OutputError> {
        self.0.take().map_or(Ok(()), Err)
    }
}
