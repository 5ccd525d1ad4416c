//! Progress reporting.
//!
//! The engine reports through the [`ProgressCallback`] trait; [`Progress`]
//! renders it with indicatif. Phases run one after another, so a single
//! bar is active at a time:
//!
//! - `walking`: spinner counting discovered files
//! - `prefix`: bar over the candidates of all size groups
//! - `full`: bar over the candidates left after the prefix stage
//!
//! Callbacks arrive from the I/O pool, so implementations must be
//! `Send + Sync`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress callback for the phases of a run.
pub trait ProgressCallback: Send + Sync {
    /// A phase starts. `total` is 0 when unknown (walking).
    fn on_phase_start(&self, phase: &str, total: usize);

    /// `current` items of the phase are done; `path` is the latest one.
    fn on_progress(&self, current: usize, path: &str);

    /// A file of `bytes` bytes was fully hashed.
    fn on_item_completed(&self, _bytes: u64) {}

    /// A phase ended.
    fn on_phase_end(&self, phase: &str);

    /// Free-form status text.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress bars.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    bytes: AtomicU64,
    quiet: bool,
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").field("quiet", &self.quiet).finish()
    }
}

impl Progress {
    /// Create a reporter. A quiet reporter draws nothing.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            bytes: AtomicU64::new(0),
            quiet,
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = &*self.bar.lock().unwrap_or_else(PoisonError::into_inner) {
            f(bar);
        }
    }

    fn style(phase: &str) -> ProgressStyle {
        let template = match phase {
            "walking" => "{spinner:.green} {prefix} [{elapsed_precise}] {pos} files {msg}",
            "full" => {
                "{prefix:>8} [{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} {msg} (ETA: {eta})"
            }
            _ => "{prefix:>8} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let bar = if phase == "walking" {
            let bar = ProgressBar::new_spinner();
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::new(total as u64)
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.set_style(Self::style(phase));
        bar.set_prefix(phase.to_string());
        self.bytes.store(0, Ordering::Relaxed);

        let previous = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(bar);
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }

    fn on_progress(&self, current: usize, path: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|bar| {
            bar.set_position(current as u64);
            bar.set_message(truncate_path(path, 40));
        });
    }

    fn on_item_completed(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn on_phase_end(&self, phase: &str) {
        let bar = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bar) = bar {
            let hashed = self.bytes.load(Ordering::Relaxed);
            if hashed > 0 {
                bar.finish_with_message(format!("{phase} done, {} read", bytesize::ByteSize(hashed)));
            } else {
                bar.finish_with_message(format!("{phase} done"));
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.with_bar(|bar| bar.set_message(message.to_string()));
    }
}

/// Shorten a path to its file name when it does not fit.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    let name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let count = name.chars().count();
    if count + 4 > max_len {
        let tail: String = name.chars().skip((count + 3).saturating_sub(max_len)).collect();
        return format!("...{tail}");
    }
    format!(".../{name}")
}
