//! Ctrl+C handling.
//!
//! The first interrupt sets a shared shutdown flag. The walker, the hasher
//! and the finder poll it between files and chunks, so the run ends in
//! `FAILED` with [`FinderError::Cancelled`](crate::duplicates::FinderError)
//! and the binary exits with code 130. A second interrupt exits at once.
//!
//! ```rust,no_run
//! use dupelint::duplicates::FinderConfig;
//! use dupelint::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = FinderConfig::default().with_shutdown_flag(handler.flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Exit code for SIGINT (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// A handler that is not wired to any signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request cancellation.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Clear the flag for the next run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// The flag to hand to a [`FinderConfig`](crate::duplicates::FinderConfig).
    #[must_use]
    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Failure to hook the signal.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// `ctrlc` refused the handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static INSTALLED: OnceLock<ShutdownHandler> = OnceLock::new();
static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

/// Install the process-wide Ctrl+C handler.
///
/// Later calls return the same handler with its flag cleared, so several
/// runs in one process (tests, for instance) can each call this.
///
/// # Errors
///
/// Returns [`SignalError`] if another handler was registered outside of
/// this function.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    let _guard = INSTALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handler) = INSTALLED.get() {
        handler.reset();
        INTERRUPTS.store(0, Ordering::SeqCst);
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.flag();
    let result = ctrlc::set_handler(move || {
        if INTERRUPTS.fetch_add(1, Ordering::SeqCst) > 0 {
            std::process::exit(EXIT_CODE_INTERRUPTED);
        }
        flag.store(true, Ordering::SeqCst);
        let mut stderr = std::io::stderr();
        let _ = writeln!(stderr, "\nInterrupted, stopping (press Ctrl+C again to exit now)");
        let _ = stderr.flush();
        log::info!("Shutdown signal received");
    });

    result?;
    Ok(INSTALLED.get_or_init(|| handler).clone())
}
