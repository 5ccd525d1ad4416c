//! dupelint - streaming duplicate file finder
//!
//! Walks one or more directory trees, narrows candidates by size and by a
//! checksum of the first bytes, confirms duplicates with a full-content
//! checksum, and delivers each duplicate set to subscribers as soon as it
//! is resolved.
//!
//! The library entry points are [`duplicates::DuplicateFinder`] and
//! [`emitter::Emitter`]; [`run_app`] and [`scan`] wire them to the
//! command line and to the writers in [`output`].

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod emitter;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context};
use yansi::Paint;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::config::{AppConfig, ConfigError};
use crate::duplicates::DuplicateFinder;
use crate::emitter::Emitter;
use crate::error::ExitCode;
use crate::output::{CsvReport, JsonReport, Report, TextReport};
use crate::progress::Progress;
use crate::scanner::ChecksumAlgorithm;
use crate::signal::ShutdownHandler;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns configuration, engine and output errors. A cancelled run
/// surfaces as [`duplicates::FinderError::Cancelled`].
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    if cli.no_color || !io::stdout().is_terminal() {
        yansi::disable();
    }

    match &cli.command {
        Commands::Algorithms => {
            print_algorithms(&mut io::stdout().lock())?;
            Ok(ExitCode::Success)
        }
        Commands::Scan(args) => {
            let config = AppConfig::load(cli.config.as_deref())
                .context("Failed to load configuration")?
                .apply_scan_args(args);
            log::debug!("Effective configuration: {:?}", config);

            let show_progress =
                args.output == OutputFormat::Text && !cli.quiet && io::stderr().is_terminal();
            let out = BufWriter::new(io::stdout());
            scan(&config, args.paths.clone(), args.output, show_progress, out)
        }
    }
}

fn print_algorithms(out: &mut impl Write) -> io::Result<()> {
    for algorithm in ChecksumAlgorithm::ALL {
        let marker = if algorithm == ChecksumAlgorithm::default() {
            " (default)"
        } else {
            ""
        };
        let kind = if algorithm.is_cryptographic() {
            "cryptographic"
        } else {
            "non-cryptographic"
        };
        writeln!(
            out,
            "{} {:>3} bits  {}{}",
            format!("{:<8}", algorithm.name()).bold(),
            algorithm.digest_len() * 8,
            kind,
            marker
        )?;
    }
    Ok(())
}

fn report_for<'a, W>(format: OutputFormat, out: W) -> Box<dyn Report + 'a>
where
    W: Write + Send + 'a,
{
    match format {
        OutputFormat::Text => Box::new(TextReport::new(out)),
        OutputFormat::Json => Box::new(JsonReport::new(out)),
        OutputFormat::Csv => Box::new(CsvReport::new(out)),
    }
}

/// Scan `roots` and write the report in `format` to `out`.
///
/// The engine runs on its own thread and feeds a bounded queue sized by
/// `config.queue_capacity`; the report is written from the calling thread.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the run fails, or
/// the report cannot be written.
pub fn scan<W>(
    config: &AppConfig,
    roots: Vec<PathBuf>,
    format: OutputFormat,
    show_progress: bool,
    out: W,
) -> anyhow::Result<ExitCode>
where
    W: Write + Send,
{
    if roots.is_empty() {
        return Err(ConfigError::NoRoots.into());
    }
    let shutdown = match signal::install_handler() {
        Ok(handler) => handler,
        Err(e) => {
            log::warn!("{}; Ctrl+C will terminate immediately", e);
            ShutdownHandler::new()
        }
    };

    let mut finder_config = config
        .to_finder_config()
        .context("Invalid configuration")?
        .with_shutdown_flag(shutdown.flag());
    if show_progress {
        finder_config = finder_config.with_progress_callback(Arc::new(Progress::new(false)));
    }
    let finder = DuplicateFinder::new(finder_config);

    let (subscriber, receiver) = emitter::channel(config.queue_capacity, config.overflow);
    let emitter = Emitter::new().with_subscriber(subscriber);
    let mut report = report_for(format, out);

    let (outcome, result) = thread::scope(|s| {
        // the emitter moves into the engine thread so the queue closes when it exits
        let engine = s.spawn(move || finder.run(roots, &emitter));
        let outcome = receiver.forward_to(report.as_mut());
        engine
            .join()
            .map(|result| (outcome, result))
            .map_err(|_| anyhow!("Scan thread panicked"))
    })?;

    report.finish().context("Failed to write report")?;
    let summary = result?;

    // the queued outcome carries warnings added by the queue itself
    let exit_code = match outcome.as_deref() {
        Some(Ok(queued)) => ExitCode::from_summary(queued),
        _ => ExitCode::from_summary(&summary),
    };
    log::info!("{}", summary.message());
    Ok(exit_code)
}
