//! Command-line interface definitions for dupelint.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Scan flags are optional overlays: anything not given falls back to the
//! configuration file, then to `DUPELINT_*` environment variables, then to
//! built-in defaults (see [`crate::config`]).
//!
//! # Example
//!
//! ```bash
//! # Scan two directories and print duplicate sets as they are found
//! dupelint scan ~/Photos /mnt/backup/Photos
//!
//! # JSON output with a weaker, faster checksum
//! dupelint scan ~/Downloads --output json --algorithm xxh3
//!
//! # Report whole directories that duplicate each other
//! dupelint scan ~/src --merge-directories
//!
//! # Verbose mode for debugging
//! dupelint -v scan ~/Downloads
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::duplicates::OriginalPolicy;

/// Streaming duplicate file finder.
///
/// dupelint walks one or more directories, groups files by size, confirms
/// equal content with a checksum and reports each duplicate set as soon as
/// it is resolved.
#[derive(Debug, Parser)]
#[command(name = "dupelint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan directories for duplicate files
    Scan(ScanArgs),
    /// List the supported checksum algorithms
    Algorithms,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Default, Args)]
pub struct ScanArgs {
    /// Directories to scan; nested and repeated roots are merged
    #[arg(value_name = "PATH", required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Checksum algorithm (see `dupelint algorithms`)
    #[arg(short, long, value_name = "NAME")]
    pub algorithm: Option<String>,

    /// Hash whole files directly, without the prefix stage
    #[arg(long)]
    pub no_two_stage: bool,

    /// Bytes read by the prefix stage (e.g. 4KiB)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub prefix_size: Option<u64>,

    /// Which file of a set is the original
    #[arg(long, value_enum, value_name = "POLICY")]
    pub original: Option<OriginalArg>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Maximum directory depth below each root (1 = only the root's own files)
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Glob patterns to ignore (can be specified multiple times)
    ///
    /// These patterns are added to any .gitignore patterns found.
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Follow symbolic links during scan
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long)]
    pub skip_hidden: bool,

    /// Report every hardlink to the same file separately
    #[arg(long)]
    pub keep_hardlinks: bool,

    /// Include zero-byte files
    #[arg(long)]
    pub include_empty: bool,

    /// Number of I/O threads for hashing (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Read files through buffered I/O only
    #[arg(long)]
    pub no_mmap: bool,

    /// Also report directories whose contents duplicate each other
    #[arg(long)]
    pub merge_directories: bool,

    /// Abort on the first unreadable file instead of warning
    #[arg(long)]
    pub strict: bool,
}

/// Original selection policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OriginalArg {
    /// Oldest modification time
    Oldest,
    /// Lexicographically smallest path
    Path,
    /// First file discovered by the walk
    First,
}

impl From<OriginalArg> for OriginalPolicy {
    fn from(arg: OriginalArg) -> Self {
        match arg {
            OriginalArg::Oldest => Self::OldestMtime,
            OriginalArg::Path => Self::SmallestPath,
            OriginalArg::First => Self::FirstDiscovered,
        }
    }
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, streamed as sets are found
    #[default]
    Text,
    /// JSON document for scripting
    Json,
    /// CSV for spreadsheets
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use dupelint::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}
