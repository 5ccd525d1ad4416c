//! Scanner module for directory traversal and file hashing.
//!
//! This module provides functionality for:
//! - Multi-root directory walking using jwalk
//! - Content checksums from a selectable algorithm family
//! - Prefix-then-full file hashing
//! - Hardlink detection
//! - Unicode root normalization
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate discovery
//! - [`checksum`]: Checksum algorithms and algorithm-tagged digests
//! - [`hasher`]: Streaming file hashing (prefix and full)
//! - [`hardlink`]: Inode tracking
//! - [`path_utils`]: Root normalization and overlap removal
//!
//! # Example
//!
//! ```no_run
//! use dupelint::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let config = WalkerConfig {
//!     min_size: Some(1024),
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(vec![PathBuf::from(".")], config);
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod checksum;
pub mod hardlink;
pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

// Re-export main types
pub use checksum::{checksum_bytes, Checksum, ChecksumAlgorithm, Digest};
pub use hasher::{Hasher, DEFAULT_PREFIX_SIZE};
pub use walker::Walker;

/// A regular file discovered during the walk.
///
/// Immutable once discovered. `seq` is the zero-based discovery index
/// within one run and is only meaningful relative to other candidates
/// from the same run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: SystemTime,
    /// Discovery order within the run
    pub seq: usize,
}

impl FileCandidate {
    /// Create a new candidate.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the file
    /// * `size` - File size in bytes
    /// * `modified` - Last modification time
    #[must_use]
    pub fn new(path: PathBuf, size: u64, modified: SystemTime) -> Self {
        Self {
            path,
            size,
            modified,
            seq: 0,
        }
    }

    /// Set the discovery index.
    #[must_use]
    pub fn with_seq(mut self, seq: usize) -> Self {
        self.seq = seq;
        self
    }
}

/// Configuration for directory walking.
///
/// Controls filtering, symlink handling, and other walk behavior.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Minimum file size to include (in bytes).
    pub min_size: Option<u64>,

    /// Maximum file size to include (in bytes).
    pub max_size: Option<u64>,

    /// Maximum recursion depth below each root (`None` for unlimited).
    pub max_depth: Option<usize>,

    /// Glob patterns to ignore (gitignore-style).
    /// These are applied in addition to any .gitignore file at a root.
    pub ignore_patterns: Vec<String>,

    /// Report every directory entry of a hardlinked inode instead of
    /// only the first one.
    pub keep_hardlinks: bool,

    /// Include zero-byte files.
    pub include_empty: bool,
}

impl WalkerConfig {
    /// Set the maximum depth.
    #[must_use]
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the ignore patterns.
    #[must_use]
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    /// Keep hardlinked entries.
    #[must_use]
    pub fn with_keep_hardlinks(mut self, keep: bool) -> Self {
        self.keep_hardlinks = keep;
        self
    }

    /// Include zero-byte files.
    #[must_use]
    pub fn with_include_empty(mut self, include: bool) -> Self {
        self.include_empty = include;
        self
    }

    /// Check whether a size passes the min/max filters.
    #[must_use]
    pub fn accepts_size(&self, size: u64) -> bool {
        if size == 0 && !self.include_empty {
            return false;
        }
        if self.min_size.is_some_and(|min| size < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| size > max) {
            return false;
        }
        true
    }
}

/// Errors that can occur during directory scanning.
///
/// These are non-fatal: they are collected as warnings and the
/// run continues (unless strict mode is enabled).
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Hashing a candidate failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::NotADirectory(p) => Some(p),
            Self::Io { path, .. } => Some(path),
            Self::Hash(e) => e.path(),
        }
    }

    /// Build a scan error from an I/O error, classifying common kinds.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: Arc::new(error),
            },
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug, Clone)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Hashing was abandoned because the run was cancelled.
    #[error("Hashing cancelled: {0}")]
    Cancelled(PathBuf),
}

impl HashError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Cancelled(p) => Some(p),
            Self::Io { path, .. } => Some(path),
        }
    }

    /// Build a hash error from an I/O error, classifying common kinds.
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: Arc::new(error),
            },
        }
    }

    /// Whether this error was caused by cancellation rather than I/O.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// A non-fatal problem recorded during a run and attached to the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    /// Path the warning refers to, if any
    pub path: Option<PathBuf>,
    /// Human-readable description
    pub message: String,
}

impl Warning {
    /// Create a warning that is not tied to a path.
    #[must_use]
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }
}

impl From<&ScanError> for Warning {
    fn from(err: &ScanError) -> Self {
        Self {
            path: err.path().map(std::path::Path::to_path_buf),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
