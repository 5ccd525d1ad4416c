//! Layered application configuration.
//!
//! Settings are merged in increasing precedence:
//!
//! 1. Built-in defaults ([`AppConfig::default`])
//! 2. TOML file (`<config_dir>/config.toml`, or an explicit `--config` path)
//! 3. Environment variables prefixed with `DUPELINT_` (e.g. `DUPELINT_ALGORITHM=sha256`)
//! 4. Command-line flags (applied by the caller with [`AppConfig::apply_scan_args`])
//!
//! The merged configuration is validated and turned into a
//! [`FinderConfig`] with [`AppConfig::to_finder_config`].

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::ScanArgs;
use crate::duplicates::{FinderConfig, HashPolicy, OriginalPolicy};
use crate::emitter::OverflowPolicy;
use crate::scanner::{ChecksumAlgorithm, WalkerConfig, DEFAULT_PREFIX_SIZE};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DUPELINT_";

/// Fatal configuration problems, surfaced before any work starts.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConfigError {
    /// The requested checksum algorithm is not part of the family.
    #[error("Unknown checksum algorithm '{name}' (valid: {valid})")]
    UnknownAlgorithm {
        /// Name as given by the user
        name: String,
        /// Comma-separated list of accepted names
        valid: String,
    },

    /// Prefix size must be at least one byte.
    #[error("Invalid prefix size: {0} (must be at least 1 byte)")]
    InvalidPrefixSize(u64),

    /// The I/O pool needs at least one thread.
    #[error("Invalid I/O thread count: {0} (must be at least 1)")]
    InvalidThreadCount(usize),

    /// `min_size` is larger than `max_size`.
    #[error("Invalid size range: min_size {min} is larger than max_size {max}")]
    InvalidSizeRange {
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },

    /// The subscriber queue needs room for at least one event.
    #[error("Invalid queue capacity: {0} (must be at least 1)")]
    InvalidQueueCapacity(usize),

    /// No root path was given.
    #[error("No root paths given")]
    NoRoots,

    /// The layered sources could not be merged or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Merged application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Checksum algorithm name (see `dupelint algorithms`).
    pub algorithm: String,
    /// Hash a prefix first and only fully hash prefix matches.
    pub two_stage: bool,
    /// Prefix length in bytes.
    pub prefix_size: u64,
    /// How the original of each duplicate set is chosen.
    pub original: OriginalPolicy,
    /// Threads in the hashing pool.
    pub io_threads: usize,
    /// Start prefix hashing while the walk is still running.
    pub prefetch: bool,
    /// Memory-map large files when hashing.
    pub use_mmap: bool,
    /// Follow symbolic links.
    pub follow_symlinks: bool,
    /// Skip dot-files and dot-directories.
    pub skip_hidden: bool,
    /// Report every link of a hardlinked file.
    pub keep_hardlinks: bool,
    /// Consider zero-byte files.
    pub include_empty: bool,
    /// Minimum file size in bytes.
    pub min_size: Option<u64>,
    /// Maximum file size in bytes.
    pub max_size: Option<u64>,
    /// Maximum recursion depth below each root.
    pub max_depth: Option<usize>,
    /// Extra gitignore-style patterns.
    pub ignore_patterns: Vec<String>,
    /// Detect directories whose whole content is duplicated.
    pub merge_directories: bool,
    /// Abort on the first per-file error.
    pub strict: bool,
    /// Bound of the subscriber event queue.
    pub queue_capacity: usize,
    /// What to do when the subscriber queue is full.
    pub overflow: OverflowPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            algorithm: ChecksumAlgorithm::default().name().to_string(),
            two_stage: true,
            prefix_size: DEFAULT_PREFIX_SIZE,
            original: OriginalPolicy::default(),
            io_threads: 4,
            prefetch: true,
            use_mmap: true,
            follow_symlinks: false,
            skip_hidden: false,
            keep_hardlinks: false,
            include_empty: false,
            min_size: None,
            max_size: None,
            max_depth: None,
            ignore_patterns: Vec::new(),
            merge_directories: false,
            strict: false,
            queue_capacity: 256,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Platform-specific default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupelint", "dupelint")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Build the layered figment (defaults, TOML file, environment).
    ///
    /// A missing file is not an error; figment treats it as empty.
    #[must_use]
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_path);
        if let Some(path) = file {
            log::debug!("Reading configuration from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]))
    }

    /// Load and validate configuration from file and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] for unreadable or malformed sources and
    /// the validation errors of [`AppConfig::validate`].
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(config_path).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay explicitly given command-line flags.
    #[must_use]
    pub fn apply_scan_args(mut self, args: &ScanArgs) -> Self {
        if let Some(algorithm) = &args.algorithm {
            self.algorithm.clone_from(algorithm);
        }
        if args.no_two_stage {
            self.two_stage = false;
        }
        if let Some(prefix) = args.prefix_size {
            self.prefix_size = prefix;
        }
        if let Some(original) = args.original {
            self.original = original.into();
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = threads;
        }
        if args.no_mmap {
            self.use_mmap = false;
        }
        self.follow_symlinks |= args.follow_symlinks;
        self.skip_hidden |= args.skip_hidden;
        self.keep_hardlinks |= args.keep_hardlinks;
        self.include_empty |= args.include_empty;
        self.merge_directories |= args.merge_directories;
        self.strict |= args.strict;
        if args.min_size.is_some() {
            self.min_size = args.min_size;
        }
        if args.max_size.is_some() {
            self.max_size = args.max_size;
        }
        if args.max_depth.is_some() {
            self.max_depth = args.max_depth;
        }
        self.ignore_patterns
            .extend(args.ignore_patterns.iter().cloned());
        self
    }

    /// Check value ranges and the algorithm name.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm.parse::<ChecksumAlgorithm>()?;
        if self.prefix_size == 0 {
            return Err(ConfigError::InvalidPrefixSize(self.prefix_size));
        }
        if self.io_threads == 0 {
            return Err(ConfigError::InvalidThreadCount(self.io_threads));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity(self.queue_capacity));
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(ConfigError::InvalidSizeRange { min, max });
            }
        }
        Ok(())
    }

    /// Walker settings derived from this configuration.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            follow_symlinks: self.follow_symlinks,
            skip_hidden: self.skip_hidden,
            min_size: self.min_size,
            max_size: self.max_size,
            max_depth: self.max_depth,
            ignore_patterns: self.ignore_patterns.clone(),
            keep_hardlinks: self.keep_hardlinks,
            include_empty: self.include_empty,
        }
    }

    /// Validate and convert into engine configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if validation fails.
    pub fn to_finder_config(&self) -> Result<FinderConfig, ConfigError> {
        self.validate()?;
        let algorithm: ChecksumAlgorithm = self.algorithm.parse()?;

        Ok(FinderConfig::default()
            .with_algorithm(algorithm)
            .with_hash_policy(HashPolicy {
                two_stage: self.two_stage,
                prefix_size: self.prefix_size,
            })
            .with_original_policy(self.original)
            .with_io_threads(self.io_threads)
            .with_prefetch(self.prefetch)
            .with_mmap(self.use_mmap)
            .with_merge_directories(self.merge_directories)
            .with_strict(self.strict)
            .with_walker_config(self.walker_config()))
    }
}
