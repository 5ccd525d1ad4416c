//! Run orchestration: walk, group, hash, deduplicate, emit.
//!
//! # Overview
//!
//! [`DuplicateFinder::run`] drives one run through
//! `IDLE → WALKING → GROUPING → HASHING → DEDUPING → EMITTING → FINISHED`,
//! or into `FAILED` on a fatal error or cancellation. Every transition is
//! announced to the [`Emitter`]'s subscribers, and the run always ends with
//! exactly one terminal event.
//!
//! 1. **Walk**: a walker thread streams candidates over a bounded channel
//!    into a [`SizeGrouper`]. As soon as a size bucket reaches two members,
//!    prefix hashing of its files is queued on the I/O pool, so hashing
//!    overlaps the walk.
//! 2. **Group**: once the walk is over, buckets with a single member are
//!    dropped. No bucket is treated as final before this point.
//! 3. **Prefix**: each bucket is split by a digest of its first bytes.
//!    Buckets of files no longer than the prefix are resolved right away.
//! 4. **Full**: the remaining clusters are hashed in full and partitioned
//!    into [`DuplicateSet`]s, each delivered as soon as it is resolved.
//! 5. **Directories**: optionally, equal directories are grouped with a
//!    [`TreeMerger`].
//!
//! Per-file problems become [`Warning`]s on the [`RunSummary`] unless the
//! finder is strict, in which case the first one fails the run.
//!
//! # Example
//!
//! ```no_run
//! use dupelint::duplicates::{DuplicateFinder, FinderConfig};
//! use dupelint::emitter::Emitter;
//! use std::path::PathBuf;
//!
//! let finder = DuplicateFinder::new(FinderConfig::default());
//! let (sets, summary) = finder.find(vec![PathBuf::from(".")]).unwrap();
//! println!("{} sets, {}", sets.len(), summary.message());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Sender};
use rayon::prelude::*;
use serde::Serialize;

use super::groups::{
    partition_by_digest, Admission, DuplicateSet, OriginalPolicy, SizeGroup, SizeGrouper,
};
use super::treemerge::TreeMerger;
use crate::config::ConfigError;
use crate::emitter::{Emitter, LintElement, LintSubscriber, RunOutcome};
use crate::progress::ProgressCallback;
use crate::scanner::{
    ChecksumAlgorithm, Digest, FileCandidate, HashError, Hasher, ScanError, Walker, WalkerConfig,
    Warning, DEFAULT_PREFIX_SIZE,
};

/// Capacity of the walker to grouper hand-off.
const WALK_CHANNEL_CAPACITY: usize = 1024;

/// How candidates are hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HashPolicy {
    /// Split size groups by a prefix digest before hashing in full.
    pub two_stage: bool,
    /// Bytes read for the prefix digest.
    pub prefix_size: u64,
}

impl Default for HashPolicy {
    fn default() -> Self {
        Self {
            two_stage: true,
            prefix_size: DEFAULT_PREFIX_SIZE,
        }
    }
}

/// Configuration for a [`DuplicateFinder`].
#[derive(Clone)]
pub struct FinderConfig {
    /// Checksum algorithm used for every digest of the run.
    pub algorithm: ChecksumAlgorithm,
    /// Prefix/full hashing policy.
    pub hash_policy: HashPolicy,
    /// Which member of a set is the original.
    pub original_policy: OriginalPolicy,
    /// Walk filters.
    pub walker_config: WalkerConfig,
    /// Threads in the hashing pool.
    /// Default is 4 to keep disks from thrashing.
    pub io_threads: usize,
    /// Start prefix hashing while the walk is still running.
    pub prefetch: bool,
    /// Memory-map large files for full hashing.
    pub use_mmap: bool,
    /// Group equal directories after sets are resolved.
    pub merge_directories: bool,
    /// Fail on the first per-file error instead of warning.
    pub strict: bool,
    /// Optional shutdown flag for cooperative cancellation.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl fmt::Debug for FinderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderConfig")
            .field("algorithm", &self.algorithm)
            .field("hash_policy", &self.hash_policy)
            .field("original_policy", &self.original_policy)
            .field("walker_config", &self.walker_config)
            .field("io_threads", &self.io_threads)
            .field("prefetch", &self.prefetch)
            .field("use_mmap", &self.use_mmap)
            .field("merge_directories", &self.merge_directories)
            .field("strict", &self.strict)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            algorithm: ChecksumAlgorithm::default(),
            hash_policy: HashPolicy::default(),
            original_policy: OriginalPolicy::default(),
            walker_config: WalkerConfig::default(),
            io_threads: 4,
            prefetch: true,
            use_mmap: true,
            merge_directories: false,
            strict: false,
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl FinderConfig {
    /// Set the checksum algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: ChecksumAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the hashing policy.
    #[must_use]
    pub fn with_hash_policy(mut self, policy: HashPolicy) -> Self {
        self.hash_policy = policy;
        self
    }

    /// Enable or disable the prefix stage.
    #[must_use]
    pub fn with_two_stage(mut self, enabled: bool) -> Self {
        self.hash_policy.two_stage = enabled;
        self
    }

    /// Set the prefix size in bytes.
    #[must_use]
    pub fn with_prefix_size(mut self, size: u64) -> Self {
        self.hash_policy.prefix_size = size;
        self
    }

    /// Set the original selection policy.
    #[must_use]
    pub fn with_original_policy(mut self, policy: OriginalPolicy) -> Self {
        self.original_policy = policy;
        self
    }

    /// Set the walk configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Set the number of hashing threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Enable or disable hashing during the walk.
    #[must_use]
    pub fn with_prefetch(mut self, enabled: bool) -> Self {
        self.prefetch = enabled;
        self
    }

    /// Enable or disable memory mapping.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Enable or disable duplicate directory detection.
    #[must_use]
    pub fn with_merge_directories(mut self, enabled: bool) -> Self {
        self.merge_directories = enabled;
        self
    }

    /// Enable or disable strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the shutdown flag for cancellation.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Check whether cancellation was requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a zero prefix size, a zero thread
    /// count or an inverted size range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hash_policy.prefix_size == 0 {
            return Err(ConfigError::InvalidPrefixSize(0));
        }
        if self.io_threads == 0 {
            return Err(ConfigError::InvalidThreadCount(0));
        }
        if let (Some(min), Some(max)) = (self.walker_config.min_size, self.walker_config.max_size) {
            if min > max {
                return Err(ConfigError::InvalidSizeRange { min, max });
            }
        }
        Ok(())
    }
}

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Not started.
    Idle,
    /// Discovering candidates.
    Walking,
    /// Closing size buckets.
    Grouping,
    /// Reading file contents.
    Hashing,
    /// Building duplicate sets.
    Deduping,
    /// Delivering results.
    Emitting,
    /// Completed; terminal.
    Finished,
    /// Aborted; terminal.
    Failed,
}

impl RunState {
    /// The state that normally follows this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Walking),
            Self::Walking => Some(Self::Grouping),
            Self::Grouping => Some(Self::Hashing),
            Self::Hashing => Some(Self::Deduping),
            Self::Deduping => Some(Self::Emitting),
            Self::Emitting => Some(Self::Finished),
            Self::Finished | Self::Failed => None,
        }
    }

    /// Whether the run is over.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Whether `to` may directly follow `self`.
    ///
    /// `FAILED` is reachable from every non-terminal state; otherwise
    /// only the next state in the pipeline is.
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }

    /// Uppercase name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Walking => "WALKING",
            Self::Grouping => "GROUPING",
            Self::Hashing => "HASHING",
            Self::Deduping => "DEDUPING",
            Self::Emitting => "EMITTING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statistics and warnings of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Roots that were walked, after normalization
    pub roots: Vec<PathBuf>,
    /// Algorithm used for every digest
    pub algorithm: ChecksumAlgorithm,
    /// Candidates admitted by the walk
    pub total_files: usize,
    /// Sum of candidate sizes
    pub total_size: u64,
    /// Candidates with a unique size
    pub eliminated_by_size: usize,
    /// Candidates whose prefix digest was unique in their size group
    pub eliminated_by_prefix: usize,
    /// Bytes read for hashing
    pub bytes_hashed: u64,
    /// Duplicate sets delivered
    pub duplicate_sets: usize,
    /// Members of those sets, excluding originals
    pub duplicate_files: usize,
    /// Bytes held by non-original members
    pub reclaimable_space: u64,
    /// Groups of equal directories delivered
    pub directory_groups: usize,
    /// Wall time of the run
    pub duration: Duration,
    /// Non-fatal problems, ordered by path
    pub warnings: Vec<Warning>,
}

impl RunSummary {
    /// Whether any duplicate set was found.
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.duplicate_sets > 0
    }

    /// Percentage of scanned bytes that could be reclaimed.
    #[must_use]
    pub fn wasted_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.reclaimable_space as f64 / self.total_size as f64) * 100.0
        }
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = format!(
            "{} duplicate files in {} sets, {} reclaimable ({} files scanned in {:.2}s",
            self.duplicate_files,
            self.duplicate_sets,
            bytesize::ByteSize(self.reclaimable_space),
            self.total_files,
            self.duration.as_secs_f64()
        );
        if !self.warnings.is_empty() {
            message.push_str(&format!(", {} warnings", self.warnings.len()));
        }
        message.push(')');
        message
    }
}

/// Fatal errors that end a run in `FAILED`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum FinderError {
    /// None of the given roots could be walked.
    #[error("No accessible roots among: {}", display_paths(.0))]
    NoAccessibleRoots(Vec<PathBuf>),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The run was cancelled through its shutdown flag.
    #[error("Run cancelled")]
    Cancelled,

    /// A per-file error in strict mode.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The hashing pool could not be started.
    #[error("Failed to start hashing pool: {0}")]
    Pool(String),

    /// A worker thread could not be spawned.
    #[error("Failed to spawn worker thread: {0}")]
    Io(Arc<std::io::Error>),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

enum Source {
    Roots(Vec<PathBuf>),
    Candidates(Vec<FileCandidate>),
}

/// Files of one size whose digests agree so far.
struct Cluster {
    size: u64,
    members: Vec<FileCandidate>,
}

/// Per-run mutable state, shared by the hashing workers.
struct RunContext<'a> {
    emitter: &'a Emitter,
    policy: OriginalPolicy,
    strict: bool,
    shutdown: Option<Arc<AtomicBool>>,
    state: Mutex<RunState>,
    warnings: Mutex<Vec<Warning>>,
    first_error: Mutex<Option<ScanError>>,
    aborted: AtomicBool,
    bytes_hashed: AtomicU64,
    eliminated_by_prefix: AtomicUsize,
    duplicate_sets: AtomicUsize,
    duplicate_files: AtomicUsize,
    reclaimable_space: AtomicU64,
    resolved: Option<Mutex<Vec<Arc<DuplicateSet>>>>,
}

impl<'a> RunContext<'a> {
    fn new(emitter: &'a Emitter, config: &FinderConfig) -> Self {
        Self {
            emitter,
            policy: config.original_policy,
            strict: config.strict,
            shutdown: config.shutdown_flag.clone(),
            state: Mutex::new(RunState::Idle),
            warnings: Mutex::new(Vec::new()),
            first_error: Mutex::new(None),
            aborted: AtomicBool::new(false),
            bytes_hashed: AtomicU64::new(0),
            eliminated_by_prefix: AtomicUsize::new(0),
            duplicate_sets: AtomicUsize::new(0),
            duplicate_files: AtomicUsize::new(0),
            reclaimable_space: AtomicU64::new(0),
            resolved: config.merge_directories.then(|| Mutex::new(Vec::new())),
        }
    }

    /// Step forward through every intermediate state up to `target`.
    fn advance(&self, target: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state < target {
            let Some(next) = state.next() else {
                break;
            };
            debug_assert!(state.can_transition_to(next));
            log::debug!("Run state {} -> {}", *state, next);
            self.emitter.state_changed(*state, next);
            *state = next;
        }
    }

    fn fail(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.is_terminal() {
            log::debug!("Run state {} -> {}", *state, RunState::Failed);
            self.emitter.state_changed(*state, RunState::Failed);
            *state = RunState::Failed;
        }
    }

    fn warn(&self, error: &ScanError) {
        log::warn!("{}", error);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Warning::from(error));
    }

    /// Record a per-file error. Returns `Err` in strict mode.
    fn scan_error(&self, error: ScanError) -> Result<(), FinderError> {
        if self.strict {
            return Err(FinderError::Scan(error));
        }
        self.warn(&error);
        Ok(())
    }

    /// Record a hashing error from a worker thread.
    fn hash_error(&self, error: HashError) {
        if error.is_cancelled() {
            return;
        }
        let error = ScanError::from(error);
        if self.strict {
            log::error!("{}", error);
            self.aborted.store(true, Ordering::SeqCst);
            self.first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert(error);
        } else {
            self.warn(&error);
        }
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn is_cancelled(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn take_first_error(&self) -> Option<ScanError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Turn a cluster of equal digests into a set and deliver it.
    ///
    /// Nothing is delivered once the run is cancelled or aborted: the
    /// workers skip files from then on, so `members` may be incomplete.
    fn resolve(&self, digest: Digest, members: Vec<FileCandidate>) {
        if self.is_aborted() || self.is_cancelled() {
            return;
        }
        let Some(set) = DuplicateSet::new(digest, members, self.policy) else {
            return;
        };
        self.advance(RunState::Emitting);

        let set = Arc::new(set);
        self.duplicate_sets.fetch_add(1, Ordering::Relaxed);
        self.duplicate_files
            .fetch_add(set.twin_count(), Ordering::Relaxed);
        self.reclaimable_space
            .fetch_add(set.wasted_space(), Ordering::Relaxed);
        log::debug!(
            "Resolved set {} ({} files of {} bytes)",
            set.id,
            set.len(),
            set.size
        );
        self.emitter.emit_set(&set);
        if let Some(resolved) = &self.resolved {
            resolved
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(set);
        }
    }

    fn into_warnings(self) -> Vec<Warning> {
        let mut warnings = self
            .warnings
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        warnings.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));
        warnings
    }
}

/// Walk-time bookkeeping: size buckets, directory counts and prefetch.
struct Intake<'p> {
    grouper: SizeGrouper,
    merger: Option<TreeMerger>,
    prefetch: Option<(&'p rayon::ThreadPool, Hasher, Sender<(usize, Result<Digest, HashError>)>)>,
}

impl Intake<'_> {
    fn admit(&mut self, candidate: FileCandidate) {
        if let Some(merger) = &mut self.merger {
            merger.count_file(&candidate.path);
        }
        match self.grouper.insert(candidate) {
            Admission::Held => {}
            Admission::Promoted(pair) => {
                for file in pair {
                    self.dispatch(file);
                }
            }
            Admission::Joined(file) => self.dispatch(file),
        }
    }

    fn dispatch(&self, file: FileCandidate) {
        let Some((pool, hasher, tx)) = &self.prefetch else {
            return;
        };
        let hasher = hasher.clone();
        let tx = tx.clone();
        pool.spawn(move || {
            let result = hasher.prefix_digest(&file.path);
            // fails only when the run ended before grouping collected the prefetches
            if tx.send((file.seq, result)).is_err() {
                log::trace!("Prefetched digest discarded: {}", file.path.display());
            }
        });
    }
}

/// Duplicate finder.
///
/// Holds configuration only; every call to [`DuplicateFinder::run`] owns
/// its buckets and maps, so one finder can serve concurrent runs.
#[derive(Debug, Clone)]
pub struct DuplicateFinder {
    config: FinderConfig,
    hasher: Hasher,
}

impl Default for DuplicateFinder {
    fn default() -> Self {
        Self::new(FinderConfig::default())
    }
}

impl DuplicateFinder {
    /// Create a finder with the given configuration.
    #[must_use]
    pub fn new(config: FinderConfig) -> Self {
        let mut hasher = Hasher::new(config.algorithm)
            .with_prefix_size(config.hash_policy.prefix_size)
            .with_mmap(config.use_mmap);
        if let Some(flag) = &config.shutdown_flag {
            hasher = hasher.with_shutdown_flag(Arc::clone(flag));
        }
        Self { config, hasher }
    }

    /// Configuration of this finder.
    #[must_use]
    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Walk `roots` and deliver every duplicate set to `emitter`.
    ///
    /// Subscribers always receive a terminal event, carrying the same
    /// result that is returned here.
    ///
    /// # Errors
    ///
    /// Returns a [`FinderError`] if the configuration is invalid, no root
    /// is accessible, the run was cancelled, or a per-file error occurred
    /// in strict mode.
    pub fn run(&self, roots: Vec<PathBuf>, emitter: &Emitter) -> Result<RunSummary, FinderError> {
        self.execute(Source::Roots(roots), emitter)
    }

    /// Like [`DuplicateFinder::run`], over a list of already discovered
    /// files instead of a walk.
    ///
    /// Candidates are renumbered in list order and filtered by the size
    /// limits of the walk configuration.
    ///
    /// # Errors
    ///
    /// Same as [`DuplicateFinder::run`], except that roots are never
    /// checked.
    pub fn run_from_candidates(
        &self,
        candidates: Vec<FileCandidate>,
        emitter: &Emitter,
    ) -> Result<RunSummary, FinderError> {
        self.execute(Source::Candidates(candidates), emitter)
    }

    /// Run without subscribers and collect the sets.
    ///
    /// # Errors
    ///
    /// Same as [`DuplicateFinder::run`].
    pub fn find(
        &self,
        roots: Vec<PathBuf>,
    ) -> Result<(Vec<Arc<DuplicateSet>>, RunSummary), FinderError> {
        let collector = SetCollector::default();
        let sets = Arc::clone(&collector.sets);
        let emitter = Emitter::new().with_subscriber(collector);
        let summary = self.run(roots, &emitter)?;
        let mut sets = std::mem::take(&mut *sets.lock().unwrap_or_else(PoisonError::into_inner));
        sets.sort_by_key(|set| set.id);
        Ok((sets, summary))
    }

    fn execute(&self, source: Source, emitter: &Emitter) -> Result<RunSummary, FinderError> {
        let start = Instant::now();
        let context = RunContext::new(emitter, &self.config);
        let result = self.pipeline(source, &context, start);

        match result {
            Ok(mut summary) => {
                context.advance(RunState::Finished);
                summary.warnings = context.into_warnings();
                log::info!("{}", summary.message());
                emitter.finish(&Ok(summary.clone()));
                Ok(summary)
            }
            Err(error) => {
                log::error!("Run failed: {}", error);
                context.fail();
                emitter.finish(&Err(error.clone()));
                Err(error)
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), FinderError> {
        if self.config.is_shutdown_requested() {
            log::info!("Shutdown requested, abandoning run");
            return Err(FinderError::Cancelled);
        }
        Ok(())
    }

    fn progress(&self) -> Option<&dyn ProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    fn pipeline(
        &self,
        source: Source,
        context: &RunContext<'_>,
        start: Instant,
    ) -> Result<RunSummary, FinderError> {
        self.config.validate()?;
        self.check_cancelled()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .thread_name(|i| format!("dupelint-io-{i}"))
            .build()
            .map_err(|e| FinderError::Pool(e.to_string()))?;

        let prefetch = self.config.prefetch && self.config.hash_policy.two_stage;
        let (prefix_tx, prefix_rx) = unbounded();

        let mut summary = RunSummary {
            algorithm: self.config.algorithm,
            ..RunSummary::default()
        };

        // Walk
        let intake = match source {
            Source::Roots(roots) => {
                let mut walker = Walker::new(roots.clone(), self.config.walker_config.clone());
                if let Some(flag) = &self.config.shutdown_flag {
                    walker = walker.with_shutdown_flag(Arc::clone(flag));
                }
                let (valid, errors) = walker.prepare();
                for error in &errors {
                    context.warn(error);
                }
                if valid.is_empty() {
                    return Err(FinderError::NoAccessibleRoots(roots));
                }
                log::info!("Scanning {} root(s)", valid.len());
                summary.roots.clone_from(&valid);

                let intake = Intake {
                    grouper: SizeGrouper::new(),
                    merger: self
                        .config
                        .merge_directories
                        .then(|| TreeMerger::new(valid.clone())),
                    prefetch: prefetch.then(|| (&pool, self.hasher.clone(), prefix_tx)),
                };
                context.advance(RunState::Walking);
                self.walk(&walker, valid, intake, context)?
            }
            Source::Candidates(candidates) => {
                let mut intake = Intake {
                    grouper: SizeGrouper::new(),
                    merger: self
                        .config
                        .merge_directories
                        .then(|| TreeMerger::new(Vec::new())),
                    prefetch: prefetch.then(|| (&pool, self.hasher.clone(), prefix_tx)),
                };
                context.advance(RunState::Walking);
                for (seq, candidate) in candidates.into_iter().enumerate() {
                    self.check_cancelled()?;
                    if self.config.walker_config.accepts_size(candidate.size) {
                        intake.admit(candidate.with_seq(seq));
                    }
                }
                intake
            }
        };
        self.check_cancelled()?;

        // Group
        context.advance(RunState::Grouping);
        let Intake {
            grouper,
            merger,
            prefetch: prefetch_handle,
        } = intake;
        // the workers hold the remaining senders until their hash is sent
        drop(prefetch_handle);
        let prefetched: HashMap<usize, Result<Digest, HashError>> = prefix_rx.iter().collect();
        let (groups, stats) = grouper.finish();
        summary.total_files = stats.total_files;
        summary.total_size = stats.total_size;
        summary.eliminated_by_size = stats.eliminated_unique;
        self.check_cancelled()?;

        // Hash
        context.advance(RunState::Hashing);
        let clusters = if self.config.hash_policy.two_stage {
            self.prefix_stage(&pool, groups, prefetched, context)
        } else {
            groups
                .into_iter()
                .map(|g| Cluster {
                    size: g.size,
                    members: g.files,
                })
                .collect()
        };
        self.check_cancelled()?;
        if let Some(error) = context.take_first_error() {
            return Err(FinderError::Scan(error));
        }

        self.full_stage(&pool, clusters, context);
        self.check_cancelled()?;
        if let Some(error) = context.take_first_error() {
            return Err(FinderError::Scan(error));
        }

        // Emit what is left: directory groups
        context.advance(RunState::Emitting);
        if let (Some(mut merger), Some(resolved)) = (merger, &context.resolved) {
            let resolved = std::mem::take(&mut *resolved.lock().unwrap_or_else(PoisonError::into_inner));
            for set in &resolved {
                merger.add_set(set);
            }
            for group in merger.finish() {
                context.emitter.emit_directory_group(&group);
                summary.directory_groups += 1;
            }
        }

        summary.eliminated_by_prefix = context.eliminated_by_prefix.load(Ordering::Relaxed);
        summary.bytes_hashed = context.bytes_hashed.load(Ordering::Relaxed);
        summary.duplicate_sets = context.duplicate_sets.load(Ordering::Relaxed);
        summary.duplicate_files = context.duplicate_files.load(Ordering::Relaxed);
        summary.reclaimable_space = context.reclaimable_space.load(Ordering::Relaxed);
        summary.duration = start.elapsed();
        Ok(summary)
    }

    /// Stream the walk into `intake` on the calling thread.
    fn walk<'p>(
        &self,
        walker: &Walker,
        roots: Vec<PathBuf>,
        mut intake: Intake<'p>,
        context: &RunContext<'_>,
    ) -> Result<Intake<'p>, FinderError> {
        if let Some(callback) = self.progress() {
            callback.on_phase_start("walking", 0);
        }

        thread::scope(|scope| {
            let (tx, rx) = bounded(WALK_CHANNEL_CAPACITY);
            thread::Builder::new()
                .name("dupelint-walker".to_string())
                .spawn_scoped(scope, move || {
                    for item in walker.walk_prepared(roots) {
                        if tx.send(item).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| FinderError::Io(Arc::new(e)))?;

            let mut seen = 0usize;
            for item in rx {
                match item {
                    Ok(candidate) => {
                        seen += 1;
                        if let Some(callback) = self.progress() {
                            callback.on_progress(seen, &candidate.path.to_string_lossy());
                        }
                        intake.admit(candidate);
                    }
                    // leaving the loop drops the receiver, which stops the walker
                    Err(error) => context.scan_error(error)?,
                }
            }
            Ok::<(), FinderError>(())
        })?;

        if let Some(callback) = self.progress() {
            callback.on_phase_end("walking");
        }
        log::info!("Walk complete: {} candidates", intake.grouper.len());
        Ok(intake)
    }

    /// Split size groups by prefix digest.
    ///
    /// Groups of files that fit in the prefix are resolved here. Returns
    /// the clusters that still need a full hash.
    fn prefix_stage(
        &self,
        pool: &rayon::ThreadPool,
        groups: Vec<SizeGroup>,
        prefetched: HashMap<usize, Result<Digest, HashError>>,
        context: &RunContext<'_>,
    ) -> Vec<Cluster> {
        let total: usize = groups.iter().map(SizeGroup::len).sum();
        let prefix_size = self.config.hash_policy.prefix_size;
        log::info!(
            "Prefix hashing {} candidates ({} prefetched)",
            total,
            prefetched.len()
        );
        if let Some(callback) = self.progress() {
            callback.on_phase_start("prefix", total);
        }
        let done = AtomicUsize::new(0);

        let clusters: Vec<Cluster> = pool.install(|| {
            groups
                .into_par_iter()
                .flat_map_iter(|group| {
                    let size = group.size;
                    let hashed: Vec<(FileCandidate, Digest)> = group
                        .files
                        .into_iter()
                        .filter_map(|file| {
                            if self.config.is_shutdown_requested() || context.is_aborted() {
                                return None;
                            }
                            let result = match prefetched.get(&file.seq) {
                                Some(result) => result.clone(),
                                None => self.hasher.prefix_digest(&file.path),
                            };
                            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                            if let Some(callback) = self.progress() {
                                callback.on_progress(n, &file.path.to_string_lossy());
                            }
                            match result {
                                Ok(digest) => {
                                    context
                                        .bytes_hashed
                                        .fetch_add(size.min(prefix_size), Ordering::Relaxed);
                                    Some((file, digest))
                                }
                                Err(error) => {
                                    context.hash_error(error);
                                    None
                                }
                            }
                        })
                        .collect();

                    let hashed_count = hashed.len();
                    let partitions = partition_by_digest(hashed);
                    let survivors: usize = partitions.iter().map(|(_, m)| m.len()).sum();
                    context
                        .eliminated_by_prefix
                        .fetch_add(hashed_count - survivors, Ordering::Relaxed);

                    // the prefix already covers the whole file
                    if size <= prefix_size {
                        context.advance(RunState::Deduping);
                        for (digest, members) in partitions {
                            context.resolve(digest, members);
                        }
                        return Vec::new();
                    }
                    partitions
                        .into_iter()
                        .map(|(_, members)| Cluster { size, members })
                        .collect()
                })
                .collect()
        });

        if let Some(callback) = self.progress() {
            callback.on_phase_end("prefix");
        }
        clusters
    }

    /// Hash clusters in full and deliver the resulting sets.
    fn full_stage(&self, pool: &rayon::ThreadPool, clusters: Vec<Cluster>, context: &RunContext<'_>) {
        let total: usize = clusters.iter().map(|c| c.members.len()).sum();
        log::info!("Full hashing {} candidates in {} clusters", total, clusters.len());
        if let Some(callback) = self.progress() {
            callback.on_phase_start("full", total);
        }
        let done = AtomicUsize::new(0);

        pool.install(|| {
            clusters.into_par_iter().for_each(|Cluster { size, members }| {
                let hashed: Vec<(FileCandidate, Digest)> = members
                    .into_par_iter()
                    .filter_map(|file| {
                        if self.config.is_shutdown_requested() || context.is_aborted() {
                            return None;
                        }
                        let result = self.hasher.full_digest(&file.path);
                        let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                        if let Some(callback) = self.progress() {
                            callback.on_progress(n, &file.path.to_string_lossy());
                            callback.on_item_completed(size);
                        }
                        match result {
                            Ok(digest) => {
                                context
                                    .bytes_hashed
                                    .fetch_add(size, Ordering::Relaxed);
                                Some((file, digest))
                            }
                            Err(error) => {
                                context.hash_error(error);
                                None
                            }
                        }
                    })
                    .collect();

                context.advance(RunState::Deduping);
                for (digest, members) in partition_by_digest(hashed) {
                    if self.config.is_shutdown_requested() {
                        return;
                    }
                    context.resolve(digest, members);
                }
            });
        });

        if let Some(callback) = self.progress() {
            callback.on_phase_end("full");
        }
    }
}

/// Collects resolved sets for [`DuplicateFinder::find`].
#[derive(Default)]
struct SetCollector {
    sets: Arc<Mutex<Vec<Arc<DuplicateSet>>>>,
}

impl LintSubscriber for SetCollector {
    fn on_element_added(&mut self, _element: &LintElement) {}

    fn on_set_resolved(&mut self, elements: &[LintElement]) {
        if let Some(first) = elements.first() {
            self.sets
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Arc::clone(first.set()));
        }
    }

    fn on_finished(&mut self, _outcome: &RunOutcome) {}
}
