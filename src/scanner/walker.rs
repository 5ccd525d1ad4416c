//! Multi-root directory walker built on jwalk.
//!
//! # Overview
//!
//! The [`Walker`] enumerates regular files below one or more roots and
//! yields a [`FileCandidate`] for each file that passes the configured
//! filters. Roots are resolved and de-overlapped first (see
//! [`path_utils::prepare_roots`](super::path_utils::prepare_roots)), then
//! walked one after another. Children are sorted by file name so the
//! discovery order, and therefore every candidate's `seq`, is stable
//! across runs on an unchanged tree.
//!
//! Per-entry failures are yielded as [`ScanError`] items and the walk
//! continues. Gitignore-style patterns (and a `.gitignore` at a root)
//! prune whole directories before they are read.
//!
//! # Example
//!
//! ```no_run
//! use dupelint::scanner::{Walker, WalkerConfig};
//! use std::path::PathBuf;
//!
//! let walker = Walker::new(
//!     vec![PathBuf::from("/data/photos"), PathBuf::from("/backup/photos")],
//!     WalkerConfig::default(),
//! );
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::fs::{File, Metadata};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::hardlink::HardlinkTracker;
use super::path_utils::prepare_roots;
use super::{FileCandidate, ScanError, WalkerConfig};

/// Directory walker over a list of roots.
#[derive(Debug, Clone)]
pub struct Walker {
    roots: Vec<PathBuf>,
    config: WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

/// A file that passed every per-entry filter, before hardlink collapsing.
struct Found {
    candidate: FileCandidate,
    metadata: Metadata,
}

impl Walker {
    /// Create a walker for the given roots.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>, config: WalkerConfig) -> Self {
        Self {
            roots,
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag checked between entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Roots as given.
    #[must_use]
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Walker configuration.
    #[must_use]
    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Resolve the roots: usable canonical roots plus one error per
    /// unusable root.
    #[must_use]
    pub fn prepare(&self) -> (Vec<PathBuf>, Vec<ScanError>) {
        prepare_roots(&self.roots)
    }

    /// Walk every root, yielding root errors first.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileCandidate, ScanError>> + '_ {
        let (roots, errors) = self.prepare();
        errors.into_iter().map(Err).chain(self.walk_prepared(roots))
    }

    /// Walk roots that were already resolved with [`Walker::prepare`].
    ///
    /// Candidates are numbered in discovery order starting at zero.
    pub fn walk_prepared(
        &self,
        roots: Vec<PathBuf>,
    ) -> impl Iterator<Item = Result<FileCandidate, ScanError>> + '_ {
        let mut hardlinks = HardlinkTracker::new();
        let keep_hardlinks = self.config.keep_hardlinks;
        let mut seq = 0usize;

        roots
            .into_iter()
            .flat_map(move |root| self.walk_root(root))
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |item| match item {
                Ok(found) => {
                    if !keep_hardlinks && !hardlinks.admit(&found.metadata) {
                        log::debug!("Skipping hardlink: {}", found.candidate.path.display());
                        return None;
                    }
                    let candidate = found.candidate.with_seq(seq);
                    seq += 1;
                    Some(Ok(candidate))
                }
                Err(e) => Some(Err(e)),
            })
    }

    fn walk_root(&self, root: PathBuf) -> impl Iterator<Item = Result<Found, ScanError>> + '_ {
        log::debug!("Walking root {}", root.display());
        let gitignore = self.build_gitignore(&root).map(Arc::new);
        let prune = gitignore.clone();

        let mut walk_dir = WalkDir::new(&root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
                if let Some(gi) = &prune {
                    children.retain(|child| match child {
                        Ok(entry) if entry.file_type().is_dir() => {
                            !gi.matched(entry.path(), true).is_ignore()
                        }
                        _ => true,
                    });
                }
            });
        if let Some(depth) = self.config.max_depth {
            walk_dir = walk_dir.max_depth(depth);
        }

        let root_for_errors = root.clone();
        walk_dir
            .into_iter()
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    if path == root || entry.file_type().is_dir() {
                        return None;
                    }
                    if let Some(gi) = &gitignore {
                        if gi.matched(&path, false).is_ignore() {
                            log::trace!("Ignoring file: {}", path.display());
                            return None;
                        }
                    }
                    if entry.file_type().is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }
                    self.stat_entry(path)
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| root_for_errors.clone(), Path::to_path_buf);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    let io = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    Some(Err(ScanError::from_io(path, io)))
                }
            })
    }

    fn stat_entry(&self, path: PathBuf) -> Option<Result<Found, ScanError>> {
        let metadata = if self.config.follow_symlinks {
            std::fs::metadata(&path)
        } else {
            std::fs::symlink_metadata(&path)
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    log::debug!("File vanished during walk: {}", path.display());
                } else {
                    log::warn!("Cannot stat {}: {}", path.display(), e);
                }
                return Some(Err(ScanError::from_io(path, e)));
            }
        };

        if !metadata.is_file() {
            return None;
        }

        let size = metadata.len();
        if !self.config.accepts_size(size) {
            if size == 0 {
                log::debug!("Skipping empty file: {}", path.display());
            } else {
                log::trace!("Skipping {} ({} bytes): size filter", path.display(), size);
            }
            return None;
        }

        // a file of unique size is never hashed, so readability is checked here
        if let Err(e) = File::open(&path) {
            log::warn!("Cannot read {}: {}", path.display(), e);
            return Some(Err(ScanError::from_io(path, e)));
        }

        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Some(Ok(Found {
            candidate: FileCandidate::new(path, size, modified),
            metadata,
        }))
    }

    fn build_gitignore(&self, root: &Path) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(root);

        let gitignore_path = root.join(".gitignore");
        if gitignore_path.is_file() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }
}
