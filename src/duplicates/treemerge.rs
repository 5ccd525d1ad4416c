//! Duplicate directory detection.
//!
//! A directory is *complete* when every file the run considered below it
//! is a member of some duplicate set. Complete directories whose multisets
//! of content digests are equal hold the same data and are reported
//! together as a [`DirectoryGroup`].
//!
//! Counting works bottom-up. Every walked file increments the recursive
//! count of each ancestor directory up to its root. Every duplicate file
//! hands its digest to its parent directory. Directories are then visited
//! deepest first; a complete directory passes its digests to its parent,
//! which becomes complete once it has collected as many digests as its
//! recursive count. Nothing is passed above a root.
//!
//! When several levels match, only the shallowest directories are
//! reported and their descendants are suppressed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::groups::DuplicateSet;
use crate::scanner::path_utils::owning_root;
use crate::scanner::Digest;

/// Directories with identical duplicate content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryGroup {
    /// Distinct digests inside each directory
    pub digest_count: usize,
    /// Files inside each directory (recursive)
    pub file_count: usize,
    /// The equal directories, shallowest first
    pub directories: Vec<PathBuf>,
}

/// Accumulates walk counts and duplicate sets for one run.
#[derive(Debug, Default)]
pub struct TreeMerger {
    roots: Vec<PathBuf>,
    counts: HashMap<PathBuf, usize>,
    collected: HashMap<PathBuf, Vec<Digest>>,
}

impl TreeMerger {
    /// Create a merger bounded by `roots`.
    ///
    /// Files outside every root only count towards their own parent.
    #[must_use]
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Record a walked file.
    pub fn count_file(&mut self, path: &Path) {
        let root = owning_root(&self.roots, path).map(Path::to_path_buf);
        let mut dir = path.parent();
        while let Some(current) = dir {
            *self.counts.entry(current.to_path_buf()).or_insert(0) += 1;
            match &root {
                Some(root) if current != root.as_path() => dir = current.parent(),
                _ => break,
            }
        }
    }

    /// Record every member of a resolved duplicate set.
    pub fn add_set(&mut self, set: &DuplicateSet) {
        for member in &set.members {
            if let Some(parent) = member.path.parent() {
                self.collected
                    .entry(parent.to_path_buf())
                    .or_default()
                    .push(set.digest.clone());
            }
        }
    }

    fn is_root(&self, dir: &Path) -> bool {
        self.roots.iter().any(|r| r == dir)
    }

    /// Resolve complete directories and group the equal ones.
    #[must_use]
    pub fn finish(mut self) -> Vec<DirectoryGroup> {
        let mut dirs: Vec<PathBuf> = self.counts.keys().cloned().collect();
        dirs.sort_by(|a, b| {
            depth(b)
                .cmp(&depth(a))
                .then_with(|| a.cmp(b))
        });

        let mut complete: Vec<(PathBuf, Vec<Digest>)> = Vec::new();
        for dir in dirs {
            let expected = self.counts.get(&dir).copied().unwrap_or(0);
            let got = self.collected.get(&dir).map_or(0, Vec::len);
            if expected == 0 || got != expected {
                continue;
            }
            let digests = self.collected.remove(&dir).unwrap_or_default();
            if !self.is_root(&dir) {
                if let Some(parent) = dir.parent() {
                    if self.counts.contains_key(parent) {
                        self.collected
                            .entry(parent.to_path_buf())
                            .or_default()
                            .extend(digests.iter().cloned());
                    }
                }
            }
            complete.push((dir, digests));
        }
        log::debug!("Tree merge: {} complete directories", complete.len());

        // bucket by cheap fingerprint, then confirm on the sorted digest list
        let mut buckets: HashMap<(u64, usize), Vec<(Vec<Digest>, Vec<PathBuf>)>> = HashMap::new();
        for (dir, mut digests) in complete {
            let fingerprint = digests.iter().fold(0u64, |acc, d| acc ^ d.fold64());
            digests.sort();
            let classes = buckets.entry((fingerprint, digests.len())).or_default();
            match classes.iter_mut().find(|(known, _)| *known == digests) {
                Some((_, members)) => members.push(dir),
                None => classes.push((digests, vec![dir])),
            }
        }

        let mut classes: Vec<(Vec<Digest>, Vec<PathBuf>)> = buckets
            .into_values()
            .flatten()
            .filter(|(_, dirs)| dirs.len() > 1)
            .collect();
        for (_, dirs) in &mut classes {
            dirs.sort_by(|a, b| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));
        }
        classes.sort_by(|a, b| {
            depth(&a.1[0])
                .cmp(&depth(&b.1[0]))
                .then_with(|| a.1[0].cmp(&b.1[0]))
        });

        let mut reported: HashSet<PathBuf> = HashSet::new();
        let mut groups = Vec::new();
        for (digests, dirs) in classes {
            let mut kept: Vec<PathBuf> = Vec::with_capacity(dirs.len());
            for dir in dirs {
                let covered = dir
                    .ancestors()
                    .skip(1)
                    .any(|a| reported.contains(a) || kept.iter().any(|k| k == a));
                if !covered {
                    kept.push(dir);
                }
            }
            if kept.len() < 2 {
                continue;
            }
            let distinct: HashSet<&Digest> = digests.iter().collect();
            reported.extend(kept.iter().cloned());
            groups.push(DirectoryGroup {
                digest_count: distinct.len(),
                file_count: digests.len(),
                directories: kept,
            });
        }

        log::info!("Tree merge: {} duplicate directory groups", groups.len());
        groups
    }
}

fn depth(path: &Path) -> usize {
    path.components().count()
}
