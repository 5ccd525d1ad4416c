//! Size grouping, digest partitioning and duplicate sets.
//!
//! # Overview
//!
//! Files of different sizes cannot be duplicates, so the first filter is
//! an exact-size bucket. [`SizeGrouper`] is the incremental form used
//! while the walk is still running: it reports the moment a bucket
//! reaches two members, and every later arrival, so hashing can start
//! early without ever treating a bucket as final before the walk ends.
//!
//! Within a bucket, [`partition_by_digest`] clusters hashed files, and
//! each surviving cluster becomes a [`DuplicateSet`] whose members are
//! ordered by an [`OriginalPolicy`]: `members[0]` is the original.
//!
//! # Example
//!
//! ```
//! use dupelint::scanner::FileCandidate;
//! use dupelint::duplicates::group_by_size;
//! use std::path::PathBuf;
//! use std::time::SystemTime;
//!
//! let files = vec![
//!     FileCandidate::new(PathBuf::from("/file1.txt"), 1024, SystemTime::now()),
//!     FileCandidate::new(PathBuf::from("/file2.txt"), 1024, SystemTime::now()).with_seq(1),
//!     FileCandidate::new(PathBuf::from("/file3.txt"), 2048, SystemTime::now()).with_seq(2),
//! ];
//!
//! let (groups, stats) = group_by_size(files);
//! assert_eq!(stats.total_files, 3);
//! assert_eq!(stats.potential_duplicates, 2);
//! assert_eq!(groups.len(), 1);
//! ```

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::scanner::{Digest, FileCandidate};

/// Files sharing one exact byte size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeGroup {
    /// Size shared by every member
    pub size: u64,
    /// Members in discovery order
    pub files: Vec<FileCandidate>,
}

impl SizeGroup {
    /// Create a group from members that all have `size` bytes.
    #[must_use]
    pub fn with_files(size: u64, files: Vec<FileCandidate>) -> Self {
        debug_assert!(files.iter().all(|f| f.size == size));
        Self { size, files }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Upper bound on reclaimable bytes if every member turned out equal.
    #[must_use]
    pub fn potential_savings(&self) -> u64 {
        self.size * (self.files.len().saturating_sub(1) as u64)
    }
}

/// Statistics gathered while grouping by size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupingStats {
    /// Candidates seen
    pub total_files: usize,
    /// Sum of all candidate sizes
    pub total_size: u64,
    /// Distinct sizes seen
    pub unique_sizes: usize,
    /// Candidates in buckets of two or more
    pub potential_duplicates: usize,
    /// Candidates eliminated because their size was unique
    pub eliminated_unique: usize,
    /// Zero-byte candidates seen
    pub empty_files: usize,
    /// Buckets with two or more members
    pub duplicate_groups: usize,
}

impl GroupingStats {
    /// Percentage of candidates eliminated by size alone.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Outcome of inserting a candidate into a [`SizeGrouper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First file of its size; nothing to hash yet.
    Held,
    /// The bucket just reached two members; both are returned.
    Promoted([FileCandidate; 2]),
    /// A later member of a bucket that was already promoted.
    Joined(FileCandidate),
}

/// Incremental size bucketing owned by one run.
#[derive(Debug, Default)]
pub struct SizeGrouper {
    buckets: HashMap<u64, Vec<FileCandidate>>,
    total_files: usize,
    total_size: u64,
    empty_files: usize,
}

impl SizeGrouper {
    /// Create an empty grouper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate to its size bucket.
    pub fn insert(&mut self, file: FileCandidate) -> Admission {
        self.total_files += 1;
        self.total_size += file.size;
        if file.size == 0 {
            self.empty_files += 1;
        }

        let bucket = self.buckets.entry(file.size).or_default();
        bucket.push(file);
        match bucket.len() {
            1 => Admission::Held,
            2 => Admission::Promoted([bucket[0].clone(), bucket[1].clone()]),
            n => Admission::Joined(bucket[n - 1].clone()),
        }
    }

    /// Candidates inserted so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.total_files
    }

    /// Whether nothing was inserted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_files == 0
    }

    /// Close the grouper: buckets with two or more members, largest size
    /// first, members in discovery order.
    #[must_use]
    pub fn finish(self) -> (Vec<SizeGroup>, GroupingStats) {
        let mut stats = GroupingStats {
            total_files: self.total_files,
            total_size: self.total_size,
            unique_sizes: self.buckets.len(),
            empty_files: self.empty_files,
            ..GroupingStats::default()
        };

        let mut groups = Vec::new();
        for (size, mut files) in self.buckets {
            if files.len() < 2 {
                stats.eliminated_unique += files.len();
                continue;
            }
            files.sort_by_key(|f| f.seq);
            stats.potential_duplicates += files.len();
            stats.duplicate_groups += 1;
            log::debug!("Size group {} bytes: {} candidates", size, files.len());
            groups.push(SizeGroup::with_files(size, files));
        }
        groups.sort_by(|a, b| {
            b.size
                .cmp(&a.size)
                .then_with(|| a.files[0].seq.cmp(&b.files[0].seq))
        });

        log::info!(
            "Size grouping: {} files -> {} candidates in {} groups ({:.1}% eliminated)",
            stats.total_files,
            stats.potential_duplicates,
            stats.duplicate_groups,
            stats.elimination_rate()
        );
        (groups, stats)
    }
}

/// Group a finished list of candidates by size.
#[must_use]
pub fn group_by_size(
    files: impl IntoIterator<Item = FileCandidate>,
) -> (Vec<SizeGroup>, GroupingStats) {
    let mut grouper = SizeGrouper::new();
    for file in files {
        grouper.insert(file);
    }
    grouper.finish()
}

/// Rule for choosing the original of a duplicate set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginalPolicy {
    /// Earliest modification time.
    #[default]
    #[serde(alias = "oldest")]
    OldestMtime,
    /// Lexicographically smallest path.
    #[serde(alias = "path")]
    SmallestPath,
    /// Earliest discovered during the walk.
    #[serde(alias = "first")]
    FirstDiscovered,
}

impl OriginalPolicy {
    /// Total order used to rank set members; the least member is the
    /// original.
    #[must_use]
    pub fn compare(self, a: &FileCandidate, b: &FileCandidate) -> Ordering {
        let by_path = || a.path.cmp(&b.path).then_with(|| a.seq.cmp(&b.seq));
        match self {
            Self::OldestMtime => a.modified.cmp(&b.modified).then_with(by_path),
            Self::SmallestPath => by_path(),
            Self::FirstDiscovered => a.seq.cmp(&b.seq).then_with(|| a.path.cmp(&b.path)),
        }
    }

    /// Short name used on the command line.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::OldestMtime => "oldest",
            Self::SmallestPath => "path",
            Self::FirstDiscovered => "first",
        }
    }
}

impl std::fmt::Display for OriginalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Split items by digest, keeping order of first appearance.
///
/// Clusters with a single member are dropped.
#[must_use]
pub fn partition_by_digest<T>(items: Vec<(T, Digest)>) -> Vec<(Digest, Vec<T>)> {
    let mut index: HashMap<Digest, usize> = HashMap::new();
    let mut clusters: Vec<(Digest, Vec<T>)> = Vec::new();

    for (item, digest) in items {
        match index.get(&digest) {
            Some(&i) => clusters[i].1.push(item),
            None => {
                index.insert(digest.clone(), clusters.len());
                clusters.push((digest, vec![item]));
            }
        }
    }

    clusters.retain(|(_, members)| members.len() > 1);
    clusters
}

/// Files with identical size and digest.
///
/// `members[0]` is the original; the others are its twins, ordered by
/// the same policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateSet {
    /// Stable identifier: the discovery index of the original
    pub id: usize,
    /// Size of every member
    pub size: u64,
    /// Content digest shared by every member
    pub digest: Digest,
    /// Members, original first
    pub members: Vec<FileCandidate>,
}

impl DuplicateSet {
    /// Build a set, ordering members by `policy`.
    ///
    /// Returns `None` for fewer than two members.
    #[must_use]
    pub fn new(digest: Digest, mut members: Vec<FileCandidate>, policy: OriginalPolicy) -> Option<Self> {
        if members.len() < 2 {
            return None;
        }
        members.sort_by(|a, b| policy.compare(a, b));
        let size = members[0].size;
        debug_assert!(members.iter().all(|m| m.size == size));
        Some(Self {
            id: members[0].seq,
            size,
            digest,
            members,
        })
    }

    /// The member kept as original.
    #[must_use]
    pub fn original(&self) -> &FileCandidate {
        &self.members[0]
    }

    /// Every member except the original.
    #[must_use]
    pub fn twins(&self) -> &[FileCandidate] {
        &self.members[1..]
    }

    /// Number of siblings each member has.
    #[must_use]
    pub fn twin_count(&self) -> usize {
        self.members.len() - 1
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; sets have at least two members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Bytes freed by removing every twin.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.twin_count() as u64
    }

    /// Member paths, original first.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.members.iter().map(|m| m.path.clone()).collect()
    }
}
