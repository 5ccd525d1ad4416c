//! Duplicate detection.
//!
//! This module provides:
//! - Incremental size grouping ([`SizeGrouper`])
//! - Digest partitioning and duplicate sets ([`DuplicateSet`])
//! - Run orchestration ([`DuplicateFinder`])
//! - Duplicate directory detection ([`TreeMerger`])

pub mod finder;
pub mod groups;
pub mod treemerge;

pub use finder::{
    DuplicateFinder, FinderConfig, FinderError, HashPolicy, RunState, RunSummary,
};
pub use groups::{
    group_by_size, partition_by_digest, Admission, DuplicateSet, GroupingStats, OriginalPolicy,
    SizeGroup, SizeGrouper,
};
pub use treemerge::{DirectoryGroup, TreeMerger};
