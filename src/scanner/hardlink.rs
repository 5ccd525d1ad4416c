//! Hardlink collapsing.
//!
//! Several directory entries can name the same inode. They share content
//! but reclaiming one of them frees nothing, so by default only the first
//! entry seen for a given (device, inode) pair is admitted to the run.
//!
//! Only files with a link count above one are remembered; a file with a
//! single link cannot collide with a later entry, so tracking it would
//! only cost memory.
//!
//! Detection uses `std::os::unix::fs::MetadataExt`. On other platforms
//! every entry is admitted and same-content links surface as duplicates.
//!
//! ```
//! use dupelint::scanner::hardlink::HardlinkTracker;
//!
//! let tracker = HardlinkTracker::new();
//! assert_eq!(tracker.collapsed(), 0);
//! ```

use std::collections::HashSet;
use std::fs::Metadata;

/// Remembers multiply-linked inodes seen during one walk.
///
/// Not thread-safe; the walker owns one tracker per run.
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    seen: HashSet<FileId>,
    collapsed: usize,
}

impl HardlinkTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an entry should be admitted.
    ///
    /// Returns `false` for a second (or later) link to an inode that was
    /// already admitted.
    pub fn admit(&mut self, metadata: &Metadata) -> bool {
        let Some((id, links)) = FileId::from_metadata(metadata) else {
            return true;
        };
        if links <= 1 {
            return true;
        }
        if self.seen.insert(id) {
            true
        } else {
            self.collapsed += 1;
            false
        }
    }

    /// Number of entries rejected as additional links.
    #[must_use]
    pub fn collapsed(&self) -> usize {
        self.collapsed
    }

    /// Number of multiply-linked inodes remembered.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.seen.len()
    }

    /// Whether this platform exposes inode identity.
    #[must_use]
    pub const fn is_supported() -> bool {
        cfg!(unix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    #[cfg(unix)]
    fn from_metadata(metadata: &Metadata) -> Option<(Self, u64)> {
        use std::os::unix::fs::MetadataExt;
        Some((
            Self {
                dev: metadata.dev(),
                ino: metadata.ino(),
            },
            metadata.nlink(),
        ))
    }

    #[cfg(not(unix))]
    fn from_metadata(_metadata: &Metadata) -> Option<(Self, u64)> {
        None
    }
}
