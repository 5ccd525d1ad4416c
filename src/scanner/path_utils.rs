//! Root path normalization.
//!
//! Roots given on the command line may name the same directory more than
//! once, differ only in Unicode normalization (macOS stores NFD, most
//! other systems NFC), or be nested inside one another. Walking such a
//! list as-is would discover some files twice, and a file discovered twice
//! would look like its own duplicate. [`prepare_roots`] resolves every
//! root, compares them by their NFC form, and keeps only the outermost
//! root of each overlapping family.
//!
//! # Example
//!
//! ```
//! use dupelint::scanner::path_utils::normalize_path_str;
//!
//! let nfc = "café.txt";
//! let nfd = "cafe\u{0301}.txt";
//! assert_eq!(normalize_path_str(nfc), normalize_path_str(nfd));
//! ```

use std::path::{Path, PathBuf};

use unicode_normalization::{is_nfc, UnicodeNormalization};

use super::ScanError;

/// Normalize a string to NFC (composed) form.
#[must_use]
pub fn normalize_path_str(s: &str) -> String {
    if is_nfc(s) {
        s.to_string()
    } else {
        s.nfc().collect()
    }
}

/// Comparison key for a path: its NFC form, or the lossy rendering for
/// non-UTF-8 paths.
#[must_use]
pub fn path_key(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(normalize_path_str(s)),
        None => PathBuf::from(path.to_string_lossy().into_owned()),
    }
}

/// Resolve a single root: it must exist and be a directory.
///
/// # Errors
///
/// Returns [`ScanError::NotFound`], [`ScanError::PermissionDenied`],
/// [`ScanError::Io`] or [`ScanError::NotADirectory`].
pub fn resolve_root(root: &Path) -> Result<PathBuf, ScanError> {
    let canonical =
        std::fs::canonicalize(root).map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;
    let metadata =
        std::fs::metadata(&canonical).map_err(|e| ScanError::from_io(root.to_path_buf(), e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    Ok(canonical)
}

/// Resolve, deduplicate and un-nest a list of roots.
///
/// Returns the usable roots in their original order, followed by one
/// error per root that could not be used. Roots equal to or nested inside
/// an earlier usable root are dropped silently (debug log).
#[must_use]
pub fn prepare_roots(roots: &[PathBuf]) -> (Vec<PathBuf>, Vec<ScanError>) {
    let mut errors = Vec::new();
    let mut resolved: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(roots.len());

    for root in roots {
        match resolve_root(root) {
            Ok(canonical) => {
                let key = path_key(&canonical);
                resolved.push((canonical, key));
            }
            Err(e) => {
                log::warn!("Skipping root {}: {}", root.display(), e);
                errors.push(e);
            }
        }
    }

    let mut kept: Vec<PathBuf> = Vec::with_capacity(resolved.len());
    for (index, (canonical, key)) in resolved.iter().enumerate() {
        let covered = resolved.iter().enumerate().any(|(other, (_, other_key))| {
            if other == index {
                return false;
            }
            if other_key == key {
                // identical roots: the first occurrence wins
                return other < index;
            }
            key.starts_with(other_key)
        });
        if covered {
            log::debug!(
                "Root {} is already covered by another root",
                canonical.display()
            );
        } else {
            kept.push(canonical.clone());
        }
    }

    (kept, errors)
}

/// Root that contains `path`, if any.
#[must_use]
pub fn owning_root<'a>(roots: &'a [PathBuf], path: &Path) -> Option<&'a Path> {
    roots
        .iter()
        .map(PathBuf::as_path)
        .filter(|root| path.starts_with(root))
        .max_by_key(|root| root.components().count())
}
