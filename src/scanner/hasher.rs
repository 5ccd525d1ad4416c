//! Streaming file hasher with prefix and full-content modes.
//!
//! # Overview
//!
//! The [`Hasher`] reads a file through a fixed-size buffer (or a read-only
//! memory map above a size threshold) and feeds it into the configured
//! [`ChecksumAlgorithm`]. Prefix hashing reads at most
//! [`DEFAULT_PREFIX_SIZE`] bytes and is used to cheaply split same-size
//! groups before committing to a full read.
//!
//! The shutdown flag is polled between chunks. A cancelled hash drops the
//! partial state and the file handle before returning
//! [`HashError::Cancelled`].
//!
//! # Example
//!
//! ```no_run
//! use dupelint::scanner::{ChecksumAlgorithm, Hasher};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(ChecksumAlgorithm::Sha256);
//! let prefix = hasher.prefix_digest(Path::new("a.bin")).unwrap();
//! let full = hasher.full_digest(Path::new("a.bin")).unwrap();
//! println!("{} / {}", prefix.to_hex(), full.to_hex());
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memmap2::Mmap;

use super::checksum::{Checksum, ChecksumAlgorithm, Digest};
use super::HashError;

/// Default number of leading bytes read by [`Hasher::prefix_digest`].
pub const DEFAULT_PREFIX_SIZE: u64 = 4096;

/// Read buffer size for streaming hashes.
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Default size above which memory mapping is used.
const DEFAULT_MMAP_THRESHOLD: u64 = 64 * 1024 * 1024;

/// File content hasher bound to one algorithm.
#[derive(Debug, Clone)]
pub struct Hasher {
    algorithm: ChecksumAlgorithm,
    prefix_size: u64,
    use_mmap: bool,
    mmap_threshold: u64,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(ChecksumAlgorithm::default())
    }
}

impl Hasher {
    /// Create a hasher for the given algorithm.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        Self {
            algorithm,
            prefix_size: DEFAULT_PREFIX_SIZE,
            use_mmap: false,
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
            shutdown_flag: None,
        }
    }

    /// Set the prefix length used by [`Hasher::prefix_digest`].
    #[must_use]
    pub fn with_prefix_size(mut self, size: u64) -> Self {
        self.prefix_size = size.max(1);
        self
    }

    /// Enable or disable memory-mapped reads for large files.
    #[must_use]
    pub fn with_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    /// Set the file size above which memory mapping is used.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Set the shutdown flag polled between chunks.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Algorithm used by this hasher.
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Configured prefix length.
    #[must_use]
    pub fn prefix_size(&self) -> u64 {
        self.prefix_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the first `prefix_size` bytes of a file.
    ///
    /// For files no larger than the prefix this equals [`Hasher::full_digest`].
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, or if
    /// the run was cancelled.
    pub fn prefix_digest(&self, path: &Path) -> Result<Digest, HashError> {
        self.digest_file(path, Some(self.prefix_size))
    }

    /// Hash the entire content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, or if
    /// the run was cancelled.
    pub fn full_digest(&self, path: &Path) -> Result<Digest, HashError> {
        self.digest_file(path, None)
    }

    /// Hash up to `limit` bytes of a file (`None` reads to the end).
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] on I/O failure or cancellation.
    pub fn digest_file(&self, path: &Path, limit: Option<u64>) -> Result<Digest, HashError> {
        if self.is_shutdown_requested() {
            return Err(HashError::Cancelled(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut checksum = Checksum::new(self.algorithm);

        let file_len = file
            .metadata()
            .map_err(|e| HashError::from_io(path, e))?
            .len();
        let wanted = limit.map_or(file_len, |l| l.min(file_len));

        if self.use_mmap && limit.is_none() && file_len > self.mmap_threshold {
            match self.hash_mmap(&file, path, &mut checksum) {
                Ok(()) => return Ok(checksum.finalize()),
                Err(MmapFailure::Cancelled) => return Err(HashError::Cancelled(path.to_path_buf())),
                Err(MmapFailure::Map(e)) => {
                    log::debug!(
                        "Memory map failed for {}, falling back to buffered read: {}",
                        path.display(),
                        e
                    );
                    checksum = Checksum::new(self.algorithm);
                }
            }
        }

        self.hash_reader(file, path, wanted, &mut checksum)?;
        Ok(checksum.finalize())
    }

    fn hash_reader(
        &self,
        file: File,
        path: &Path,
        wanted: u64,
        checksum: &mut Checksum,
    ) -> Result<(), HashError> {
        let mut reader = file.take(wanted);
        let mut buffer = vec![0u8; READ_CHUNK_SIZE];

        loop {
            if self.is_shutdown_requested() {
                log::trace!("Abandoning partial hash of {}", path.display());
                return Err(HashError::Cancelled(path.to_path_buf()));
            }
            let n = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            checksum.update(&buffer[..n]);
        }
        Ok(())
    }

    fn hash_mmap(
        &self,
        file: &File,
        path: &Path,
        checksum: &mut Checksum,
    ) -> Result<(), MmapFailure> {
        // SAFETY: the map is read-only and dropped before returning. A file
        // truncated concurrently can fault; the buffered path is the fallback.
        let mmap = unsafe { Mmap::map(file) }.map_err(MmapFailure::Map)?;
        log::trace!("Hashing {} via mmap ({} bytes)", path.display(), mmap.len());

        for chunk in mmap.chunks(READ_CHUNK_SIZE * 16) {
            if self.is_shutdown_requested() {
                return Err(MmapFailure::Cancelled);
            }
            checksum.update(chunk);
        }
        Ok(())
    }
}

enum MmapFailure {
    Map(std::io::Error),
    Cancelled,
}
