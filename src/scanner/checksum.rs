//! Checksum algorithm family and algorithm-tagged digests.
//!
//! # Overview
//!
//! Digest equality is the only duplicate criterion, so every algorithm
//! offered here must keep birthday-bound collisions negligible at a few
//! million inputs. The weakest member is 64 bits wide.
//!
//! | Algorithm | Digest bytes | Notes                       |
//! |-----------|--------------|-----------------------------|
//! | `xxh64`   | 8            | fastest, non-cryptographic  |
//! | `xxh3`    | 16           | XXH3-128, non-cryptographic |
//! | `md5`     | 16           | legacy cryptographic        |
//! | `sha1`    | 20           | legacy cryptographic        |
//! | `sha256`  | 32           | cryptographic               |
//! | `sha512`  | 64           | cryptographic               |
//! | `blake3`  | 32           | cryptographic, default      |
//!
//! # Example
//!
//! ```
//! use dupelint::scanner::{checksum_bytes, ChecksumAlgorithm};
//!
//! let a = checksum_bytes(ChecksumAlgorithm::Sha256, b"hello");
//! let b = checksum_bytes(ChecksumAlgorithm::Sha256, b"hello");
//! assert_eq!(a, b);
//! assert_eq!(a.len(), 32);
//!
//! // Digests from different algorithms never compare equal
//! let c = checksum_bytes(ChecksumAlgorithm::Blake3, b"hello");
//! assert_ne!(a, c);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sha2::Digest as _;

use crate::config::ConfigError;

/// Selectable content checksum algorithm.
///
/// Variants are declared from fastest/weakest to slowest/strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// XXH64, 64-bit
    Xxh64,
    /// XXH3, 128-bit variant
    Xxh3,
    /// MD5, 128-bit
    Md5,
    /// SHA-1, 160-bit
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-512
    Sha512,
    /// BLAKE3, 256-bit
    #[default]
    Blake3,
}

impl ChecksumAlgorithm {
    /// Every supported algorithm, weakest first.
    pub const ALL: [ChecksumAlgorithm; 7] = [
        Self::Xxh64,
        Self::Xxh3,
        Self::Md5,
        Self::Sha1,
        Self::Sha256,
        Self::Sha512,
        Self::Blake3,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Xxh64 => "xxh64",
            Self::Xxh3 => "xxh3",
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
            Self::Blake3 => "blake3",
        }
    }

    /// Width of the digest in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Xxh64 => 8,
            Self::Xxh3 | Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 | Self::Blake3 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Whether the algorithm is designed to resist deliberate collisions.
    #[must_use]
    pub const fn is_cryptographic(self) -> bool {
        !matches!(self, Self::Xxh64 | Self::Xxh3)
    }

    /// Start a streaming checksum with this algorithm.
    #[must_use]
    pub fn checksum(self) -> Checksum {
        Checksum::new(self)
    }

    /// Comma-separated list of valid names, for error messages.
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect();

        match normalized.as_str() {
            "xxh64" | "xxhash64" | "xxhash" => Ok(Self::Xxh64),
            "xxh3" | "xxh3128" => Ok(Self::Xxh3),
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "blake3" | "b3" => Ok(Self::Blake3),
            _ => Err(ConfigError::UnknownAlgorithm {
                name: s.to_string(),
                valid: Self::valid_names(),
            }),
        }
    }
}

/// A finished content digest, tagged with the algorithm that produced it.
///
/// Equality and hashing include the algorithm, so two digests computed
/// with different algorithms are never equal even if their bytes are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest {
    algorithm: ChecksumAlgorithm,
    bytes: Box<[u8]>,
}

impl Digest {
    /// Wrap raw digest bytes.
    ///
    /// # Panics
    ///
    /// Debug assertion fails if the length does not match the algorithm.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm, bytes: impl Into<Box<[u8]>>) -> Self {
        let bytes = bytes.into();
        debug_assert_eq!(bytes.len(), algorithm.digest_len());
        Self { algorithm, bytes }
    }

    /// Algorithm that produced this digest.
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Raw digest bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Digest width in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false for digests produced by [`Checksum`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hexadecimal rendering.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// First eight bytes folded into a `u64`, used as a cheap fingerprint.
    #[must_use]
    pub fn fold64(&self) -> u64 {
        let mut buf = [0u8; 8];
        let n = self.bytes.len().min(8);
        buf[..n].copy_from_slice(&self.bytes[..n]);
        u64::from_le_bytes(buf)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

enum State {
    Xxh64(xxhash_rust::xxh64::Xxh64),
    Xxh3(Box<xxhash_rust::xxh3::Xxh3>),
    Md5(md5::Md5),
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
    Sha512(sha2::Sha512),
    Blake3(Box<blake3::Hasher>),
}

/// Streaming checksum state for one algorithm.
///
/// ```
/// use dupelint::scanner::{checksum_bytes, ChecksumAlgorithm};
///
/// let mut sum = ChecksumAlgorithm::Xxh64.checksum();
/// sum.update(b"chunk 1");
/// sum.update(b"chunk 2");
/// assert_eq!(sum.finalize(), checksum_bytes(ChecksumAlgorithm::Xxh64, b"chunk 1chunk 2"));
/// ```
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    state: State,
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checksum")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Checksum {
    /// Start a new streaming checksum.
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        let state = match algorithm {
            ChecksumAlgorithm::Xxh64 => State::Xxh64(xxhash_rust::xxh64::Xxh64::new(0)),
            ChecksumAlgorithm::Xxh3 => State::Xxh3(Box::new(xxhash_rust::xxh3::Xxh3::new())),
            ChecksumAlgorithm::Md5 => State::Md5(md5::Md5::default()),
            ChecksumAlgorithm::Sha1 => State::Sha1(sha1::Sha1::default()),
            ChecksumAlgorithm::Sha256 => State::Sha256(sha2::Sha256::default()),
            ChecksumAlgorithm::Sha512 => State::Sha512(sha2::Sha512::default()),
            ChecksumAlgorithm::Blake3 => State::Blake3(Box::new(blake3::Hasher::new())),
        };
        Self { algorithm, state }
    }

    /// Algorithm of this checksum.
    #[must_use]
    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.state {
            State::Xxh64(h) => h.update(data),
            State::Xxh3(h) => h.update(data),
            State::Md5(h) => h.update(data),
            State::Sha1(h) => h.update(data),
            State::Sha256(h) => h.update(data),
            State::Sha512(h) => h.update(data),
            State::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Consume the state and produce the digest.
    ///
    /// Integer-valued digests (xxh64, xxh3) are rendered big-endian so their
    /// hex form matches the canonical `xxhsum` output.
    #[must_use]
    pub fn finalize(self) -> Digest {
        let bytes: Box<[u8]> = match self.state {
            State::Xxh64(h) => h.digest().to_be_bytes().to_vec().into_boxed_slice(),
            State::Xxh3(h) => h.digest128().to_be_bytes().to_vec().into_boxed_slice(),
            State::Md5(h) => h.finalize().to_vec().into_boxed_slice(),
            State::Sha1(h) => h.finalize().to_vec().into_boxed_slice(),
            State::Sha256(h) => h.finalize().to_vec().into_boxed_slice(),
            State::Sha512(h) => h.finalize().to_vec().into_boxed_slice(),
            State::Blake3(h) => h.finalize().as_bytes().to_vec().into_boxed_slice(),
        };
        Digest::new(self.algorithm, bytes)
    }
}

/// One-shot checksum of an in-memory buffer.
#[must_use]
pub fn checksum_bytes(algorithm: ChecksumAlgorithm, data: &[u8]) -> Digest {
    let mut sum = Checksum::new(algorithm);
    sum.update(data);
    sum.finalize()
}
