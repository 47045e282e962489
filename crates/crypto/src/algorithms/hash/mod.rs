// Path: crates/crypto/src/algorithms/hash/mod.rs
//! Cryptographic hash functions using `sha2`.
//!
//! Object hashes (sign hashes, commitment hashes, quorum scores) are double
//! SHA-256 over the canonical encoding of their fields, written in order.

use mnq_types::Hash256;
use parity_scale_codec::Encode;
use sha2::{Digest, Sha256};

/// Single SHA-256.
pub fn sha256<T: AsRef<[u8]>>(data: T) -> Hash256 {
    Hash256(Sha256::digest(data.as_ref()).into())
}

/// Double SHA-256.
pub fn sha256d<T: AsRef<[u8]>>(data: T) -> Hash256 {
    let first = Sha256::digest(data.as_ref());
    Hash256(Sha256::digest(first).into())
}

/// An incremental double-SHA-256 writer over canonically encoded fields.
#[derive(Clone, Default)]
pub struct HashWriter {
    inner: Sha256,
}

impl HashWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw bytes.
    pub fn write(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    /// Appends the canonical encoding of `value`.
    pub fn write_encoded<T: Encode>(&mut self, value: &T) -> &mut Self {
        value.using_encoded(|bytes| self.inner.update(bytes));
        self
    }

    /// Finishes with a second SHA-256 round.
    pub fn finalize(self) -> Hash256 {
        let first = self.inner.finalize();
        Hash256(Sha256::digest(first).into())
    }
}

/// Hashes the canonical encoding of `value`.
pub fn hash_canonical<T: Encode>(value: &T) -> Hash256 {
    let mut writer = HashWriter::new();
    writer.write_encoded(value);
    writer.finalize()
}
