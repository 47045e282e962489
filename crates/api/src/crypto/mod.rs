// Path: crates/api/src/crypto/mod.rs
//! Signing contracts for operator and quorum keys.
//!
//! Every signed object in the quorum core is reduced to a 32-byte hash first,
//! so keys only ever sign and verify hashes.

use crate::error::CryptoError;
use mnq_types::Hash256;

/// A key or signature with a fixed-width compressed wire form.
pub trait CompressedPoint: Sized {
    /// The wire form.
    type Bytes;

    fn compress(&self) -> Self::Bytes;

    /// Decodes and validates the wire form.
    fn decompress(bytes: &Self::Bytes) -> Result<Self, CryptoError>;
}

/// A secret key that signs message hashes.
pub trait HashSigner {
    type Signature;

    fn sign_hash(&self, hash: &Hash256) -> Self::Signature;
}

/// A public key that verifies signatures over message hashes.
pub trait HashVerifier {
    type Signature;

    fn verify_hash(&self, hash: &Hash256, sig: &Self::Signature) -> bool;
}
