// Path: crates/types/src/codec.rs

//! Defines the canonical, deterministic binary codec for consensus-critical data.
//!
//! Ledger snapshots, diffs, DKG wire messages and recovered signatures are all
//! encoded with `parity-scale-codec` (SCALE). Hashes over these objects are
//! taken over the canonical bytes, so every component must go through the
//! helpers here.

use parity_scale_codec::{Decode, DecodeAll, Encode};

/// Encodes a value into its canonical byte representation.
pub fn to_bytes_canonical<T: Encode>(v: &T) -> Vec<u8> {
    v.encode()
}

/// Decodes a value from its canonical byte representation.
///
/// Trailing bytes are rejected, so a payload decodes to exactly one value or
/// fails.
pub fn from_bytes_canonical<T: Decode>(b: &[u8]) -> Result<T, String> {
    T::decode_all(&mut &*b).map_err(|e| format!("canonical decode failed: {}", e))
}
