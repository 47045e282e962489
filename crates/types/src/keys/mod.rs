// Path: crates/types/src/keys/mod.rs
//! Defines the key prefixes for everything persisted in the ordered key-value store.
//!
//! Every index described for the recovered-signature store and the membership
//! snapshot cache maps onto one prefix here. Composite keys are built by
//! appending fixed-width, big-endian encoded fields so that range scans
//! iterate in numeric order. Prefixes carry a leading length byte so that no
//! prefix is itself a prefix of another.

/// `rs_r ‖ id` → recovered signature; `rs_r ‖ id ‖ msgHash` → big-endian insertion time.
pub const RECSIG_BY_ID_PREFIX: &[u8] = b"\x04rs_r";
/// `rs_h ‖ hash` → id. Survives truncation so relays of old signatures are still recognised.
pub const RECSIG_BY_HASH_PREFIX: &[u8] = b"\x04rs_h";
/// `rs_s ‖ signHash` → marker.
pub const RECSIG_BY_SIGN_HASH_PREFIX: &[u8] = b"\x04rs_s";
/// `rs_t ‖ be32(time) ‖ id` → marker, scanned by pruning.
pub const RECSIG_BY_TIME_PREFIX: &[u8] = b"\x04rs_t";
/// `rs_v ‖ id` → msgHash the local node voted for.
pub const VOTE_BY_ID_PREFIX: &[u8] = b"\x04rs_v";
/// `rs_vt ‖ be32(time) ‖ id` → marker, scanned by vote pruning.
pub const VOTE_BY_TIME_PREFIX: &[u8] = b"\x05rs_vt";

/// `q_mc ‖ quorumHash` → mined final commitment and the hash of the block it was mined in.
pub const QUORUM_MINED_COMMITMENT_PREFIX: &[u8] = b"\x04q_mc";

/// `mn_s ‖ blockHash` → canonical membership ledger snapshot.
pub const MN_SNAPSHOT_PREFIX: &[u8] = b"\x04mn_s";
/// The key of the last processed block hash.
pub const MN_BEST_BLOCK_KEY: &[u8] = b"\x07mn_best";

/// Concatenates a prefix and any number of key parts.
pub fn composite_key(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = prefix.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}
