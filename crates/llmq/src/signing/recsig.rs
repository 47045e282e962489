// Path: crates/llmq/src/signing/recsig.rs

use mnq_crypto::algorithms::hash::{hash_canonical, HashWriter};
use mnq_types::codec::{from_bytes_canonical, to_bytes_canonical};
use mnq_types::{BlsSignatureBytes, Hash256};
use parity_scale_codec::{Decode, Encode};
use serde_json::json;

/// The hash a quorum threshold-signs for request `id` and message `msg_hash`.
pub fn build_sign_hash(quorum_hash: &Hash256, id: &Hash256, msg_hash: &Hash256) -> Hash256 {
    let mut w = HashWriter::new();
    w.write_encoded(quorum_hash).write_encoded(id).write_encoded(msg_hash);
    w.finalize()
}

/// A threshold signature recovered from enough member shares.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct RecoveredSignature {
    pub quorum_hash: Hash256,
    pub id: Hash256,
    pub msg_hash: Hash256,
    pub sig: BlsSignatureBytes,
}

impl RecoveredSignature {
    pub fn sign_hash(&self) -> Hash256 {
        build_sign_hash(&self.quorum_hash, &self.id, &self.msg_hash)
    }

    /// Content hash, used for relay and deduplication.
    pub fn hash(&self) -> Hash256 {
        hash_canonical(self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        to_bytes_canonical(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        from_bytes_canonical(bytes)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "quorumHash": self.quorum_hash.to_hex(),
            "id": self.id.to_hex(),
            "msgHash": self.msg_hash.to_hex(),
            "sig": hex::encode(self.sig.as_bytes()),
            "hash": self.hash().to_hex(),
        })
    }
}
