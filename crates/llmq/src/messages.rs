// Path: crates/llmq/src/messages.rs
//! DKG wire messages.
//!
//! The cryptographic content of each message is opaque here: it is produced
//! and consumed by the [`DkgSession`](crate::session::DkgSession). The handler
//! only needs the signer, the quorum and the operator signature.

use mnq_api::network::InventoryKind;
use mnq_crypto::algorithms::hash::{hash_canonical, HashWriter};
use mnq_types::codec::{from_bytes_canonical, to_bytes_canonical};
use mnq_types::{BlsSignatureBytes, Hash256};
use parity_scale_codec::{Decode, Encode};

/// The four message types exchanged during a DKG cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub enum DkgMessageKind {
    Contribution,
    Complaint,
    Justification,
    PrematureCommitment,
}

impl DkgMessageKind {
    pub const ALL: [DkgMessageKind; 4] = [
        Self::Contribution,
        Self::Complaint,
        Self::Justification,
        Self::PrematureCommitment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contribution => "contribution",
            Self::Complaint => "complaint",
            Self::Justification => "justification",
            Self::PrematureCommitment => "premature_commitment",
        }
    }

    pub fn inventory_kind(&self) -> InventoryKind {
        match self {
            Self::Contribution => InventoryKind::QuorumContribution,
            Self::Complaint => InventoryKind::QuorumComplaint,
            Self::Justification => InventoryKind::QuorumJustification,
            Self::PrematureCommitment => InventoryKind::QuorumPrematureCommitment,
        }
    }
}

/// A signed DKG message from one quorum member.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DkgMessage {
    pub kind: DkgMessageKind,
    pub quorum_hash: Hash256,
    /// The sending member.
    pub pro_tx_hash: Hash256,
    /// Type-specific content, interpreted by the session.
    pub payload: Vec<u8>,
    /// Operator signature over [`DkgMessage::sign_hash`].
    pub sig: BlsSignatureBytes,
}

impl DkgMessage {
    /// The hash the sender's operator key signs: every field except the signature.
    pub fn sign_hash(&self) -> Hash256 {
        let mut writer = HashWriter::new();
        writer
            .write_encoded(&self.kind)
            .write_encoded(&self.quorum_hash)
            .write_encoded(&self.pro_tx_hash)
            .write_encoded(&self.payload);
        writer.finalize()
    }

    /// The content hash used for inventory and deduplication.
    pub fn hash(&self) -> Hash256 {
        hash_canonical(self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        to_bytes_canonical(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        from_bytes_canonical(bytes)
    }
}
