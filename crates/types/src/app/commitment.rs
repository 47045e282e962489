// Path: crates/types/src/app/commitment.rs
//! Final commitments: the on-chain outcome of one DKG round.

use crate::primitives::{BlsPublicKeyBytes, BlsSignatureBytes, Hash256};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// The result of a DKG round, mined into a block.
#[derive(Clone, Debug, PartialEq, Eq, Default, Encode, Decode, Serialize, Deserialize)]
pub struct FinalCommitment {
    /// Commitment version.
    pub version: u16,
    /// The hash of the quorum base block.
    pub quorum_hash: Hash256,
    /// One bit per quorum member: did the member sign this commitment.
    pub signers: Vec<bool>,
    /// One bit per quorum member: did the member complete the DKG.
    pub valid_members: Vec<bool>,
    /// The resulting quorum threshold public key.
    pub quorum_public_key: BlsPublicKeyBytes,
    /// Hash of the verification vector.
    pub vvec_hash: Hash256,
    /// Threshold signature of the quorum over the commitment hash.
    pub quorum_sig: BlsSignatureBytes,
    /// Aggregate of the signers' operator signatures over the commitment hash.
    pub members_sig: BlsSignatureBytes,
}

impl FinalCommitment {
    /// Returns the number of members that signed.
    pub fn count_signers(&self) -> usize {
        self.signers.iter().filter(|b| **b).count()
    }

    /// Returns the number of members marked valid.
    pub fn count_valid_members(&self) -> usize {
        self.valid_members.iter().filter(|b| **b).count()
    }

    /// A null commitment carries no signers and no valid members.
    pub fn is_null(&self) -> bool {
        self.count_signers() == 0
            && self.count_valid_members() == 0
            && self.quorum_public_key.is_null()
            && self.vvec_hash.is_null()
    }
}

/// The payload of a quorum-commitment special transaction.
#[derive(Clone, Debug, PartialEq, Eq, Default, Encode, Decode, Serialize, Deserialize)]
pub struct FinalCommitmentTxPayload {
    /// Payload version.
    pub version: u16,
    /// The height of the block the commitment was mined in.
    pub height: u32,
    /// The commitment itself.
    pub commitment: FinalCommitment,
}
