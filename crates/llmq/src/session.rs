// Path: crates/llmq/src/session.rs
//! Collaborators of the phase handler.

use crate::messages::{DkgMessage, DkgMessageKind};
use mnq_api::network::Inventory;
use mnq_membership::{MembershipManager, QuorumMembers};
use mnq_types::app::{BlockRef, FinalCommitment};
use mnq_types::error::{DkgError, MembershipError};
use mnq_types::{BlsPublicKeyBytes, Hash256};

/// Why a message failed pre-verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreVerifyFailure {
    /// Skip the message.
    Skip,
    /// Skip the message and punish the sender.
    Ban,
}

/// The cryptographic side of one DKG cycle.
///
/// The handler owns scheduling, queueing and signature batching; the session
/// owns the polynomial math and decides which members are complained about.
/// Local actions return the messages the node produced so the handler can
/// feed them through its own queues and relay them.
pub trait DkgSession: Send + Sync {
    /// Starts a new cycle for the quorum based at `base`.
    fn init(
        &self,
        base: &BlockRef,
        members: QuorumMembers,
        my_pro_tx_hash: Option<Hash256>,
    ) -> Result<(), DkgError>;

    fn are_we_member(&self) -> bool;

    /// Position of the local node in the member list.
    fn my_member_index(&self) -> Option<usize>;

    /// The operator key of a member of the current cycle.
    fn member_operator_key(&self, pro_tx_hash: &Hash256) -> Option<BlsPublicKeyBytes>;

    fn contribute(&self) -> Vec<DkgMessage>;
    fn verify_and_complain(&self) -> Vec<DkgMessage>;
    fn verify_and_justify(&self) -> Vec<DkgMessage>;
    fn verify_and_commit(&self) -> Vec<DkgMessage>;

    /// Structural checks only. Signatures are batch-verified afterwards.
    fn pre_verify(&self, msg: &DkgMessage) -> Result<(), PreVerifyFailure>;

    /// Accepts a message whose signature has been verified.
    fn receive_message(&self, hash: Hash256, msg: DkgMessage);

    /// Looks up a message accepted this cycle, for serving peers.
    fn message(&self, kind: DkgMessageKind, hash: &Hash256) -> Option<DkgMessage>;

    /// Builds the final commitments from the premature commitments received.
    fn finalize_commitments(&self) -> Vec<FinalCommitment>;
}

/// Where finished commitments go to be mined.
pub trait CommitmentPool: Send + Sync {
    /// Offers a commitment. Returns the inventory to relay if it was new or better.
    fn add_mineable_commitment(&self, commitment: FinalCommitment) -> Option<Inventory>;
}

/// Deterministic member selection for a quorum base block.
pub trait QuorumMemberSource: Send + Sync {
    fn quorum_members(&self, base: &BlockRef) -> Result<QuorumMembers, MembershipError>;
}

impl QuorumMemberSource for MembershipManager {
    fn quorum_members(&self, base: &BlockRef) -> Result<QuorumMembers, MembershipError> {
        MembershipManager::quorum_members(self, base)
    }
}
