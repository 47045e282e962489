// Path: crates/api/src/network/mod.rs
//! Peer identities, misbehavior reporting and inventory relay.

use mnq_types::Hash256;

/// A connected peer. Negative ids denote locally produced objects.
pub type PeerId = i64;

/// The peer id used for objects produced by the local node.
pub const LOCAL_PEER: PeerId = -1;

/// The kinds of objects the quorum core announces to peers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InventoryKind {
    /// A DKG contribution.
    QuorumContribution,
    /// A DKG complaint.
    QuorumComplaint,
    /// A DKG justification.
    QuorumJustification,
    /// A DKG premature commitment.
    QuorumPrematureCommitment,
    /// A final commitment awaiting inclusion in a block.
    QuorumFinalCommitment,
    /// A recovered threshold signature.
    RecoveredSig,
}

/// An announcement of an object by content hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Inventory {
    /// What the hash refers to.
    pub kind: InventoryKind,
    /// The object's content hash.
    pub hash: Hash256,
}

/// The node's peer manager, as seen by the quorum core.
///
/// Implementations must not block: calls are made from phase handlers and the
/// signing worker while they hold no locks.
pub trait PeerReporter: Send + Sync {
    /// Adds `score` to the misbehavior counter of `peer`.
    fn misbehaving(&self, peer: PeerId, score: u32, reason: &str);

    /// Announces an object to all connected peers.
    fn relay_inventory(&self, inv: Inventory);
}
