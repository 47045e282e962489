// Path: crates/llmq/src/blockprocessor.rs
//! Final commitments in the mempool-like mineable pool and on chain.

use crate::commitment::{verify, verify_null};
use crate::session::{CommitmentPool, QuorumMemberSource};
use mnq_api::chain::ChainView;
use mnq_api::network::{Inventory, InventoryKind, PeerId, PeerReporter};
use mnq_api::storage::{KvStore, StorageError, WriteBatch};
use mnq_crypto::algorithms::hash::hash_canonical;
use mnq_types::app::{Block, FinalCommitment, ProviderTx};
use mnq_types::codec::{from_bytes_canonical, to_bytes_canonical};
use mnq_types::config::ConsensusParams;
use mnq_types::error::MembershipError;
use mnq_types::keys::{composite_key, QUORUM_MINED_COMMITMENT_PREFIX};
use mnq_types::Hash256;
use parity_scale_codec::{Decode, Encode};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Score for peers relaying invalid final commitments.
const BAD_COMMITMENT_SCORE: u32 = 100;

/// A commitment as persisted once mined.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct MinedCommitment {
    pub commitment: FinalCommitment,
    pub mined_block_hash: Hash256,
}

#[derive(Default)]
struct Mineable {
    by_quorum: HashMap<Hash256, Hash256>,
    by_hash: HashMap<Hash256, FinalCommitment>,
}

/// Tracks final commitments waiting to be mined and those already mined.
pub struct QuorumBlockProcessor {
    params: ConsensusParams,
    store: Arc<dyn KvStore>,
    chain: Arc<dyn ChainView>,
    members: Arc<dyn QuorumMemberSource>,
    peers: Arc<dyn PeerReporter>,
    mineable: RwLock<Mineable>,
}

fn mined_key(quorum_hash: &Hash256) -> Vec<u8> {
    composite_key(QUORUM_MINED_COMMITMENT_PREFIX, &[quorum_hash.as_bytes()])
}

impl QuorumBlockProcessor {
    pub fn new(
        params: ConsensusParams,
        store: Arc<dyn KvStore>,
        chain: Arc<dyn ChainView>,
        members: Arc<dyn QuorumMemberSource>,
        peers: Arc<dyn PeerReporter>,
    ) -> Self {
        Self {
            params,
            store,
            chain,
            members,
            peers,
            mineable: RwLock::new(Mineable::default()),
        }
    }

    /// Handles a final commitment relayed by `peer`.
    pub fn process_commitment_message(&self, peer: PeerId, commitment: FinalCommitment) {
        if commitment.is_null() {
            self.peers.misbehaving(peer, BAD_COMMITMENT_SCORE, "null final commitment");
            return;
        }
        let Some(base) = self.chain.block_by_hash(&commitment.quorum_hash) else {
            // Could be a block we have not seen yet.
            tracing::debug!(
                target: "llmq::quorums",
                event = "commitment_unknown_block",
                quorum_hash = %commitment.quorum_hash,
                peer
            );
            return;
        };
        if base.height % self.params.llmq.dkg_interval.max(1) != 0 {
            self.peers.misbehaving(peer, BAD_COMMITMENT_SCORE, "commitment for a non-base block");
            return;
        }
        match self.has_mined_commitment(&commitment.quorum_hash) {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(target: "llmq::quorums", event = "store_error", error = %e);
                return;
            }
        }
        let members = match self.members.quorum_members(&base) {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(target: "llmq::quorums", event = "members_unavailable", error = %e);
                return;
            }
        };
        if let Err(e) = verify(&commitment, &self.params.llmq, &base, &members, true) {
            tracing::debug!(
                target: "llmq::quorums",
                event = "commitment_invalid",
                quorum_hash = %commitment.quorum_hash,
                error = %e,
                peer
            );
            self.peers.misbehaving(peer, BAD_COMMITMENT_SCORE, "invalid final commitment");
            return;
        }
        if let Some(inv) = self.add_mineable_commitment(commitment) {
            self.peers.relay_inventory(inv);
        }
    }

    pub fn has_mineable_commitment(&self, hash: &Hash256) -> bool {
        self.mineable.read().by_hash.contains_key(hash)
    }

    pub fn mineable_commitment_by_hash(&self, hash: &Hash256) -> Option<FinalCommitment> {
        self.mineable.read().by_hash.get(hash).cloned()
    }

    /// The best commitment known for a quorum that has not been mined yet.
    pub fn mineable_commitment(&self, quorum_hash: &Hash256) -> Option<FinalCommitment> {
        let mineable = self.mineable.read();
        let hash = mineable.by_quorum.get(quorum_hash)?;
        mineable.by_hash.get(hash).cloned()
    }

    /// Verifies and records the commitments mined in `block`.
    ///
    /// With `just_check` set nothing is written.
    pub fn process_block(&self, block: &Block, just_check: bool) -> Result<(), MembershipError> {
        let mut batch = WriteBatch::new();
        let mut seen = HashSet::new();
        for qc in block.txs.iter().filter_map(|tx| match &tx.payload {
            Some(ProviderTx::QuorumCommitment(qc)) => Some(&qc.commitment),
            _ => None,
        }) {
            let base = self.chain.block_by_hash(&qc.quorum_hash).ok_or_else(|| {
                MembershipError::violation("bad-qc-quorum-hash", format!("unknown quorum block {}", qc.quorum_hash))
            })?;
            if !seen.insert(qc.quorum_hash) {
                return Err(MembershipError::violation(
                    "bad-qc-dup",
                    format!("two commitments for quorum {}", qc.quorum_hash),
                ));
            }
            if qc.is_null() {
                verify_null(qc, &self.params.llmq, &base)
                    .map_err(|e| MembershipError::violation("bad-qc-invalid-null", e.to_string()))?;
                continue;
            }
            if self.has_mined_commitment(&qc.quorum_hash)? {
                return Err(MembershipError::violation(
                    "bad-qc-dup",
                    format!("quorum {} already has a mined commitment", qc.quorum_hash),
                ));
            }
            let members = self.members.quorum_members(&base)?;
            verify(qc, &self.params.llmq, &base, &members, true)
                .map_err(|e| MembershipError::violation("bad-qc-invalid", e.to_string()))?;

            let mined = MinedCommitment {
                commitment: qc.clone(),
                mined_block_hash: block.header.hash,
            };
            batch.put(mined_key(&qc.quorum_hash), to_bytes_canonical(&mined));
        }
        if just_check || batch.is_empty() {
            return Ok(());
        }
        self.store.write_batch(batch)?;

        let mut mineable = self.mineable.write();
        for quorum_hash in &seen {
            if let Some(hash) = mineable.by_quorum.remove(quorum_hash) {
                mineable.by_hash.remove(&hash);
            }
        }
        tracing::debug!(
            target: "llmq::quorums",
            event = "commitments_mined",
            height = block.header.height,
            count = seen.len()
        );
        Ok(())
    }

    /// Forgets the commitments mined in `block`.
    pub fn undo_block(&self, block: &Block) -> Result<(), MembershipError> {
        let mut batch = WriteBatch::new();
        for qc in block.txs.iter().filter_map(|tx| match &tx.payload {
            Some(ProviderTx::QuorumCommitment(qc)) if !qc.commitment.is_null() => Some(&qc.commitment),
            _ => None,
        }) {
            if let Some(mined) = self.mined_commitment(&qc.quorum_hash)? {
                if mined.mined_block_hash == block.header.hash {
                    batch.delete(mined_key(&qc.quorum_hash));
                }
            }
        }
        if !batch.is_empty() {
            self.store.write_batch(batch)?;
        }
        Ok(())
    }

    pub fn has_mined_commitment(&self, quorum_hash: &Hash256) -> Result<bool, StorageError> {
        self.store.exists(&mined_key(quorum_hash))
    }

    pub fn mined_commitment(&self, quorum_hash: &Hash256) -> Result<Option<MinedCommitment>, StorageError> {
        match self.store.get(&mined_key(quorum_hash))? {
            Some(bytes) => from_bytes_canonical(&bytes).map(Some).map_err(StorageError::Decode),
            None => Ok(None),
        }
    }
}

impl CommitmentPool for QuorumBlockProcessor {
    fn add_mineable_commitment(&self, commitment: FinalCommitment) -> Option<Inventory> {
        let hash = hash_canonical(&commitment);
        let mut mineable = self.mineable.write();
        let replace = match mineable.by_quorum.get(&commitment.quorum_hash) {
            None => true,
            Some(existing) => mineable
                .by_hash
                .get(existing)
                .map_or(true, |old| commitment.count_signers() > old.count_signers()),
        };
        if !replace {
            return None;
        }
        if let Some(old) = mineable.by_quorum.insert(commitment.quorum_hash, hash) {
            mineable.by_hash.remove(&old);
        }
        tracing::debug!(
            target: "llmq::quorums",
            event = "mineable_commitment",
            quorum_hash = %commitment.quorum_hash,
            signers = commitment.count_signers(),
            hash = %hash
        );
        mineable.by_hash.insert(hash, commitment);
        Some(Inventory {
            kind: InventoryKind::QuorumFinalCommitment,
            hash,
        })
    }
}
