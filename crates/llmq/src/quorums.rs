// Path: crates/llmq/src/quorums.rs
//! Mined quorums: lookup, scanning, activity and signing-quorum selection.

use crate::blockprocessor::QuorumBlockProcessor;
use crate::session::QuorumMemberSource;
use crate::signing::recsig::build_sign_hash;
use crate::utils::{quorum_connections, watch_connections};
use lru::LruCache;
use mnq_api::chain::ChainView;
use mnq_crypto::algorithms::hash::HashWriter;
use mnq_crypto::sign::bls::{BlsPublicKey, BlsSignature};
use mnq_membership::QuorumMembers;
use mnq_types::app::{BlockRef, FinalCommitment};
use mnq_types::config::ConsensusParams;
use mnq_types::Hash256;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Blocks between the signing height and the chain state used to pick a quorum.
pub const SIGN_HEIGHT_OFFSET: u32 = 5;

/// Watch connections opened per quorum by non-members that watch quorums.
pub const WATCH_CONNECTION_COUNT: usize = 2;

const QUORUM_CACHE_SIZE: usize = 10;

/// A quorum with a mined final commitment.
#[derive(Debug)]
pub struct Quorum {
    pub commitment: FinalCommitment,
    pub base: BlockRef,
    pub mined_block_hash: Hash256,
    pub members: QuorumMembers,
    public_key: BlsPublicKey,
}

impl Quorum {
    pub fn quorum_hash(&self) -> Hash256 {
        self.commitment.quorum_hash
    }

    pub fn public_key(&self) -> &BlsPublicKey {
        &self.public_key
    }

    pub fn member_index(&self, pro_tx_hash: &Hash256) -> Option<usize> {
        self.members.iter().position(|m| m.pro_tx_hash == *pro_tx_hash)
    }

    pub fn is_member(&self, pro_tx_hash: &Hash256) -> bool {
        self.member_index(pro_tx_hash).is_some()
    }

    /// A member that completed the DKG and holds a key share.
    pub fn is_valid_member(&self, pro_tx_hash: &Hash256) -> bool {
        self.member_index(pro_tx_hash)
            .and_then(|i| self.commitment.valid_members.get(i).copied())
            .unwrap_or(false)
    }

    pub fn member_hashes(&self) -> Vec<Hash256> {
        self.members.iter().map(|m| m.pro_tx_hash).collect()
    }
}

/// Outcome of checking a recovered signature against the selected quorum.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecoveredSigVerdict {
    NoQuorum,
    Valid,
    Invalid,
}

/// The peers the local node should keep connected for one quorum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuorumConnectionPlan {
    /// The local node is a member and connects to these members.
    Member(BTreeSet<Hash256>),
    /// The local node watches the quorum through these members.
    Watch(BTreeSet<Hash256>),
}

pub struct QuorumManager {
    params: ConsensusParams,
    chain: Arc<dyn ChainView>,
    blocks: Arc<QuorumBlockProcessor>,
    members: Arc<dyn QuorumMemberSource>,
    cache: Mutex<LruCache<Hash256, Arc<Quorum>>>,
}

impl QuorumManager {
    pub fn new(
        params: ConsensusParams,
        chain: Arc<dyn ChainView>,
        blocks: Arc<QuorumBlockProcessor>,
        members: Arc<dyn QuorumMemberSource>,
    ) -> Self {
        let cap = NonZeroUsize::new(QUORUM_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            params,
            chain,
            blocks,
            members,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Loads a quorum by its base block hash. Only quorums with a mined commitment exist.
    pub fn get_quorum(&self, quorum_hash: &Hash256) -> Option<Arc<Quorum>> {
        // A disconnected block may have taken the commitment with it.
        match self.blocks.has_mined_commitment(quorum_hash) {
            Ok(true) => {}
            Ok(false) => {
                self.cache.lock().pop(quorum_hash);
                return None;
            }
            Err(e) => {
                tracing::warn!(target: "llmq::quorums", event = "store_error", error = %e);
                return None;
            }
        }
        if let Some(quorum) = self.cache.lock().get(quorum_hash) {
            return Some(quorum.clone());
        }
        let quorum = Arc::new(self.build_quorum(quorum_hash)?);
        self.cache.lock().put(*quorum_hash, quorum.clone());
        Some(quorum)
    }

    fn build_quorum(&self, quorum_hash: &Hash256) -> Option<Quorum> {
        let base = self.chain.block_by_hash(quorum_hash)?;
        let mined = match self.blocks.mined_commitment(quorum_hash) {
            Ok(mined) => mined?,
            Err(e) => {
                tracing::warn!(target: "llmq::quorums", event = "store_error", error = %e);
                return None;
            }
        };
        let members = match self.members.quorum_members(&base) {
            Ok(members) => members,
            Err(e) => {
                tracing::warn!(target: "llmq::quorums", event = "members_unavailable", error = %e);
                return None;
            }
        };
        let public_key = match BlsPublicKey::from_compressed(&mined.commitment.quorum_public_key) {
            Ok(key) => key,
            Err(e) => {
                tracing::error!(
                    target: "llmq::quorums",
                    event = "bad_quorum_key",
                    quorum_hash = %quorum_hash,
                    error = %e
                );
                return None;
            }
        };
        Some(Quorum {
            commitment: mined.commitment,
            base,
            mined_block_hash: mined.mined_block_hash,
            members,
            public_key,
        })
    }

    /// Up to `count` quorums, newest first, whose base blocks are at or below `start`.
    pub fn scan_quorums(&self, start: &BlockRef, count: usize) -> Vec<Arc<Quorum>> {
        let interval = self.params.llmq.dkg_interval.max(1);
        let mut out = Vec::with_capacity(count);
        let mut cursor = self.chain.ancestor(start, start.height - start.height % interval);
        while let Some(block) = cursor {
            if out.len() >= count {
                break;
            }
            if let Some(quorum) = self.get_quorum(&block.hash) {
                out.push(quorum);
            }
            if block.height < interval {
                break;
            }
            cursor = self.chain.ancestor(&block, block.height - interval);
        }
        out
    }

    pub fn scan_quorums_at_tip(&self, count: usize) -> Vec<Arc<Quorum>> {
        match self.chain.tip() {
            Some(tip) => self.scan_quorums(&tip, count),
            None => Vec::new(),
        }
    }

    /// A quorum stays active for `keep_old_connections` cycles after it is mined.
    pub fn is_quorum_active(&self, quorum_hash: &Hash256) -> bool {
        self.scan_quorums_at_tip(self.params.llmq.keep_old_connections)
            .iter()
            .any(|q| q.quorum_hash() == *quorum_hash)
    }

    /// Picks the quorum responsible for `selection_hash` as of `sign_height - offset`.
    ///
    /// `sign_height` defaults to the tip height.
    pub fn select_quorum_for_signing(
        &self,
        selection_hash: &Hash256,
        sign_height: Option<u32>,
        offset: u32,
    ) -> Option<Arc<Quorum>> {
        let tip = self.chain.tip()?;
        let sign_height = sign_height.unwrap_or(tip.height);
        let start_height = sign_height.checked_sub(offset)?;
        if start_height > tip.height {
            return None;
        }
        let start = self.chain.ancestor(&tip, start_height)?;
        self.scan_quorums(&start, self.params.llmq.signing_active_quorum_count)
            .into_iter()
            .min_by_key(|q| {
                let mut w = HashWriter::new();
                w.write_encoded(&q.quorum_hash()).write_encoded(selection_hash);
                w.finalize()
            })
    }

    /// Checks `sig` against the quorum selected for `id` at `sign_height`.
    pub fn verify_recovered_sig(
        &self,
        sign_height: Option<u32>,
        id: &Hash256,
        msg_hash: &Hash256,
        sig: &BlsSignature,
        offset: u32,
    ) -> RecoveredSigVerdict {
        match self.select_quorum_for_signing(id, sign_height, offset) {
            None => RecoveredSigVerdict::NoQuorum,
            Some(quorum) => verify_with_quorum(&quorum, id, msg_hash, sig),
        }
    }

    /// Connections the node at `local` should hold for every active quorum.
    ///
    /// Non-members get watch connections only when `watch_seed` is set.
    pub fn connection_plan(
        &self,
        local: &Hash256,
        watch_seed: Option<Hash256>,
    ) -> Vec<(Hash256, QuorumConnectionPlan)> {
        let llmq = &self.params.llmq;
        let mut plan = Vec::new();
        for quorum in self.scan_quorums_at_tip(llmq.keep_old_connections) {
            let members = quorum.member_hashes();
            if quorum.is_member(local) {
                let peers = quorum_connections(&members, local, llmq.all_members_connected, false);
                plan.push((quorum.quorum_hash(), QuorumConnectionPlan::Member(peers)));
            } else if let Some(seed) = watch_seed {
                let picked = watch_connections(seed, &quorum.quorum_hash(), members.len(), WATCH_CONNECTION_COUNT)
                    .into_iter()
                    .filter_map(|i| members.get(i).copied())
                    .collect();
                plan.push((quorum.quorum_hash(), QuorumConnectionPlan::Watch(picked)));
            }
        }
        plan
    }
}

/// Checks `sig` over the sign hash of `(quorum, id, msg_hash)`.
pub fn verify_with_quorum(quorum: &Quorum, id: &Hash256, msg_hash: &Hash256, sig: &BlsSignature) -> RecoveredSigVerdict {
    let sign_hash = build_sign_hash(&quorum.quorum_hash(), id, msg_hash);
    if quorum.public_key().verify_hash(&sign_hash, sig) {
        RecoveredSigVerdict::Valid
    } else {
        RecoveredSigVerdict::Invalid
    }
}
