// Path: crates/llmq/src/signing/manager.rs

use super::recsig::RecoveredSignature;
use super::store::RecoveredSigStore;
use crate::quorums::{Quorum, QuorumManager, SIGN_HEIGHT_OFFSET};
use mnq_api::chain::ChainView;
use mnq_api::network::{Inventory, InventoryKind, PeerId, PeerReporter, LOCAL_PEER};
use mnq_api::storage::StorageError;
use mnq_api::time::Clock;
use mnq_crypto::sign::batch::{message_id, BlsBatchVerifier};
use mnq_crypto::sign::bls::BlsSignature;
use mnq_telemetry::signing_metrics;
use mnq_types::config::SigningConfig;
use mnq_types::Hash256;
use parking_lot::{Mutex, RwLock};
use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Score for peers relaying signatures that fail batch verification.
const BAD_RECSIG_SCORE: u32 = 100;
/// Score for peers relaying signatures over blocks we cannot accept.
const INADMISSIBLE_RECSIG_SCORE: u32 = 10;

/// Receives every recovered signature accepted by the [`SigningManager`].
///
/// Called synchronously from the thread that accepted the signature.
pub trait RecoveredSigListener: Send + Sync {
    fn on_new_recovered_sig(&self, sig: &RecoveredSignature);
}

/// Produces and announces signature shares for the local member.
///
/// Share creation and threshold recovery live outside this crate. Recovered
/// signatures come back through [`SigningManager::push_reconstructed_recovered_sig`].
pub trait SigShareSigner: Send + Sync {
    fn async_sign(&self, quorum: &Arc<Quorum>, id: &Hash256, msg_hash: &Hash256);
    fn force_reannouncement(&self, quorum: &Arc<Quorum>, id: &Hash256, msg_hash: &Hash256);
}

#[derive(Default)]
struct Pending {
    by_peer: HashMap<PeerId, VecDeque<RecoveredSignature>>,
    reconstructed: HashMap<Hash256, RecoveredSignature>,
}

/// Signatures picked for one verification pass, grouped by sender.
struct Collected {
    by_peer: HashMap<PeerId, Vec<RecoveredSignature>>,
    quorums: HashMap<Hash256, Arc<Quorum>>,
}

fn or_log<T: Default>(result: Result<T, StorageError>, op: &'static str) -> T {
    result.unwrap_or_else(|e| {
        tracing::error!(target: "llmq::signing", event = "store_error", op, error = %e);
        T::default()
    })
}

/// Accepts, verifies, persists and relays recovered signatures, and starts local signing.
pub struct SigningManager {
    config: SigningConfig,
    local_pro_tx_hash: Option<Hash256>,
    chain: Arc<dyn ChainView>,
    quorums: Arc<QuorumManager>,
    store: RecoveredSigStore,
    peers: Arc<dyn PeerReporter>,
    signer: Arc<dyn SigShareSigner>,
    clock: Arc<dyn Clock>,
    pending: Mutex<Pending>,
    listeners: RwLock<Vec<Arc<dyn RecoveredSigListener>>>,
    last_cleanup_ms: Mutex<u64>,
}

impl SigningManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SigningConfig,
        local_pro_tx_hash: Option<Hash256>,
        chain: Arc<dyn ChainView>,
        quorums: Arc<QuorumManager>,
        store: RecoveredSigStore,
        peers: Arc<dyn PeerReporter>,
        signer: Arc<dyn SigShareSigner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_millis();
        Self {
            config,
            local_pro_tx_hash,
            chain,
            quorums,
            store,
            peers,
            signer,
            clock,
            pending: Mutex::new(Pending::default()),
            listeners: RwLock::new(Vec::new()),
            last_cleanup_ms: Mutex::new(now),
        }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn quorums(&self) -> &Arc<QuorumManager> {
        &self.quorums
    }

    pub fn register_listener(&self, listener: Arc<dyn RecoveredSigListener>) {
        self.listeners.write().push(listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn RecoveredSigListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// True if the signature with content hash `hash` is known or pending locally.
    pub fn already_have(&self, hash: &Hash256) -> bool {
        if self.pending.lock().reconstructed.contains_key(hash) {
            return true;
        }
        or_log(self.store.has_recovered_sig_for_hash(hash), "has_for_hash")
    }

    /// Serves a signature to a peer, but only while its quorum is active.
    pub fn get_recovered_sig_for_get_data(&self, hash: &Hash256) -> Option<RecoveredSignature> {
        let sig = or_log(self.store.get_recovered_sig_by_hash(hash), "get_by_hash")?;
        self.quorums.is_quorum_active(&sig.quorum_hash).then_some(sig)
    }

    /// Cheap checks before a relayed signature is queued. Never bans: a quorum
    /// we do not know yet may just be ahead of our chain.
    fn pre_verify(&self, sig: &RecoveredSignature) -> bool {
        if self.quorums.get_quorum(&sig.quorum_hash).is_none() {
            tracing::debug!(
                target: "llmq::signing",
                event = "recsig_unknown_quorum",
                quorum_hash = %sig.quorum_hash
            );
            return false;
        }
        if !self.quorums.is_quorum_active(&sig.quorum_hash) {
            tracing::debug!(
                target: "llmq::signing",
                event = "recsig_inactive_quorum",
                quorum_hash = %sig.quorum_hash
            );
            return false;
        }
        true
    }

    /// Queues a recovered signature relayed by `peer` for batch verification.
    pub fn process_message_recovered_sig(&self, peer: PeerId, sig: RecoveredSignature) {
        if !self.pre_verify(&sig) {
            return;
        }
        let hash = sig.hash();
        if or_log(self.store.has_recovered_sig_for_hash(&hash), "has_for_hash") {
            return;
        }
        tracing::trace!(
            target: "llmq::signing",
            event = "recsig_queued",
            id = %sig.id,
            msg_hash = %sig.msg_hash,
            peer
        );
        let mut pending = self.pending.lock();
        if pending.reconstructed.contains_key(&hash) {
            return;
        }
        pending.by_peer.entry(peer).or_default().push_back(sig);
    }

    /// Takes one signature per peer per round, in random peer order, until
    /// `max_sessions` distinct `(peer, signHash)` pairs are collected.
    fn collect_pending(&self, max_sessions: usize) -> Collected {
        let mut by_peer: HashMap<PeerId, Vec<RecoveredSignature>> = HashMap::new();
        {
            let mut pending = self.pending.lock();
            let mut unique = HashSet::new();
            let mut order: Vec<PeerId> = pending.by_peer.keys().copied().collect();
            order.shuffle(&mut rand::thread_rng());

            while unique.len() < max_sessions && !order.is_empty() {
                order.retain(|peer| {
                    if unique.len() >= max_sessions {
                        return true;
                    }
                    let Some(queue) = pending.by_peer.get_mut(peer) else {
                        return false;
                    };
                    let Some(sig) = queue.pop_front() else {
                        return false;
                    };
                    if !or_log(self.store.has_recovered_sig_for_hash(&sig.hash()), "has_for_hash") {
                        unique.insert((*peer, sig.sign_hash()));
                        by_peer.entry(*peer).or_default().push(sig);
                    }
                    !queue.is_empty()
                });
            }
            pending.by_peer.retain(|_, queue| !queue.is_empty());
        }

        let mut quorums: HashMap<Hash256, Arc<Quorum>> = HashMap::new();
        let mut dropped: HashSet<Hash256> = HashSet::new();
        for sigs in by_peer.values_mut() {
            sigs.retain(|sig| {
                if quorums.contains_key(&sig.quorum_hash) {
                    return true;
                }
                if dropped.contains(&sig.quorum_hash) {
                    return false;
                }
                match self.quorums.get_quorum(&sig.quorum_hash) {
                    Some(q) if self.quorums.is_quorum_active(&sig.quorum_hash) => {
                        quorums.insert(sig.quorum_hash, q);
                        true
                    }
                    _ => {
                        tracing::debug!(
                            target: "llmq::signing",
                            event = "recsig_quorum_gone",
                            quorum_hash = %sig.quorum_hash
                        );
                        dropped.insert(sig.quorum_hash);
                        false
                    }
                }
            });
        }
        by_peer.retain(|_, sigs| !sigs.is_empty());
        Collected { by_peer, quorums }
    }

    fn process_pending_reconstructed(&self) {
        let reconstructed = std::mem::take(&mut self.pending.lock().reconstructed);
        for sig in reconstructed.into_values() {
            self.process_recovered_sig(LOCAL_PEER, sig);
        }
    }

    /// Runs one verification pass. Returns true if the pass was saturated and
    /// another one should follow immediately.
    pub fn process_pending_recovered_sigs(&self) -> bool {
        self.process_pending_reconstructed();

        let max = self.config.max_batch_sessions;
        let Collected { by_peer, quorums } = self.collect_pending(max);
        if by_peer.is_empty() {
            return false;
        }

        let started = Instant::now();
        let mut verifier = BlsBatchVerifier::<PeerId, Hash256>::new(false);
        for (peer, sigs) in &by_peer {
            for sig in sigs {
                let Ok(parsed) = BlsSignature::from_compressed(&sig.sig) else {
                    verifier.bad_sources.insert(*peer);
                    break;
                };
                let Some(quorum) = quorums.get(&sig.quorum_hash) else {
                    continue;
                };
                verifier.push(
                    message_id(*peer, &sig.hash()),
                    *peer,
                    parsed,
                    quorum.public_key().clone(),
                    sig.sign_hash(),
                );
            }
        }
        verifier.verify();
        signing_metrics().observe_batch_verify_duration(started.elapsed().as_secs_f64());

        if !verifier.bad_sources.is_empty() {
            signing_metrics().inc_bad_sources(verifier.bad_sources.len() as u64);
        }
        let mut processed = HashSet::new();
        for (peer, sigs) in by_peer.iter() {
            if verifier.bad_sources.contains(peer) {
                tracing::debug!(target: "llmq::signing", event = "recsig_bad_source", peer = *peer);
                self.peers.misbehaving(*peer, BAD_RECSIG_SCORE, "invalid recovered signature");
                continue;
            }
            for sig in sigs {
                if processed.insert(sig.hash()) {
                    self.process_recovered_sig(*peer, sig.clone());
                }
            }
        }
        by_peer.len() >= max
    }

    /// Accepts a signature whose BLS validity has already been established.
    pub fn process_recovered_sig(&self, peer: PeerId, sig: RecoveredSignature) {
        let Some(block) = self.chain.block_by_hash(&sig.msg_hash) else {
            tracing::debug!(target: "llmq::signing", event = "recsig_unknown_block", msg_hash = %sig.msg_hash, peer);
            self.peers
                .misbehaving(peer, INADMISSIBLE_RECSIG_SCORE, "recovered signature for unknown block");
            return;
        };
        if block.height % SIGN_HEIGHT_OFFSET != 0 {
            self.peers
                .misbehaving(peer, INADMISSIBLE_RECSIG_SCORE, "recovered signature for misaligned height");
            return;
        }
        if !self.chain.is_on_active_chain(&block.hash) || !self.chain.is_fully_validated(&block.hash) {
            self.peers
                .misbehaving(peer, INADMISSIBLE_RECSIG_SCORE, "recovered signature for inactive block");
            return;
        }

        let hash = sig.hash();
        if or_log(self.store.has_recovered_sig_for_hash(&hash), "has_for_hash") {
            return;
        }
        if or_log(self.store.has_recovered_sig_for_id(&sig.id), "has_for_id") {
            if let Some(other) = or_log(self.store.get_recovered_sig_by_id(&sig.id), "get_by_id") {
                if other.sign_hash() != sig.sign_hash() {
                    signing_metrics().inc_conflicts();
                    tracing::warn!(
                        target: "llmq::signing",
                        event = "recsig_conflict",
                        id = %sig.id,
                        msg_hash = %sig.msg_hash,
                        other_msg_hash = %other.msg_hash,
                        peer
                    );
                }
                return;
            }
            // Pruned between the two reads: treat as never seen.
        }

        if let Err(e) = self.store.write_recovered_sig(&sig) {
            tracing::error!(target: "llmq::signing", event = "store_error", op = "write", error = %e);
            return;
        }
        self.pending.lock().reconstructed.remove(&hash);
        signing_metrics().inc_recovered_sigs();
        tracing::debug!(
            target: "llmq::signing",
            event = "recsig_accepted",
            id = %sig.id,
            msg_hash = %sig.msg_hash,
            quorum_hash = %sig.quorum_hash,
            peer
        );

        if self.local_pro_tx_hash.is_some() {
            self.peers.relay_inventory(Inventory {
                kind: InventoryKind::RecoveredSig,
                hash,
            });
        }
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener.on_new_recovered_sig(&sig);
        }
    }

    /// Queues a signature recovered locally from shares. It skips batch verification.
    pub fn push_reconstructed_recovered_sig(&self, sig: RecoveredSignature) {
        self.pending.lock().reconstructed.insert(sig.hash(), sig);
    }

    pub fn truncate_recovered_sig(&self, id: &Hash256) {
        or_log(self.store.truncate_recovered_sig(id), "truncate");
    }

    /// Prunes old signatures and votes, at most once per `cleanup_interval_ms`.
    pub fn cleanup(&self) {
        let now = self.clock.now_millis();
        {
            let mut last = self.last_cleanup_ms.lock();
            if now.saturating_sub(*last) < self.config.cleanup_interval_ms {
                return;
            }
            *last = now;
        }
        let max_age = self.config.max_recovered_sig_age_secs;
        or_log(self.store.cleanup_old_recovered_sigs(max_age), "cleanup_sigs");
        or_log(self.store.cleanup_old_votes(max_age), "cleanup_votes");
    }

    /// Starts signing `msg_hash` under `id` if the local node is a valid member
    /// of the responsible quorum. Never signs two messages for one id.
    pub fn async_sign_if_member(
        &self,
        id: &Hash256,
        msg_hash: &Hash256,
        quorum_hash: Option<Hash256>,
        allow_resign: bool,
    ) -> bool {
        let Some(local) = self.local_pro_tx_hash else {
            return false;
        };
        let quorum = match quorum_hash {
            Some(hash) => self.quorums.get_quorum(&hash),
            None => self.quorums.select_quorum_for_signing(id, None, SIGN_HEIGHT_OFFSET),
        };
        let Some(quorum) = quorum else {
            tracing::debug!(target: "llmq::signing", event = "sign_no_quorum", id = %id);
            return false;
        };
        if !quorum.is_valid_member(&local) {
            return false;
        }

        let voted = or_log(self.store.get_vote_for_id(id), "get_vote");
        if let Some(prev) = voted {
            if prev != *msg_hash {
                tracing::warn!(
                    target: "llmq::signing",
                    event = "vote_conflict",
                    id = %id,
                    voted = %prev,
                    requested = %msg_hash
                );
                return false;
            }
            if !allow_resign {
                tracing::debug!(target: "llmq::signing", event = "already_voted", id = %id, msg_hash = %msg_hash);
                return false;
            }
            tracing::debug!(target: "llmq::signing", event = "resign", id = %id, msg_hash = %msg_hash);
        }

        if or_log(self.store.has_recovered_sig_for_id(id), "has_for_id") {
            return true;
        }
        if voted.is_none() {
            if let Err(e) = self.store.write_vote_for_id(id, msg_hash) {
                tracing::error!(target: "llmq::signing", event = "store_error", op = "write_vote", error = %e);
                return false;
            }
        }

        if allow_resign {
            self.signer.force_reannouncement(&quorum, id, msg_hash);
        }
        self.signer.async_sign(&quorum, id, msg_hash);
        true
    }

    pub fn has_recovered_sig(&self, id: &Hash256, msg_hash: &Hash256) -> bool {
        or_log(self.store.has_recovered_sig(id, msg_hash), "has")
    }

    pub fn has_recovered_sig_for_id(&self, id: &Hash256) -> bool {
        or_log(self.store.has_recovered_sig_for_id(id), "has_for_id")
    }

    pub fn has_recovered_sig_for_session(&self, sign_hash: &Hash256) -> bool {
        or_log(self.store.has_recovered_sig_for_session(sign_hash), "has_for_session")
    }

    /// A signature exists for `id`, but over a different message.
    pub fn is_conflicting(&self, id: &Hash256, msg_hash: &Hash256) -> bool {
        self.has_recovered_sig_for_id(id) && !self.has_recovered_sig(id, msg_hash)
    }

    /// The signature for `id`, if it signs `msg_hash`.
    pub fn get_recovered_sig_for_id(&self, id: &Hash256, msg_hash: &Hash256) -> Option<RecoveredSignature> {
        or_log(self.store.get_recovered_sig_by_id(id), "get_by_id").filter(|sig| sig.msg_hash == *msg_hash)
    }

    pub fn has_voted_on_id(&self, id: &Hash256) -> bool {
        or_log(self.store.has_voted_on_id(id), "has_voted")
    }

    pub fn get_vote_for_id(&self, id: &Hash256) -> Option<Hash256> {
        or_log(self.store.get_vote_for_id(id), "get_vote")
    }

    /// Number of relayed signatures waiting for verification.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().by_peer.values().map(VecDeque::len).sum()
    }
}
