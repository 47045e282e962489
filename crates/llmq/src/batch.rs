// Path: crates/llmq/src/batch.rs
//! Draining a pending queue into the session with batched signature checks.

use crate::messages::DkgMessage;
use crate::pending::PendingMessageQueue;
use crate::session::{DkgSession, PreVerifyFailure};
use mnq_api::network::{PeerId, PeerReporter};
use mnq_crypto::sign::bls::{
    aggregate_signatures_insecure, verify_insecure_aggregated, BlsPublicKey, BlsSignature,
};
use std::collections::{BTreeSet, HashSet};

/// Score reported against peers that send undecodable, invalid or badly signed messages.
pub const DKG_MISBEHAVIOR_SCORE: u32 = 100;

struct Prepared {
    peer: PeerId,
    pubkey: BlsPublicKey,
    sig: BlsSignature,
    sign_hash: mnq_types::Hash256,
}

/// Returns the peers that sent at least one message with an invalid signature.
///
/// All signatures are checked in one aggregate pairing first. If that fails and
/// every message came from one peer, that peer is blamed without further work;
/// otherwise each message is verified on its own. Two messages with the same
/// sign hash mean at least one signature is bad, so the aggregate is skipped.
pub fn verify_message_sigs(session: &dyn DkgSession, messages: &[(PeerId, DkgMessage)]) -> BTreeSet<PeerId> {
    let mut bad = BTreeSet::new();
    if messages.is_empty() {
        return bad;
    }

    let mut prepared = Vec::with_capacity(messages.len());
    for (peer, msg) in messages {
        let key = session
            .member_operator_key(&msg.pro_tx_hash)
            .and_then(|k| BlsPublicKey::from_compressed(&k).ok());
        let sig = BlsSignature::from_compressed(&msg.sig).ok();
        match (key, sig) {
            (Some(pubkey), Some(sig)) => prepared.push(Prepared {
                peer: *peer,
                pubkey,
                sig,
                sign_hash: msg.sign_hash(),
            }),
            _ => {
                bad.insert(*peer);
            }
        }
    }

    let mut hashes = HashSet::with_capacity(prepared.len());
    let single = prepared.iter().any(|p| !hashes.insert(p.sign_hash));
    if !single && !prepared.is_empty() {
        let sigs: Vec<BlsSignature> = prepared.iter().map(|p| p.sig.clone()).collect();
        let keys: Vec<BlsPublicKey> = prepared.iter().map(|p| p.pubkey.clone()).collect();
        let sign_hashes: Vec<_> = prepared.iter().map(|p| p.sign_hash).collect();
        let valid = aggregate_signatures_insecure(&sigs)
            .map(|agg| verify_insecure_aggregated(&agg, &keys, &sign_hashes))
            .unwrap_or(false);
        if valid {
            return bad;
        }
        let first = messages.first().map(|(peer, _)| *peer);
        if messages.iter().all(|(peer, _)| Some(*peer) == first) {
            bad.extend(first);
            return bad;
        }
    }

    for p in &prepared {
        if bad.contains(&p.peer) {
            continue;
        }
        if !p.pubkey.verify_hash(&p.sign_hash, &p.sig) {
            bad.insert(p.peer);
        }
    }
    bad
}

/// Pops up to `max` messages, verifies them and hands the good ones to the session.
///
/// Returns the number of messages delivered, or `None` if the queue was empty.
pub fn process_pending_batch(
    session: &dyn DkgSession,
    queue: &PendingMessageQueue,
    max: usize,
    peers: &dyn PeerReporter,
) -> Option<usize> {
    let raw = queue.pop(max);
    if raw.is_empty() {
        return None;
    }
    let kind = queue.kind().as_str();

    let mut preverified = Vec::with_capacity(raw.len());
    for (peer, bytes) in raw {
        let msg = match DkgMessage::from_bytes(&bytes) {
            Ok(msg) if msg.kind == queue.kind() => msg,
            Ok(_) | Err(_) => {
                tracing::debug!(target: "llmq::dkg", event = "decode_failed", kind, peer);
                peers.misbehaving(peer, DKG_MISBEHAVIOR_SCORE, "failed to deserialize message");
                continue;
            }
        };
        match session.pre_verify(&msg) {
            Ok(()) => preverified.push((peer, msg)),
            Err(PreVerifyFailure::Ban) => {
                tracing::debug!(target: "llmq::dkg", event = "preverify_ban", kind, peer);
                peers.misbehaving(peer, DKG_MISBEHAVIOR_SCORE, "banning node due to failed preverification");
            }
            Err(PreVerifyFailure::Skip) => {
                tracing::trace!(target: "llmq::dkg", event = "preverify_skip", kind, peer);
            }
        }
    }
    if preverified.is_empty() {
        return Some(0);
    }

    let bad = verify_message_sigs(session, &preverified);
    if !bad.is_empty() {
        mnq_telemetry::dkg_metrics().inc_bad_sources(kind, bad.len() as u64);
        for peer in &bad {
            tracing::debug!(target: "llmq::dkg", event = "bad_signature", kind, peer = *peer);
            peers.misbehaving(*peer, DKG_MISBEHAVIOR_SCORE, "failed to verify signature");
        }
    }
    let mut delivered = 0;
    for (peer, msg) in preverified {
        if bad.contains(&peer) {
            continue;
        }
        session.receive_message(msg.hash(), msg);
        delivered += 1;
    }
    Some(delivered)
}
