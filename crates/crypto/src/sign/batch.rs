// Path: crates/crypto/src/sign/batch.rs

use crate::algorithms::hash::HashWriter;
use crate::sign::bls::{
    aggregate_public_keys_insecure, aggregate_signatures_insecure, verify_insecure_aggregated,
    BlsPublicKey, BlsSignature,
};
use mnq_types::Hash256;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

struct PendingMessage<S> {
    source: S,
    sign_hash: Hash256,
    sig: BlsSignature,
    pubkey: BlsPublicKey,
}

/// Verifies many `(source, message)` signatures with as few pairings as possible.
///
/// All messages are first checked in one aggregate pass. If that fails, the
/// messages are re-checked per source, and with `per_message_fallback` each
/// message of a failing source is checked individually. Afterwards
/// `bad_sources` and `bad_messages` name exactly the offenders.
pub struct BlsBatchVerifier<S, M> {
    per_message_fallback: bool,
    messages: BTreeMap<M, PendingMessage<S>>,
    /// Sources that sent at least one invalid signature.
    pub bad_sources: BTreeSet<S>,
    /// Messages whose signature is invalid (only with per-message fallback).
    pub bad_messages: BTreeSet<M>,
}

impl<S, M> BlsBatchVerifier<S, M>
where
    S: Ord + Clone + Send + Sync,
    M: Ord + Clone + Send + Sync,
{
    /// Creates an empty verifier.
    pub fn new(per_message_fallback: bool) -> Self {
        Self {
            per_message_fallback,
            messages: BTreeMap::new(),
            bad_sources: BTreeSet::new(),
            bad_messages: BTreeSet::new(),
        }
    }

    /// Queues a message. A second message with the same id replaces nothing and is ignored.
    pub fn push(&mut self, id: M, source: S, sig: BlsSignature, pubkey: BlsPublicKey, sign_hash: Hash256) {
        self.messages.entry(id).or_insert(PendingMessage {
            source,
            sign_hash,
            sig,
            pubkey,
        });
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Runs the verification, filling `bad_sources` and `bad_messages`.
    pub fn verify(&mut self) {
        let all: Vec<&PendingMessage<S>> = self.messages.values().collect();
        if verify_group(&all) {
            return;
        }

        let mut by_source: BTreeMap<&S, Vec<(&M, &PendingMessage<S>)>> = BTreeMap::new();
        for (id, msg) in &self.messages {
            by_source.entry(&msg.source).or_default().push((id, msg));
        }

        let per_message_fallback = self.per_message_fallback;
        let results: Vec<(S, Vec<M>)> = by_source
            .into_par_iter()
            .filter_map(|(source, msgs)| {
                let refs: Vec<&PendingMessage<S>> = msgs.iter().map(|(_, m)| *m).collect();
                if verify_group(&refs) {
                    return None;
                }
                let bad: Vec<M> = if per_message_fallback {
                    msgs.iter()
                        .filter(|(_, m)| !m.pubkey.verify_hash(&m.sign_hash, &m.sig))
                        .map(|(id, _)| (*id).clone())
                        .collect()
                } else {
                    Vec::new()
                };
                Some((source.clone(), bad))
            })
            .collect();

        for (source, bad) in results {
            self.bad_sources.insert(source);
            self.bad_messages.extend(bad);
        }
    }
}

/// Aggregates the signatures of a group and checks them in one pairing product.
///
/// Keys of messages with an identical sign hash are summed so that every hash
/// appears once in the final check.
fn verify_group<S>(msgs: &[&PendingMessage<S>]) -> bool {
    if msgs.is_empty() {
        return true;
    }
    let mut by_hash: BTreeMap<Hash256, Vec<BlsPublicKey>> = BTreeMap::new();
    let mut sigs = Vec::with_capacity(msgs.len());
    for msg in msgs {
        by_hash.entry(msg.sign_hash).or_default().push(msg.pubkey.clone());
        sigs.push(msg.sig.clone());
    }
    let Ok(agg_sig) = aggregate_signatures_insecure(&sigs) else {
        return false;
    };
    let mut hashes = Vec::with_capacity(by_hash.len());
    let mut keys = Vec::with_capacity(by_hash.len());
    for (hash, pks) in by_hash {
        match aggregate_public_keys_insecure(&pks) {
            Ok(pk) => {
                hashes.push(hash);
                keys.push(pk);
            }
            Err(_) => return false,
        }
    }
    verify_insecure_aggregated(&agg_sig, &keys, &hashes)
}

/// Derives a stable id for a message from its source and sign hash.
pub fn message_id(source: i64, sign_hash: &Hash256) -> Hash256 {
    let mut writer = HashWriter::new();
    writer.write(&source.to_le_bytes()).write(sign_hash.as_bytes());
    writer.finalize()
}
