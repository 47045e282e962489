// Path: crates/llmq/src/pending.rs

use crate::messages::DkgMessageKind;
use mnq_api::network::PeerId;
use mnq_crypto::algorithms::hash::sha256d;
use mnq_types::Hash256;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Default)]
struct Inner {
    per_peer: HashMap<PeerId, usize>,
    seen: HashSet<Hash256>,
    queue: VecDeque<(PeerId, Vec<u8>)>,
}

/// The inbox of one DKG message kind.
///
/// Each peer may push at most `max_per_peer` messages per cycle, and a payload
/// is accepted once no matter how many peers relay it. Decoding is left to the
/// consumer so that network threads never do more than hash and enqueue.
pub struct PendingMessageQueue {
    kind: DkgMessageKind,
    max_per_peer: usize,
    inner: Mutex<Inner>,
}

impl PendingMessageQueue {
    pub fn new(kind: DkgMessageKind, max_per_peer: usize) -> Self {
        Self {
            kind,
            max_per_peer,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn kind(&self) -> DkgMessageKind {
        self.kind
    }

    /// Queues `raw` from `peer`. Returns false if it was dropped.
    pub fn push(&self, peer: PeerId, raw: Vec<u8>) -> bool {
        let hash = sha256d(&raw);
        let mut inner = self.inner.lock();
        let count = inner.per_peer.entry(peer).or_insert(0);
        if *count >= self.max_per_peer {
            tracing::debug!(
                target: "llmq::dkg",
                event = "pending_dropped",
                kind = self.kind.as_str(),
                peer,
                reason = "too many messages"
            );
            mnq_telemetry::dkg_metrics().inc_messages_dropped(self.kind.as_str(), "peer_budget");
            return false;
        }
        // The budget is spent even by duplicates.
        *count += 1;
        if !inner.seen.insert(hash) {
            tracing::trace!(
                target: "llmq::dkg",
                event = "pending_dropped",
                kind = self.kind.as_str(),
                peer,
                reason = "already seen"
            );
            mnq_telemetry::dkg_metrics().inc_messages_dropped(self.kind.as_str(), "duplicate");
            return false;
        }
        inner.queue.push_back((peer, raw));
        mnq_telemetry::dkg_metrics().inc_messages_received(self.kind.as_str());
        true
    }

    /// Removes up to `max` messages in arrival order.
    pub fn pop(&self, max: usize) -> Vec<(PeerId, Vec<u8>)> {
        let mut inner = self.inner.lock();
        let n = max.min(inner.queue.len());
        inner.queue.drain(..n).collect()
    }

    /// Returns true if a payload with this content hash was accepted this cycle.
    pub fn has_seen(&self, hash: &Hash256) -> bool {
        self.inner.lock().seen.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets queued messages, seen hashes and per-peer budgets.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.per_peer.clear();
        inner.seen.clear();
        inner.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_dropped_across_peers() {
        let queue = PendingMessageQueue::new(DkgMessageKind::Contribution, 4);
        assert!(queue.push(1, vec![1, 2, 3]));
        assert!(!queue.push(2, vec![1, 2, 3]));
        assert!(queue.push(2, vec![4]));
        assert_eq!(queue.pop(8), vec![(1, vec![1, 2, 3]), (2, vec![4])]);
        assert!(queue.has_seen(&sha256d([1u8, 2, 3])));
    }

    #[test]
    fn per_peer_budget_counts_duplicates() {
        let queue = PendingMessageQueue::new(DkgMessageKind::Complaint, 2);
        assert!(queue.push(7, vec![1]));
        assert!(!queue.push(7, vec![1]));
        // Budget of two is now exhausted even though only one message was queued.
        assert!(!queue.push(7, vec![2]));
        assert!(queue.push(8, vec![2]));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn pop_drains_in_order_and_clear_resets_budgets() {
        let queue = PendingMessageQueue::new(DkgMessageKind::Justification, 1);
        for peer in 0..5 {
            assert!(queue.push(peer, vec![peer as u8]));
        }
        let first = queue.pop(3);
        assert_eq!(first.iter().map(|(p, _)| *p).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(queue.len(), 2);
        assert!(!queue.push(0, vec![9]));

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.push(0, vec![0]));
    }
}
