// Path: crates/test_utils/src/network.rs

use mnq_api::network::{Inventory, PeerId, PeerReporter};
use parking_lot::Mutex;

/// A `PeerReporter` that records every call.
#[derive(Default)]
pub struct RecordingPeers {
    misbehaving: Mutex<Vec<(PeerId, u32, String)>>,
    relayed: Mutex<Vec<Inventory>>,
}

impl RecordingPeers {
    pub fn misbehaviors(&self) -> Vec<(PeerId, u32, String)> {
        self.misbehaving.lock().clone()
    }

    /// Total score reported against `peer`.
    pub fn score_of(&self, peer: PeerId) -> u32 {
        self.misbehaving
            .lock()
            .iter()
            .filter(|(p, _, _)| *p == peer)
            .map(|(_, score, _)| *score)
            .sum()
    }

    pub fn relayed(&self) -> Vec<Inventory> {
        self.relayed.lock().clone()
    }
}

impl PeerReporter for RecordingPeers {
    fn misbehaving(&self, peer: PeerId, score: u32, reason: &str) {
        self.misbehaving.lock().push((peer, score, reason.to_string()));
    }

    fn relay_inventory(&self, inv: Inventory) {
        self.relayed.lock().push(inv);
    }
}
