// Path: crates/llmq/src/debug.rs

use crate::messages::DkgMessageKind;
use crate::phase::QuorumPhase;
use mnq_types::Hash256;
use parking_lot::RwLock;
use serde::Serialize;

/// Per-kind message counters of the local session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessageCounters {
    pub contributions: u32,
    pub complaints: u32,
    pub justifications: u32,
    pub premature_commitments: u32,
}

impl MessageCounters {
    fn slot(&mut self, kind: DkgMessageKind) -> &mut u32 {
        match kind {
            DkgMessageKind::Contribution => &mut self.contributions,
            DkgMessageKind::Complaint => &mut self.complaints,
            DkgMessageKind::Justification => &mut self.justifications,
            DkgMessageKind::PrematureCommitment => &mut self.premature_commitments,
        }
    }
}

/// What the local node is doing in the current DKG cycle, for operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DkgDebugStatus {
    pub phase: Option<QuorumPhase>,
    pub quorum_hash: Hash256,
    pub quorum_height: u32,
    pub aborted: bool,
    pub sent: MessageCounters,
    pub received: MessageCounters,
    pub final_commitments: u32,
}

impl Default for DkgDebugStatus {
    fn default() -> Self {
        Self {
            phase: None,
            quorum_hash: Hash256::ZERO,
            quorum_height: 0,
            aborted: false,
            sent: MessageCounters::default(),
            received: MessageCounters::default(),
            final_commitments: 0,
        }
    }
}

/// Shared, lock-protected [`DkgDebugStatus`].
#[derive(Default)]
pub struct DkgDebugManager {
    status: RwLock<DkgDebugStatus>,
}

impl DkgDebugManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> DkgDebugStatus {
        self.status.read().clone()
    }

    /// Starts a fresh status for a new cycle.
    pub fn reset(&self, quorum_hash: Hash256, quorum_height: u32) {
        *self.status.write() = DkgDebugStatus {
            quorum_hash,
            quorum_height,
            ..DkgDebugStatus::default()
        };
    }

    pub fn set_phase(&self, phase: QuorumPhase) {
        self.status.write().phase = Some(phase);
        mnq_telemetry::dkg_metrics().set_phase(phase.as_str());
    }

    pub fn mark_aborted(&self) {
        self.status.write().aborted = true;
    }

    pub fn inc_sent(&self, kind: DkgMessageKind) {
        *self.status.write().sent.slot(kind) += 1;
    }

    /// Counts `count` verified messages of `kind` delivered to the session.
    pub fn add_received(&self, kind: DkgMessageKind, count: u32) {
        *self.status.write().received.slot(kind) += count;
    }

    pub fn inc_final_commitments(&self) {
        self.status.write().final_commitments += 1;
    }
}
