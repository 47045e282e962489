// Path: crates/llmq/src/handler.rs
//! Drives one quorum type through its DKG cycles.
//!
//! Block notifications update a shared `(phase, quorumHash, height)` state. A
//! single task follows that state: it initialises the session at the start of
//! each cycle, runs the local action of every phase, and drains the pending
//! queue of the phase's message kind while waiting for the next boundary. Any
//! unexpected change of quorum or phase, and shutdown, abandons the cycle.

use crate::batch::process_pending_batch;
use crate::debug::DkgDebugManager;
use crate::messages::{DkgMessage, DkgMessageKind};
use crate::pending::PendingMessageQueue;
use crate::phase::{phase_starting_at, quorum_base_height, QuorumPhase};
use crate::session::{CommitmentPool, DkgSession, QuorumMemberSource};
use mnq_api::chain::ChainView;
use mnq_api::network::{Inventory, PeerId, PeerReporter, LOCAL_PEER};
use mnq_telemetry::dkg_metrics;
use mnq_types::app::BlockRef;
use mnq_types::config::{ConsensusParams, DkgConfig};
use mnq_types::error::DkgError;
use mnq_types::Hash256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The phase state shared between block notifications and the handler task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseState {
    pub phase: QuorumPhase,
    pub quorum_hash: Hash256,
    pub height: u32,
}

/// Collaborators of a [`QuorumSessionHandler`].
pub struct HandlerDeps {
    pub chain: Arc<dyn ChainView>,
    pub members: Arc<dyn QuorumMemberSource>,
    pub session: Arc<dyn DkgSession>,
    pub pool: Arc<dyn CommitmentPool>,
    pub peers: Arc<dyn PeerReporter>,
    pub debug: Arc<DkgDebugManager>,
}

pub struct QuorumSessionHandler {
    params: ConsensusParams,
    config: DkgConfig,
    local_pro_tx_hash: Option<Hash256>,
    deps: HandlerDeps,
    state_tx: watch::Sender<PhaseState>,
    contributions: PendingMessageQueue,
    complaints: PendingMessageQueue,
    justifications: PendingMessageQueue,
    premature_commitments: PendingMessageQueue,
}

/// The receivers one handler task waits on.
struct Waiter {
    state_rx: watch::Receiver<PhaseState>,
    shutdown_rx: watch::Receiver<bool>,
    poll: Duration,
}

impl Waiter {
    fn stopped(&self) -> bool {
        *self.shutdown_rx.borrow() || self.shutdown_rx.has_changed().is_err()
    }

    fn state(&mut self) -> PhaseState {
        *self.state_rx.borrow_and_update()
    }

    /// Sleeps for one poll interval, waking early on a state change or shutdown.
    async fn pause(&mut self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll) => {}
            _ = self.state_rx.changed() => {}
            _ = self.shutdown_rx.changed() => {}
        }
    }
}

impl QuorumSessionHandler {
    pub fn new(
        params: ConsensusParams,
        config: DkgConfig,
        local_pro_tx_hash: Option<Hash256>,
        deps: HandlerDeps,
    ) -> Self {
        let max_per_peer = params.llmq.size.saturating_mul(2);
        let (state_tx, _) = watch::channel(PhaseState {
            phase: QuorumPhase::Idle,
            quorum_hash: Hash256::ZERO,
            height: 0,
        });
        Self {
            params,
            config,
            local_pro_tx_hash,
            deps,
            state_tx,
            contributions: PendingMessageQueue::new(DkgMessageKind::Contribution, max_per_peer),
            complaints: PendingMessageQueue::new(DkgMessageKind::Complaint, max_per_peer),
            justifications: PendingMessageQueue::new(DkgMessageKind::Justification, max_per_peer),
            premature_commitments: PendingMessageQueue::new(DkgMessageKind::PrematureCommitment, max_per_peer),
        }
    }

    fn queue(&self, kind: DkgMessageKind) -> &PendingMessageQueue {
        match kind {
            DkgMessageKind::Contribution => &self.contributions,
            DkgMessageKind::Complaint => &self.complaints,
            DkgMessageKind::Justification => &self.justifications,
            DkgMessageKind::PrematureCommitment => &self.premature_commitments,
        }
    }

    pub fn phase_state(&self) -> PhaseState {
        *self.state_tx.borrow()
    }

    /// Follows a new chain tip. The quorum hash and height always move; the
    /// phase changes only on a phase boundary.
    pub fn updated_block_tip(&self, tip: &BlockRef) {
        let llmq = &self.params.llmq;
        let quorum_hash = self
            .deps
            .chain
            .ancestor(tip, quorum_base_height(llmq, tip.height))
            .map_or(Hash256::ZERO, |b| b.hash);
        let phase = phase_starting_at(llmq, tip.height);
        self.state_tx.send_modify(|state| {
            state.height = tip.height;
            state.quorum_hash = quorum_hash;
            if let Some(phase) = phase {
                state.phase = phase;
            }
        });
        tracing::trace!(
            target: "llmq::dkg",
            event = "tip_updated",
            height = tip.height,
            quorum_hash = %quorum_hash,
            phase = %self.phase_state().phase
        );
    }

    /// Queues a raw DKG message from the network. Returns false if it was dropped.
    pub fn push_message(&self, peer: PeerId, kind: DkgMessageKind, raw: Vec<u8>) -> bool {
        self.queue(kind).push(peer, raw)
    }

    /// True if a message with this hash was accepted this cycle.
    pub fn already_have(&self, kind: DkgMessageKind, hash: &Hash256) -> bool {
        self.queue(kind).has_seen(hash)
    }

    /// A message accepted this cycle, for serving peers.
    pub fn get_message(&self, kind: DkgMessageKind, hash: &Hash256) -> Option<DkgMessage> {
        self.deps.session.message(kind, hash)
    }

    /// Starts the handler task. It runs until `shutdown_rx` turns true.
    pub fn spawn(self: Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut waiter = Waiter {
                state_rx: self.state_tx.subscribe(),
                shutdown_rx,
                poll: Duration::from_millis(self.config.poll_interval_ms.max(1)),
            };
            tracing::info!(target: "llmq::dkg", event = "handler_started", llmq = %self.params.llmq.name);
            while !waiter.stopped() {
                match self.handle_dkg_round(&mut waiter).await {
                    Ok(()) => {}
                    Err(DkgError::PhaseAborted) => {
                        self.deps.debug.mark_aborted();
                        dkg_metrics().inc_phase_aborts();
                        tracing::info!(
                            target: "llmq::dkg",
                            event = "phase_aborted",
                            quorum_hash = %self.phase_state().quorum_hash
                        );
                    }
                    Err(e) => {
                        tracing::warn!(target: "llmq::dkg", event = "round_failed", error = %e);
                    }
                }
            }
            tracing::info!(target: "llmq::dkg", event = "handler_stopped", llmq = %self.params.llmq.name);
        })
    }

    /// Drains one batch of `kind`. Returns true if the queue had work.
    fn process_pending(&self, kind: DkgMessageKind) -> bool {
        let queue = self.queue(kind);
        let batch = self.config.message_batch_size.max(1);
        match process_pending_batch(self.deps.session.as_ref(), queue, batch, self.deps.peers.as_ref()) {
            None => false,
            Some(delivered) => {
                self.deps
                    .debug
                    .add_received(kind, u32::try_from(delivered).unwrap_or(u32::MAX));
                true
            }
        }
    }

    /// Feeds locally produced messages through our own queues and announces them.
    fn publish(&self, messages: Vec<DkgMessage>) {
        for msg in messages {
            let inv = Inventory {
                kind: msg.kind.inventory_kind(),
                hash: msg.hash(),
            };
            self.deps.debug.inc_sent(msg.kind);
            if self.queue(msg.kind).push(LOCAL_PEER, msg.to_bytes()) {
                self.deps.peers.relay_inventory(inv);
            }
        }
    }

    async fn wait_for_next_phase(
        &self,
        waiter: &mut Waiter,
        cur: Option<QuorumPhase>,
        next: QuorumPhase,
        expected_hash: Hash256,
        work: Option<DkgMessageKind>,
    ) -> Result<(), DkgError> {
        loop {
            if waiter.stopped() {
                return Err(DkgError::PhaseAborted);
            }
            let state = waiter.state();
            if !expected_hash.is_null() && state.quorum_hash != expected_hash {
                return Err(DkgError::PhaseAborted);
            }
            if state.phase == next {
                return Ok(());
            }
            if cur.is_some_and(|cur| state.phase != cur) {
                return Err(DkgError::PhaseAborted);
            }
            if !work.is_some_and(|kind| self.process_pending(kind)) {
                waiter.pause().await;
            }
        }
    }

    async fn wait_for_new_quorum(&self, waiter: &mut Waiter, old_hash: Hash256) -> Result<(), DkgError> {
        loop {
            if waiter.stopped() {
                return Err(DkgError::PhaseAborted);
            }
            if waiter.state().quorum_hash != old_hash {
                return Ok(());
            }
            waiter.pause().await;
        }
    }

    /// Staggers members so that not everyone acts at the same instant.
    ///
    /// The delay grows with the member index and ends early once blocks have
    /// covered it.
    async fn sleep_before_phase(
        &self,
        waiter: &mut Waiter,
        cur: QuorumPhase,
        expected_hash: Hash256,
        kind: DkgMessageKind,
    ) -> Result<(), DkgError> {
        let session = &self.deps.session;
        if !session.are_we_member() || self.params.mine_blocks_on_demand {
            return Ok(());
        }
        let llmq = &self.params.llmq;
        let spacing_ms = self.params.pow_target_spacing_secs as f64 * 1000.0;
        let phase_time_ms = f64::from(llmq.dkg_phase_blocks.saturating_sub(1)) * spacing_ms;
        let index = session.my_member_index().unwrap_or(0) as f64;
        let sleep_ms = phase_time_ms / llmq.size.max(1) as f64 * cur.sleep_factor() * index;
        if sleep_ms <= 0.0 {
            return Ok(());
        }

        let start_height = waiter.state().height;
        let deadline = Instant::now() + Duration::from_millis(sleep_ms as u64);
        while Instant::now() < deadline {
            if waiter.stopped() {
                return Err(DkgError::PhaseAborted);
            }
            let state = waiter.state();
            if state.height > start_height && f64::from(state.height - start_height) * spacing_ms > sleep_ms {
                break;
            }
            if state.phase != cur || state.quorum_hash != expected_hash {
                return Err(DkgError::PhaseAborted);
            }
            if !self.process_pending(kind) {
                waiter.pause().await;
            }
        }
        Ok(())
    }

    async fn handle_phase(
        &self,
        waiter: &mut Waiter,
        cur: QuorumPhase,
        expected_hash: Hash256,
        kind: DkgMessageKind,
        start: impl FnOnce(&dyn DkgSession) -> Vec<DkgMessage>,
    ) -> Result<(), DkgError> {
        self.sleep_before_phase(waiter, cur, expected_hash, kind).await?;
        self.deps.debug.set_phase(cur);
        tracing::debug!(target: "llmq::dkg", event = "phase_start", phase = %cur, quorum_hash = %expected_hash);
        self.publish(start(self.deps.session.as_ref()));
        self.wait_for_next_phase(waiter, Some(cur), cur.next(), expected_hash, Some(kind))
            .await
    }

    fn init_new_quorum(&self, base: &BlockRef) -> Result<(), DkgError> {
        let members = self
            .deps
            .members
            .quorum_members(base)
            .map_err(|e| DkgError::SessionInit(e.to_string()))?;
        self.deps.session.init(base, members, self.local_pro_tx_hash)
    }

    async fn handle_dkg_round(&self, waiter: &mut Waiter) -> Result<(), DkgError> {
        self.wait_for_next_phase(waiter, None, QuorumPhase::Initialized, Hash256::ZERO, None)
            .await?;
        for kind in DkgMessageKind::ALL {
            self.queue(kind).clear();
        }

        let quorum_hash = waiter.state().quorum_hash;
        let init = match self.deps.chain.block_by_hash(&quorum_hash) {
            Some(base) => self.init_new_quorum(&base).map(|()| base),
            None => Err(DkgError::SessionInit(format!("unknown quorum block {quorum_hash}"))),
        };
        let base = match init {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!(target: "llmq::dkg", event = "init_failed", quorum_hash = %quorum_hash, error = %e);
                self.wait_for_new_quorum(waiter, quorum_hash).await?;
                return Err(DkgError::PhaseAborted);
            }
        };

        self.deps.debug.reset(quorum_hash, base.height);
        self.deps.debug.set_phase(QuorumPhase::Initialized);
        tracing::info!(
            target: "llmq::dkg",
            event = "round_started",
            quorum_hash = %quorum_hash,
            height = base.height,
            member = self.deps.session.are_we_member()
        );
        self.wait_for_next_phase(
            waiter,
            Some(QuorumPhase::Initialized),
            QuorumPhase::Contribute,
            quorum_hash,
            None,
        )
        .await?;

        self.handle_phase(waiter, QuorumPhase::Contribute, quorum_hash, DkgMessageKind::Contribution, |s| {
            s.contribute()
        })
        .await?;
        self.handle_phase(waiter, QuorumPhase::Complain, quorum_hash, DkgMessageKind::Complaint, |s| {
            s.verify_and_complain()
        })
        .await?;
        self.handle_phase(waiter, QuorumPhase::Justify, quorum_hash, DkgMessageKind::Justification, |s| {
            s.verify_and_justify()
        })
        .await?;
        self.handle_phase(
            waiter,
            QuorumPhase::Commit,
            quorum_hash,
            DkgMessageKind::PrematureCommitment,
            |s| s.verify_and_commit(),
        )
        .await?;

        self.deps.debug.set_phase(QuorumPhase::Finalize);
        let commitments = self.deps.session.finalize_commitments();
        for commitment in commitments {
            self.deps.debug.inc_final_commitments();
            if let Some(inv) = self.deps.pool.add_mineable_commitment(commitment) {
                self.deps.peers.relay_inventory(inv);
            }
        }
        tracing::info!(target: "llmq::dkg", event = "round_finished", quorum_hash = %quorum_hash);
        Ok(())
    }
}
