// Path: crates/membership/src/manager.rs
//! Block-driven ledger transitions, snapshot persistence and caching.

use crate::diff::LedgerDiff;
use crate::ledger::MembershipLedger;
use crate::listener::MembershipListener;
use crate::processor::{build_new_list_from_block, BlockContext, QuorumMembers};
use lru::LruCache;
use mnq_api::chain::{ChainView, CoinView};
use mnq_api::storage::{KvStore, WriteBatch};
use mnq_telemetry::time::Timer;
use mnq_telemetry::{error_metrics, membership_metrics};
use mnq_types::app::{Block, BlockRef};
use mnq_types::config::ConsensusParams;
use mnq_types::error::{ErrorCode, MembershipError};
use mnq_types::keys::{composite_key, MN_BEST_BLOCK_KEY, MN_SNAPSHOT_PREFIX};
use mnq_types::Hash256;
use parking_lot::{Mutex, RwLock};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of ledger snapshots kept in memory.
pub const DEFAULT_SNAPSHOT_CACHE_SIZE: usize = 64;
/// Number of quorum member lists kept in memory.
pub const QUORUM_MEMBERS_CACHE_SIZE: usize = 10;

/// Owns the ledger history: derives, persists and caches one ledger per block.
pub struct MembershipManager {
    params: ConsensusParams,
    store: Arc<dyn KvStore>,
    chain: Arc<dyn ChainView>,
    snapshots: Mutex<LruCache<Hash256, Arc<MembershipLedger>>>,
    members: Mutex<LruCache<Hash256, QuorumMembers>>,
    tip: RwLock<Option<BlockRef>>,
    listeners: RwLock<Vec<Arc<dyn MembershipListener>>>,
}

fn snapshot_key(block_hash: &Hash256) -> Vec<u8> {
    composite_key(MN_SNAPSHOT_PREFIX, &[block_hash.as_bytes()])
}

fn lru<K: std::hash::Hash + Eq, V>(size: usize) -> LruCache<K, V> {
    LruCache::new(NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN))
}

impl MembershipManager {
    pub fn new(
        params: ConsensusParams,
        store: Arc<dyn KvStore>,
        chain: Arc<dyn ChainView>,
        snapshot_cache_size: usize,
    ) -> Self {
        Self {
            params,
            store,
            chain,
            snapshots: Mutex::new(lru(snapshot_cache_size)),
            members: Mutex::new(lru(QUORUM_MEMBERS_CACHE_SIZE)),
            tip: RwLock::new(None),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn register_listener(&self, listener: Arc<dyn MembershipListener>) {
        self.listeners.write().push(listener);
    }

    pub fn unregister_listener(&self, listener: &Arc<dyn MembershipListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Derives the ledger of `block` and, unless `just_check`, persists it and notifies listeners.
    pub fn process_block(
        &self,
        block: &Block,
        coins: &dyn CoinView,
        just_check: bool,
    ) -> Result<LedgerDiff, MembershipError> {
        let header = block.header;
        if header.height < self.params.membership_start_height {
            return Ok(LedgerDiff::default());
        }
        let _timer = Timer::new(membership_metrics());

        let prev = self
            .chain
            .block_by_hash(&header.prev_hash)
            .ok_or(MembershipError::UnknownBlock(header.prev_hash))?;
        let old_list = self.list_for_block(&prev)?;

        let ctx = BlockContext {
            params: &self.params,
            chain: self.chain.as_ref(),
            coins,
        };
        let lookup = |base: &BlockRef| self.quorum_members(base);
        let new_list = build_new_list_from_block(&ctx, block, &prev, &old_list, &lookup)
            .map_err(|e| self.reject(&header, e))?;
        let (diff, aux) = old_list.build_diff(&new_list);

        if just_check {
            return Ok(diff);
        }

        let mut batch = WriteBatch::new();
        batch.put(snapshot_key(&header.hash), new_list.to_snapshot_bytes());
        batch.put(MN_BEST_BLOCK_KEY, header.hash.as_bytes());
        self.store.write_batch(batch)?;

        let new_list = Arc::new(new_list);
        self.snapshots.lock().put(header.hash, Arc::clone(&new_list));
        *self.tip.write() = Some(header);
        membership_metrics().set_masternode_counts(new_list.all_count(), new_list.valid_count());

        tracing::info!(
            target: "membership",
            event = "block_processed",
            height = header.height,
            hash = %header.hash,
            total = new_list.all_count(),
            valid = new_list.valid_count(),
            added = diff.added.len(),
            updated = diff.updated.len(),
            removed = diff.removed.len()
        );

        if diff.has_changes() || !aux.is_empty() {
            for listener in self.listeners.read().iter() {
                listener.on_membership_changed(false, &new_list, &diff, &aux);
            }
        }
        Ok(diff)
    }

    /// Rolls the tip back over `block`, returning the inverse diff (block ledger → parent ledger).
    pub fn undo_block(&self, block: &BlockRef) -> Result<LedgerDiff, MembershipError> {
        if block.height < self.params.membership_start_height {
            return Ok(LedgerDiff::default());
        }
        let prev = self
            .chain
            .block_by_hash(&block.prev_hash)
            .ok_or(MembershipError::UnknownBlock(block.prev_hash))?;
        let cur_list = self.list_for_block(block)?;
        let prev_list = self.list_for_block(&prev)?;
        let (inverse, aux) = cur_list.build_diff(&prev_list);

        let mut batch = WriteBatch::new();
        batch.delete(snapshot_key(&block.hash));
        batch.put(MN_BEST_BLOCK_KEY, prev.hash.as_bytes());
        self.store.write_batch(batch)?;
        self.snapshots.lock().pop(&block.hash);
        *self.tip.write() = Some(prev);

        tracing::info!(
            target: "membership",
            event = "block_undone",
            height = block.height,
            hash = %block.hash
        );

        if inverse.has_changes() || !aux.is_empty() {
            for listener in self.listeners.read().iter() {
                listener.on_membership_changed(true, &prev_list, &inverse, &aux);
            }
        }
        Ok(inverse)
    }

    /// The ledger as of `block`.
    ///
    /// Blocks below the activation height have an empty ledger. A block with
    /// no stored snapshot starts a new, empty history at that block.
    pub fn list_for_block(&self, block: &BlockRef) -> Result<Arc<MembershipLedger>, MembershipError> {
        if block.height < self.params.membership_start_height {
            return Ok(Arc::new(MembershipLedger::new(block.hash, block.height, 0)));
        }
        if let Some(list) = self.snapshots.lock().get(&block.hash) {
            return Ok(Arc::clone(list));
        }

        let key = snapshot_key(&block.hash);
        let list = match self.store.get(&key)? {
            Some(bytes) => MembershipLedger::from_snapshot_bytes(&bytes)?,
            None => {
                let list = MembershipLedger::new(block.hash, block.height, 0);
                self.store.put(&key, &list.to_snapshot_bytes())?;
                tracing::info!(
                    target: "membership",
                    event = "initial_snapshot",
                    height = block.height,
                    hash = %block.hash
                );
                list
            }
        };
        let list = Arc::new(list);
        self.snapshots.lock().put(block.hash, Arc::clone(&list));
        Ok(list)
    }

    /// The ledger at the last processed tip, or at the chain tip if none was processed yet.
    pub fn list_at_tip(&self) -> Result<Arc<MembershipLedger>, MembershipError> {
        let tip = match *self.tip.read() {
            Some(tip) => tip,
            None => self
                .chain
                .tip()
                .ok_or(MembershipError::UnknownBlock(Hash256::ZERO))?,
        };
        self.list_for_block(&tip)
    }

    pub fn updated_block_tip(&self, tip: &BlockRef) {
        *self.tip.write() = Some(*tip);
        if let Ok(list) = self.list_for_block(tip) {
            membership_metrics().set_masternode_counts(list.all_count(), list.valid_count());
        }
    }

    pub fn tip(&self) -> Option<BlockRef> {
        *self.tip.read()
    }

    /// The block hash recorded by the last persisted transition.
    pub fn best_block_hash(&self) -> Result<Option<Hash256>, MembershipError> {
        Ok(self
            .store
            .get(MN_BEST_BLOCK_KEY)?
            .and_then(|bytes| Hash256::from_slice(&bytes)))
    }

    /// The members of the quorum whose base block is `base`, highest score first.
    pub fn quorum_members(&self, base: &BlockRef) -> Result<QuorumMembers, MembershipError> {
        if let Some(members) = self.members.lock().get(&base.hash) {
            return Ok(Arc::clone(members));
        }
        let list = self.list_for_block(base)?;
        let members = Arc::new(list.calculate_quorum(self.params.llmq.size, &base.hash));
        self.members.lock().put(base.hash, Arc::clone(&members));
        Ok(members)
    }

    fn reject(&self, block: &BlockRef, err: MembershipError) -> MembershipError {
        let err = match err {
            MembershipError::Ledger(e) => {
                tracing::error!(
                    target: "membership",
                    event = "ledger_violation",
                    height = block.height,
                    hash = %block.hash,
                    error = %e
                );
                MembershipError::violation("failed-dmn-block", e.to_string())
            }
            other => other,
        };
        if let Some(reason) = err.reject_reason() {
            membership_metrics().inc_blocks_rejected(reason);
            tracing::warn!(
                target: "membership",
                event = "block_rejected",
                height = block.height,
                hash = %block.hash,
                reason,
                error = %err
            );
        }
        error_metrics().inc_error("membership", err.code());
        err
    }
}
