// Path: crates/test_utils/src/chain.rs
//! An in-memory block index and coin set.

use mnq_api::chain::{ChainView, Coin, CoinView};
use mnq_types::app::{Block, BlockRef, ChainTx};
use mnq_types::{Hash256, OutPoint};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Seconds between mock blocks.
pub const MOCK_SPACING_SECS: u64 = 150;

#[derive(Default)]
struct Inner {
    blocks: HashMap<Hash256, BlockRef>,
    active: Vec<BlockRef>,
    unvalidated: HashSet<Hash256>,
}

/// A block tree with one active chain. Forks are kept and can be walked by hash.
#[derive(Default)]
pub struct MockChain {
    inner: RwLock<Inner>,
}

/// The deterministic hash of the block at `height` on branch `branch`.
pub fn block_hash(branch: u8, height: u32) -> Hash256 {
    let mut bytes = [0xb1; 32];
    bytes[0] = branch;
    bytes[1..5].copy_from_slice(&height.to_be_bytes());
    Hash256(bytes)
}

impl MockChain {
    /// A chain of `len` blocks, heights `0..len`, on branch 0.
    pub fn with_height(len: u32) -> Self {
        let chain = Self::default();
        chain.extend(len);
        chain
    }

    /// Appends `count` blocks to the active tip.
    pub fn extend(&self, count: u32) -> Vec<BlockRef> {
        let mut inner = self.inner.write();
        let mut added = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (height, prev_hash) = match inner.active.last() {
                Some(tip) => (tip.height + 1, tip.hash),
                None => (0, Hash256::ZERO),
            };
            let block = BlockRef {
                hash: block_hash(0, height),
                prev_hash,
                height,
                time: u64::from(height) * MOCK_SPACING_SECS,
            };
            inner.blocks.insert(block.hash, block);
            inner.active.push(block);
            added.push(block);
        }
        added
    }

    /// Builds `count` blocks on `branch` on top of the active block at `fork_height`
    /// and makes them the active chain.
    pub fn reorg(&self, fork_height: u32, branch: u8, count: u32) -> Vec<BlockRef> {
        let mut inner = self.inner.write();
        inner.active.truncate(fork_height as usize + 1);
        let mut added = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let Some(tip) = inner.active.last().copied() else {
                break;
            };
            let block = BlockRef {
                hash: block_hash(branch, tip.height + 1),
                prev_hash: tip.hash,
                height: tip.height + 1,
                time: u64::from(tip.height + 1) * MOCK_SPACING_SECS,
            };
            inner.blocks.insert(block.hash, block);
            inner.active.push(block);
            added.push(block);
        }
        added
    }

    /// The active block at `height`.
    pub fn at(&self, height: u32) -> Option<BlockRef> {
        self.inner.read().active.get(height as usize).copied()
    }

    pub fn mark_unvalidated(&self, hash: Hash256) {
        self.inner.write().unvalidated.insert(hash);
    }

    /// A block with the given header and transactions, prefixed with a coinbase.
    pub fn block(&self, header: BlockRef, txs: Vec<ChainTx>) -> Block {
        let mut all = Vec::with_capacity(txs.len() + 1);
        all.push(crate::fixtures::coinbase(header.height));
        all.extend(txs);
        Block { header, txs: all }
    }
}

impl ChainView for MockChain {
    fn tip(&self) -> Option<BlockRef> {
        self.inner.read().active.last().copied()
    }

    fn block_by_hash(&self, hash: &Hash256) -> Option<BlockRef> {
        self.inner.read().blocks.get(hash).copied()
    }

    fn ancestor(&self, block: &BlockRef, height: u32) -> Option<BlockRef> {
        if height > block.height {
            return None;
        }
        let inner = self.inner.read();
        let mut cur = *block;
        while cur.height > height {
            cur = *inner.blocks.get(&cur.prev_hash)?;
        }
        Some(cur)
    }

    fn is_on_active_chain(&self, hash: &Hash256) -> bool {
        let inner = self.inner.read();
        inner
            .blocks
            .get(hash)
            .and_then(|b| inner.active.get(b.height as usize))
            .is_some_and(|active| active.hash == *hash)
    }

    fn is_fully_validated(&self, hash: &Hash256) -> bool {
        let inner = self.inner.read();
        inner.blocks.contains_key(hash) && !inner.unvalidated.contains(hash)
    }
}

/// A mutable coin set.
#[derive(Default)]
pub struct MockCoins {
    coins: RwLock<HashMap<OutPoint, Coin>>,
}

impl MockCoins {
    pub fn add(&self, outpoint: OutPoint, value: u64, height: u32) {
        self.coins.write().insert(
            outpoint,
            Coin {
                value,
                height,
                spent: false,
            },
        );
    }

    pub fn spend(&self, outpoint: &OutPoint) {
        if let Some(coin) = self.coins.write().get_mut(outpoint) {
            coin.spent = true;
        }
    }
}

impl CoinView for MockCoins {
    fn coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.read().get(outpoint).copied()
    }
}
