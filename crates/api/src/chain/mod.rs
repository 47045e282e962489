// Path: crates/api/src/chain/mod.rs
//! Read-only views of the block index and the UTXO set.
//!
//! The quorum core never owns chain state. It asks the node through these
//! traits and treats the answers as authoritative for the duration of a call.

use mnq_types::app::BlockRef;
use mnq_types::{Hash256, OutPoint};

/// A view of the block index and the active chain.
pub trait ChainView: Send + Sync {
    /// The tip of the active chain, if any block is known.
    fn tip(&self) -> Option<BlockRef>;

    /// Looks up any known block (active chain or not) by hash.
    fn block_by_hash(&self, hash: &Hash256) -> Option<BlockRef>;

    /// Returns the ancestor of `block` at `height`, or `None` if `height > block.height`.
    fn ancestor(&self, block: &BlockRef, height: u32) -> Option<BlockRef>;

    /// Returns true if the block is part of the active chain.
    fn is_on_active_chain(&self, hash: &Hash256) -> bool;

    /// Returns true if the block passed full validation.
    fn is_fully_validated(&self, hash: &Hash256) -> bool;

    /// The active-chain block at `height`.
    fn block_at_height(&self, height: u32) -> Option<BlockRef> {
        let tip = self.tip()?;
        self.ancestor(&tip, height)
    }
}

/// An unspent (or spent) output as seen by the coin view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Coin {
    /// Output value in base units.
    pub value: u64,
    /// Height of the block that created the output.
    pub height: u32,
    /// True once the output has been spent.
    pub spent: bool,
}

/// A view of the UTXO set as of the block being processed.
pub trait CoinView: Send + Sync {
    /// Looks up an output.
    fn coin(&self, outpoint: &OutPoint) -> Option<Coin>;
}

/// A coin view with no coins, for blocks that carry no external collateral.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyCoinView;

impl CoinView for EmptyCoinView {
    fn coin(&self, _outpoint: &OutPoint) -> Option<Coin> {
        None
    }
}
