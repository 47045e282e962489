// Path: crates/types/src/app/chain.rs
//! Blocks and transactions, reduced to what membership processing needs.

use crate::app::provider::ProviderTx;
use crate::primitives::{Hash256, OutPoint, Script};
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A lightweight reference to a block on the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Encode, Decode, Serialize, Deserialize)]
pub struct BlockRef {
    /// The block hash.
    pub hash: Hash256,
    /// The hash of the parent block (zero for genesis).
    pub prev_hash: Hash256,
    /// The block height.
    pub height: u32,
    /// The block timestamp in seconds since the Unix epoch.
    pub time: u64,
}

/// A transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Default, Encode, Decode, Serialize, Deserialize)]
pub struct TxOut {
    /// The output value in base units.
    pub value: u64,
    /// The locking script.
    pub script: Script,
}

/// A transaction as seen by membership processing.
///
/// Only the spent outpoints, the created outputs and an optional decoded
/// provider payload are retained. Payload decoding happens upstream.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct ChainTx {
    /// The transaction id.
    pub hash: Hash256,
    /// Outpoints consumed by this transaction.
    pub inputs: Vec<OutPoint>,
    /// Outputs created by this transaction.
    pub outputs: Vec<TxOut>,
    /// A decoded special-transaction payload, if any.
    pub payload: Option<ProviderTx>,
}

/// A connected block: its header reference and transactions (coinbase first).
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub struct Block {
    /// The header reference of this block.
    pub header: BlockRef,
    /// The block's transactions. Index 0 is the coinbase.
    pub txs: Vec<ChainTx>,
}

impl Block {
    /// Iterates the non-coinbase transactions.
    pub fn non_coinbase(&self) -> impl Iterator<Item = &ChainTx> {
        self.txs.iter().skip(1)
    }
}
