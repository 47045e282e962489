// Path: crates/membership/src/record.rs

use crate::state::MasternodeState;
use mnq_types::{Hash256, OutPoint};
use parity_scale_codec::{Decode, Encode};
use serde::Serialize;
use std::sync::Arc;

/// A registered masternode: stable identity plus a shared, immutable state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MasternodeRecord {
    pub pro_tx_hash: Hash256,
    /// Dense, monotonic id assigned at registration. Diffs address records by it.
    pub internal_id: u64,
    pub collateral_outpoint: OutPoint,
    pub operator_reward_bps: u16,
    pub state: Arc<MasternodeState>,
}

impl MasternodeRecord {
    pub fn new(
        pro_tx_hash: Hash256,
        internal_id: u64,
        collateral_outpoint: OutPoint,
        operator_reward_bps: u16,
        state: MasternodeState,
    ) -> Self {
        Self {
            pro_tx_hash,
            internal_id,
            collateral_outpoint,
            operator_reward_bps,
            state: Arc::new(state),
        }
    }

    /// A copy of this record carrying `state` instead.
    pub fn with_state(&self, state: MasternodeState) -> Self {
        Self {
            state: Arc::new(state),
            ..self.clone()
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.state.is_banned()
    }
}

/// The persisted form of a record inside a ledger snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub(crate) struct StoredRecord {
    pub pro_tx_hash: Hash256,
    pub internal_id: u64,
    pub collateral_outpoint: OutPoint,
    pub operator_reward_bps: u16,
    pub state: MasternodeState,
}

impl From<&MasternodeRecord> for StoredRecord {
    fn from(r: &MasternodeRecord) -> Self {
        Self {
            pro_tx_hash: r.pro_tx_hash,
            internal_id: r.internal_id,
            collateral_outpoint: r.collateral_outpoint,
            operator_reward_bps: r.operator_reward_bps,
            state: (*r.state).clone(),
        }
    }
}

impl From<StoredRecord> for MasternodeRecord {
    fn from(r: StoredRecord) -> Self {
        Self::new(
            r.pro_tx_hash,
            r.internal_id,
            r.collateral_outpoint,
            r.operator_reward_bps,
            r.state,
        )
    }
}
