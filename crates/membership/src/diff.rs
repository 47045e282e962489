// Path: crates/membership/src/diff.rs
//! Differences between two ledger snapshots.

use crate::record::MasternodeRecord;
use crate::state::StateDelta;
use mnq_types::{Hash256, NevmAddress};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// The additions, state updates and removals turning one ledger into another.
///
/// Applying a diff removes first, then adds in `added` order, then updates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerDiff {
    /// New records, ascending by internal id.
    pub added: Vec<Arc<MasternodeRecord>>,
    pub updated: BTreeMap<u64, StateDelta>,
    pub removed: BTreeSet<u64>,
    /// The registration counter of the target ledger.
    pub total_registered: u64,
}

impl LedgerDiff {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }
}

/// The net NEVM address changes between two ledgers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxAddressDiff {
    /// `(address, collateral height)` of addresses that appeared.
    pub added: Vec<(NevmAddress, u32)>,
    /// `(old, new)` pairs.
    pub updated: Vec<(NevmAddress, NevmAddress)>,
    pub removed: Vec<NevmAddress>,
}

impl AuxAddressDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum AuxChange {
    Added { address: NevmAddress, collateral_height: u32 },
    Updated { old: NevmAddress, new: NevmAddress },
    Removed { old: NevmAddress },
}

/// Collects one net NEVM change per masternode; later entries replace earlier ones.
#[derive(Default)]
pub(crate) struct AuxDiffBuilder {
    changes: BTreeMap<Hash256, AuxChange>,
}

impl AuxDiffBuilder {
    pub fn record(&mut self, pro_tx_hash: Hash256, change: AuxChange) {
        self.changes.insert(pro_tx_hash, change);
    }

    /// Classifies a change between two addresses of the same record.
    pub fn record_transition(
        &mut self,
        pro_tx_hash: Hash256,
        old: &NevmAddress,
        new: &NevmAddress,
        collateral_height: u32,
    ) {
        let change = match (old.is_empty(), new.is_empty()) {
            (true, true) => return,
            (false, true) => AuxChange::Removed { old: old.clone() },
            (true, false) => AuxChange::Added {
                address: new.clone(),
                collateral_height,
            },
            (false, false) if old == new => return,
            (false, false) => AuxChange::Updated {
                old: old.clone(),
                new: new.clone(),
            },
        };
        self.record(pro_tx_hash, change);
    }

    pub fn finish(self) -> AuxAddressDiff {
        let mut diff = AuxAddressDiff::default();
        for change in self.changes.into_values() {
            match change {
                AuxChange::Added {
                    address,
                    collateral_height,
                } => diff.added.push((address, collateral_height)),
                AuxChange::Updated { old, new } => diff.updated.push((old, new)),
                AuxChange::Removed { old } => diff.removed.push(old),
            }
        }
        diff
    }
}
