// Path: crates/membership/src/ledger.rs
//! The deterministic masternode list at one block.

use crate::diff::{AuxAddressDiff, AuxChange, AuxDiffBuilder, LedgerDiff};
use crate::penalty::{compute_decrease, compute_max_penalty, compute_penalty, compute_punishment};
use crate::record::{MasternodeRecord, StoredRecord};
use crate::state::{MasternodeState, StateDelta};
use crate::unique::{PropertyIndex, PropertyKey};
use mnq_crypto::algorithms::hash::sha256;
use mnq_types::codec;
use mnq_types::error::LedgerError;
use mnq_types::{BlsPublicKeyBytes, Hash256, OutPoint, ServiceAddr};
use parity_scale_codec::{Decode, Encode};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// All registered masternodes as of `block_hash`.
///
/// Records are keyed by `proTxHash`, with a secondary internal-id map and a
/// unique-property index. The three structures change together or not at all.
#[derive(Clone, Debug, Default, Eq)]
pub struct MembershipLedger {
    block_hash: Hash256,
    height: u32,
    total_registered: u64,
    records: BTreeMap<Hash256, Arc<MasternodeRecord>>,
    internal_ids: BTreeMap<u64, Hash256>,
    properties: PropertyIndex,
    /// Per-block bookkeeping; not part of the ledger's identity.
    nevm_changed: bool,
}

impl PartialEq for MembershipLedger {
    fn eq(&self, other: &Self) -> bool {
        self.block_hash == other.block_hash
            && self.height == other.height
            && self.total_registered == other.total_registered
            && self.records == other.records
            && self.internal_ids == other.internal_ids
            && self.properties == other.properties
    }
}

#[derive(Encode, Decode)]
struct StoredLedger {
    block_hash: Hash256,
    height: u32,
    total_registered: u64,
    records: Vec<StoredRecord>,
}

impl MembershipLedger {
    pub fn new(block_hash: Hash256, height: u32, total_registered: u64) -> Self {
        Self {
            block_hash,
            height,
            total_registered,
            ..Self::default()
        }
    }

    pub fn block_hash(&self) -> Hash256 {
        self.block_hash
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Re-labels this ledger as the one of `block_hash`, clearing the NEVM change flag.
    pub fn set_block(&mut self, block_hash: Hash256, height: u32) {
        self.block_hash = block_hash;
        self.height = height;
        self.nevm_changed = false;
    }

    pub fn total_registered_count(&self) -> u64 {
        self.total_registered
    }

    pub fn all_count(&self) -> usize {
        self.records.len()
    }

    pub fn valid_count(&self) -> usize {
        self.records.values().filter(|r| r.is_valid()).count()
    }

    /// Set when any record gained, changed or lost its NEVM address since this ledger was derived.
    pub fn nevm_changed(&self) -> bool {
        self.nevm_changed
    }

    pub fn mark_nevm_changed(&mut self) {
        self.nevm_changed = true;
    }

    /// Iterates records ascending by `proTxHash`.
    pub fn iter(&self, only_valid: bool) -> impl Iterator<Item = &Arc<MasternodeRecord>> {
        self.records.values().filter(move |r| !only_valid || r.is_valid())
    }

    pub fn contains(&self, pro_tx_hash: &Hash256) -> bool {
        self.records.contains_key(pro_tx_hash)
    }

    pub fn get(&self, pro_tx_hash: &Hash256) -> Option<&Arc<MasternodeRecord>> {
        self.records.get(pro_tx_hash)
    }

    pub fn get_valid(&self, pro_tx_hash: &Hash256) -> Option<&Arc<MasternodeRecord>> {
        self.get(pro_tx_hash).filter(|r| r.is_valid())
    }

    pub fn is_valid(&self, pro_tx_hash: &Hash256) -> bool {
        self.get_valid(pro_tx_hash).is_some()
    }

    pub fn get_by_internal_id(&self, internal_id: u64) -> Option<&Arc<MasternodeRecord>> {
        self.internal_ids.get(&internal_id).and_then(|h| self.get(h))
    }

    /// The record currently holding `key`.
    pub fn property_holder(&self, key: &PropertyKey) -> Option<&Arc<MasternodeRecord>> {
        self.properties.holder(key).and_then(|h| self.get(&h))
    }

    pub fn has_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains(key)
    }

    pub fn get_by_collateral(&self, outpoint: &OutPoint) -> Option<&Arc<MasternodeRecord>> {
        self.property_holder(&PropertyKey::Collateral(*outpoint))
    }

    pub fn get_valid_by_collateral(&self, outpoint: &OutPoint) -> Option<&Arc<MasternodeRecord>> {
        self.get_by_collateral(outpoint).filter(|r| r.is_valid())
    }

    pub fn get_by_service(&self, addr: &ServiceAddr) -> Option<&Arc<MasternodeRecord>> {
        PropertyKey::service_addr(addr).and_then(|k| self.property_holder(&k))
    }

    pub fn get_by_operator_key(&self, key: &BlsPublicKeyBytes) -> Option<&Arc<MasternodeRecord>> {
        PropertyKey::operator_key(key).and_then(|k| self.property_holder(&k))
    }

    pub fn get_by_nevm_address(&self, addr: &[u8]) -> Option<&Arc<MasternodeRecord>> {
        PropertyKey::nevm_address(addr).and_then(|k| self.property_holder(&k))
    }

    /// Adds a new record and indexes its properties.
    ///
    /// With `bump_total`, the registered counter advances past the record's internal id.
    pub fn add_record(&mut self, record: MasternodeRecord, bump_total: bool) -> Result<(), LedgerError> {
        if self.records.contains_key(&record.pro_tx_hash) {
            return Err(LedgerError::DuplicateIdentity(record.pro_tx_hash));
        }
        if self.internal_ids.contains_key(&record.internal_id) {
            return Err(LedgerError::DuplicateInternalId(record.internal_id));
        }

        let mut txn = self.properties.begin();
        for key in PropertyKey::of_record(&record) {
            txn.insert(key, record.pro_tx_hash)?;
        }
        txn.commit();

        if bump_total {
            self.total_registered = self.total_registered.max(record.internal_id + 1);
        }
        self.internal_ids.insert(record.internal_id, record.pro_tx_hash);
        self.records.insert(record.pro_tx_hash, Arc::new(record));
        Ok(())
    }

    /// Swaps in a new state for an existing record, re-indexing every changed property.
    pub fn update_record(&mut self, pro_tx_hash: &Hash256, state: MasternodeState) -> Result<(), LedgerError> {
        let old = self
            .records
            .get(pro_tx_hash)
            .ok_or_else(|| LedgerError::NotFound(pro_tx_hash.to_string()))?;
        if *old.state == state {
            return Ok(());
        }

        let mut txn = self.properties.begin();
        let old_keys = PropertyKey::of_state(&old.state);
        let new_keys = PropertyKey::of_state(&state);
        for (old_key, new_key) in old_keys.into_iter().zip(new_keys) {
            txn.replace(old_key, new_key, *pro_tx_hash)?;
        }
        txn.commit();

        let updated = old.with_state(state);
        self.records.insert(*pro_tx_hash, Arc::new(updated));
        Ok(())
    }

    pub fn remove_record(&mut self, pro_tx_hash: &Hash256) -> Result<(), LedgerError> {
        let record = self
            .records
            .get(pro_tx_hash)
            .ok_or_else(|| LedgerError::NotFound(pro_tx_hash.to_string()))?;

        let mut txn = self.properties.begin();
        for key in PropertyKey::of_record(record) {
            txn.remove(key, *pro_tx_hash)?;
        }
        txn.commit();

        let internal_id = record.internal_id;
        self.records.remove(pro_tx_hash);
        self.internal_ids.remove(&internal_id);
        Ok(())
    }

    pub fn max_penalty(&self) -> u32 {
        compute_max_penalty(self.valid_count())
    }

    pub fn calc_penalty(&self, percent: u32) -> u32 {
        compute_penalty(self.max_penalty(), percent)
    }

    /// Adds `percent` of the cap to the record's penalty and bans it at this
    /// ledger's height once the cap is reached. Returns true on a new ban.
    pub fn pose_punish(&mut self, pro_tx_hash: &Hash256, percent: u32) -> Result<bool, LedgerError> {
        let max_penalty = self.max_penalty();
        let added = compute_penalty(max_penalty, percent);
        let record = self
            .get(pro_tx_hash)
            .ok_or_else(|| LedgerError::NotFound(pro_tx_hash.to_string()))?;
        let outcome = compute_punishment(
            record.state.pose_penalty,
            added,
            max_penalty,
            record.state.is_banned(),
        );

        let mut state = (*record.state).clone();
        tracing::debug!(
            target: "membership",
            event = "pose_punish",
            pro_tx_hash = %pro_tx_hash,
            from = state.pose_penalty,
            to = outcome.penalty,
            max = max_penalty
        );
        state.pose_penalty = outcome.penalty;
        if outcome.ban {
            if !state.nevm_address.is_empty() {
                self.nevm_changed = true;
            }
            state.ban_if_not_banned(self.height);
            tracing::info!(
                target: "membership",
                event = "pose_ban",
                pro_tx_hash = %pro_tx_hash,
                height = self.height
            );
        }
        self.update_record(pro_tx_hash, state)?;
        Ok(outcome.ban)
    }

    /// Decays the penalty of a valid record by one.
    pub fn pose_decrease(&mut self, pro_tx_hash: &Hash256) -> Result<(), LedgerError> {
        let record = self
            .get(pro_tx_hash)
            .ok_or_else(|| LedgerError::NotFound(pro_tx_hash.to_string()))?;
        if let Some(penalty) = compute_decrease(record.state.pose_penalty, record.state.is_banned()) {
            let mut state = (*record.state).clone();
            state.pose_penalty = penalty;
            self.update_record(pro_tx_hash, state)?;
        }
        Ok(())
    }

    /// Computes the diff turning `self` into `to`, plus the net NEVM changes.
    pub fn build_diff(&self, to: &MembershipLedger) -> (LedgerDiff, AuxAddressDiff) {
        let mut diff = LedgerDiff::default();
        let mut aux = AuxDiffBuilder::default();

        for to_record in to.records.values() {
            match self.records.get(&to_record.pro_tx_hash) {
                None => {
                    if !to_record.state.nevm_address.is_empty() {
                        aux.record(
                            to_record.pro_tx_hash,
                            AuxChange::Added {
                                address: to_record.state.nevm_address.clone(),
                                collateral_height: to_record.state.collateral_height,
                            },
                        );
                    }
                    diff.added.push(Arc::clone(to_record));
                }
                Some(from_record) => {
                    if Arc::ptr_eq(from_record, to_record) {
                        continue;
                    }
                    let delta = StateDelta::between(&from_record.state, &to_record.state);
                    if delta.is_empty() {
                        continue;
                    }
                    aux.record_transition(
                        to_record.pro_tx_hash,
                        &from_record.state.nevm_address,
                        &to_record.state.nevm_address,
                        to_record.state.collateral_height,
                    );
                    diff.updated.insert(to_record.internal_id, delta);
                }
            }
        }

        for from_record in self.records.values() {
            if !to.records.contains_key(&from_record.pro_tx_hash) {
                if !from_record.state.nevm_address.is_empty() {
                    aux.record(
                        from_record.pro_tx_hash,
                        AuxChange::Removed {
                            old: from_record.state.nevm_address.clone(),
                        },
                    );
                }
                diff.removed.insert(from_record.internal_id);
            }
        }

        diff.added.sort_by_key(|r| r.internal_id);
        diff.total_registered = to.total_registered;
        (diff, aux.finish())
    }

    /// Derives the ledger of `block_hash` by applying `diff` to a copy of this one.
    ///
    /// Removals, additions and updates are applied in that order. Uniqueness is
    /// checked once against the final record set, so a property handed from one
    /// record to another within the same block does not collide midway.
    pub fn apply_diff(&self, block_hash: Hash256, height: u32, diff: &LedgerDiff) -> Result<Self, LedgerError> {
        let mut result = self.clone();
        result.set_block(block_hash, height);

        for internal_id in &diff.removed {
            let pro_tx_hash = result
                .internal_ids
                .remove(internal_id)
                .ok_or_else(|| LedgerError::NotFound(format!("removed internal id {}", internal_id)))?;
            result.records.remove(&pro_tx_hash);
        }
        for record in &diff.added {
            if result.records.contains_key(&record.pro_tx_hash) {
                return Err(LedgerError::DuplicateIdentity(record.pro_tx_hash));
            }
            if result.internal_ids.contains_key(&record.internal_id) {
                return Err(LedgerError::DuplicateInternalId(record.internal_id));
            }
            result.internal_ids.insert(record.internal_id, record.pro_tx_hash);
            result.records.insert(record.pro_tx_hash, Arc::clone(record));
        }
        for (internal_id, delta) in &diff.updated {
            let record = result
                .get_by_internal_id(*internal_id)
                .ok_or_else(|| LedgerError::NotFound(format!("updated internal id {}", internal_id)))?;
            let mut state = (*record.state).clone();
            delta.apply_to(&mut state);
            let updated = record.with_state(state);
            result.records.insert(updated.pro_tx_hash, Arc::new(updated));
        }

        result.total_registered = diff.total_registered;
        result.properties = PropertyIndex::from_records(result.records.values().map(|r| &**r))?;
        Ok(result)
    }

    /// The valid record due for payment next: lowest payment-queue height, then lowest `proTxHash`.
    pub fn payee(&self) -> Option<&Arc<MasternodeRecord>> {
        self.iter(true).min_by(|a, b| compare_by_last_paid(a, b))
    }

    /// The next `count` payees, in payment order.
    pub fn projected_payees(&self, count: usize) -> Vec<Arc<MasternodeRecord>> {
        let mut valid: Vec<Arc<MasternodeRecord>> = self.iter(true).cloned().collect();
        valid.sort_by(|a, b| compare_by_last_paid(a, b));
        valid.truncate(count);
        valid
    }

    /// Scores every confirmed, valid record against `modifier`, in `proTxHash` order.
    ///
    /// `score = sha256(confirmedHashWithProRegTxHash ‖ modifier)`, compared as a
    /// 256-bit integer.
    pub fn calculate_scores(&self, modifier: &Hash256) -> Vec<(Hash256, Arc<MasternodeRecord>)> {
        self.iter(true)
            .filter(|r| !r.state.confirmed_hash.is_null())
            .map(|r| {
                let score = sha256(
                    [
                        r.state.confirmed_hash_with_pro_reg_tx_hash.as_bytes(),
                        modifier.as_bytes(),
                    ]
                    .concat(),
                );
                (score, Arc::clone(r))
            })
            .collect()
    }

    /// The `max_size` highest-scoring records, descending by score; ties go to the lower collateral.
    pub fn calculate_quorum(&self, max_size: usize, modifier: &Hash256) -> Vec<Arc<MasternodeRecord>> {
        let mut scores = self.calculate_scores(modifier);
        scores.sort_by(|(sa, ra), (sb, rb)| {
            sb.cmp_as_uint(sa)
                .then_with(|| ra.collateral_outpoint.cmp(&rb.collateral_outpoint))
        });
        scores.into_iter().take(max_size).map(|(_, r)| r).collect()
    }

    /// The canonical snapshot encoding.
    pub fn to_snapshot_bytes(&self) -> Vec<u8> {
        let stored = StoredLedger {
            block_hash: self.block_hash,
            height: self.height,
            total_registered: self.total_registered,
            records: self.records.values().map(|r| StoredRecord::from(&**r)).collect(),
        };
        codec::to_bytes_canonical(&stored)
    }

    /// Rebuilds a ledger, including its indices, from a snapshot.
    pub fn from_snapshot_bytes(bytes: &[u8]) -> Result<Self, LedgerError> {
        let stored: StoredLedger = codec::from_bytes_canonical(bytes).map_err(LedgerError::Corrupt)?;
        let mut ledger = Self::new(stored.block_hash, stored.height, stored.total_registered);
        for record in stored.records {
            ledger.add_record(record.into(), false)?;
        }
        Ok(ledger)
    }
}

fn compare_by_last_paid(a: &MasternodeRecord, b: &MasternodeRecord) -> Ordering {
    a.state
        .payment_queue_height()
        .cmp(&b.state.payment_queue_height())
        .then_with(|| a.pro_tx_hash.cmp(&b.pro_tx_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnq_types::error::PropertyField;
    use mnq_types::{KeyId, NevmAddress};

    pub(crate) fn record(seed: u8, internal_id: u64) -> MasternodeRecord {
        let state = MasternodeState {
            registered_height: 1,
            owner_key_id: KeyId([seed; 20]),
            operator_pubkey: BlsPublicKeyBytes([seed; 48]),
            voting_key_id: KeyId([seed; 20]),
            service_addr: ServiceAddr::from_ipv4([10, 0, 0, seed], 8369),
            ..MasternodeState::default()
        };
        MasternodeRecord::new(
            Hash256([seed; 32]),
            internal_id,
            OutPoint::new(Hash256([seed; 32]), 0),
            0,
            state,
        )
    }

    fn ledger_with(n: u8) -> MembershipLedger {
        let mut ledger = MembershipLedger::new(Hash256([0xaa; 32]), 100, 0);
        for seed in 1..=n {
            ledger.add_record(record(seed, u64::from(seed) - 1), true).unwrap();
        }
        ledger
    }

    #[test]
    fn add_rejects_duplicates_atomically() {
        let mut ledger = ledger_with(2);
        let before = ledger.clone();

        let mut clash = record(9, 9);
        Arc::make_mut(&mut clash.state).operator_pubkey = BlsPublicKeyBytes([1; 48]);
        let err = ledger.add_record(clash, true).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DuplicateProperty {
                field: PropertyField::OperatorKey,
                ..
            }
        ));
        assert_eq!(ledger, before);

        assert_eq!(
            ledger.add_record(record(1, 7), true),
            Err(LedgerError::DuplicateIdentity(Hash256([1; 32])))
        );
        assert_eq!(
            ledger.add_record(record(5, 0), true),
            Err(LedgerError::DuplicateInternalId(0))
        );
        assert_eq!(ledger, before);
        assert_eq!(ledger.total_registered_count(), 2);
    }

    #[test]
    fn update_reindexes_and_rolls_back() {
        let mut ledger = ledger_with(3);
        let id = Hash256([1; 32]);

        let mut state = (*ledger.get(&id).unwrap().state).clone();
        state.service_addr = ServiceAddr::from_ipv4([192, 168, 0, 1], 1);
        ledger.update_record(&id, state).unwrap();
        assert!(ledger.get_by_service(&ServiceAddr::from_ipv4([10, 0, 0, 1], 8369)).is_none());
        assert_eq!(
            ledger.get_by_service(&ServiceAddr::from_ipv4([192, 168, 0, 1], 1)).unwrap().pro_tx_hash,
            id
        );

        let before = ledger.clone();
        let mut state = (*ledger.get(&id).unwrap().state).clone();
        state.service_addr = ServiceAddr::from_ipv4([172, 16, 0, 1], 1);
        state.owner_key_id = KeyId([2; 20]);
        let err = ledger.update_record(&id, state).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::DuplicateProperty {
                field: PropertyField::OwnerKey,
                ..
            }
        ));
        assert_eq!(ledger, before);
    }

    #[test]
    fn remove_clears_every_index() {
        let mut ledger = ledger_with(2);
        let id = Hash256([2; 32]);
        ledger.remove_record(&id).unwrap();
        assert!(ledger.get_by_internal_id(1).is_none());
        assert!(ledger.get_by_collateral(&OutPoint::new(id, 0)).is_none());
        assert!(ledger.get_by_operator_key(&BlsPublicKeyBytes([2; 48])).is_none());
        assert_eq!(
            ledger.remove_record(&id),
            Err(LedgerError::NotFound(id.to_string()))
        );
        ledger.add_record(record(2, 5), true).unwrap();
        assert_eq!(ledger.total_registered_count(), 6);
    }

    #[test]
    fn punish_to_ban_at_ledger_height() {
        let mut ledger = MembershipLedger::new(Hash256::ZERO, 100, 0);
        for i in 0..100u64 {
            let mut r = record(0, i);
            let mut bytes = [0u8; 32];
            bytes[..8].copy_from_slice(&i.to_be_bytes());
            r.pro_tx_hash = Hash256(bytes);
            r.collateral_outpoint = OutPoint::new(Hash256(bytes), 0);
            let state = Arc::make_mut(&mut r.state);
            state.service_addr = ServiceAddr::default();
            state.owner_key_id = KeyId::from_slice(&bytes[..20]).unwrap();
            state.operator_pubkey = BlsPublicKeyBytes::ZERO;
            ledger.add_record(r, true).unwrap();
        }
        let target = ledger.iter(false).next().unwrap().pro_tx_hash;
        assert_eq!(ledger.max_penalty(), 100);

        assert!(!ledger.pose_punish(&target, 66).unwrap());
        assert_eq!(ledger.get(&target).unwrap().state.pose_penalty, 66);
        ledger.set_block(Hash256::ZERO, 123);
        assert!(ledger.pose_punish(&target, 66).unwrap());
        let state = &ledger.get(&target).unwrap().state;
        assert_eq!(state.pose_penalty, 100);
        assert_eq!(state.pose_ban_height, Some(123));
        assert!(!ledger.pose_punish(&target, 66).unwrap());

        ledger.pose_decrease(&target).unwrap();
        assert_eq!(ledger.get(&target).unwrap().state.pose_penalty, 100);
    }

    #[test]
    fn payee_is_least_recently_paid() {
        let mut ledger = ledger_with(3);
        for (seed, paid) in [(1u8, 10u32), (2, 20), (3, 5)] {
            let id = Hash256([seed; 32]);
            let mut state = (*ledger.get(&id).unwrap().state).clone();
            state.last_paid_height = paid;
            ledger.update_record(&id, state).unwrap();
        }
        assert_eq!(ledger.payee().unwrap().pro_tx_hash, Hash256([3; 32]));
        let order: Vec<Hash256> = ledger.projected_payees(5).iter().map(|r| r.pro_tx_hash).collect();
        assert_eq!(order, vec![Hash256([3; 32]), Hash256([1; 32]), Hash256([2; 32])]);
    }

    #[test]
    fn quorum_selection_is_deterministic_and_skips_unconfirmed() {
        let mut ledger = ledger_with(5);
        for seed in 1..=4u8 {
            let id = Hash256([seed; 32]);
            let mut state = (*ledger.get(&id).unwrap().state).clone();
            state.update_confirmed_hash(&id, Hash256([0x11; 32]));
            ledger.update_record(&id, state).unwrap();
        }
        let modifier = Hash256([0x22; 32]);
        let first = ledger.calculate_scores(&modifier);
        assert_eq!(first.len(), 4);
        assert_eq!(first, ledger.calculate_scores(&modifier));

        let quorum = ledger.calculate_quorum(3, &modifier);
        assert_eq!(quorum.len(), 3);
        let mut expected = first.clone();
        expected.sort_by(|(a, _), (b, _)| b.cmp_as_uint(a));
        let expected: Vec<Hash256> = expected.iter().take(3).map(|(_, r)| r.pro_tx_hash).collect();
        let got: Vec<Hash256> = quorum.iter().map(|r| r.pro_tx_hash).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn diff_round_trip_with_nevm_changes() {
        let a = ledger_with(4);
        let mut b = a.clone();
        b.set_block(Hash256([0xbb; 32]), 101);
        b.remove_record(&Hash256([2; 32])).unwrap();
        b.add_record(record(7, 4), true).unwrap();
        let id = Hash256([3; 32]);
        let mut state = (*b.get(&id).unwrap().state).clone();
        state.nevm_address = NevmAddress(vec![3; 20]);
        state.pose_penalty = 4;
        b.update_record(&id, state).unwrap();

        let (diff, aux) = a.build_diff(&b);
        assert_eq!(diff.removed.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.updated.len(), 1);
        assert_eq!(aux.added, vec![(NevmAddress(vec![3; 20]), 0)]);

        let applied = a.apply_diff(b.block_hash(), b.height(), &diff).unwrap();
        assert_eq!(applied, b);
    }

    #[test]
    fn nevm_bookkeeping_is_not_part_of_equality() {
        let a = ledger_with(3);
        let mut b = a.clone();
        b.set_block(Hash256([0xbb; 32]), 101);
        b.remove_record(&Hash256([1; 32])).unwrap();
        b.mark_nevm_changed();

        let (diff, _) = a.build_diff(&b);
        let applied = a.apply_diff(b.block_hash(), b.height(), &diff).unwrap();
        assert_ne!(applied.nevm_changed(), b.nevm_changed());
        assert_eq!(applied, b);

        let mut flagged = a.clone();
        flagged.mark_nevm_changed();
        assert_eq!(flagged, a);
    }

    #[test]
    fn property_handoff_within_one_diff() {
        let a = ledger_with(2);
        let mut b = a.clone();
        let id = Hash256([1; 32]);
        let mut state = (*b.get(&id).unwrap().state).clone();
        state.service_addr = ServiceAddr::from_ipv4([10, 9, 9, 9], 1);
        b.update_record(&id, state).unwrap();
        let mut newcomer = record(5, 2);
        Arc::make_mut(&mut newcomer.state).service_addr = ServiceAddr::from_ipv4([10, 0, 0, 1], 8369);
        b.add_record(newcomer, true).unwrap();

        let (diff, _) = a.build_diff(&b);
        assert_eq!(a.apply_diff(b.block_hash(), b.height(), &diff).unwrap(), b);
    }

    #[test]
    fn apply_diff_with_unknown_removal_fails() {
        let a = ledger_with(1);
        let mut diff = LedgerDiff::default();
        diff.removed.insert(42);
        assert!(matches!(
            a.apply_diff(Hash256::ZERO, 1, &diff),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn snapshot_rebuilds_indices() {
        let ledger = ledger_with(3);
        let bytes = ledger.to_snapshot_bytes();
        let back = MembershipLedger::from_snapshot_bytes(&bytes).unwrap();
        assert_eq!(back, ledger);
        assert!(back.get_by_operator_key(&BlsPublicKeyBytes([2; 48])).is_some());
    }
}
