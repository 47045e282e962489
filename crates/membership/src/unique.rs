// Path: crates/membership/src/unique.rs
//! The unique-property index and its staging transaction.
//!
//! Every mutation of the index goes through an [`IndexTxn`]. The transaction
//! records its writes in an overlay and only touches the index on
//! [`IndexTxn::commit`]. Dropping an uncommitted transaction leaves the index
//! exactly as it was.

use crate::record::MasternodeRecord;
use crate::state::MasternodeState;
use mnq_types::error::{LedgerError, PropertyField};
use mnq_types::{BlsPublicKeyBytes, Hash256, KeyId, OutPoint, ServiceAddr};
use std::collections::BTreeMap;

/// A property value that at most one live record may hold.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PropertyKey {
    Collateral(OutPoint),
    ServiceAddr(ServiceAddr),
    OwnerKey(KeyId),
    OperatorKey(BlsPublicKeyBytes),
    NevmAddress(Vec<u8>),
}

impl PropertyKey {
    pub fn field(&self) -> PropertyField {
        match self {
            Self::Collateral(_) => PropertyField::Collateral,
            Self::ServiceAddr(_) => PropertyField::ServiceAddr,
            Self::OwnerKey(_) => PropertyField::OwnerKey,
            Self::OperatorKey(_) => PropertyField::OperatorKey,
            Self::NevmAddress(_) => PropertyField::NevmAddress,
        }
    }

    pub fn service_addr(addr: &ServiceAddr) -> Option<Self> {
        (!addr.is_null()).then_some(Self::ServiceAddr(*addr))
    }

    pub fn owner_key(key: &KeyId) -> Option<Self> {
        (!key.is_null()).then_some(Self::OwnerKey(*key))
    }

    pub fn operator_key(key: &BlsPublicKeyBytes) -> Option<Self> {
        (!key.is_null()).then_some(Self::OperatorKey(*key))
    }

    pub fn nevm_address(addr: &[u8]) -> Option<Self> {
        (!addr.is_empty()).then(|| Self::NevmAddress(addr.to_vec()))
    }

    /// The state-dependent properties of `state`, in check order. Null values are skipped.
    pub fn of_state(state: &MasternodeState) -> [Option<Self>; 4] {
        [
            Self::service_addr(&state.service_addr),
            Self::owner_key(&state.owner_key_id),
            Self::operator_key(&state.operator_pubkey),
            Self::nevm_address(&state.nevm_address.0),
        ]
    }

    /// All properties of `record`, collateral first.
    pub fn of_record(record: &MasternodeRecord) -> impl Iterator<Item = Self> {
        std::iter::once(Some(Self::Collateral(record.collateral_outpoint)))
            .chain(Self::of_state(&record.state))
            .flatten()
    }
}

/// Maps each held property to the `proTxHash` holding it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertyIndex {
    holders: BTreeMap<PropertyKey, Hash256>,
}

impl PropertyIndex {
    /// Indexes every property of `records`, failing on the first collision.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a MasternodeRecord>) -> Result<Self, LedgerError> {
        let mut index = Self::default();
        let mut txn = index.begin();
        for record in records {
            for key in PropertyKey::of_record(record) {
                txn.insert(key, record.pro_tx_hash)?;
            }
        }
        txn.commit();
        Ok(index)
    }

    pub fn holder(&self, key: &PropertyKey) -> Option<Hash256> {
        self.holders.get(key).copied()
    }

    pub fn contains(&self, key: &PropertyKey) -> bool {
        self.holders.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    pub fn begin(&mut self) -> IndexTxn<'_> {
        IndexTxn {
            base: self,
            overlay: BTreeMap::new(),
        }
    }
}

/// Staged writes against a [`PropertyIndex`]. `None` in the overlay marks a removal.
pub struct IndexTxn<'a> {
    base: &'a mut PropertyIndex,
    overlay: BTreeMap<PropertyKey, Option<Hash256>>,
}

impl IndexTxn<'_> {
    /// Reads through the overlay.
    pub fn holder(&self, key: &PropertyKey) -> Option<Hash256> {
        match self.overlay.get(key) {
            Some(staged) => *staged,
            None => self.base.holder(key),
        }
    }

    pub fn insert(&mut self, key: PropertyKey, owner: Hash256) -> Result<(), LedgerError> {
        if let Some(holder) = self.holder(&key) {
            return Err(LedgerError::DuplicateProperty {
                field: key.field(),
                pro_tx_hash: owner,
                holder,
            });
        }
        self.overlay.insert(key, Some(owner));
        Ok(())
    }

    /// Removes `key`, which must currently be held by `owner`.
    pub fn remove(&mut self, key: PropertyKey, owner: Hash256) -> Result<(), LedgerError> {
        match self.holder(&key) {
            Some(holder) if holder == owner => {
                self.overlay.insert(key, None);
                Ok(())
            }
            _ => Err(LedgerError::PropertyNotIndexed {
                field: key.field(),
                pro_tx_hash: owner,
            }),
        }
    }

    /// Moves `owner` from `old` to `new`. Equal values are left alone.
    pub fn replace(
        &mut self,
        old: Option<PropertyKey>,
        new: Option<PropertyKey>,
        owner: Hash256,
    ) -> Result<(), LedgerError> {
        if old == new {
            return Ok(());
        }
        if let Some(old) = old {
            self.remove(old, owner)?;
        }
        if let Some(new) = new {
            self.insert(new, owner)?;
        }
        Ok(())
    }

    pub fn commit(self) {
        for (key, staged) in self.overlay {
            match staged {
                Some(owner) => {
                    self.base.holders.insert(key, owner);
                }
                None => {
                    self.base.holders.remove(&key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> PropertyKey {
        PropertyKey::ServiceAddr(ServiceAddr::from_ipv4([10, 0, 0, last], 1))
    }

    #[test]
    fn dropped_txn_leaves_index_untouched() {
        let mut index = PropertyIndex::default();
        let a = Hash256([1; 32]);
        let mut txn = index.begin();
        txn.insert(addr(1), a).unwrap();
        txn.commit();
        let before = index.clone();

        let mut txn = index.begin();
        txn.remove(addr(1), a).unwrap();
        txn.insert(addr(2), a).unwrap();
        assert_eq!(txn.holder(&addr(1)), None);
        drop(txn);
        assert_eq!(index, before);
    }

    #[test]
    fn duplicate_names_the_holder() {
        let mut index = PropertyIndex::default();
        let (a, b) = (Hash256([1; 32]), Hash256([2; 32]));
        let mut txn = index.begin();
        txn.insert(addr(1), a).unwrap();
        let err = txn.insert(addr(1), b).unwrap_err();
        assert_eq!(
            err,
            LedgerError::DuplicateProperty {
                field: PropertyField::ServiceAddr,
                pro_tx_hash: b,
                holder: a
            }
        );
    }

    #[test]
    fn replace_moves_within_one_txn() {
        let mut index = PropertyIndex::default();
        let a = Hash256([1; 32]);
        let mut txn = index.begin();
        txn.insert(addr(1), a).unwrap();
        txn.replace(Some(addr(1)), Some(addr(2)), a).unwrap();
        txn.commit();
        assert!(!index.contains(&addr(1)));
        assert_eq!(index.holder(&addr(2)), Some(a));
    }

    #[test]
    fn null_values_are_not_properties() {
        assert!(PropertyKey::service_addr(&ServiceAddr::default()).is_none());
        assert!(PropertyKey::operator_key(&BlsPublicKeyBytes::ZERO).is_none());
        assert!(PropertyKey::nevm_address(&[]).is_none());
    }
}
