// Path: crates/storage/src/memory.rs
//! An in-memory ordered store.

use crate::metrics::metrics;
use mnq_api::storage::{BatchOp, KvStore, StorageError, WriteBatch};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A `BTreeMap` behind a read-write lock. Batches are applied under one write lock.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.map.read().get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.map.read().contains_key(key))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        let bytes = batch.size_estimate() as u64;
        let mut deleted = 0u64;
        let mut map = self.map.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(k, v) => {
                    map.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    if map.remove(&k).is_some() {
                        deleted += 1;
                    }
                }
            }
        }
        metrics().inc_bytes_written_total(bytes);
        metrics().inc_keys_deleted(deleted);
        Ok(())
    }

    fn iter_from(
        &self,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StorageError> {
        let map = self.map.read();
        for (k, v) in map.range::<[u8], _>((Bound::Included(start), Bound::Unbounded)) {
            if !visit(k, v) {
                break;
            }
        }
        Ok(())
    }
}
