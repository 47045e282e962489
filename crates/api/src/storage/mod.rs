// Path: crates/api/src/storage/mod.rs

//! API for the abstract ordered key-value store.
//!
//! Every persistent index of the quorum core (ledger snapshots, recovered
//! signatures and their secondary indices, votes) maps 1:1 onto this
//! contract: point reads, existence checks, ordered forward iteration and
//! atomically applied write batches.

use thiserror::Error;

/// Encodes a u64 into a big-endian byte array, suitable for ordered key scans.
#[inline]
pub fn be64(x: u64) -> [u8; 8] {
    x.to_be_bytes()
}
/// Encodes a u32 into a big-endian byte array.
#[inline]
pub fn be32(x: u32) -> [u8; 4] {
    x.to_be_bytes()
}

/// Represents errors that can occur within the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A generic error originating from the underlying key-value store backend (e.g., redb).
    #[error("backend error: {0}")]
    Backend(String),
    /// An error occurred while serializing data for storage.
    #[error("encode error: {0}")]
    Encode(String),
    /// An error occurred while deserializing data from storage.
    #[error("decode error: {0}")]
    Decode(String),
    /// The requested key or item was not found in the store.
    #[error("not found")]
    NotFound,
}

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put(Vec<u8>, Vec<u8>),
    /// Remove a key. Removing an absent key is not an error.
    Delete(Vec<u8>),
}

/// An ordered list of mutations applied atomically by [`KvStore::write_batch`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    size: usize,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an insert.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let (key, value) = (key.into(), value.into());
        self.size += key.len() + value.len();
        self.ops.push(BatchOp::Put(key, value));
    }

    /// Queues a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        let key = key.into();
        self.size += key.len();
        self.ops.push(BatchOp::Delete(key));
    }

    /// Approximate number of bytes the batch will write.
    pub fn size_estimate(&self) -> usize {
        self.size
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops all queued operations.
    pub fn clear(&mut self) {
        self.ops.clear();
        self.size = 0;
    }

    /// Consumes the batch, yielding its operations in order.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// The ordered key-value store collaborator.
///
/// Keys are compared bytewise. Implementations must apply a batch atomically:
/// either all of its operations become visible or none do.
pub trait KvStore: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Returns true if the key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }

    /// Applies a batch atomically.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError>;

    /// Visits entries with keys `>= start` in ascending key order until `visit` returns `false`.
    fn iter_from(
        &self,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StorageError>;

    /// Writes a single key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write_batch(batch)
    }

    /// Deletes a single key.
    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write_batch(batch)
    }

    /// Visits every entry whose key starts with `prefix`, in key order, until `visit` returns `false`.
    fn scan_prefix(
        &self,
        prefix: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StorageError> {
        self.iter_from(prefix, &mut |k, v| k.starts_with(prefix) && visit(k, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_tracks_size_and_clears() {
        let mut batch = WriteBatch::new();
        batch.put(b"k1".to_vec(), b"value".to_vec());
        batch.delete(b"k2".to_vec());
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.size_estimate(), 2 + 5 + 2);
        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.size_estimate(), 0);
    }

    #[test]
    fn big_endian_keys_sort_numerically() {
        assert!(be32(255) < be32(256));
        assert!(be64(1) < be64(u64::from(u32::MAX) + 1));
    }
}
