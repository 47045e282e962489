// Path: crates/storage/src/redb_store.rs
//! A durable ordered store on top of redb.

use crate::metrics::metrics;
use mnq_api::storage::{BatchOp, KvStore, StorageError, WriteBatch};
use redb::{Database, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction};
use std::path::Path;

const KV: TableDefinition<&[u8], &[u8]> = TableDefinition::new("KV");

fn backend<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// A single-table redb database. Every batch is one write transaction.
pub struct RedbKvStore {
    db: Database,
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore").finish_non_exhaustive()
    }
}

impl RedbKvStore {
    /// Opens (or creates) the database file and ensures the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        {
            let w = db.begin_write().map_err(backend)?;
            w.open_table(KV).map_err(backend)?;
            w.commit().map_err(backend)?;
        }
        tracing::info!(target: "storage", path = %path.as_ref().display(), "opened redb store");
        Ok(Self { db })
    }

    fn read_txn(&self) -> Result<ReadTransaction<'_>, StorageError> {
        self.db.begin_read().map_err(backend)
    }

    fn write_txn(&self) -> Result<WriteTransaction<'_>, StorageError> {
        self.db.begin_write().map_err(backend)
    }
}

impl KvStore for RedbKvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let r = self.read_txn()?;
        let t = r.open_table(KV).map_err(backend)?;
        let value = t.get(key).map_err(backend)?.map(|v| v.value().to_vec());
        Ok(value)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }
        let bytes = batch.size_estimate() as u64;
        let mut deleted = 0u64;
        let w = self.write_txn()?;
        {
            let mut t = w.open_table(KV).map_err(backend)?;
            for op in batch.into_ops() {
                match op {
                    BatchOp::Put(k, v) => {
                        t.insert(k.as_slice(), v.as_slice()).map_err(backend)?;
                    }
                    BatchOp::Delete(k) => {
                        if t.remove(k.as_slice()).map_err(backend)?.is_some() {
                            deleted += 1;
                        }
                    }
                }
            }
        }
        w.commit().map_err(backend)?;
        metrics().inc_bytes_written_total(bytes);
        metrics().inc_keys_deleted(deleted);
        Ok(())
    }

    fn iter_from(
        &self,
        start: &[u8],
        visit: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), StorageError> {
        let r = self.read_txn()?;
        let t = r.open_table(KV).map_err(backend)?;
        for entry in t.range::<&[u8]>(start..).map_err(backend)? {
            let (k, v) = entry.map_err(backend)?;
            if !visit(k.value(), v.value()) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quorum.redb");
        {
            let store = RedbKvStore::open(&path).unwrap();
            let mut batch = WriteBatch::new();
            batch.put(b"k1".to_vec(), b"v1".to_vec());
            batch.put(b"k2".to_vec(), b"v2".to_vec());
            store.write_batch(batch).unwrap();
            store.delete(b"k2").unwrap();
        }
        let store = RedbKvStore::open(&path).unwrap();
        assert_eq!(store.get(b"k1").unwrap(), Some(b"v1".to_vec()));
        assert!(!store.exists(b"k2").unwrap());
    }

    #[test]
    fn range_scan_is_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbKvStore::open(dir.path().join("scan.redb")).unwrap();
        for i in [5u32, 1, 3, 2, 4] {
            store.put(&[b"t".as_slice(), &i.to_be_bytes()].concat(), b"").unwrap();
        }
        store.put(b"u", b"").unwrap();
        let mut seen = Vec::new();
        store
            .scan_prefix(b"t", &mut |k, _| {
                seen.push(u32::from_be_bytes(k[1..5].try_into().unwrap()));
                true
            })
            .unwrap();
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }
}
