// Path: crates/llmq/src/signing/store.rs
//! Persistent recovered signatures and local votes.
//!
//! Layout, all under the prefixes in [`mnq_types::keys`]:
//!
//! * `rs_r ‖ id` holds the signature and `rs_r ‖ id ‖ msgHash` its insertion time.
//! * `rs_h ‖ hash` maps the content hash back to the id.
//! * `rs_s ‖ signHash` marks a finished signing session.
//! * `rs_t ‖ be32(time) ‖ id` orders signatures for pruning.
//! * `rs_v ‖ id` records the message the local node voted for, and
//!   `rs_vt ‖ be32(time) ‖ id` orders votes for pruning.

use super::recsig::RecoveredSignature;
use lru::LruCache;
use mnq_api::storage::{be32, KvStore, StorageError, WriteBatch};
use mnq_api::time::Clock;
use mnq_types::keys::{
    composite_key, RECSIG_BY_HASH_PREFIX, RECSIG_BY_ID_PREFIX, RECSIG_BY_SIGN_HASH_PREFIX, RECSIG_BY_TIME_PREFIX,
    VOTE_BY_ID_PREFIX, VOTE_BY_TIME_PREFIX,
};
use mnq_types::Hash256;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Delete batches are flushed once they grow past this many bytes.
const MAX_CLEANUP_BATCH_BYTES: usize = 1 << 24;

const MARKER: &[u8] = &[1];

struct ExistenceCaches {
    for_id: LruCache<Hash256, bool>,
    for_session: LruCache<Hash256, bool>,
    for_hash: LruCache<Hash256, bool>,
}

/// Cache entries to drop once a staged removal has been committed.
struct Evicted {
    id: Hash256,
    sign_hash: Hash256,
    hash: Option<Hash256>,
}

pub struct RecoveredSigStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    caches: Mutex<ExistenceCaches>,
}

fn id_key(id: &Hash256) -> Vec<u8> {
    composite_key(RECSIG_BY_ID_PREFIX, &[id.as_bytes()])
}

fn id_msg_key(id: &Hash256, msg_hash: &Hash256) -> Vec<u8> {
    composite_key(RECSIG_BY_ID_PREFIX, &[id.as_bytes(), msg_hash.as_bytes()])
}

fn hash_key(hash: &Hash256) -> Vec<u8> {
    composite_key(RECSIG_BY_HASH_PREFIX, &[hash.as_bytes()])
}

fn session_key(sign_hash: &Hash256) -> Vec<u8> {
    composite_key(RECSIG_BY_SIGN_HASH_PREFIX, &[sign_hash.as_bytes()])
}

fn time_key(prefix: &[u8], time: u32, id: &Hash256) -> Vec<u8> {
    composite_key(prefix, &[&be32(time), id.as_bytes()])
}

fn vote_key(id: &Hash256) -> Vec<u8> {
    composite_key(VOTE_BY_ID_PREFIX, &[id.as_bytes()])
}

fn decode_time(bytes: &[u8]) -> Option<u32> {
    bytes.first_chunk::<4>().map(|b| u32::from_be_bytes(*b))
}

fn decode_hash(bytes: &[u8]) -> Option<Hash256> {
    bytes.first_chunk::<32>().map(|b| Hash256(*b))
}

/// Splits an `rs_t`/`rs_vt` key into its time and id.
fn split_time_key(prefix: &[u8], key: &[u8]) -> Option<(u32, Hash256)> {
    let rest = key.strip_prefix(prefix)?;
    let time = decode_time(rest)?;
    let id = decode_hash(rest.get(4..)?)?;
    Some((time, id))
}

impl RecoveredSigStore {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            clock,
            caches: Mutex::new(ExistenceCaches {
                for_id: LruCache::new(cap),
                for_session: LruCache::new(cap),
                for_hash: LruCache::new(cap),
            }),
        }
    }

    fn now(&self) -> u32 {
        u32::try_from(self.clock.now_secs()).unwrap_or(u32::MAX)
    }

    pub fn has_recovered_sig(&self, id: &Hash256, msg_hash: &Hash256) -> Result<bool, StorageError> {
        self.store.exists(&id_msg_key(id, msg_hash))
    }

    pub fn has_recovered_sig_for_id(&self, id: &Hash256) -> Result<bool, StorageError> {
        if let Some(hit) = self.caches.lock().for_id.get(id) {
            return Ok(*hit);
        }
        let found = self.store.exists(&id_key(id))?;
        self.caches.lock().for_id.put(*id, found);
        Ok(found)
    }

    pub fn has_recovered_sig_for_session(&self, sign_hash: &Hash256) -> Result<bool, StorageError> {
        if let Some(hit) = self.caches.lock().for_session.get(sign_hash) {
            return Ok(*hit);
        }
        let found = self.store.exists(&session_key(sign_hash))?;
        self.caches.lock().for_session.put(*sign_hash, found);
        Ok(found)
    }

    pub fn has_recovered_sig_for_hash(&self, hash: &Hash256) -> Result<bool, StorageError> {
        if let Some(hit) = self.caches.lock().for_hash.get(hash) {
            return Ok(*hit);
        }
        let found = self.store.exists(&hash_key(hash))?;
        self.caches.lock().for_hash.put(*hash, found);
        Ok(found)
    }

    pub fn get_recovered_sig_by_id(&self, id: &Hash256) -> Result<Option<RecoveredSignature>, StorageError> {
        match self.store.get(&id_key(id))? {
            Some(bytes) => RecoveredSignature::from_bytes(&bytes).map(Some).map_err(StorageError::Decode),
            None => Ok(None),
        }
    }

    pub fn get_recovered_sig_by_hash(&self, hash: &Hash256) -> Result<Option<RecoveredSignature>, StorageError> {
        let Some(bytes) = self.store.get(&hash_key(hash))? else {
            return Ok(None);
        };
        let id = decode_hash(&bytes).ok_or_else(|| StorageError::Decode("short id in hash index".into()))?;
        self.get_recovered_sig_by_id(&id)
    }

    pub fn write_recovered_sig(&self, sig: &RecoveredSignature) -> Result<(), StorageError> {
        let now = self.now();
        let hash = sig.hash();
        let sign_hash = sig.sign_hash();

        let mut batch = WriteBatch::new();
        batch.put(id_key(&sig.id), sig.to_bytes());
        batch.put(id_msg_key(&sig.id, &sig.msg_hash), be32(now).to_vec());
        batch.put(hash_key(&hash), sig.id.as_bytes().to_vec());
        batch.put(session_key(&sign_hash), MARKER);
        batch.put(time_key(RECSIG_BY_TIME_PREFIX, now, &sig.id), MARKER);
        self.store.write_batch(batch)?;

        let mut caches = self.caches.lock();
        caches.for_id.put(sig.id, true);
        caches.for_session.put(sign_hash, true);
        caches.for_hash.put(hash, true);
        Ok(())
    }

    /// Stages the removal of the signature stored under `id` into `batch`.
    /// The caches are untouched until the caller has committed the batch.
    fn remove_into(
        &self,
        batch: &mut WriteBatch,
        id: &Hash256,
        delete_hash_key: bool,
        delete_time_key: bool,
    ) -> Result<Option<Evicted>, StorageError> {
        let Some(sig) = self.get_recovered_sig_by_id(id)? else {
            return Ok(None);
        };
        let sign_hash = sig.sign_hash();
        let hash = sig.hash();
        let msg_key = id_msg_key(id, &sig.msg_hash);

        if delete_time_key {
            if let Some(time) = self.store.get(&msg_key)?.as_deref().and_then(decode_time) {
                batch.delete(time_key(RECSIG_BY_TIME_PREFIX, time, id));
            }
        }
        batch.delete(id_key(id));
        batch.delete(msg_key);
        if delete_hash_key {
            batch.delete(hash_key(&hash));
        }
        batch.delete(session_key(&sign_hash));

        Ok(Some(Evicted {
            id: *id,
            sign_hash,
            hash: delete_hash_key.then_some(hash),
        }))
    }

    fn evict(&self, evicted: &[Evicted]) {
        let mut caches = self.caches.lock();
        for e in evicted {
            caches.for_id.pop(&e.id);
            caches.for_session.pop(&e.sign_hash);
            if let Some(hash) = &e.hash {
                caches.for_hash.pop(hash);
            }
        }
    }

    fn remove_committed(
        &self,
        id: &Hash256,
        delete_hash_key: bool,
        delete_time_key: bool,
    ) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        let Some(evicted) = self.remove_into(&mut batch, id, delete_hash_key, delete_time_key)? else {
            return Ok(());
        };
        self.store.write_batch(batch)?;
        self.evict(&[evicted]);
        Ok(())
    }

    /// Deletes the signature under `id` and every index pointing at it.
    pub fn remove_recovered_sig(&self, id: &Hash256) -> Result<(), StorageError> {
        self.remove_committed(id, true, true)
    }

    /// Deletes the signature under `id` but keeps the content-hash index, so a
    /// relayed copy is still recognised as known. The time index entry is left
    /// for pruning to collect.
    pub fn truncate_recovered_sig(&self, id: &Hash256) -> Result<(), StorageError> {
        self.remove_committed(id, false, false)
    }

    /// Collects keys under a time-ordered prefix older than `cutoff`.
    fn expired(&self, prefix: &[u8], cutoff: u32) -> Result<Vec<(Vec<u8>, Hash256)>, StorageError> {
        let mut out = Vec::new();
        self.store.scan_prefix(prefix, &mut |key, _| match split_time_key(prefix, key) {
            Some((time, id)) if time < cutoff => {
                out.push((key.to_vec(), id));
                true
            }
            Some(_) => false,
            None => true,
        })?;
        Ok(out)
    }

    /// Deletes recovered signatures older than `max_age_secs`. Returns how many were removed.
    pub fn cleanup_old_recovered_sigs(&self, max_age_secs: u64) -> Result<usize, StorageError> {
        let cutoff = u32::try_from(u64::from(self.now()).saturating_sub(max_age_secs)).unwrap_or(0);
        let expired = self.expired(RECSIG_BY_TIME_PREFIX, cutoff)?;
        if expired.is_empty() {
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        let mut pending = Vec::new();
        for (_, id) in &expired {
            pending.extend(self.remove_into(&mut batch, id, true, false)?);
            if batch.size_estimate() >= MAX_CLEANUP_BATCH_BYTES {
                self.store.write_batch(std::mem::take(&mut batch))?;
                self.evict(&std::mem::take(&mut pending));
            }
        }
        for (key, _) in &expired {
            batch.delete(key.clone());
        }
        self.store.write_batch(batch)?;
        self.evict(&pending);

        tracing::debug!(target: "llmq::signing", event = "recsigs_pruned", count = expired.len());
        mnq_telemetry::signing_metrics().inc_pruned(expired.len() as u64);
        Ok(expired.len())
    }

    pub fn has_voted_on_id(&self, id: &Hash256) -> Result<bool, StorageError> {
        self.store.exists(&vote_key(id))
    }

    pub fn get_vote_for_id(&self, id: &Hash256) -> Result<Option<Hash256>, StorageError> {
        Ok(self.store.get(&vote_key(id))?.as_deref().and_then(decode_hash))
    }

    pub fn write_vote_for_id(&self, id: &Hash256, msg_hash: &Hash256) -> Result<(), StorageError> {
        let mut batch = WriteBatch::new();
        batch.put(vote_key(id), msg_hash.as_bytes().to_vec());
        batch.put(time_key(VOTE_BY_TIME_PREFIX, self.now(), id), MARKER);
        self.store.write_batch(batch)
    }

    /// Deletes votes older than `max_age_secs`. Returns how many were removed.
    pub fn cleanup_old_votes(&self, max_age_secs: u64) -> Result<usize, StorageError> {
        let cutoff = u32::try_from(u64::from(self.now()).saturating_sub(max_age_secs)).unwrap_or(0);
        let expired = self.expired(VOTE_BY_TIME_PREFIX, cutoff)?;
        if expired.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for (key, id) in &expired {
            batch.delete(vote_key(id));
            batch.delete(key.clone());
        }
        self.store.write_batch(batch)?;
        Ok(expired.len())
    }
}
