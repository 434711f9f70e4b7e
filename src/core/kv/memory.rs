//! In-memory `OrderedKv` reference implementation.
//!
//! Backed by a `BTreeMap` so range scans come for free in the right
//! order. Writes are staged in an overlay and only merged into the
//! shared store on `commit`; `rollback` simply discards the overlay.
//! This gives the reference backend transactional semantics without a
//! WAL or any on-disk persistence — a crash-safe KV backend is out of
//! scope for this crate.

use crate::core::error::{GraphError, GraphResult};
use crate::core::kv::{KvEntry, OrderedKv};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Store = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory, `BTreeMap`-backed ordered key/value store.
///
/// Multiple `MemoryKv` handles may share the same underlying store via
/// [`MemoryKv::open`]; each keeps an independent pending-write overlay
/// until it commits.
pub struct MemoryKv {
    store: Arc<Mutex<Store>>,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    read_only: bool,
}

impl MemoryKv {
    /// Creates a brand-new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::open(Arc::new(Mutex::new(BTreeMap::new())))
    }

    /// Opens a fresh transactional handle over an existing shared store.
    #[must_use]
    pub fn open(store: Arc<Mutex<Store>>) -> Self {
        Self { store, pending: BTreeMap::new(), read_only: false }
    }

    /// Returns a handle to the underlying shared store, for constructing
    /// sibling transactions over the same data.
    #[must_use]
    pub fn shared_store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    /// Captures a point-in-time, read-only view including this handle's
    /// own uncommitted writes.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::LockPoisoned`] if the underlying store's
    /// mutex was poisoned by a panicking holder.
    pub fn read_only_snapshot(&self) -> GraphResult<crate::core::kv::Snapshot> {
        Ok(crate::core::kv::Snapshot::from_map(self.merged()?))
    }

    fn merged(&self) -> GraphResult<Store> {
        let mut out = self
            .store
            .lock()
            .map_err(|_| GraphError::LockPoisoned("memory kv store".to_string()))?
            .clone();
        for (k, v) in &self.pending {
            match v {
                Some(val) => {
                    out.insert(k.clone(), val.clone());
                }
                None => {
                    out.remove(k);
                }
            }
        }
        Ok(out)
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedKv for MemoryKv {
    fn get(&self, key: &[u8]) -> GraphResult<Option<Vec<u8>>> {
        if let Some(staged) = self.pending.get(key) {
            return Ok(staged.clone());
        }
        let store = self
            .store
            .lock()
            .map_err(|_| GraphError::LockPoisoned("memory kv store".to_string()))?;
        Ok(store.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> GraphResult<()> {
        self.pending.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> GraphResult<()> {
        self.pending.insert(key.to_vec(), None);
        Ok(())
    }

    fn remove_range(&mut self, lo: &[u8], hi: &[u8]) -> GraphResult<()> {
        let keys: Vec<Vec<u8>> = self.merged()?.range(lo.to_vec()..hi.to_vec()).map(|(k, _)| k.clone()).collect();
        for k in keys {
            self.pending.insert(k, None);
        }
        Ok(())
    }

    fn get_at_least(&self, key: &[u8], max_prefix: &[u8]) -> GraphResult<Option<KvEntry>> {
        let merged = self.merged()?;
        Ok(merged
            .range(key.to_vec()..)
            .take_while(|(k, _)| k.starts_with(max_prefix))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn get_at_most(&self, key: &[u8], max_prefix: &[u8]) -> GraphResult<Option<KvEntry>> {
        let merged = self.merged()?;
        Ok(merged
            .range(..=key.to_vec())
            .rev()
            .take_while(|(k, _)| k.starts_with(max_prefix))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn get_range(&self, lo: &[u8], hi: &[u8], reverse: bool) -> GraphResult<Vec<KvEntry>> {
        let merged = self.merged()?;
        let mut entries: Vec<KvEntry> =
            merged.range(lo.to_vec()..hi.to_vec()).map(|(k, v)| (k.clone(), v.clone())).collect();
        if reverse {
            entries.reverse();
        }
        Ok(entries)
    }

    fn encode_counter(&self, value: i64) -> Vec<u8> {
        value.to_be_bytes().to_vec()
    }

    fn decode_counter(&self, bytes: &[u8]) -> GraphResult<i64> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| GraphError::Encoding("counter value is not 8 bytes".to_string()))?;
        Ok(i64::from_be_bytes(arr))
    }

    fn adjust_counter(&mut self, key: &[u8], delta: i64) -> GraphResult<i64> {
        let current = match self.get(key)? {
            Some(bytes) => self.decode_counter(&bytes)?,
            None => 0,
        };
        let updated = current.wrapping_add(delta);
        let encoded = self.encode_counter(updated);
        self.put(key, &encoded)?;
        Ok(updated)
    }

    fn commit(&mut self) -> GraphResult<()> {
        if self.read_only {
            self.pending.clear();
            return Ok(());
        }
        let mut store = self
            .store
            .lock()
            .map_err(|_| GraphError::LockPoisoned("memory kv store".to_string()))?;
        for (k, v) in self.pending.drain(..) {
            match v {
                Some(val) => {
                    store.insert(k, val);
                }
                None => {
                    store.remove(&k);
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> GraphResult<()> {
        self.pending.clear();
        Ok(())
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_before_commit_is_visible() {
        let mut kv = MemoryKv::new();
        kv.put(b"k", b"v").unwrap();
        assert_eq!(kv.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn rollback_discards_pending_writes() {
        let mut kv = MemoryKv::new();
        kv.put(b"k", b"v").unwrap();
        kv.rollback().unwrap();
        assert_eq!(kv.get(b"k").unwrap(), None);
    }

    #[test]
    fn commit_persists_to_shared_store() {
        let mut kv = MemoryKv::new();
        kv.put(b"k", b"v").unwrap();
        kv.commit().unwrap();
        let kv2 = MemoryKv::open(kv.shared_store());
        assert_eq!(kv2.get(b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn read_only_commit_discards_writes() {
        let mut kv = MemoryKv::new();
        kv.set_read_only(true);
        kv.put(b"k", b"v").unwrap();
        kv.commit().unwrap();
        let kv2 = MemoryKv::open(kv.shared_store());
        assert_eq!(kv2.get(b"k").unwrap(), None);
    }

    #[test]
    fn range_scan_respects_prefix_bound() {
        let mut kv = MemoryKv::new();
        kv.put(b"a\x01", b"1").unwrap();
        kv.put(b"a\x02", b"2").unwrap();
        kv.put(b"b\x01", b"3").unwrap();
        let least = kv.get_at_least(b"a\x00", b"a").unwrap();
        assert_eq!(least, Some((b"a\x01".to_vec(), b"1".to_vec())));
        let most = kv.get_at_most(b"a\xff", b"a").unwrap();
        assert_eq!(most, Some((b"a\x02".to_vec(), b"2".to_vec())));
    }

    #[test]
    fn counter_adjust_accumulates() {
        let mut kv = MemoryKv::new();
        assert_eq!(kv.adjust_counter(b"c", 5).unwrap(), 5);
        assert_eq!(kv.adjust_counter(b"c", -2).unwrap(), 3);
    }
}
