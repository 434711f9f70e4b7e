//! A frozen, read-only view over a `MemoryKv` store.

use crate::core::error::{GraphError, GraphResult};
use crate::core::kv::{KvEntry, OrderedKv};
use std::collections::BTreeMap;

/// A point-in-time, read-only copy of a store. Every mutating method
/// returns [`GraphError::IllegalArgument`].
pub struct Snapshot {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Snapshot {
    /// Builds a snapshot from a plain map, as captured by the owning
    /// store at `read_only_snapshot` time.
    #[must_use]
    pub fn from_map(data: BTreeMap<Vec<u8>, Vec<u8>>) -> Self {
        Self { data }
    }

    fn read_only_error() -> GraphError {
        GraphError::IllegalArgument("snapshot transactions are read-only".to_string())
    }
}

impl OrderedKv for Snapshot {
    fn get(&self, key: &[u8]) -> GraphResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn put(&mut self, _key: &[u8], _value: &[u8]) -> GraphResult<()> {
        Err(Self::read_only_error())
    }

    fn remove(&mut self, _key: &[u8]) -> GraphResult<()> {
        Err(Self::read_only_error())
    }

    fn remove_range(&mut self, _lo: &[u8], _hi: &[u8]) -> GraphResult<()> {
        Err(Self::read_only_error())
    }

    fn get_at_least(&self, key: &[u8], max_prefix: &[u8]) -> GraphResult<Option<KvEntry>> {
        Ok(self
            .data
            .range(key.to_vec()..)
            .take_while(|(k, _)| k.starts_with(max_prefix))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn get_at_most(&self, key: &[u8], max_prefix: &[u8]) -> GraphResult<Option<KvEntry>> {
        Ok(self
            .data
            .range(..=key.to_vec())
            .rev()
            .take_while(|(k, _)| k.starts_with(max_prefix))
            .next()
            .map(|(k, v)| (k.clone(), v.clone())))
    }

    fn get_range(&self, lo: &[u8], hi: &[u8], reverse: bool) -> GraphResult<Vec<KvEntry>> {
        let mut entries: Vec<KvEntry> =
            self.data.range(lo.to_vec()..hi.to_vec()).map(|(k, v)| (k.clone(), v.clone())).collect();
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

    fn adjust_counter(&mut self, _key: &[u8], _delta: i64) -> GraphResult<i64> {
        Err(Self::read_only_error())
    }

    fn commit(&mut self) -> GraphResult<()> {
        Err(Self::read_only_error())
    }

    fn rollback(&mut self) -> GraphResult<()> {
        Ok(())
    }

    fn set_read_only(&mut self, _read_only: bool) {}

    fn is_read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_but_refuses_writes() {
        let mut data = BTreeMap::new();
        data.insert(b"k".to_vec(), b"v".to_vec());
        let mut snap = Snapshot::from_map(data);
        assert_eq!(snap.get(b"k").unwrap(), Some(b"v".to_vec()));
        assert!(snap.put(b"k2", b"v2").is_err());
        assert!(snap.is_read_only());
    }
}
