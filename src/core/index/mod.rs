//! Index maintainer: keeps simple, composite, and schema indexes
//! consistent with data writes.

use crate::core::error::GraphResult;
use crate::core::ids::ObjId;
use crate::core::keys;
use crate::core::kv::OrderedKv;
use std::collections::BTreeMap;

/// Writes a simple (or complex-sub-field) index entry.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn write_simple_entry<K: OrderedKv>(
    kv: &mut K,
    index_storage_id: u64,
    encoded_value: &[u8],
    obj_id: ObjId,
) -> GraphResult<()> {
    let key = keys::index_entry_key(index_storage_id, encoded_value, obj_id, None);
    kv.put(&key, &[])
}

/// Removes a simple (or complex-sub-field) index entry.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn remove_simple_entry<K: OrderedKv>(
    kv: &mut K,
    index_storage_id: u64,
    encoded_value: &[u8],
    obj_id: ObjId,
) -> GraphResult<()> {
    let key = keys::index_entry_key(index_storage_id, encoded_value, obj_id, None);
    kv.remove(&key)
}

/// Replaces a simple index entry's value, as part of a field write, by
/// removing the old entry and inserting the new one.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn update_simple_entry<K: OrderedKv>(
    kv: &mut K,
    index_storage_id: u64,
    old_encoded_value: &[u8],
    new_encoded_value: &[u8],
    obj_id: ObjId,
) -> GraphResult<()> {
    if old_encoded_value == new_encoded_value {
        return Ok(());
    }
    remove_simple_entry(kv, index_storage_id, old_encoded_value, obj_id)?;
    write_simple_entry(kv, index_storage_id, new_encoded_value, obj_id)
}

/// Writes a composite-index entry with the given concatenated,
/// per-field-encoded values.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn write_composite_entry<K: OrderedKv>(
    kv: &mut K,
    index_storage_id: u64,
    encoded_values: &[u8],
    obj_id: ObjId,
) -> GraphResult<()> {
    write_simple_entry(kv, index_storage_id, encoded_values, obj_id)
}

/// Removes a composite-index entry.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn remove_composite_entry<K: OrderedKv>(
    kv: &mut K,
    index_storage_id: u64,
    encoded_values: &[u8],
    obj_id: ObjId,
) -> GraphResult<()> {
    remove_simple_entry(kv, index_storage_id, encoded_values, obj_id)
}

/// Adds an entry to the schema index recording that `obj_id` is stored
/// under `schema_index`.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn add_schema_index_entry<K: OrderedKv>(
    kv: &mut K,
    schema_index: u64,
    obj_id: ObjId,
) -> GraphResult<()> {
    kv.put(&keys::schema_index_key(schema_index, obj_id), &[])
}

/// Removes `obj_id`'s schema-index entry for `schema_index`.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn remove_schema_index_entry<K: OrderedKv>(
    kv: &mut K,
    schema_index: u64,
    obj_id: ObjId,
) -> GraphResult<()> {
    kv.remove(&keys::schema_index_key(schema_index, obj_id))
}

/// Moves `obj_id`'s schema-index entry from `old_schema_index` to
/// `new_schema_index`, as part of a migration.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn move_schema_index_entry<K: OrderedKv>(
    kv: &mut K,
    old_schema_index: u64,
    new_schema_index: u64,
    obj_id: ObjId,
) -> GraphResult<()> {
    remove_schema_index_entry(kv, old_schema_index, obj_id)?;
    add_schema_index_entry(kv, new_schema_index, obj_id)
}

/// Returns every `ObjId` registered under `schema_index` in the schema
/// index.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn query_schema_index<K: OrderedKv>(kv: &K, schema_index: u64) -> GraphResult<Vec<ObjId>> {
    let prefix = keys::schema_index_prefix(schema_index);
    let upper = keys::prefix_upper_bound(&prefix);
    let entries = kv.get_range(&prefix, &upper, false)?;
    entries
        .into_iter()
        .map(|(key, _)| keys::parse_schema_index_key(&key).map(|(_, id)| id))
        .collect()
}

/// Returns every `(encoded_value, ObjId)` pair stored in a simple index,
/// grouped and sorted the way a range scan of the index naturally
/// yields them.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn query_simple_index<K: OrderedKv>(
    kv: &K,
    index_storage_id: u64,
) -> GraphResult<BTreeMap<Vec<u8>, Vec<ObjId>>> {
    let (lo, hi) = keys::index_full_range(index_storage_id);
    let prefix_len = keys::simple_index_prefix(index_storage_id).len();
    let entries = kv.get_range(&lo, &hi, false)?;
    let mut out: BTreeMap<Vec<u8>, Vec<ObjId>> = BTreeMap::new();
    for (key, _) in entries {
        let rest = &key[prefix_len..];
        let obj_id_start = rest.len() - 8;
        let value_bytes = rest[..obj_id_start].to_vec();
        let obj_id = ObjId::from_slice(&rest[obj_id_start..])?;
        out.entry(value_bytes).or_default().push(obj_id);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::memory::MemoryKv;

    fn id(n: u8) -> ObjId {
        ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, n])
    }

    #[test]
    fn simple_index_round_trips_through_query() {
        let mut kv = MemoryKv::new();
        write_simple_entry(&mut kv, 9, b"Alice", id(1)).unwrap();
        write_simple_entry(&mut kv, 9, b"Bob", id(2)).unwrap();
        let queried = query_simple_index(&kv, 9).unwrap();
        assert_eq!(queried.get(b"Alice".as_slice()), Some(&vec![id(1)]));
        assert_eq!(queried.get(b"Bob".as_slice()), Some(&vec![id(2)]));
    }

    #[test]
    fn update_simple_entry_is_a_noop_when_unchanged() {
        let mut kv = MemoryKv::new();
        write_simple_entry(&mut kv, 9, b"Alice", id(1)).unwrap();
        update_simple_entry(&mut kv, 9, b"Alice", b"Alice", id(1)).unwrap();
        let queried = query_simple_index(&kv, 9).unwrap();
        assert_eq!(queried.get(b"Alice".as_slice()), Some(&vec![id(1)]));
    }

    #[test]
    fn schema_index_roundtrip() {
        let mut kv = MemoryKv::new();
        add_schema_index_entry(&mut kv, 1, id(1)).unwrap();
        add_schema_index_entry(&mut kv, 1, id(2)).unwrap();
        let members = query_schema_index(&kv, 1).unwrap();
        assert_eq!(members, vec![id(1), id(2)]);
        remove_schema_index_entry(&mut kv, 1, id(1)).unwrap();
        assert_eq!(query_schema_index(&kv, 1).unwrap(), vec![id(2)]);
    }
}
