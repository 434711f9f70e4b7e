//! Key layout.
//!
//! Assembles and parses every key the engine reads or writes. Each
//! category of key (meta-data tables, schema index, object data, index
//! data) lives in its own contiguous range, distinguished by a one-byte
//! marker below the floor [`varint::encode_uint`] ever produces, so the
//! ranges never interleave regardless of what storage IDs a schema
//! happens to assign.

pub mod varint;

use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use varint::{decode_uint, encode_uint};

const FORMAT_VERSION: u8 = 0x00;
const USER_META: u8 = 0x01;
const SCHEMA_TABLE: u8 = 0x02;
const STORAGE_ID_TABLE: u8 = 0x03;
const SCHEMA_INDEX: u8 = 0x04;
const OBJECT_DATA: u8 = 0x05;
const INDEX_DATA: u8 = 0x06;

/// The current on-disk format version.
pub const CURRENT_FORMAT_VERSION: u64 = 1;

/// The single key holding the format version.
#[must_use]
pub fn format_version_key() -> Vec<u8> {
    vec![FORMAT_VERSION]
}

/// The byte range reserved for caller-owned meta-data; the engine never
/// reads or writes inside it.
#[must_use]
pub fn user_meta_data_range() -> (Vec<u8>, Vec<u8>) {
    (vec![USER_META], vec![USER_META + 1])
}

/// Key for the Schema Table entry at `schema_index`.
#[must_use]
pub fn schema_table_key(schema_index: u64) -> Vec<u8> {
    let mut out = vec![SCHEMA_TABLE];
    encode_uint(schema_index, &mut out);
    out
}

/// The full Schema Table key range, for iterating every registered schema.
#[must_use]
pub fn schema_table_range() -> (Vec<u8>, Vec<u8>) {
    (vec![SCHEMA_TABLE], vec![SCHEMA_TABLE + 1])
}

/// Key for the Storage ID Table entry at `storage_id`.
#[must_use]
pub fn storage_id_table_key(storage_id: u64) -> Vec<u8> {
    let mut out = vec![STORAGE_ID_TABLE];
    encode_uint(storage_id, &mut out);
    out
}

/// The full Storage ID Table key range.
#[must_use]
pub fn storage_id_table_range() -> (Vec<u8>, Vec<u8>) {
    (vec![STORAGE_ID_TABLE], vec![STORAGE_ID_TABLE + 1])
}

/// Prefix of every schema-index entry for `schema_index`.
#[must_use]
pub fn schema_index_prefix(schema_index: u64) -> Vec<u8> {
    let mut out = vec![SCHEMA_INDEX];
    encode_uint(schema_index, &mut out);
    out
}

/// Key for the schema-index entry recording that `obj_id` is stored
/// under `schema_index`.
#[must_use]
pub fn schema_index_key(schema_index: u64, obj_id: ObjId) -> Vec<u8> {
    let mut out = schema_index_prefix(schema_index);
    out.extend_from_slice(obj_id.as_bytes());
    out
}

/// The full schema-index key range, across every schema index.
#[must_use]
pub fn schema_index_full_range() -> (Vec<u8>, Vec<u8>) {
    (vec![SCHEMA_INDEX], vec![SCHEMA_INDEX + 1])
}

/// Key for an object's meta-data entry.
#[must_use]
pub fn object_meta_key(obj_id: ObjId) -> Vec<u8> {
    let mut out = vec![OBJECT_DATA];
    out.extend_from_slice(obj_id.as_bytes());
    out
}

/// Prefix of every key (meta-data, fields, complex sub-keys) belonging
/// to `obj_id`; used to delete an object's data in one range removal.
#[must_use]
pub fn object_data_prefix(obj_id: ObjId) -> Vec<u8> {
    object_meta_key(obj_id)
}

/// Key for a single simple or counter field on `obj_id`.
#[must_use]
pub fn object_field_key(obj_id: ObjId, field_storage_id: u64) -> Vec<u8> {
    let mut out = object_meta_key(obj_id);
    encode_uint(field_storage_id, &mut out);
    out
}

/// Prefix of every sub-key belonging to a complex (set/list/map) field.
#[must_use]
pub fn complex_field_prefix(obj_id: ObjId, field_storage_id: u64) -> Vec<u8> {
    object_field_key(obj_id, field_storage_id)
}

/// Key for a single sub-entry of a complex field (an element, a list
/// index, or a map key).
#[must_use]
pub fn complex_field_sub_key(obj_id: ObjId, field_storage_id: u64, sub_key: &[u8]) -> Vec<u8> {
    let mut out = complex_field_prefix(obj_id, field_storage_id);
    out.extend_from_slice(sub_key);
    out
}

/// Prefix of every simple-index entry for `index_storage_id`.
#[must_use]
pub fn simple_index_prefix(index_storage_id: u64) -> Vec<u8> {
    let mut out = vec![INDEX_DATA];
    encode_uint(index_storage_id, &mut out);
    out
}

/// Key for a simple or composite index entry: `index prefix ‖
/// field-value(s) ‖ ObjId [‖ sub-key]`.
#[must_use]
pub fn index_entry_key(
    index_storage_id: u64,
    encoded_values: &[u8],
    obj_id: ObjId,
    sub_key: Option<&[u8]>,
) -> Vec<u8> {
    let mut out = simple_index_prefix(index_storage_id);
    out.extend_from_slice(encoded_values);
    out.extend_from_slice(obj_id.as_bytes());
    if let Some(sub) = sub_key {
        out.extend_from_slice(sub);
    }
    out
}

/// The full key range for one index (covers every value it has ever
/// indexed).
#[must_use]
pub fn index_full_range(index_storage_id: u64) -> (Vec<u8>, Vec<u8>) {
    let lo = simple_index_prefix(index_storage_id);
    let hi = prefix_upper_bound(&lo);
    (lo, hi)
}

/// Returns the key that exclusively bounds every key beginning with
/// `prefix` from above.
#[must_use]
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut out = prefix.to_vec();
    while let Some(&last) = out.last() {
        if last == 0xFF {
            out.pop();
        } else {
            *out.last_mut().expect("checked non-empty above") += 1;
            return out;
        }
    }
    // Every byte was 0xFF: no finite bound expressible at this length.
    let mut fallback = prefix.to_vec();
    fallback.push(0xFF);
    fallback
}

/// The exclusive upper bound of the 8-byte key range occupied by a
/// single object's data (meta-data, fields, complex sub-keys).
#[must_use]
pub fn object_data_upper_bound(obj_id: ObjId) -> Vec<u8> {
    prefix_upper_bound(&object_data_prefix(obj_id))
}

/// Parses the 8-byte `ObjId` immediately following a key's category
/// marker and any preceding varint-encoded prefix bytes.
///
/// # Errors
///
/// Returns [`GraphError::Encoding`] if fewer than 8 bytes remain.
pub fn parse_obj_id(remaining: &[u8]) -> GraphResult<(ObjId, usize)> {
    let slice = remaining
        .get(..8)
        .ok_or_else(|| GraphError::Encoding("key too short for ObjId".to_string()))?;
    Ok((ObjId::from_slice(slice)?, 8))
}

/// Parses a schema-index entry key, returning the schema index and the
/// `ObjId` it governs.
///
/// # Errors
///
/// Returns [`GraphError::Encoding`] on a malformed key.
pub fn parse_schema_index_key(key: &[u8]) -> GraphResult<(u64, ObjId)> {
    let rest = key
        .strip_prefix(&[SCHEMA_INDEX])
        .ok_or_else(|| GraphError::Encoding("not a schema-index key".to_string()))?;
    let (schema_index, consumed) = decode_uint(rest)?;
    let (obj_id, _) = parse_obj_id(&rest[consumed..])?;
    Ok((schema_index, obj_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_sort_in_spec_order() {
        let id = ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, 1]);
        let keys = vec![
            format_version_key(),
            user_meta_data_range().0,
            schema_table_key(1),
            storage_id_table_key(1),
            schema_index_key(1, id),
            object_meta_key(id),
            object_field_key(id, 7),
            index_entry_key(9, &[0x01], id, None),
        ];
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted, "keys were not already in ascending order: {keys:?}");
    }

    #[test]
    fn object_data_prefix_bounds_only_that_object() {
        let a = ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, 1]);
        let b = ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, 2]);
        let upper = object_data_upper_bound(a);
        assert!(object_field_key(a, 3) < upper);
        assert!(object_meta_key(b) >= upper);
    }

    #[test]
    fn schema_index_key_round_trips() {
        let id = ObjId::from_bytes([0x20, 1, 2, 3, 4, 5, 6, 7]);
        let key = schema_index_key(42, id);
        let (schema_index, parsed_id) = parse_schema_index_key(&key).unwrap();
        assert_eq!(schema_index, 42);
        assert_eq!(parsed_id, id);
    }
}
