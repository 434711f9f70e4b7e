//! Set/List/Map live views: element-level read/write accessors and the
//! per-element index maintenance that goes with them.
//!
//! A set stores each element as an empty-valued sub-key (existence
//! only); a list stores each element keyed by its 8-byte big-endian
//! position (order-preserving, so a range scan yields list order) and
//! shifts adjacent positions on insert/remove; a map stores each value
//! keyed by its encoded key. A field's own storage id doubles as the
//! index id for its indexed sub-fields, the same way a simple field's
//! does — a map needs two separate index namespaces sharing that one
//! id, so key-index and value-index entries are distinguished by a
//! one-byte tag prepended to the encoded bytes before indexing.

use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use crate::core::index;
use crate::core::keys;
use crate::core::kv::OrderedKv;
use crate::core::codec::{Encoding, U64Encoding};
use crate::core::schema::model::{Field, FieldKind};
use crate::core::transaction::Transaction;
use crate::core::value;
use serde_json::Value as JsonValue;

/// Tags a map key-index entry, distinguishing it from a value-index
/// entry sharing the same storage id.
pub(crate) const MAP_KEY_TAG: u8 = 0x00;
/// Tags a map value-index entry.
pub(crate) const MAP_VALUE_TAG: u8 = 0x01;

pub(crate) fn tagged(tag: u8, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(tag);
    out.extend_from_slice(bytes);
    out
}

fn not_complex(name: &str) -> GraphError {
    GraphError::IllegalArgument(format!("'{name}' is not a set, list, or map field"))
}

fn field_context<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    field_name: &str,
    migrate: bool,
) -> GraphResult<(Field, u64, u64)> {
    tx.ensure_active()?;
    let (obj_type, schema_index) = tx.resolve_for_access(id, migrate)?;
    let field = obj_type.field(field_name).cloned().ok_or_else(|| GraphError::UnknownField(field_name.to_string()))?;
    let storage_id = tx.bundle().field_storage_id(&obj_type.name, &field)?;
    Ok((field, storage_id, schema_index))
}

fn encode_element<K: OrderedKv>(tx: &Transaction<K>, schema_index: u64, kind: &FieldKind, value: &JsonValue) -> GraphResult<Vec<u8>> {
    match kind {
        FieldKind::Simple { encoding, .. } => crate::core::value::encode_simple(*encoding, value),
        FieldKind::Reference { policy, .. } => {
            let enc = tx.reference_encoding_for(schema_index, policy)?;
            value::encode_reference(&enc, value)
        }
        _ => Err(GraphError::IllegalArgument("complex fields may only nest simple or reference sub-fields".to_string())),
    }
}

fn decode_element<K: OrderedKv>(tx: &Transaction<K>, schema_index: u64, kind: &FieldKind, bytes: &[u8]) -> GraphResult<JsonValue> {
    match kind {
        FieldKind::Simple { encoding, .. } => value::decode_simple(*encoding, bytes),
        FieldKind::Reference { policy, .. } => {
            let enc = tx.reference_encoding_for(schema_index, policy)?;
            value::decode_reference(&enc, bytes)
        }
        _ => Err(GraphError::IllegalArgument("complex fields may only nest simple or reference sub-fields".to_string())),
    }
}

fn parse_hex_obj_id(hex: &str) -> GraphResult<ObjId> {
    if hex.len() != 16 {
        return Err(GraphError::IllegalArgument(format!("'{hex}' is not a 16-digit ObjId hex string")));
    }
    let mut bytes = [0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| GraphError::IllegalArgument(format!("'{hex}' is not valid hex")))?;
    }
    Ok(ObjId::from_bytes(bytes))
}

// --- Set ---------------------------------------------------------------

/// Returns whether `element` is currently a member of the set field.
///
/// # Errors
///
/// Returns [`GraphError::UnknownField`] or [`GraphError::IllegalArgument`]
/// if `field_name` does not name a set field.
pub fn set_contains<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, element: &JsonValue, migrate: bool) -> GraphResult<bool> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Set { element: elem_kind, .. } = &field.kind else { return Err(not_complex(field_name)) };
    let bytes = encode_element(tx, schema_index, elem_kind, element)?;
    let key = keys::complex_field_sub_key(id, storage_id, &bytes);
    Ok(tx.kv().get(&key)?.is_some())
}

/// Adds `element` to the set field. Returns `true` if it was newly
/// added, `false` if already present.
///
/// # Errors
///
/// See [`set_contains`].
pub fn set_add<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, element: &JsonValue, migrate: bool) -> GraphResult<bool> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Set { element: elem_kind, indexed } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let bytes = encode_element(tx, schema_index, &elem_kind, element)?;
    let key = keys::complex_field_sub_key(id, storage_id, &bytes);
    if tx.kv().get(&key)?.is_some() {
        return Ok(false);
    }
    tx.kv_mut().put(&key, &[])?;
    if indexed {
        index::write_simple_entry(tx.kv_mut(), storage_id, &bytes, id)?;
    }
    Ok(true)
}

/// Removes `element` from the set field. Returns `true` if it was
/// present.
///
/// # Errors
///
/// See [`set_contains`].
pub fn set_remove<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, element: &JsonValue, migrate: bool) -> GraphResult<bool> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Set { element: elem_kind, indexed } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let bytes = encode_element(tx, schema_index, &elem_kind, element)?;
    let key = keys::complex_field_sub_key(id, storage_id, &bytes);
    if tx.kv().get(&key)?.is_none() {
        return Ok(false);
    }
    tx.kv_mut().remove(&key)?;
    if indexed {
        index::remove_simple_entry(tx.kv_mut(), storage_id, &bytes, id)?;
    }
    Ok(true)
}

/// Returns every element of the set field, in key-encoded order.
///
/// # Errors
///
/// See [`set_contains`].
pub fn set_iter<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, migrate: bool) -> GraphResult<Vec<JsonValue>> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Set { element: elem_kind, .. } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let prefix = keys::complex_field_prefix(id, storage_id);
    let upper = keys::prefix_upper_bound(&prefix);
    let entries = tx.kv().get_range(&prefix, &upper, false)?;
    let mut out = Vec::with_capacity(entries.len());
    for (key, _) in entries {
        out.push(decode_element(tx, schema_index, &elem_kind, &key[prefix.len()..])?);
    }
    Ok(out)
}

// --- List ----------------------------------------------------------------

fn list_position_key(id: ObjId, storage_id: u64, position: u64) -> Vec<u8> {
    keys::complex_field_sub_key(id, storage_id, &U64Encoding.encode(&position))
}

fn list_len_at<K: OrderedKv>(tx: &Transaction<K>, id: ObjId, storage_id: u64) -> GraphResult<u64> {
    let prefix = keys::complex_field_prefix(id, storage_id);
    let upper = keys::prefix_upper_bound(&prefix);
    Ok(tx.kv().get_range(&prefix, &upper, false)?.len() as u64)
}

/// The number of elements in the list field.
///
/// # Errors
///
/// Returns [`GraphError::UnknownField`] or [`GraphError::IllegalArgument`]
/// if `field_name` does not name a list field.
pub fn list_len<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, migrate: bool) -> GraphResult<u64> {
    let (field, storage_id, _) = field_context(tx, id, field_name, migrate)?;
    if !matches!(field.kind, FieldKind::List { .. }) {
        return Err(not_complex(field_name));
    }
    list_len_at(tx, id, storage_id)
}

/// The element at `position`.
///
/// # Errors
///
/// Returns [`GraphError::IllegalArgument`] if `position` is out of
/// bounds, in addition to [`list_len`]'s errors.
pub fn list_get<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, position: u64, migrate: bool) -> GraphResult<JsonValue> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::List { element: elem_kind, .. } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let key = list_position_key(id, storage_id, position);
    let bytes = tx.kv().get(&key)?.ok_or_else(|| GraphError::IllegalArgument(format!("list index {position} out of bounds")))?;
    decode_element(tx, schema_index, &elem_kind, &bytes)
}

/// Overwrites the element at `position` in place.
///
/// # Errors
///
/// See [`list_get`].
pub fn list_set<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, position: u64, value: &JsonValue, migrate: bool) -> GraphResult<()> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::List { element: elem_kind, indexed } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let key = list_position_key(id, storage_id, position);
    let old_bytes = tx.kv().get(&key)?.ok_or_else(|| GraphError::IllegalArgument(format!("list index {position} out of bounds")))?;
    let new_bytes = encode_element(tx, schema_index, &elem_kind, value)?;
    if old_bytes == new_bytes {
        return Ok(());
    }
    tx.kv_mut().put(&key, &new_bytes)?;
    if indexed {
        index::update_simple_entry(tx.kv_mut(), storage_id, &old_bytes, &new_bytes, id)?;
    }
    Ok(())
}

/// Inserts `value` at `position`, shifting every later element up by
/// one slot.
///
/// # Errors
///
/// Returns [`GraphError::IllegalArgument`] if `position` is greater
/// than the list's length, in addition to [`list_len`]'s errors.
pub fn list_insert<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, position: u64, value: &JsonValue, migrate: bool) -> GraphResult<()> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::List { element: elem_kind, indexed } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let len = list_len_at(tx, id, storage_id)?;
    if position > len {
        return Err(GraphError::IllegalArgument(format!("list index {position} out of bounds")));
    }
    for i in (position..len).rev() {
        let src = list_position_key(id, storage_id, i);
        let dst = list_position_key(id, storage_id, i + 1);
        let bytes = tx.kv().get(&src)?.expect("position within current length must exist");
        tx.kv_mut().put(&dst, &bytes)?;
    }
    let new_bytes = encode_element(tx, schema_index, &elem_kind, value)?;
    let key = list_position_key(id, storage_id, position);
    tx.kv_mut().put(&key, &new_bytes)?;
    if indexed {
        index::write_simple_entry(tx.kv_mut(), storage_id, &new_bytes, id)?;
    }
    Ok(())
}

/// Appends `value` to the end of the list field.
///
/// # Errors
///
/// See [`list_insert`].
pub fn list_append<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, value: &JsonValue, migrate: bool) -> GraphResult<()> {
    let len = list_len(tx, id, field_name, migrate)?;
    list_insert(tx, id, field_name, len, value, false)
}

/// Removes and returns the element at `position`, shifting every later
/// element down by one slot.
///
/// # Errors
///
/// See [`list_get`].
pub fn list_remove<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, position: u64, migrate: bool) -> GraphResult<JsonValue> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::List { element: elem_kind, indexed } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let len = list_len_at(tx, id, storage_id)?;
    if position >= len {
        return Err(GraphError::IllegalArgument(format!("list index {position} out of bounds")));
    }
    let key = list_position_key(id, storage_id, position);
    let old_bytes = tx.kv().get(&key)?.expect("position within current length must exist");
    let removed = decode_element(tx, schema_index, &elem_kind, &old_bytes)?;
    if indexed {
        index::remove_simple_entry(tx.kv_mut(), storage_id, &old_bytes, id)?;
    }
    for i in (position + 1)..len {
        let src = list_position_key(id, storage_id, i);
        let dst = list_position_key(id, storage_id, i - 1);
        let bytes = tx.kv().get(&src)?.expect("position within current length must exist");
        tx.kv_mut().put(&dst, &bytes)?;
    }
    let last_key = list_position_key(id, storage_id, len - 1);
    tx.kv_mut().remove(&last_key)?;
    Ok(removed)
}

/// Returns every element of the list field, in list order.
///
/// # Errors
///
/// See [`list_len`].
pub fn list_iter<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, migrate: bool) -> GraphResult<Vec<JsonValue>> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::List { element: elem_kind, .. } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let prefix = keys::complex_field_prefix(id, storage_id);
    let upper = keys::prefix_upper_bound(&prefix);
    let entries = tx.kv().get_range(&prefix, &upper, false)?;
    let mut out = Vec::with_capacity(entries.len());
    for (_, bytes) in entries {
        out.push(decode_element(tx, schema_index, &elem_kind, &bytes)?);
    }
    Ok(out)
}

// --- Map -------------------------------------------------------------------

/// Looks up `key`'s value in the map field.
///
/// # Errors
///
/// Returns [`GraphError::UnknownField`] or [`GraphError::IllegalArgument`]
/// if `field_name` does not name a map field.
pub fn map_get<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, key: &JsonValue, migrate: bool) -> GraphResult<Option<JsonValue>> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Map { key: key_kind, value: value_kind, .. } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let key_bytes = encode_element(tx, schema_index, &key_kind, key)?;
    let sub_key = keys::complex_field_sub_key(id, storage_id, &key_bytes);
    match tx.kv().get(&sub_key)? {
        Some(bytes) => Ok(Some(decode_element(tx, schema_index, &value_kind, &bytes)?)),
        None => Ok(None),
    }
}

/// Returns whether `key` is present in the map field.
///
/// # Errors
///
/// See [`map_get`].
pub fn map_contains_key<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, key: &JsonValue, migrate: bool) -> GraphResult<bool> {
    Ok(map_get(tx, id, field_name, key, migrate)?.is_some())
}

/// Inserts or overwrites `key`'s value. Returns the previous value, if
/// any.
///
/// # Errors
///
/// See [`map_get`].
pub fn map_put<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, key: &JsonValue, value: &JsonValue, migrate: bool) -> GraphResult<Option<JsonValue>> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Map { key: key_kind, value: value_kind, key_indexed, value_indexed } = field.kind.clone() else {
        return Err(not_complex(field_name));
    };
    let key_bytes = encode_element(tx, schema_index, &key_kind, key)?;
    let new_value_bytes = encode_element(tx, schema_index, &value_kind, value)?;
    let sub_key = keys::complex_field_sub_key(id, storage_id, &key_bytes);
    let old_value_bytes = tx.kv().get(&sub_key)?;
    tx.kv_mut().put(&sub_key, &new_value_bytes)?;

    match &old_value_bytes {
        None => {
            if key_indexed {
                index::write_simple_entry(tx.kv_mut(), storage_id, &tagged(MAP_KEY_TAG, &key_bytes), id)?;
            }
            if value_indexed {
                index::write_simple_entry(tx.kv_mut(), storage_id, &tagged(MAP_VALUE_TAG, &new_value_bytes), id)?;
            }
        }
        Some(old) if old != &new_value_bytes => {
            if value_indexed {
                index::update_simple_entry(
                    tx.kv_mut(),
                    storage_id,
                    &tagged(MAP_VALUE_TAG, old),
                    &tagged(MAP_VALUE_TAG, &new_value_bytes),
                    id,
                )?;
            }
        }
        Some(_) => {}
    }

    match old_value_bytes {
        Some(bytes) => Ok(Some(decode_element(tx, schema_index, &value_kind, &bytes)?)),
        None => Ok(None),
    }
}

/// Removes `key`'s entry. Returns its value, if any.
///
/// # Errors
///
/// See [`map_get`].
pub fn map_remove<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, key: &JsonValue, migrate: bool) -> GraphResult<Option<JsonValue>> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Map { key: key_kind, value: value_kind, key_indexed, value_indexed } = field.kind.clone() else {
        return Err(not_complex(field_name));
    };
    let key_bytes = encode_element(tx, schema_index, &key_kind, key)?;
    let sub_key = keys::complex_field_sub_key(id, storage_id, &key_bytes);
    let Some(old_bytes) = tx.kv().get(&sub_key)? else { return Ok(None) };
    tx.kv_mut().remove(&sub_key)?;
    if key_indexed {
        index::remove_simple_entry(tx.kv_mut(), storage_id, &tagged(MAP_KEY_TAG, &key_bytes), id)?;
    }
    if value_indexed {
        index::remove_simple_entry(tx.kv_mut(), storage_id, &tagged(MAP_VALUE_TAG, &old_bytes), id)?;
    }
    Ok(Some(decode_element(tx, schema_index, &value_kind, &old_bytes)?))
}

/// Returns every `(key, value)` entry of the map field, in key-encoded
/// order.
///
/// # Errors
///
/// See [`map_get`].
pub fn map_iter<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field_name: &str, migrate: bool) -> GraphResult<Vec<(JsonValue, JsonValue)>> {
    let (field, storage_id, schema_index) = field_context(tx, id, field_name, migrate)?;
    let FieldKind::Map { key: key_kind, value: value_kind, .. } = field.kind.clone() else { return Err(not_complex(field_name)) };
    let prefix = keys::complex_field_prefix(id, storage_id);
    let upper = keys::prefix_upper_bound(&prefix);
    let entries = tx.kv().get_range(&prefix, &upper, false)?;
    let mut out = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let decoded_key = decode_element(tx, schema_index, &key_kind, &key[prefix.len()..])?;
        let decoded_value = decode_element(tx, schema_index, &value_kind, &value)?;
        out.push((decoded_key, decoded_value));
    }
    Ok(out)
}

// --- Cross-cutting helpers for delete cascade and migration ---------------

/// Wipes a complex field's entire sub-key range, first removing any
/// per-element/per-key/per-value index entries it maintains.
///
/// # Errors
///
/// Returns [`GraphError::IllegalArgument`] if `field` is not a set,
/// list, or map field, or propagates a KV failure.
pub(crate) fn clear_complex_field<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, field: &Field, storage_id: u64) -> GraphResult<()> {
    let prefix = keys::complex_field_prefix(id, storage_id);
    let upper = keys::prefix_upper_bound(&prefix);
    match &field.kind {
        FieldKind::Set { indexed, .. } => {
            if *indexed {
                for (key, _) in tx.kv().get_range(&prefix, &upper, false)? {
                    let element_bytes = key[prefix.len()..].to_vec();
                    index::remove_simple_entry(tx.kv_mut(), storage_id, &element_bytes, id)?;
                }
            }
        }
        FieldKind::List { indexed, .. } => {
            if *indexed {
                for (_, value_bytes) in tx.kv().get_range(&prefix, &upper, false)? {
                    index::remove_simple_entry(tx.kv_mut(), storage_id, &value_bytes, id)?;
                }
            }
        }
        FieldKind::Map { key_indexed, value_indexed, .. } => {
            if *key_indexed || *value_indexed {
                for (key, value_bytes) in tx.kv().get_range(&prefix, &upper, false)? {
                    let key_bytes = key[prefix.len()..].to_vec();
                    if *key_indexed {
                        index::remove_simple_entry(tx.kv_mut(), storage_id, &tagged(MAP_KEY_TAG, &key_bytes), id)?;
                    }
                    if *value_indexed {
                        index::remove_simple_entry(tx.kv_mut(), storage_id, &tagged(MAP_VALUE_TAG, &value_bytes), id)?;
                    }
                }
            }
        }
        _ => return Err(not_complex(&field.name)),
    }
    tx.kv_mut().remove_range(&prefix, &upper)
}

/// Returns every `ObjId` currently held as a reference element (set),
/// reference value (list), or reference value (map) inside `field` —
/// used to extend forward-delete to collection-held references.
///
/// # Errors
///
/// Propagates a KV or decoding failure.
pub(crate) fn collect_reference_values<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    storage_id: u64,
    schema_index: u64,
    field: &Field,
) -> GraphResult<Vec<ObjId>> {
    let mut out = Vec::new();
    let prefix = keys::complex_field_prefix(id, storage_id);
    let upper = keys::prefix_upper_bound(&prefix);
    match &field.kind {
        FieldKind::Set { element, .. } if matches!(element.as_ref(), FieldKind::Reference { .. }) => {
            for (key, _) in tx.kv().get_range(&prefix, &upper, false)? {
                if let JsonValue::String(hex) = decode_element(tx, schema_index, element, &key[prefix.len()..])? {
                    out.push(parse_hex_obj_id(&hex)?);
                }
            }
        }
        FieldKind::List { element, .. } if matches!(element.as_ref(), FieldKind::Reference { .. }) => {
            for (_, value_bytes) in tx.kv().get_range(&prefix, &upper, false)? {
                if let JsonValue::String(hex) = decode_element(tx, schema_index, element, &value_bytes)? {
                    out.push(parse_hex_obj_id(&hex)?);
                }
            }
        }
        FieldKind::Map { value, .. } if matches!(value.as_ref(), FieldKind::Reference { .. }) => {
            for (_, value_bytes) in tx.kv().get_range(&prefix, &upper, false)? {
                if let JsonValue::String(hex) = decode_element(tx, schema_index, value, &value_bytes)? {
                    out.push(parse_hex_obj_id(&hex)?);
                }
            }
        }
        _ => {}
    }
    Ok(out)
}

/// Implements `DeleteAction::Remove` for a collection-held reference:
/// drops the matching set element, list slot(s), or map entry/entries.
///
/// # Errors
///
/// Propagates a KV or decoding failure.
pub(crate) fn remove_reference_occurrences<K: OrderedKv>(tx: &mut Transaction<K>, referrer: ObjId, field_name: &str, target: ObjId) -> GraphResult<()> {
    let (field, _, _) = field_context(tx, referrer, field_name, false)?;
    let target_hex = JsonValue::String(target.to_hex());
    match &field.kind {
        FieldKind::Set { .. } => {
            set_remove(tx, referrer, field_name, &target_hex, false)?;
        }
        FieldKind::List { .. } => {
            let len = list_len(tx, referrer, field_name, false)?;
            let mut matching = Vec::new();
            for i in 0..len {
                if list_get(tx, referrer, field_name, i, false)? == target_hex {
                    matching.push(i);
                }
            }
            for position in matching.into_iter().rev() {
                list_remove(tx, referrer, field_name, position, false)?;
            }
        }
        FieldKind::Map { .. } => {
            let entries = map_iter(tx, referrer, field_name, false)?;
            for (key, value) in entries {
                if value == target_hex {
                    map_remove(tx, referrer, field_name, &key, false)?;
                }
            }
        }
        _ => return Err(not_complex(field_name)),
    }
    Ok(())
}

/// Implements `DeleteAction::Nullify` for a collection-held reference:
/// a set element has no meaningful "null" occupant so it is removed
/// like `Remove`; a list slot or map value is overwritten with the
/// null-reference sentinel in place, keeping its slot or key.
///
/// # Errors
///
/// Propagates a KV or decoding failure.
pub(crate) fn nullify_reference_occurrences<K: OrderedKv>(tx: &mut Transaction<K>, referrer: ObjId, field_name: &str, target: ObjId) -> GraphResult<()> {
    let (field, _, _) = field_context(tx, referrer, field_name, false)?;
    let target_hex = JsonValue::String(target.to_hex());
    match &field.kind {
        FieldKind::Set { .. } => {
            set_remove(tx, referrer, field_name, &target_hex, false)?;
        }
        FieldKind::List { .. } => {
            let len = list_len(tx, referrer, field_name, false)?;
            for i in 0..len {
                if list_get(tx, referrer, field_name, i, false)? == target_hex {
                    list_set(tx, referrer, field_name, i, &JsonValue::Null, false)?;
                }
            }
        }
        FieldKind::Map { .. } => {
            let entries = map_iter(tx, referrer, field_name, false)?;
            for (key, value) in entries {
                if value == target_hex {
                    map_put(tx, referrer, field_name, &key, &JsonValue::Null, false)?;
                }
            }
        }
        _ => return Err(not_complex(field_name)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::bundle::SchemaBundle;
    use crate::core::schema::model::{ObjType, Schema, SimpleKind};
    use serde_json::json;

    fn schema_with_field(field: Field) -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![field],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    fn nicknames_field(indexed: bool) -> Field {
        Field {
            name: "nicknames".to_string(),
            kind: FieldKind::Set { element: Box::new(FieldKind::Simple { encoding: SimpleKind::String, indexed: false }), indexed },
            requested_storage_id: None,
        }
    }

    fn scores_field(indexed: bool) -> Field {
        Field {
            name: "scores".to_string(),
            kind: FieldKind::List { element: Box::new(FieldKind::Simple { encoding: SimpleKind::U64, indexed: false }), indexed },
            requested_storage_id: None,
        }
    }

    fn tags_field(key_indexed: bool, value_indexed: bool) -> Field {
        Field {
            name: "tags".to_string(),
            kind: FieldKind::Map {
                key: Box::new(FieldKind::Simple { encoding: SimpleKind::String, indexed: false }),
                value: Box::new(FieldKind::Simple { encoding: SimpleKind::U64, indexed: false }),
                key_indexed,
                value_indexed,
            },
            requested_storage_id: None,
        }
    }

    #[test]
    fn set_add_remove_and_iterate_round_trips() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_field(nicknames_field(true))).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let p = tx.create("Person").unwrap();

        assert!(set_add(&mut tx, p, "nicknames", &json!("Al"), false).unwrap());
        assert!(!set_add(&mut tx, p, "nicknames", &json!("Al"), false).unwrap());
        assert!(set_add(&mut tx, p, "nicknames", &json!("Ally"), false).unwrap());
        assert!(set_contains(&mut tx, p, "nicknames", &json!("Al"), false).unwrap());

        let mut members = set_iter(&mut tx, p, "nicknames", false).unwrap();
        members.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        assert_eq!(members, vec![json!("Al"), json!("Ally")]);

        let storage_id = tx.bundle().field_storage_id("Person", tx.bundle().schema(idx).unwrap().object_type("Person").unwrap().field("nicknames").unwrap()).unwrap();
        let indexed = index::query_simple_index(tx.kv(), storage_id).unwrap();
        assert_eq!(indexed.len(), 2);

        assert!(set_remove(&mut tx, p, "nicknames", &json!("Al"), false).unwrap());
        assert!(!set_contains(&mut tx, p, "nicknames", &json!("Al"), false).unwrap());
        let indexed = index::query_simple_index(tx.kv(), storage_id).unwrap();
        assert_eq!(indexed.len(), 1);
    }

    #[test]
    fn list_insert_append_and_remove_shift_correctly() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_field(scores_field(false))).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let p = tx.create("Person").unwrap();

        list_append(&mut tx, p, "scores", &json!(1), false).unwrap();
        list_append(&mut tx, p, "scores", &json!(2), false).unwrap();
        list_append(&mut tx, p, "scores", &json!(3), false).unwrap();
        assert_eq!(list_iter(&mut tx, p, "scores", false).unwrap(), vec![json!(1), json!(2), json!(3)]);

        list_insert(&mut tx, p, "scores", 1, &json!(99), false).unwrap();
        assert_eq!(list_iter(&mut tx, p, "scores", false).unwrap(), vec![json!(1), json!(99), json!(2), json!(3)]);

        let removed = list_remove(&mut tx, p, "scores", 0, false).unwrap();
        assert_eq!(removed, json!(1));
        assert_eq!(list_iter(&mut tx, p, "scores", false).unwrap(), vec![json!(99), json!(2), json!(3)]);
        assert_eq!(list_len(&mut tx, p, "scores", false).unwrap(), 3);
    }

    #[test]
    fn list_set_overwrites_in_place_and_updates_index() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_field(scores_field(true))).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let p = tx.create("Person").unwrap();
        list_append(&mut tx, p, "scores", &json!(1), false).unwrap();
        list_set(&mut tx, p, "scores", 0, &json!(42), false).unwrap();
        assert_eq!(list_get(&mut tx, p, "scores", 0, false).unwrap(), json!(42));

        let storage_id = tx.bundle().field_storage_id("Person", tx.bundle().schema(idx).unwrap().object_type("Person").unwrap().field("scores").unwrap()).unwrap();
        let indexed = index::query_simple_index(tx.kv(), storage_id).unwrap();
        assert_eq!(indexed.len(), 1);
    }

    #[test]
    fn map_put_get_remove_round_trips() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_field(tags_field(true, true))).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let p = tx.create("Person").unwrap();

        assert_eq!(map_put(&mut tx, p, "tags", &json!("a"), &json!(1), false).unwrap(), None);
        assert_eq!(map_put(&mut tx, p, "tags", &json!("a"), &json!(2), false).unwrap(), Some(json!(1)));
        assert_eq!(map_get(&mut tx, p, "tags", &json!("a"), false).unwrap(), Some(json!(2)));
        assert!(map_contains_key(&mut tx, p, "tags", &json!("a"), false).unwrap());

        let storage_id = tx.bundle().field_storage_id("Person", tx.bundle().schema(idx).unwrap().object_type("Person").unwrap().field("tags").unwrap()).unwrap();
        let indexed = index::query_simple_index(tx.kv(), storage_id).unwrap();
        assert_eq!(indexed.len(), 2);

        assert_eq!(map_remove(&mut tx, p, "tags", &json!("a"), false).unwrap(), Some(json!(2)));
        assert_eq!(map_get(&mut tx, p, "tags", &json!("a"), false).unwrap(), None);
        let indexed = index::query_simple_index(tx.kv(), storage_id).unwrap();
        assert!(indexed.is_empty());
    }

    #[test]
    fn clear_complex_field_removes_index_entries_and_data() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_field(nicknames_field(true))).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let p = tx.create("Person").unwrap();
        set_add(&mut tx, p, "nicknames", &json!("Al"), false).unwrap();
        set_add(&mut tx, p, "nicknames", &json!("Ally"), false).unwrap();

        let field = tx.bundle().schema(idx).unwrap().object_type("Person").unwrap().field("nicknames").unwrap().clone();
        let storage_id = tx.bundle().field_storage_id("Person", &field).unwrap();
        clear_complex_field(&mut tx, p, &field, storage_id).unwrap();

        assert!(set_iter(&mut tx, p, "nicknames", false).unwrap().is_empty());
        assert!(index::query_simple_index(tx.kv(), storage_id).unwrap().is_empty());
    }
}
