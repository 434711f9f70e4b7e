//! On-access schema migration.
//!
//! Simple and reference fields are snapshotted, reset, initialized, and
//! reindexed one value at a time. Set/list/map fields go through
//! `core::complex`'s accessors for snapshotting and reindexing, and
//! through its `clear_complex_field` for a full wipe, so that collection
//! index entries stay consistent with the rest of the object's fields
//! across a schema change the same way they do across ordinary writes.

use crate::core::codec::{Encoding, ReferenceEncoding, U64Encoding};
use crate::core::complex;
use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use crate::core::index;
use crate::core::keys;
use crate::core::kv::OrderedKv;
use crate::core::schema::model::{CompositeIndex, Field, FieldKind, ObjType};
use crate::core::transaction::Transaction;
use crate::core::value;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Migrates `id` from its stored schema to `tx`'s schema, in place. A
/// no-op if `id` is already stored under `tx`'s schema.
///
/// # Errors
///
/// Returns [`GraphError::TypeNotInSchema`] if the target schema does
/// not declare the object's type, or propagates a KV failure.
pub fn migrate_object<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId) -> GraphResult<()> {
    let info = tx.obj_info(id)?;
    let old_schema_index = info.schema_index;
    let new_schema_index = tx.schema_index();
    if old_schema_index == new_schema_index {
        return Ok(());
    }

    let old_obj_type = tx.resolve_obj_type(old_schema_index, id)?;
    let new_schema = tx
        .bundle()
        .schema(new_schema_index)
        .ok_or_else(|| GraphError::InconsistentDatabase(format!("schema index {new_schema_index} not registered")))?
        .clone();
    let new_obj_type = new_schema
        .object_type(&old_obj_type.name)
        .cloned()
        .ok_or_else(|| GraphError::TypeNotInSchema(old_obj_type.name.clone()))?;
    let old_schema_id = tx
        .bundle()
        .schema(old_schema_index)
        .ok_or_else(|| GraphError::InconsistentDatabase(format!("schema index {old_schema_index} not registered")))?
        .schema_id();
    let new_schema_id = new_schema.schema_id();

    // Step 2: composite indexes dropped or SchemaId-mismatched.
    for old_composite in &old_obj_type.composite_indexes {
        let still_present = new_obj_type
            .composite_indexes
            .iter()
            .any(|c| c.schema_id(&new_obj_type.name) == old_composite.schema_id(&old_obj_type.name));
        if still_present {
            continue;
        }
        let storage_id = tx.bundle().composite_index_storage_id(&old_obj_type.name, old_composite)?;
        let bytes = composite_current_bytes(tx, id, &old_obj_type, old_composite)?;
        index::remove_composite_entry(tx.kv_mut(), storage_id, &bytes, id)?;
    }

    // Step 3-4: classify fields, snapshotting old values for the listener payload.
    let mut old_values: HashMap<String, JsonValue> = HashMap::new();
    let mut compatible: Vec<(Field, Field)> = Vec::new();
    let mut reset_fields: Vec<Field> = Vec::new();

    for old_field in &old_obj_type.fields {
        let snapshot = snapshot_field_value(tx, id, &old_obj_type, old_field)?;
        old_values.insert(old_field.name.clone(), snapshot.clone());

        let new_field = new_obj_type.field(&old_field.name);
        let same_schema_id = new_field
            .map(|nf| nf.schema_id(&new_obj_type.name) == old_field.schema_id(&old_obj_type.name))
            .unwrap_or(false);

        if !same_schema_id {
            reset_fields.push(old_field.clone());
            continue;
        }
        let new_field = new_field.expect("same_schema_id implies new_field is Some");
        let forced_reset = match (&new_field.kind, &snapshot) {
            (FieldKind::Reference { policy, .. }, JsonValue::String(hex)) if !policy.allowed_types.is_empty() => {
                !reference_target_allowed(tx, &new_schema, policy, hex)?
            }
            _ => false,
        };
        if forced_reset {
            reset_fields.push(old_field.clone());
        } else {
            compatible.push((old_field.clone(), new_field.clone()));
        }
    }

    // Step 5: reset fields.
    for old_field in &reset_fields {
        reset_field(tx, id, &old_obj_type, old_field)?;
    }

    // Step 6: fields new to the target schema.
    for new_field in &new_obj_type.fields {
        let has_old_counterpart = old_obj_type
            .field(&new_field.name)
            .map(|of| of.schema_id(&old_obj_type.name) == new_field.schema_id(&new_obj_type.name))
            .unwrap_or(false);
        if has_old_counterpart {
            continue;
        }
        initialize_new_field(tx, id, &new_obj_type, new_field)?;
    }

    // Step 7: indexing-status changes among compatible fields.
    for (old_field, new_field) in &compatible {
        reconcile_indexing(tx, id, &new_obj_type, old_field, new_field)?;
    }

    // Step 8: composite indexes new to the target schema.
    for new_composite in &new_obj_type.composite_indexes {
        let existed_before = old_obj_type
            .composite_indexes
            .iter()
            .any(|c| c.schema_id(&old_obj_type.name) == new_composite.schema_id(&new_obj_type.name));
        if existed_before {
            continue;
        }
        let storage_id = tx.bundle().composite_index_storage_id(&new_obj_type.name, new_composite)?;
        let bytes = composite_current_bytes(tx, id, &new_obj_type, new_composite)?;
        index::write_composite_entry(tx.kv_mut(), storage_id, &bytes, id)?;
    }

    // Step 9: rewrite meta-data, move schema-index entry.
    tx.kv_mut().put(&keys::object_meta_key(id), &U64Encoding.encode(&new_schema_index))?;
    index::move_schema_index_entry(tx.kv_mut(), old_schema_index, new_schema_index, id)?;
    tx.rebind_cache(id, new_schema_index);

    // Step 10: notify.
    tx.fire_schema_change(id, &old_schema_id, &new_schema_id, &old_values);

    Ok(())
}

fn snapshot_field_value<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    obj_type: &ObjType,
    field: &Field,
) -> GraphResult<JsonValue> {
    let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
    let key = keys::object_field_key(id, storage_id);
    match &field.kind {
        FieldKind::Simple { encoding, .. } => match tx.kv().get(&key)? {
            Some(bytes) => value::decode_simple(*encoding, &bytes),
            None => value::decode_simple(*encoding, &value::default_simple_bytes(*encoding)),
        },
        FieldKind::Reference { .. } => match tx.kv().get(&key)? {
            Some(bytes) => value::decode_reference(&ReferenceEncoding::unrestricted(), &bytes),
            None => Ok(JsonValue::Null),
        },
        FieldKind::Counter => {
            let value = match tx.kv().get(&key)? {
                Some(bytes) => tx.kv().decode_counter(&bytes)?,
                None => 0,
            };
            Ok(JsonValue::from(value))
        }
        FieldKind::Set { .. } => Ok(JsonValue::Array(complex::set_iter(tx, id, &field.name, false)?)),
        FieldKind::List { .. } => Ok(JsonValue::Array(complex::list_iter(tx, id, &field.name, false)?)),
        FieldKind::Map { .. } => {
            let entries = complex::map_iter(tx, id, &field.name, false)?;
            Ok(JsonValue::Array(entries.into_iter().map(|(k, v)| JsonValue::Array(vec![k, v])).collect()))
        }
    }
}

fn reference_target_allowed<K: OrderedKv>(
    tx: &Transaction<K>,
    new_schema: &crate::core::schema::model::Schema,
    policy: &crate::core::schema::model::ReferencePolicy,
    target_hex: &str,
) -> GraphResult<bool> {
    let bytes = parse_hex_obj_id(target_hex)?;
    let target_id = ObjId::from_slice(&bytes)?;
    let (target_storage_id, _) = keys::varint::decode_uint(target_id.as_bytes())?;
    for name in &policy.allowed_types {
        if let Some(ot) = new_schema.object_type(name) {
            if tx.bundle().type_storage_id(ot)? == target_storage_id {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

fn parse_hex_obj_id(hex: &str) -> GraphResult<Vec<u8>> {
    if hex.len() != 16 {
        return Err(GraphError::IllegalArgument(format!("'{hex}' is not a 16-digit ObjId hex string")));
    }
    let mut bytes = vec![0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| GraphError::IllegalArgument(format!("'{hex}' is not valid hex")))?;
    }
    Ok(bytes)
}

fn reset_field<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, obj_type: &ObjType, field: &Field) -> GraphResult<()> {
    let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
    let key = keys::object_field_key(id, storage_id);
    match &field.kind {
        FieldKind::Simple { encoding, indexed } => {
            if *indexed {
                if let Some(bytes) = tx.kv().get(&key)? {
                    index::remove_simple_entry(tx.kv_mut(), storage_id, &bytes, id)?;
                } else {
                    let default = value::default_simple_bytes(*encoding);
                    index::remove_simple_entry(tx.kv_mut(), storage_id, &default, id)?;
                }
            }
            tx.kv_mut().remove(&key)?;
        }
        FieldKind::Reference { indexed, .. } => {
            if *indexed {
                let bytes = tx.kv().get(&key)?.unwrap_or_else(value::default_reference_bytes);
                index::remove_simple_entry(tx.kv_mut(), storage_id, &bytes, id)?;
            }
            tx.kv_mut().remove(&key)?;
        }
        FieldKind::Counter => {
            let zero = tx.kv().encode_counter(0);
            tx.kv_mut().put(&key, &zero)?;
        }
        FieldKind::Set { .. } | FieldKind::List { .. } | FieldKind::Map { .. } => {
            complex::clear_complex_field(tx, id, field, storage_id)?;
        }
    }
    Ok(())
}

fn initialize_new_field<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, obj_type: &ObjType, field: &Field) -> GraphResult<()> {
    let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
    match &field.kind {
        FieldKind::Simple { encoding, indexed } => {
            if *indexed {
                index::write_simple_entry(tx.kv_mut(), storage_id, &value::default_simple_bytes(*encoding), id)?;
            }
        }
        FieldKind::Reference { indexed, .. } => {
            if *indexed {
                index::write_simple_entry(tx.kv_mut(), storage_id, &value::default_reference_bytes(), id)?;
            }
        }
        FieldKind::Counter => {
            let zero = tx.kv().encode_counter(0);
            tx.kv_mut().put(&keys::object_field_key(id, storage_id), &zero)?;
        }
        // A newly-declared collection starts out empty: no sub-keys exist
        // to write and no index entries to maintain for them yet.
        FieldKind::Set { .. } | FieldKind::List { .. } | FieldKind::Map { .. } => {}
    }
    Ok(())
}

fn reindex_entry<K: OrderedKv>(tx: &mut Transaction<K>, storage_id: u64, bytes: &[u8], id: ObjId, now_indexed: bool) -> GraphResult<()> {
    if now_indexed {
        index::write_simple_entry(tx.kv_mut(), storage_id, bytes, id)
    } else {
        index::remove_simple_entry(tx.kv_mut(), storage_id, bytes, id)
    }
}

fn reconcile_indexing<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    obj_type: &ObjType,
    old_field: &Field,
    new_field: &Field,
) -> GraphResult<()> {
    match (&old_field.kind, &new_field.kind) {
        (FieldKind::Simple { indexed: oi, encoding }, FieldKind::Simple { indexed: ni, .. }) => {
            if oi == ni {
                return Ok(());
            }
            let storage_id = tx.bundle().field_storage_id(&obj_type.name, new_field)?;
            let key = keys::object_field_key(id, storage_id);
            let current_bytes = tx.kv().get(&key)?.unwrap_or_else(|| value::default_simple_bytes(*encoding));
            reindex_entry(tx, storage_id, &current_bytes, id, *ni)
        }
        (FieldKind::Reference { indexed: oi, .. }, FieldKind::Reference { indexed: ni, .. }) => {
            if oi == ni {
                return Ok(());
            }
            let storage_id = tx.bundle().field_storage_id(&obj_type.name, new_field)?;
            let key = keys::object_field_key(id, storage_id);
            let current_bytes = tx.kv().get(&key)?.unwrap_or_else(value::default_reference_bytes);
            reindex_entry(tx, storage_id, &current_bytes, id, *ni)
        }
        (FieldKind::Set { indexed: oi, .. }, FieldKind::Set { indexed: ni, .. }) => {
            if oi == ni {
                return Ok(());
            }
            let storage_id = tx.bundle().field_storage_id(&obj_type.name, new_field)?;
            let prefix = keys::complex_field_prefix(id, storage_id);
            let upper = keys::prefix_upper_bound(&prefix);
            for (key, _) in tx.kv().get_range(&prefix, &upper, false)? {
                let element_bytes = key[prefix.len()..].to_vec();
                reindex_entry(tx, storage_id, &element_bytes, id, *ni)?;
            }
            Ok(())
        }
        (FieldKind::List { indexed: oi, .. }, FieldKind::List { indexed: ni, .. }) => {
            if oi == ni {
                return Ok(());
            }
            let storage_id = tx.bundle().field_storage_id(&obj_type.name, new_field)?;
            let prefix = keys::complex_field_prefix(id, storage_id);
            let upper = keys::prefix_upper_bound(&prefix);
            for (_, value_bytes) in tx.kv().get_range(&prefix, &upper, false)? {
                reindex_entry(tx, storage_id, &value_bytes, id, *ni)?;
            }
            Ok(())
        }
        (
            FieldKind::Map { key_indexed: oki, value_indexed: ovi, .. },
            FieldKind::Map { key_indexed: nki, value_indexed: nvi, .. },
        ) => {
            if oki == nki && ovi == nvi {
                return Ok(());
            }
            let storage_id = tx.bundle().field_storage_id(&obj_type.name, new_field)?;
            let prefix = keys::complex_field_prefix(id, storage_id);
            let upper = keys::prefix_upper_bound(&prefix);
            for (key, value_bytes) in tx.kv().get_range(&prefix, &upper, false)? {
                let key_bytes = key[prefix.len()..].to_vec();
                if oki != nki {
                    reindex_entry(tx, storage_id, &complex::tagged(complex::MAP_KEY_TAG, &key_bytes), id, *nki)?;
                }
                if ovi != nvi {
                    reindex_entry(tx, storage_id, &complex::tagged(complex::MAP_VALUE_TAG, &value_bytes), id, *nvi)?;
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn composite_current_bytes<K: OrderedKv>(
    tx: &Transaction<K>,
    id: ObjId,
    obj_type: &ObjType,
    composite: &CompositeIndex,
) -> GraphResult<Vec<u8>> {
    let mut out = Vec::new();
    for name in &composite.field_names {
        let field = obj_type.field(name).ok_or_else(|| GraphError::UnknownField(name.clone()))?;
        let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
        let bytes = match &field.kind {
            FieldKind::Simple { encoding, .. } => tx
                .kv()
                .get(&keys::object_field_key(id, storage_id))?
                .unwrap_or_else(|| value::default_simple_bytes(*encoding)),
            _ => return Err(GraphError::InvalidSchema(format!("composite index field '{name}' is not simple"))),
        };
        out.extend_from_slice(&bytes);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::bundle::SchemaBundle;
    use crate::core::schema::model::{DeleteAction, ReferencePolicy, Schema, SimpleKind};
    use serde_json::json;

    fn person_schema_v1() -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![
                    Field { name: "name".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false }, requested_storage_id: None },
                    Field {
                        name: "friend".to_string(),
                        kind: FieldKind::Reference {
                            policy: ReferencePolicy { allowed_types: vec![], on_delete: DeleteAction::Nullify, forward_delete: false, allow_deleted: true },
                            indexed: true,
                        },
                        requested_storage_id: None,
                    },
                ],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    fn person_schema_v2() -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![
                    Field { name: "name".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false }, requested_storage_id: None },
                    Field { name: "age".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::U64, indexed: true }, requested_storage_id: None },
                ],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    #[test]
    fn migration_resets_dropped_field_and_defaults_new_indexed_field() {
        let bundle = SchemaBundle::empty();
        let (bundle, idx1) = bundle.with_schema_added(None, person_schema_v1()).unwrap();
        let (bundle, idx2) = bundle.with_schema_added(None, person_schema_v2()).unwrap();

        let mut tx1 = Transaction::detached(bundle.clone(), idx1, 16, 64);
        let p1 = tx1.create("Person").unwrap();
        let p2 = tx1.create("Person").unwrap();
        tx1.write_simple_field(p2, "name", json!("Bob"), false).unwrap();
        tx1.write_simple_field(p2, "friend", json!(p1.to_hex()), false).unwrap();

        let mut tx2 = Transaction::new(std::mem::replace(tx1.kv_mut(), crate::core::kv::memory::MemoryKv::new()), bundle, idx2, 16, 64);
        assert_eq!(tx2.read_simple_field(p2, "name", true).unwrap(), json!("Bob"));
        assert_eq!(tx2.read_simple_field(p2, "age", true).unwrap(), json!(0));
        assert!(tx2.read_simple_field(p2, "friend", true).is_err());
    }

    fn person_schema_with_tags_v1() -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![
                    Field { name: "name".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false }, requested_storage_id: None },
                    Field {
                        name: "tags".to_string(),
                        kind: FieldKind::Set { element: Box::new(FieldKind::Simple { encoding: SimpleKind::String, indexed: false }), indexed: true },
                        requested_storage_id: None,
                    },
                ],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    fn person_schema_with_tags_v2_kept() -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![
                    Field {
                        name: "tags".to_string(),
                        kind: FieldKind::Set { element: Box::new(FieldKind::Simple { encoding: SimpleKind::String, indexed: false }), indexed: true },
                        requested_storage_id: None,
                    },
                    Field { name: "nickname".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false }, requested_storage_id: None },
                ],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    fn person_schema_with_tags_v2_dropped() -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![Field { name: "name".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false }, requested_storage_id: None }],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    #[test]
    fn migration_preserves_compatible_set_field_elements_and_index() {
        let bundle = SchemaBundle::empty();
        let (bundle, idx1) = bundle.with_schema_added(None, person_schema_with_tags_v1()).unwrap();
        let (bundle, idx2) = bundle.with_schema_added(None, person_schema_with_tags_v2_kept()).unwrap();

        let mut tx1 = Transaction::detached(bundle.clone(), idx1, 16, 64);
        let p = tx1.create("Person").unwrap();
        complex::set_add(&mut tx1, p, "tags", &json!("a"), false).unwrap();
        complex::set_add(&mut tx1, p, "tags", &json!("b"), false).unwrap();

        let mut tx2 = Transaction::new(std::mem::replace(tx1.kv_mut(), crate::core::kv::memory::MemoryKv::new()), bundle, idx2, 16, 64);
        let mut tags = complex::set_iter(&mut tx2, p, "tags", true).unwrap();
        tags.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
        assert_eq!(tags, vec![json!("a"), json!("b")]);

        let storage_id = tx2
            .bundle()
            .field_storage_id("Person", tx2.bundle().schema(idx2).unwrap().object_type("Person").unwrap().field("tags").unwrap())
            .unwrap();
        let indexed = index::query_simple_index(tx2.kv(), storage_id).unwrap();
        assert_eq!(indexed.len(), 2);
    }

    #[test]
    fn migration_resets_dropped_set_field_and_clears_its_index_entries() {
        let bundle = SchemaBundle::empty();
        let (bundle, idx1) = bundle.with_schema_added(None, person_schema_with_tags_v1()).unwrap();
        let (bundle, idx2) = bundle.with_schema_added(None, person_schema_with_tags_v2_dropped()).unwrap();

        let mut tx1 = Transaction::detached(bundle.clone(), idx1, 16, 64);
        let p = tx1.create("Person").unwrap();
        complex::set_add(&mut tx1, p, "tags", &json!("a"), false).unwrap();
        let tags_field = tx1.bundle().schema(idx1).unwrap().object_type("Person").unwrap().field("tags").unwrap().clone();
        let storage_id = tx1.bundle().field_storage_id("Person", &tags_field).unwrap();

        let mut tx2 = Transaction::new(std::mem::replace(tx1.kv_mut(), crate::core::kv::memory::MemoryKv::new()), bundle, idx2, 16, 64);
        assert!(tx2.read_simple_field(p, "name", true).is_ok());
        assert!(index::query_simple_index(tx2.kv(), storage_id).unwrap().is_empty());
    }
}
