//! Delete cascades: `DeleteAction` policy enforcement, forward-delete,
//! and re-entrant delete guarding.
//!
//! The cascade walks incoming references the same way field-monitor
//! delivery does: by indexed-simple-field lookup in the KV store, never
//! by holding an in-memory object graph. A field's storage id is
//! content-derived from its owning type, name, *and* policy, so one
//! index query per distinct storage id is enough to find every current
//! referrer of a deleted object through that field, across every
//! registered schema version. A reference nested inside a set, list, or
//! map is indexed under that field's own storage id too (tagged, for a
//! map, to tell its key-index and value-index entries apart) — the
//! cascade queries those the same way, then dispatches the matching
//! element/entry removal through `core::complex` instead of
//! `write_simple_field`.

use crate::core::complex;
use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use crate::core::index;
use crate::core::keys;
use crate::core::kv::OrderedKv;
use crate::core::schema::model::{DeleteAction, FieldKind, ObjType, ReferencePolicy};
use crate::core::transaction::Transaction;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Deletes `id` and cascades per each referring field's `DeleteAction`.
/// Returns `true` if `id` existed and was deleted, `false` if it
/// did not exist or a cascade had already reached it (re-entrant
/// no-op, treating a second arrival at an object already marked for
/// deletion as inert rather than re-raising).
///
/// # Errors
///
/// Returns [`GraphError::ReferencedObject`] if a referring field with
/// `on_delete = Exception` blocks the delete (a self-reference never
/// blocks its own delete this way), or propagates a KV failure.
pub fn delete_object<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId) -> GraphResult<bool> {
    let mut in_progress = HashSet::new();
    delete_inner(tx, id, &mut in_progress)
}

fn delete_inner<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    in_progress: &mut HashSet<ObjId>,
) -> GraphResult<bool> {
    if in_progress.contains(&id) {
        return Ok(false);
    }
    if tx.kv().get(&keys::object_meta_key(id))?.is_none() {
        return Ok(false);
    }
    in_progress.insert(id);

    let info = tx.obj_info(id)?;
    let obj_type = tx.resolve_obj_type(info.schema_index, id)?;

    cascade_to_referrers(tx, id, in_progress)?;

    let forward_targets = collect_forward_delete_targets(tx, id, info.schema_index, &obj_type)?;

    tx.fire_delete(id);
    erase_object(tx, id, &obj_type)?;
    tx.invalidate_cache(id);

    for target in forward_targets {
        delete_inner(tx, target, in_progress)?;
    }

    Ok(true)
}

/// Which position inside a referring field held the reference that
/// cascades to the deleted object — a scalar reference field, a
/// set/list element, or a map key/value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ReferringKind {
    Simple,
    SetElement,
    ListElement,
    MapKey,
    MapValue,
}

/// Every reference-holding field's storage id, policy, and referring
/// position, across every schema version the bundle currently knows
/// about — a field's storage id already encodes its declaring type,
/// name, and policy, so this dedups fields shared by content across
/// schema versions for free.
fn referring_reference_fields<K: OrderedKv>(tx: &Transaction<K>) -> GraphResult<HashMap<(u64, ReferringKind), ReferencePolicy>> {
    let mut out = HashMap::new();
    for schema_index in tx.bundle().registered_schema_indexes() {
        let schema = tx.bundle().schema(schema_index).expect("just-listed schema index is registered");
        for obj_type in &schema.object_types {
            for field in &obj_type.fields {
                let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
                match &field.kind {
                    FieldKind::Reference { policy, .. } => {
                        out.insert((storage_id, ReferringKind::Simple), policy.clone());
                    }
                    FieldKind::Set { element, .. } => {
                        if let FieldKind::Reference { policy, .. } = element.as_ref() {
                            out.insert((storage_id, ReferringKind::SetElement), policy.clone());
                        }
                    }
                    FieldKind::List { element, .. } => {
                        if let FieldKind::Reference { policy, .. } = element.as_ref() {
                            out.insert((storage_id, ReferringKind::ListElement), policy.clone());
                        }
                    }
                    FieldKind::Map { key, value, .. } => {
                        if let FieldKind::Reference { policy, .. } = key.as_ref() {
                            out.insert((storage_id, ReferringKind::MapKey), policy.clone());
                        }
                        if let FieldKind::Reference { policy, .. } = value.as_ref() {
                            out.insert((storage_id, ReferringKind::MapValue), policy.clone());
                        }
                    }
                    FieldKind::Simple { .. } | FieldKind::Counter => {}
                }
            }
        }
    }
    Ok(out)
}

fn cascade_to_referrers<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    in_progress: &mut HashSet<ObjId>,
) -> GraphResult<()> {
    for ((storage_id, kind), policy) in referring_reference_fields(tx)? {
        let lookup_bytes = match kind {
            ReferringKind::MapKey => complex::tagged(complex::MAP_KEY_TAG, id.as_bytes()),
            ReferringKind::MapValue => complex::tagged(complex::MAP_VALUE_TAG, id.as_bytes()),
            ReferringKind::Simple | ReferringKind::SetElement | ReferringKind::ListElement => id.as_bytes().to_vec(),
        };
        let referrers = index::query_simple_index(tx.kv(), storage_id)?
            .get(lookup_bytes.as_slice())
            .cloned()
            .unwrap_or_default();
        for referrer in referrers {
            if referrer == id {
                continue;
            }
            apply_delete_action(tx, referrer, storage_id, kind, &policy, id, in_progress)?;
        }
    }
    Ok(())
}

fn apply_delete_action<K: OrderedKv>(
    tx: &mut Transaction<K>,
    referrer: ObjId,
    storage_id: u64,
    kind: ReferringKind,
    policy: &ReferencePolicy,
    target: ObjId,
    in_progress: &mut HashSet<ObjId>,
) -> GraphResult<()> {
    match policy.on_delete {
        DeleteAction::Exception => {
            let field_name = referring_field_name(tx, referrer, storage_id)?;
            Err(GraphError::ReferencedObject { referrer: referrer.to_hex(), field: field_name })
        }
        DeleteAction::Nullify => {
            let field_name = referring_field_name(tx, referrer, storage_id)?;
            match kind {
                ReferringKind::Simple => tx.write_simple_field(referrer, &field_name, JsonValue::Null, false),
                ReferringKind::SetElement | ReferringKind::ListElement | ReferringKind::MapValue => {
                    complex::nullify_reference_occurrences(tx, referrer, &field_name, target)
                }
                // A map key has no "null" occupant; nullify degrades to dropping the entry.
                ReferringKind::MapKey => complex::map_remove(tx, referrer, &field_name, &JsonValue::String(target.to_hex()), false).map(|_| ()),
            }
        }
        DeleteAction::Remove => {
            let field_name = referring_field_name(tx, referrer, storage_id)?;
            match kind {
                ReferringKind::Simple => tx.write_simple_field(referrer, &field_name, JsonValue::Null, false),
                ReferringKind::SetElement | ReferringKind::ListElement | ReferringKind::MapValue => {
                    complex::remove_reference_occurrences(tx, referrer, &field_name, target)
                }
                ReferringKind::MapKey => complex::map_remove(tx, referrer, &field_name, &JsonValue::String(target.to_hex()), false).map(|_| ()),
            }
        }
        DeleteAction::Delete => {
            delete_inner(tx, referrer, in_progress)?;
            Ok(())
        }
        DeleteAction::Ignore => Ok(()),
    }
}

fn referring_field_name<K: OrderedKv>(tx: &mut Transaction<K>, referrer: ObjId, storage_id: u64) -> GraphResult<String> {
    let info = tx.obj_info(referrer)?;
    let obj_type = tx.resolve_obj_type(info.schema_index, referrer)?;
    for field in &obj_type.fields {
        if tx.bundle().field_storage_id(&obj_type.name, field)? == storage_id {
            return Ok(field.name.clone());
        }
    }
    Err(GraphError::InconsistentDatabase(format!(
        "referrer {} has no field matching storage id {storage_id}",
        referrer.to_hex()
    )))
}

fn collect_forward_delete_targets<K: OrderedKv>(
    tx: &mut Transaction<K>,
    id: ObjId,
    schema_index: u64,
    obj_type: &ObjType,
) -> GraphResult<Vec<ObjId>> {
    let mut targets = Vec::new();
    for field in &obj_type.fields {
        match &field.kind {
            FieldKind::Reference { policy, .. } => {
                if policy.forward_delete {
                    if let JsonValue::String(hex) = tx.read_simple_field(id, &field.name, false)? {
                        targets.push(ObjId::from_slice(&hex_to_obj_id_bytes(&hex)?)?);
                    }
                }
            }
            FieldKind::Set { element, .. } | FieldKind::List { element, .. } => {
                if let FieldKind::Reference { policy, .. } = element.as_ref() {
                    if policy.forward_delete {
                        let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
                        targets.extend(complex::collect_reference_values(tx, id, storage_id, schema_index, field)?);
                    }
                }
            }
            FieldKind::Map { value, .. } => {
                if let FieldKind::Reference { policy, .. } = value.as_ref() {
                    if policy.forward_delete {
                        let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
                        targets.extend(complex::collect_reference_values(tx, id, storage_id, schema_index, field)?);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(targets)
}

fn hex_to_obj_id_bytes(hex: &str) -> GraphResult<Vec<u8>> {
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

fn erase_object<K: OrderedKv>(tx: &mut Transaction<K>, id: ObjId, obj_type: &ObjType) -> GraphResult<()> {
    for composite in &obj_type.composite_indexes {
        let storage_id = tx.bundle().composite_index_storage_id(&obj_type.name, composite)?;
        let bytes = composite_current_bytes(tx, id, obj_type, composite)?;
        index::remove_composite_entry(tx.kv_mut(), storage_id, &bytes, id)?;
    }

    for field in &obj_type.fields {
        let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
        let key = keys::object_field_key(id, storage_id);
        match &field.kind {
            FieldKind::Simple { encoding, indexed } => {
                if *indexed {
                    let bytes = tx
                        .kv()
                        .get(&key)?
                        .unwrap_or_else(|| crate::core::value::default_simple_bytes(*encoding));
                    index::remove_simple_entry(tx.kv_mut(), storage_id, &bytes, id)?;
                }
                tx.kv_mut().remove(&key)?;
            }
            FieldKind::Reference { indexed, .. } => {
                if *indexed {
                    let bytes = tx.kv().get(&key)?.unwrap_or_else(crate::core::value::default_reference_bytes);
                    index::remove_simple_entry(tx.kv_mut(), storage_id, &bytes, id)?;
                }
                tx.kv_mut().remove(&key)?;
            }
            FieldKind::Counter => {
                tx.kv_mut().remove(&key)?;
            }
            FieldKind::Set { .. } | FieldKind::List { .. } | FieldKind::Map { .. } => {
                complex::clear_complex_field(tx, id, field, storage_id)?;
            }
        }
    }

    index::remove_schema_index_entry(tx.kv_mut(), tx.obj_info(id)?.schema_index, id)?;
    tx.kv_mut().remove(&keys::object_meta_key(id))
}

fn composite_current_bytes<K: OrderedKv>(
    tx: &Transaction<K>,
    id: ObjId,
    obj_type: &ObjType,
    composite: &crate::core::schema::model::CompositeIndex,
) -> GraphResult<Vec<u8>> {
    let mut out = Vec::new();
    for name in &composite.field_names {
        let field = obj_type.field(name).ok_or_else(|| GraphError::UnknownField(name.clone()))?;
        let storage_id = tx.bundle().field_storage_id(&obj_type.name, field)?;
        let bytes = match &field.kind {
            FieldKind::Simple { encoding, .. } => tx
                .kv()
                .get(&keys::object_field_key(id, storage_id))?
                .unwrap_or_else(|| crate::core::value::default_simple_bytes(*encoding)),
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
    use crate::core::schema::model::{Field, Schema, SimpleKind};
    use serde_json::json;

    fn schema_with(on_delete: DeleteAction, forward_delete: bool) -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![
                    Field { name: "name".to_string(), kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false }, requested_storage_id: None },
                    Field {
                        name: "friend".to_string(),
                        kind: FieldKind::Reference {
                            policy: ReferencePolicy { allowed_types: vec![], on_delete, forward_delete, allow_deleted: true },
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

    fn schema_with_friends_set(on_delete: DeleteAction) -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![Field {
                    name: "friends".to_string(),
                    kind: FieldKind::Set {
                        element: Box::new(FieldKind::Reference {
                            policy: ReferencePolicy { allowed_types: vec![], on_delete, forward_delete: false, allow_deleted: true },
                            indexed: true,
                        }),
                        indexed: true,
                    },
                    requested_storage_id: None,
                }],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    #[test]
    fn nullify_clears_referring_field_on_delete() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with(DeleteAction::Nullify, false)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let a = tx.create("Person").unwrap();
        let b = tx.create("Person").unwrap();
        tx.write_simple_field(b, "friend", json!(a.to_hex()), false).unwrap();

        assert!(delete_object(&mut tx, a).unwrap());
        assert_eq!(tx.read_simple_field(b, "friend", false).unwrap(), JsonValue::Null);
    }

    #[test]
    fn exception_blocks_delete_unless_self_reference() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with(DeleteAction::Exception, false)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let a = tx.create("Person").unwrap();
        let b = tx.create("Person").unwrap();
        tx.write_simple_field(b, "friend", json!(a.to_hex()), false).unwrap();

        assert!(matches!(delete_object(&mut tx, a), Err(GraphError::ReferencedObject { .. })));

        tx.write_simple_field(a, "friend", json!(a.to_hex()), false).unwrap();
        assert!(delete_object(&mut tx, a).unwrap());
    }

    #[test]
    fn delete_cascades_transitively() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with(DeleteAction::Delete, false)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let a = tx.create("Person").unwrap();
        let b = tx.create("Person").unwrap();
        tx.write_simple_field(b, "friend", json!(a.to_hex()), false).unwrap();

        assert!(delete_object(&mut tx, a).unwrap());
        assert!(tx.kv().get(&keys::object_meta_key(b)).unwrap().is_none());
    }

    #[test]
    fn forward_delete_removes_referenced_object_too() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with(DeleteAction::Ignore, true)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let a = tx.create("Person").unwrap();
        let b = tx.create("Person").unwrap();
        tx.write_simple_field(b, "friend", json!(a.to_hex()), false).unwrap();

        assert!(delete_object(&mut tx, b).unwrap());
        assert!(tx.kv().get(&keys::object_meta_key(a)).unwrap().is_none());
    }

    #[test]
    fn deleting_missing_object_is_a_no_op() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with(DeleteAction::Ignore, false)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let ghost = ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, 9]);
        assert!(!delete_object(&mut tx, ghost).unwrap());
    }

    #[test]
    fn exception_blocks_delete_of_an_object_held_in_a_set() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_friends_set(DeleteAction::Exception)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let a = tx.create("Person").unwrap();
        let b = tx.create("Person").unwrap();
        complex::set_add(&mut tx, b, "friends", &json!(a.to_hex()), false).unwrap();

        assert!(matches!(delete_object(&mut tx, a), Err(GraphError::ReferencedObject { .. })));
    }

    #[test]
    fn remove_drops_only_the_matching_set_element() {
        let (bundle, idx) = SchemaBundle::empty().with_schema_added(None, schema_with_friends_set(DeleteAction::Remove)).unwrap();
        let mut tx = Transaction::detached(bundle, idx, 16, 64);
        let a = tx.create("Person").unwrap();
        let b = tx.create("Person").unwrap();
        let c = tx.create("Person").unwrap();
        complex::set_add(&mut tx, c, "friends", &json!(a.to_hex()), false).unwrap();
        complex::set_add(&mut tx, c, "friends", &json!(b.to_hex()), false).unwrap();

        assert!(delete_object(&mut tx, a).unwrap());
        let remaining = complex::set_iter(&mut tx, c, "friends", false).unwrap();
        assert_eq!(remaining, vec![json!(b.to_hex())]);
    }
}
