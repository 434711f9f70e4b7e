//! The Schema Table / Storage-ID Table materialized as an immutable,
//! copy-on-write bundle.

use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::model::{CompositeIndex, Field, ObjType, Schema};
use crate::core::schema::validate::validate_schema;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A decoded, cross-validated view of the Schema Table and Storage-ID
/// Table.
///
/// Every mutating operation returns a new bundle rather than mutating in
/// place.
#[derive(Debug, Clone, Default)]
pub struct SchemaBundle {
    schemas: BTreeMap<u64, Schema>,
    storage_ids: HashMap<String, u64>,
    items_by_storage_id: HashMap<u64, String>,
}

impl SchemaBundle {
    /// An empty bundle, as seen by a freshly initialized database.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decodes a bundle from raw Schema Table and Storage-ID Table
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentDatabase`] if the encoded tables
    /// violate the bundle's invariants (duplicate storage IDs, a schema
    /// item with no assigned storage ID, etc.).
    pub fn decode(
        schema_entries: &[(u64, Vec<u8>)],
        storage_entries: &[(u64, Vec<u8>)],
    ) -> GraphResult<Self> {
        let mut schemas = BTreeMap::new();
        for (schema_index, bytes) in schema_entries {
            let schema: Schema = serde_json::from_slice(bytes)
                .map_err(|e| GraphError::InconsistentDatabase(format!("corrupt schema table entry {schema_index}: {e}")))?;
            schemas.insert(*schema_index, schema);
        }

        let mut storage_ids = HashMap::new();
        let mut items_by_storage_id = HashMap::new();
        for (storage_id, bytes) in storage_entries {
            let item_id = String::from_utf8(bytes.clone())
                .map_err(|e| GraphError::InconsistentDatabase(format!("corrupt storage-id table entry {storage_id}: {e}")))?;
            if storage_ids.insert(item_id.clone(), *storage_id).is_some() {
                return Err(GraphError::InconsistentDatabase(format!(
                    "item SchemaId '{item_id}' appears more than once in the storage-id table"
                )));
            }
            items_by_storage_id.insert(*storage_id, item_id);
        }

        let bundle = Self { schemas, storage_ids, items_by_storage_id };
        bundle.check_every_item_has_storage_id()?;
        Ok(bundle)
    }

    fn check_every_item_has_storage_id(&self) -> GraphResult<()> {
        for (schema_index, schema) in &self.schemas {
            for obj_type in &schema.object_types {
                if !self.storage_ids.contains_key(&obj_type.schema_id()) {
                    return Err(GraphError::InconsistentDatabase(format!(
                        "schema {schema_index}: object type '{}' has no assigned storage id",
                        obj_type.name
                    )));
                }
                for field in &obj_type.fields {
                    if !self.storage_ids.contains_key(&field.schema_id(&obj_type.name)) {
                        return Err(GraphError::InconsistentDatabase(format!(
                            "schema {schema_index}: field '{}.{}' has no assigned storage id",
                            obj_type.name, field.name
                        )));
                    }
                }
                for index in &obj_type.composite_indexes {
                    if !self.storage_ids.contains_key(&index.schema_id(&obj_type.name)) {
                        return Err(GraphError::InconsistentDatabase(format!(
                            "schema {schema_index}: composite index '{}.{}' has no assigned storage id",
                            obj_type.name, index.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Encodes this bundle's Schema Table entries for persistence.
    ///
    /// # Panics
    ///
    /// Panics if a registered `Schema` cannot be serialized, which would
    /// indicate a bug rather than bad caller input.
    #[must_use]
    pub fn encode_schema_table(&self) -> Vec<(u64, Vec<u8>)> {
        self.schemas
            .iter()
            .map(|(idx, schema)| (*idx, serde_json::to_vec(schema).expect("schema must serialize")))
            .collect()
    }

    /// Encodes this bundle's Storage-ID Table entries for persistence.
    #[must_use]
    pub fn encode_storage_id_table(&self) -> Vec<(u64, Vec<u8>)> {
        self.items_by_storage_id
            .iter()
            .map(|(id, item_id)| (*id, item_id.clone().into_bytes()))
            .collect()
    }

    /// Looks up a registered schema by its schema index.
    #[must_use]
    pub fn schema(&self, schema_index: u64) -> Option<&Schema> {
        self.schemas.get(&schema_index)
    }

    /// Finds the schema index of a schema with the given content
    /// `SchemaId`, if registered.
    #[must_use]
    pub fn schema_index_of(&self, schema_id: &str) -> Option<u64> {
        self.schemas.iter().find(|(_, s)| s.schema_id() == schema_id).map(|(idx, _)| *idx)
    }

    /// Returns the assigned storage id for a schema item, by its content
    /// `SchemaId`.
    #[must_use]
    pub fn storage_id_of(&self, item_schema_id: &str) -> Option<u64> {
        self.storage_ids.get(item_schema_id).copied()
    }

    /// Returns the storage id assigned to `obj_type`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentDatabase`] if the type has no
    /// assigned storage id, which should never happen for a type reached
    /// through a decoded, validated bundle.
    pub fn type_storage_id(&self, obj_type: &ObjType) -> GraphResult<u64> {
        self.storage_id_of(&obj_type.schema_id()).ok_or_else(|| {
            GraphError::InconsistentDatabase(format!("object type '{}' has no storage id", obj_type.name))
        })
    }

    /// Returns the storage id assigned to `field`, owned by
    /// `owner_type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentDatabase`] if the field has no
    /// assigned storage id.
    pub fn field_storage_id(&self, owner_type_name: &str, field: &Field) -> GraphResult<u64> {
        self.storage_id_of(&field.schema_id(owner_type_name)).ok_or_else(|| {
            GraphError::InconsistentDatabase(format!(
                "field '{owner_type_name}.{}' has no storage id",
                field.name
            ))
        })
    }

    /// Returns the storage id assigned to `index`, owned by
    /// `owner_type_name`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentDatabase`] if the index has no
    /// assigned storage id.
    pub fn composite_index_storage_id(
        &self,
        owner_type_name: &str,
        index: &CompositeIndex,
    ) -> GraphResult<u64> {
        self.storage_id_of(&index.schema_id(owner_type_name)).ok_or_else(|| {
            GraphError::InconsistentDatabase(format!(
                "composite index '{owner_type_name}.{}' has no storage id",
                index.name
            ))
        })
    }

    fn next_free_schema_index(&self) -> u64 {
        let mut candidate = 1u64;
        while self.schemas.contains_key(&candidate) {
            candidate += 1;
        }
        candidate
    }

    fn next_free_storage_id(&self, taken_this_pass: &BTreeSet<u64>) -> u64 {
        let mut candidate = 1u64;
        loop {
            if !self.items_by_storage_id.contains_key(&candidate) && !taken_this_pass.contains(&candidate) {
                return candidate;
            }
            candidate += 1;
        }
    }

    /// Adds `schema_model` to the bundle, assigning storage IDs to every
    /// item it declares.
    ///
    /// Storage-ID assignment order: an item's explicit
    /// `requested_storage_id` wins if present and not already taken by a
    /// different item; otherwise an existing storage id is reused if an
    /// item with the same content `SchemaId` is already registered;
    /// otherwise the lowest free positive integer is assigned.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidSchema`] if `schema_model` fails
    /// validation, or [`GraphError::SchemaMismatch`] on an explicit
    /// schema-index or storage-id collision, or if an equivalent schema
    /// is already registered.
    pub fn with_schema_added(
        &self,
        explicit_schema_index: Option<u64>,
        schema_model: Schema,
    ) -> GraphResult<(Self, u64)> {
        validate_schema(&schema_model)?;

        let new_schema_id = schema_model.schema_id();
        if self.schemas.values().any(|s| s.schema_id() == new_schema_id) {
            return Err(GraphError::SchemaMismatch("an equivalent schema is already registered".to_string()));
        }

        let schema_index = match explicit_schema_index {
            Some(idx) => {
                if self.schemas.contains_key(&idx) {
                    return Err(GraphError::SchemaMismatch(format!(
                        "explicit schema index {idx} is already in use"
                    )));
                }
                idx
            }
            None => self.next_free_schema_index(),
        };

        let mut storage_ids = self.storage_ids.clone();
        let mut items_by_storage_id = self.items_by_storage_id.clone();
        let mut taken_this_pass = BTreeSet::new();

        let mut assign = |item_schema_id: String, requested: Option<u64>| -> GraphResult<()> {
            if let Some(existing) = storage_ids.get(&item_schema_id) {
                taken_this_pass.insert(*existing);
                return Ok(());
            }
            let storage_id = match requested {
                Some(rid) => {
                    if let Some(existing_item) = items_by_storage_id.get(&rid) {
                        if existing_item != &item_schema_id {
                            return Err(GraphError::SchemaMismatch(format!(
                                "explicit storage id {rid} is already assigned to a different schema item"
                            )));
                        }
                    }
                    rid
                }
                None => self.next_free_storage_id(&taken_this_pass),
            };
            taken_this_pass.insert(storage_id);
            storage_ids.insert(item_schema_id.clone(), storage_id);
            items_by_storage_id.insert(storage_id, item_schema_id);
            Ok(())
        };

        for obj_type in &schema_model.object_types {
            assign(obj_type.schema_id(), obj_type.requested_storage_id)?;
            for field in &obj_type.fields {
                assign(field.schema_id(&obj_type.name), field.requested_storage_id)?;
            }
            for index in &obj_type.composite_indexes {
                assign(index.schema_id(&obj_type.name), index.requested_storage_id)?;
            }
        }

        let mut schemas = self.schemas.clone();
        schemas.insert(schema_index, schema_model);

        Ok((Self { schemas, storage_ids, items_by_storage_id }, schema_index))
    }

    /// Removes the schema with content `SchemaId` equal to `schema_id`,
    /// garbage-collecting any storage id no longer referenced by a
    /// remaining schema item.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidSchema`] if no registered schema has
    /// that `SchemaId`.
    pub fn with_schema_removed(&self, schema_id: &str) -> GraphResult<Self> {
        let schema_index = self
            .schema_index_of(schema_id)
            .ok_or_else(|| GraphError::InvalidSchema(format!("no registered schema with id '{schema_id}'")))?;

        let mut schemas = self.schemas.clone();
        schemas.remove(&schema_index);

        let mut still_referenced: BTreeSet<String> = BTreeSet::new();
        for schema in schemas.values() {
            for obj_type in &schema.object_types {
                still_referenced.insert(obj_type.schema_id());
                for field in &obj_type.fields {
                    still_referenced.insert(field.schema_id(&obj_type.name));
                }
                for index in &obj_type.composite_indexes {
                    still_referenced.insert(index.schema_id(&obj_type.name));
                }
            }
        }

        let mut storage_ids = HashMap::new();
        let mut items_by_storage_id = HashMap::new();
        for (item_id, storage_id) in &self.storage_ids {
            if still_referenced.contains(item_id) {
                storage_ids.insert(item_id.clone(), *storage_id);
                items_by_storage_id.insert(*storage_id, item_id.clone());
            }
        }

        Ok(Self { schemas, storage_ids, items_by_storage_id })
    }

    /// Returns the schema indexes currently referencing `schema_id`'s
    /// object type storage id (empty if none do) — used by schema GC
    /// (`schema_removal`) to avoid evicting a schema still in use
    /// via the schema index.
    #[must_use]
    pub fn registered_schema_indexes(&self) -> Vec<u64> {
        self.schemas.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::model::{Field, FieldKind, SimpleKind};

    fn person_schema() -> Schema {
        Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![Field {
                    name: "name".to_string(),
                    kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: true },
                    requested_storage_id: None,
                }],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        }
    }

    #[test]
    fn add_then_encode_decode_round_trips() {
        let bundle = SchemaBundle::empty();
        let (bundle, idx) = bundle.with_schema_added(None, person_schema()).unwrap();
        assert_eq!(idx, 1);

        let schema_entries = bundle.encode_schema_table();
        let storage_entries = bundle.encode_storage_id_table();
        let decoded = SchemaBundle::decode(&schema_entries, &storage_entries).unwrap();

        let person = decoded.schema(1).unwrap().object_type("Person").unwrap();
        assert!(decoded.type_storage_id(person).is_ok());
    }

    #[test]
    fn adding_duplicate_schema_fails() {
        let bundle = SchemaBundle::empty();
        let (bundle, _) = bundle.with_schema_added(None, person_schema()).unwrap();
        assert!(bundle.with_schema_added(None, person_schema()).is_err());
    }

    #[test]
    fn removing_schema_gcs_unreferenced_storage_ids() {
        let bundle = SchemaBundle::empty();
        let (bundle, _) = bundle.with_schema_added(None, person_schema()).unwrap();
        let schema_id = bundle.schema(1).unwrap().schema_id();
        let removed = bundle.with_schema_removed(&schema_id).unwrap();
        assert!(removed.schema(1).is_none());
        assert!(removed.encode_storage_id_table().is_empty());
    }

    #[test]
    fn same_named_field_across_schemas_shares_storage_id_when_schema_ids_match() {
        let bundle = SchemaBundle::empty();
        let (bundle, _) = bundle.with_schema_added(None, person_schema()).unwrap();
        let mut second = person_schema();
        second.object_types[0].fields.push(Field {
            name: "age".to_string(),
            kind: FieldKind::Simple { encoding: SimpleKind::U64, indexed: false },
            requested_storage_id: None,
        });
        let (bundle, _) = bundle.with_schema_added(None, second).unwrap();
        let name_field = &bundle.schema(1).unwrap().object_type("Person").unwrap().fields[0];
        let name_field_2 = &bundle.schema(2).unwrap().object_type("Person").unwrap().fields[0];
        assert_eq!(
            bundle.field_storage_id("Person", name_field).unwrap(),
            bundle.field_storage_id("Person", name_field_2).unwrap()
        );
    }
}
