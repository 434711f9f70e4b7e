//! Schema item types: fields as a tagged variant.

use serde::{Deserialize, Serialize};

/// The policy a reference field follows when its referent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteAction {
    /// Abort the delete with `ReferencedObject`.
    Exception,
    /// Null out the referring field (or sub-field occurrence).
    Nullify,
    /// Remove the containing collection element / map entry / list slot.
    Remove,
    /// Transitively mark the referring object for deletion.
    Delete,
    /// Leave the dangling reference as-is.
    Ignore,
}

/// A primitive, encodable value kind usable as a simple field, or as the
/// element/key/value of a complex field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimpleKind {
    /// `bool`.
    Bool,
    /// `u64`.
    U64,
    /// `i64`.
    I64,
    /// `String`.
    String,
    /// `Vec<u8>`.
    Bytes,
}

/// Reference-field policy bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferencePolicy {
    /// Object type names this reference may target; empty means any.
    pub allowed_types: Vec<String>,
    /// Action taken on this field when the referent is deleted.
    pub on_delete: DeleteAction,
    /// Whether deleting the holder also deletes the referent.
    pub forward_delete: bool,
    /// Whether assigning a reference to a non-existent object is allowed.
    pub allow_deleted: bool,
}

impl Default for ReferencePolicy {
    fn default() -> Self {
        Self {
            allowed_types: Vec::new(),
            on_delete: DeleteAction::Exception,
            forward_delete: false,
            allow_deleted: false,
        }
    }
}

/// The kind of a declared field, dispatched in one tagged-variant match
/// site rather than via a visitor hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// A scalar value with no referential-integrity semantics.
    Simple {
        /// The value's primitive encoding.
        encoding: SimpleKind,
        /// Whether this field has a simple index.
        indexed: bool,
    },
    /// A reference to another object.
    Reference {
        /// Delete/assignment policy.
        policy: ReferencePolicy,
        /// Whether this field has a simple index.
        indexed: bool,
    },
    /// A 64-bit value mutated only via atomic adjust.
    Counter,
    /// An ordered set of unique simple or reference elements.
    Set {
        /// The element kind.
        element: Box<FieldKind>,
        /// Whether the element sub-field is indexed.
        indexed: bool,
    },
    /// An indexed sequence of simple or reference elements.
    List {
        /// The element kind.
        element: Box<FieldKind>,
        /// Whether the element sub-field is indexed.
        indexed: bool,
    },
    /// An ordered key-to-value mapping.
    Map {
        /// The key kind.
        key: Box<FieldKind>,
        /// The value kind.
        value: Box<FieldKind>,
        /// Whether the key sub-field is indexed.
        key_indexed: bool,
        /// Whether the value sub-field is indexed.
        value_indexed: bool,
    },
}

/// A single declared field of an [`ObjType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// The field's name, unique within its object type.
    pub name: String,
    /// The field's kind.
    pub kind: FieldKind,
    /// An explicit storage ID requested by the caller, or `None` to let
    /// the bundle assign one.
    pub requested_storage_id: Option<u64>,
}

impl Field {
    /// Builds the content-derived `SchemaId` of this field, scoped by its
    /// owning type's name so identically-named fields of different types
    /// never collide.
    #[must_use]
    pub fn schema_id(&self, owner_type: &str) -> String {
        super::content_schema_id(&(owner_type, &self.name, &self.kind))
    }
}

/// A composite index over 2..=4 simple fields of one object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeIndex {
    /// The index's name, unique within its object type.
    pub name: String,
    /// The 2 to 4 field names it covers, in key order.
    pub field_names: Vec<String>,
    /// An explicit storage ID requested by the caller, or `None`.
    pub requested_storage_id: Option<u64>,
}

impl CompositeIndex {
    /// Builds the content-derived `SchemaId` of this composite index.
    #[must_use]
    pub fn schema_id(&self, owner_type: &str) -> String {
        super::content_schema_id(&(owner_type, &self.name, &self.field_names))
    }
}

/// A declared object type: its fields and composite indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjType {
    /// The type's name, unique within its schema.
    pub name: String,
    /// The type's declared fields.
    pub fields: Vec<Field>,
    /// The type's declared composite indexes.
    pub composite_indexes: Vec<CompositeIndex>,
    /// An explicit storage ID requested by the caller, or `None`.
    pub requested_storage_id: Option<u64>,
}

impl ObjType {
    /// Builds the content-derived `SchemaId` of this object type.
    #[must_use]
    pub fn schema_id(&self) -> String {
        super::content_schema_id(&(&self.name, &self.fields, &self.composite_indexes))
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a declared composite index by name.
    #[must_use]
    pub fn composite_index(&self, name: &str) -> Option<&CompositeIndex> {
        self.composite_indexes.iter().find(|c| c.name == name)
    }
}

/// An immutable, validated schema: a set of object types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// The schema's declared object types.
    pub object_types: Vec<ObjType>,
}

impl Schema {
    /// Builds the content-derived `SchemaId` of the whole schema.
    #[must_use]
    pub fn schema_id(&self) -> String {
        super::content_schema_id(&self.object_types)
    }

    /// Looks up a declared object type by name.
    #[must_use]
    pub fn object_type(&self, name: &str) -> Option<&ObjType> {
        self.object_types.iter().find(|t| t.name == name)
    }
}
