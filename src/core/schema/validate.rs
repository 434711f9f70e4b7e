//! Schema model validation.

use crate::core::error::{GraphError, GraphResult};
use crate::core::schema::model::{FieldKind, Schema};

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validates a set/list element kind or a map key/value kind: only a
/// simple or reference kind may nest inside a complex field, and a
/// nested reference must itself be indexed (the complex field's own
/// `indexed`/`key_indexed`/`value_indexed` flag governs whether its
/// per-element index exists).
fn validate_complex_element(owner_type: &str, field_name: &str, element: &FieldKind, indexed: bool) -> GraphResult<()> {
    match element {
        FieldKind::Simple { .. } => Ok(()),
        FieldKind::Reference { .. } if indexed => Ok(()),
        FieldKind::Reference { .. } => Err(GraphError::InvalidSchema(format!(
            "field '{owner_type}.{field_name}' holds reference sub-fields and must be indexed"
        ))),
        _ => Err(GraphError::InvalidSchema(format!(
            "field '{owner_type}.{field_name}' has a non-simple, non-reference sub-field"
        ))),
    }
}

/// Validates that `schema` is well-formed: unique names, valid
/// identifiers, composite indexes of width 2..=4 over known simple
/// fields, and reference allow-lists naming known types.
///
/// # Errors
///
/// Returns [`GraphError::InvalidSchema`] describing the first violation
/// found.
pub fn validate_schema(schema: &Schema) -> GraphResult<()> {
    let mut seen_types = std::collections::HashSet::new();
    for obj_type in &schema.object_types {
        if !is_valid_identifier(&obj_type.name) {
            return Err(GraphError::InvalidSchema(format!(
                "object type name '{}' is not a valid identifier",
                obj_type.name
            )));
        }
        if !seen_types.insert(obj_type.name.as_str()) {
            return Err(GraphError::InvalidSchema(format!(
                "duplicate object type name '{}'",
                obj_type.name
            )));
        }

        let mut seen_fields = std::collections::HashSet::new();
        for field in &obj_type.fields {
            if !is_valid_identifier(&field.name) {
                return Err(GraphError::InvalidSchema(format!(
                    "field name '{}.{}' is not a valid identifier",
                    obj_type.name, field.name
                )));
            }
            if !seen_fields.insert(field.name.as_str()) {
                return Err(GraphError::InvalidSchema(format!(
                    "duplicate field name '{}.{}'",
                    obj_type.name, field.name
                )));
            }
            match &field.kind {
                FieldKind::Reference { policy, indexed } => {
                    if !indexed {
                        return Err(GraphError::InvalidSchema(format!(
                            "field '{}.{}' is a reference field and must be indexed",
                            obj_type.name, field.name
                        )));
                    }
                    for allowed in &policy.allowed_types {
                        if schema.object_type(allowed).is_none() {
                            return Err(GraphError::InvalidSchema(format!(
                                "field '{}.{}' allows unknown target type '{allowed}'",
                                obj_type.name, field.name
                            )));
                        }
                    }
                }
                FieldKind::Set { element, indexed } | FieldKind::List { element, indexed } => {
                    validate_complex_element(&obj_type.name, &field.name, element, *indexed)?;
                }
                FieldKind::Map { key, value, key_indexed, value_indexed } => {
                    validate_complex_element(&obj_type.name, &field.name, key, *key_indexed)?;
                    validate_complex_element(&obj_type.name, &field.name, value, *value_indexed)?;
                }
                FieldKind::Simple { .. } | FieldKind::Counter => {}
            }
        }

        let mut seen_indexes = std::collections::HashSet::new();
        for index in &obj_type.composite_indexes {
            if !is_valid_identifier(&index.name) {
                return Err(GraphError::InvalidSchema(format!(
                    "composite index name '{}.{}' is not a valid identifier",
                    obj_type.name, index.name
                )));
            }
            if !seen_indexes.insert(index.name.as_str()) {
                return Err(GraphError::InvalidSchema(format!(
                    "duplicate composite index name '{}.{}'",
                    obj_type.name, index.name
                )));
            }
            if index.field_names.len() < 2 || index.field_names.len() > 4 {
                return Err(GraphError::InvalidSchema(format!(
                    "composite index '{}.{}' must cover 2 to 4 fields, got {}",
                    obj_type.name,
                    index.name,
                    index.field_names.len()
                )));
            }
            for field_name in &index.field_names {
                match obj_type.field(field_name) {
                    Some(field) if matches!(field.kind, FieldKind::Simple { .. }) => {}
                    Some(_) => {
                        return Err(GraphError::InvalidSchema(format!(
                            "composite index '{}.{}' covers non-simple field '{field_name}'",
                            obj_type.name, index.name
                        )))
                    }
                    None => {
                        return Err(GraphError::InvalidSchema(format!(
                            "composite index '{}.{}' covers unknown field '{field_name}'",
                            obj_type.name, index.name
                        )))
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::model::{Field, ObjType, SimpleKind};

    fn simple_field(name: &str) -> Field {
        Field {
            name: name.to_string(),
            kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false },
            requested_storage_id: None,
        }
    }

    #[test]
    fn rejects_non_indexed_reference_field() {
        use crate::core::schema::model::ReferencePolicy;
        let schema = Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![Field {
                    name: "friend".to_string(),
                    kind: FieldKind::Reference { policy: ReferencePolicy::default(), indexed: false },
                    requested_storage_id: None,
                }],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        };
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn rejects_set_of_sets() {
        let schema = Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![Field {
                    name: "nicknames".to_string(),
                    kind: FieldKind::Set {
                        element: Box::new(FieldKind::Set {
                            element: Box::new(FieldKind::Simple { encoding: SimpleKind::String, indexed: false }),
                            indexed: false,
                        }),
                        indexed: false,
                    },
                    requested_storage_id: None,
                }],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        };
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn accepts_indexed_set_of_simple_elements() {
        let schema = Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![Field {
                    name: "nicknames".to_string(),
                    kind: FieldKind::Set {
                        element: Box::new(FieldKind::Simple { encoding: SimpleKind::String, indexed: false }),
                        indexed: true,
                    },
                    requested_storage_id: None,
                }],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        };
        assert!(validate_schema(&schema).is_ok());
    }

    #[test]
    fn rejects_invalid_identifier() {
        let schema = Schema {
            object_types: vec![ObjType {
                name: "1Bad".to_string(),
                fields: vec![],
                composite_indexes: vec![],
                requested_storage_id: None,
            }],
        };
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn rejects_narrow_composite_index() {
        use crate::core::schema::model::CompositeIndex;
        let schema = Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![simple_field("name")],
                composite_indexes: vec![CompositeIndex {
                    name: "by_name".to_string(),
                    field_names: vec!["name".to_string()],
                    requested_storage_id: None,
                }],
                requested_storage_id: None,
            }],
        };
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn accepts_well_formed_schema() {
        let schema = Schema {
            object_types: vec![ObjType {
                name: "Person".to_string(),
                fields: vec![simple_field("name"), simple_field("nick")],
                composite_indexes: vec![crate::core::schema::model::CompositeIndex {
                    name: "by_name_nick".to_string(),
                    field_names: vec!["name".to_string(), "nick".to_string()],
                    requested_storage_id: None,
                }],
                requested_storage_id: None,
            }],
        };
        assert!(validate_schema(&schema).is_ok());
    }
}
