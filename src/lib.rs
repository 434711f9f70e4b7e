#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::complexity,
    clippy::correctness,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    deprecated,
    unused,
    clippy::todo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::unreachable,
    clippy::missing_safety_doc,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::missing_docs
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_const_for_fn,
    clippy::option_if_let_else,
    clippy::cognitive_complexity,
    clippy::too_many_lines,
    clippy::similar_names,
    clippy::struct_excessive_bools,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp,
    clippy::doc_markdown,
    clippy::wildcard_imports,
    clippy::struct_field_names,
    clippy::module_inception,
    clippy::missing_fields_in_debug,
    clippy::use_self,
    clippy::return_self_not_must_use,
    clippy::bool_to_int_with_if,
    clippy::partial_pub_fields,
    clippy::multiple_crate_versions,
    clippy::single_match_else,
    clippy::implicit_hasher,
    clippy::linkedlist,
    clippy::default_trait_access,
    clippy::missing_transmute_annotations,
    clippy::multiple_inherent_impl,
    clippy::get_unwrap,
    clippy::impl_trait_in_params,
    clippy::future_not_send,
    clippy::type_complexity,
    clippy::result_large_err,
    clippy::large_stack_frames,
    clippy::significant_drop_in_scrutinee,
    clippy::significant_drop_tightening,
    clippy::items_after_statements,
    clippy::match_wildcard_for_single_variants,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::unused_async,
    clippy::unnecessary_wraps,
    clippy::trivially_copy_pass_by_ref,
    clippy::match_same_arms,
    clippy::explicit_deref_methods,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::from_iter_instead_of_collect,
    clippy::if_not_else,
    clippy::equatable_if_let,
    clippy::or_fun_call,
    clippy::iter_without_into_iter,
    clippy::infinite_loop,
    clippy::ref_as_ptr,
    clippy::ref_option_ref,
    clippy::option_option,
    clippy::match_bool,
    clippy::let_underscore_untyped,
    clippy::empty_enum_variants_with_brackets,
    clippy::pattern_type_mismatch,
    clippy::ignored_unit_patterns,
    clippy::redundant_pub_crate,
    clippy::allow_attributes,
    clippy::no_effect_underscore_binding,
    clippy::used_underscore_binding,
    clippy::tests_outside_test_module
)]

//! # permagraph - an embedded object-graph database engine
//!
//! permagraph layers a typed object-graph model on top of an
//! ordered key/value store: schemas are content-addressed, fields are
//! declared as simple, reference, counter, set, list, or map, and
//! objects migrate to their schema's current shape lazily, on first
//! access, rather than through an up-front migration pass.
//!
//! ## Features
//!
//! - **Content-addressed schemas**: every `Schema`, `ObjType`, `Field`,
//!   and `CompositeIndex` gets a `SchemaId` derived from its own
//!   content, so two transactions that declare the same shape always
//!   agree on its identity.
//! - **Dense shared storage-ID namespace**: object types, fields, and
//!   composite indexes share one storage-ID space per database, so a
//!   storage id alone is enough to resolve what declared it.
//! - **Simple and composite indexes**: both are maintained
//!   transactionally alongside the field writes they track.
//! - **Lazy schema migration**: an object's fields reset, preserve, or
//!   newly default based on a comparison between its stored schema and
//!   the transaction's schema, the moment it's next accessed.
//! - **Cascading deletes**: reference fields declare what happens to
//!   their declaring object when their target is deleted — raise,
//!   nullify, clear, cascade, or ignore.
//! - **Change notifications**: field-change, object-delete, and
//!   schema-change listeners, delivered in dependency order and
//!   buffered across re-entrant field writes.
//!
//! ## Quick start
//!
//! ```no_run
//! use permagraph::core::config::{DatabaseConfig, TransactionOptions};
//! use permagraph::core::database::Database;
//! use permagraph::core::schema::model::{Field, FieldKind, ObjType, Schema, SimpleKind};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema {
//!     object_types: vec![ObjType {
//!         name: "Person".to_string(),
//!         fields: vec![Field {
//!             name: "name".to_string(),
//!             kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false },
//!             requested_storage_id: None,
//!         }],
//!         composite_indexes: vec![],
//!         requested_storage_id: None,
//!     }],
//! };
//!
//! let mut db = Database::open(DatabaseConfig::default())?;
//! let options = TransactionOptions { schema_model: Some(schema), allow_new_schema: true, ..Default::default() };
//! let mut tx = db.begin(options)?;
//! let id = tx.create("Person")?;
//! tx.write_simple_field(id, "name", serde_json::json!("Alice"), false)?;
//! tx.commit()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The engine is organized around the same components the design
//! document names:
//!
//! - [`core::codec`]: order-preserving byte encodings for every field kind.
//! - [`core::keys`]: the shared key-layout scheme across object data,
//!   indexes, and schema meta-data.
//! - [`core::kv`]: the `OrderedKv` storage trait and its in-memory
//!   implementation.
//! - [`core::schema`]: the schema model, content-derived `SchemaId`s, and
//!   the storage-ID-assigning schema bundle.
//! - [`core::object`]: `ObjId` minting and the bounded object-info cache.
//! - [`core::index`]: simple and composite index maintenance.
//! - [`core::notify`]: listener registries, the re-entrant notification
//!   queue, and reference-path resolution.
//! - [`core::transaction`]: the transactional engine tying the above
//!   together.
//! - [`core::migration`]: on-access schema migration.
//! - [`core::delete`]: cascading delete.
//! - [`core::database`]: the top-level database handle.

pub mod core;

pub use crate::core::config::DatabaseConfig;
pub use crate::core::database::Database;
pub use crate::core::error::{GraphError, GraphResult};
