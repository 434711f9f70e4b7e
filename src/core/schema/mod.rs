//! Schema bundle: decodes/maintains the Schema Table and Storage-ID
//! Table, assigns storage IDs, and answers lookups.

pub mod bundle;
pub mod model;
pub mod validate;

pub use bundle::SchemaBundle;
pub use model::{CompositeIndex, DeleteAction, Field, FieldKind, ObjType, Schema, SimpleKind};

use serde::Serialize;

/// Computes a content-derived `SchemaId` for any canonically-serializable
/// value.
///
/// Uses FNV-1a over the value's canonical JSON form rather than a
/// cryptographic hash, to avoid an extra dependency for it.
/// `SchemaId`s only need to be stable and collision-resistant enough to
/// distinguish schema items within one database, not cryptographically
/// secure.
///
/// # Panics
///
/// Panics if `value` cannot be serialized to JSON, which would indicate
/// a bug in the caller rather than bad input data.
#[must_use]
pub fn content_schema_id<T: Serialize>(value: &T) -> String {
    let canonical = serde_json::to_vec(value).expect("schema item must be JSON-serializable");
    format!("{:016x}", fnv1a(&canonical))
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
