//! Error taxonomy for the object-graph engine.
//!
//! A single hand-rolled enum with manual `Display`/`Error` impls: no
//! `thiserror`, just explicit matches.

use std::fmt;
use std::io;

/// Errors raised by the storage engine.
#[derive(Debug)]
pub enum GraphError {
    /// On-disk meta-data violates an invariant the engine relies on.
    InconsistentDatabase(String),
    /// A caller-supplied schema failed validation.
    InvalidSchema(String),
    /// A storage-ID or schema-index conflict the caller must resolve.
    SchemaMismatch(String),
    /// Referenced object type name is not known to the schema in use.
    UnknownType(String),
    /// Referenced field name is not known on the resolved object type.
    UnknownField(String),
    /// Referenced index name or storage id is not known to the schema.
    UnknownIndex(String),
    /// The migration target schema does not declare the object's type.
    TypeNotInSchema(String),
    /// Access to, or a forbidden assignment of, a deleted object.
    DeletedObject(String),
    /// A delete was refused by a reference field with `on_delete = EXCEPTION`.
    ReferencedObject {
        /// The object that refused the delete of its referent.
        referrer: String,
        /// The reference field that refused the delete.
        field: String,
    },
    /// The transaction has already committed or rolled back.
    StaleTransaction,
    /// `commit` was called after the transaction was marked rollback-only.
    RollbackOnlyTransaction,
    /// A reference's target type is not in the field's allow-list.
    InvalidReference(String),
    /// A null or otherwise invalid argument was passed to a public method.
    IllegalArgument(String),
    /// The object does not exist.
    NoSuchObject(String),
    /// The object already exists.
    ObjectAlreadyExists(String),
    /// I/O failure surfaced from the KV backend.
    Io(String),
    /// Failure encoding/decoding a schema or value.
    Encoding(String),
    /// A lock protecting shared engine state was poisoned.
    LockPoisoned(String),
    /// Catch-all for conditions that don't fit another variant.
    Other(String),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InconsistentDatabase(msg) => write!(f, "inconsistent database: {msg}"),
            Self::InvalidSchema(msg) => write!(f, "invalid schema: {msg}"),
            Self::SchemaMismatch(msg) => write!(f, "schema mismatch: {msg}"),
            Self::UnknownType(name) => write!(f, "unknown object type: {name}"),
            Self::UnknownField(name) => write!(f, "unknown field: {name}"),
            Self::UnknownIndex(name) => write!(f, "unknown index: {name}"),
            Self::TypeNotInSchema(name) => write!(f, "type not in target schema: {name}"),
            Self::DeletedObject(id) => write!(f, "object does not exist: {id}"),
            Self::ReferencedObject { referrer, field } => {
                write!(f, "delete refused: {referrer}.{field} still references the target")
            }
            Self::StaleTransaction => write!(f, "transaction already committed or rolled back"),
            Self::RollbackOnlyTransaction => {
                write!(f, "commit attempted on a rollback-only transaction")
            }
            Self::InvalidReference(msg) => write!(f, "invalid reference: {msg}"),
            Self::IllegalArgument(msg) => write!(f, "illegal argument: {msg}"),
            Self::NoSuchObject(id) => write!(f, "no such object: {id}"),
            Self::ObjectAlreadyExists(id) => write!(f, "object already exists: {id}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Encoding(msg) => write!(f, "encoding error: {msg}"),
            Self::LockPoisoned(msg) => write!(f, "lock poisoned: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GraphError {}

impl From<io::Error> for GraphError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(
            GraphError::UnknownField("friend".into()).to_string(),
            "unknown field: friend"
        );
        assert_eq!(
            GraphError::ReferencedObject { referrer: "p2".into(), field: "Person.friend".into() }
                .to_string(),
            "delete refused: p2.Person.friend still references the target"
        );
    }

    #[test]
    fn io_error_converts() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: GraphError = io_err.into();
        assert!(matches!(err, GraphError::Io(_)));
    }
}
