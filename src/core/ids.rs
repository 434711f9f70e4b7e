//! Object identity.
//!
//! Kept in its own leaf module so the codec, key layout, schema, and
//! object-plane modules can all depend on the identifier type without
//! forming a cycle.

use crate::core::common::hex;
use crate::core::error::{GraphError, GraphResult};
use std::fmt;

/// An 8-byte object identity.
///
/// Bytes `0..k` are the storage-ID of the owning object type (variable
/// length); bytes `k..8` are random. The numeric ordering of the full 8
/// bytes is the sort order used everywhere the engine compares object
/// identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjId([u8; 8]);

impl ObjId {
    /// Wraps a raw 8-byte array as an `ObjId` without validating its
    /// storage-id prefix.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 8 bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Parses an `ObjId` from an 8-byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::IllegalArgument`] if `bytes` is not exactly
    /// 8 bytes long.
    pub fn from_slice(bytes: &[u8]) -> GraphResult<Self> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| GraphError::IllegalArgument("ObjId must be 8 bytes".to_string()))?;
        Ok(Self(arr))
    }

    /// Renders the identity as a lowercase hex string, for error messages
    /// and the CLI.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
