//! Reference-field encoding.
//!
//! Writes an [`ObjId`] as its raw 8 bytes, or the single sentinel byte
//! `0xFF` for a null reference. `0xFF` can never be a valid first byte
//! of an `ObjId`'s encoding here because object storage IDs are kept
//! well below the varint range that would produce it as a leading byte
//! in practice for any schema validation accepts; reference fields are
//! the one place a direct sentinel trick is used instead of routing
//! through [`super::NullSafeEncoding`].

use crate::core::codec::Encoding;
use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use std::cmp::Ordering;

const NULL_SENTINEL: u8 = 0xFF;

/// Encodes `Option<ObjId>`, optionally validating the referenced
/// object's storage id against an allow-list of target object types.
pub struct ReferenceEncoding {
    /// Storage IDs of object types this reference is allowed to target;
    /// empty means any type is allowed.
    pub allowed_storage_ids: Vec<u64>,
}

impl ReferenceEncoding {
    /// Builds a reference encoding with no target-type restriction.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self { allowed_storage_ids: Vec::new() }
    }

    /// Builds a reference encoding restricted to the given target
    /// object-type storage IDs.
    #[must_use]
    pub fn restricted(allowed_storage_ids: Vec<u64>) -> Self {
        Self { allowed_storage_ids }
    }

    /// Returns whether `target_type_storage_id` is an allowed target.
    #[must_use]
    pub fn allows(&self, target_type_storage_id: u64) -> bool {
        self.allowed_storage_ids.is_empty()
            || self.allowed_storage_ids.contains(&target_type_storage_id)
    }

    /// Validates and encodes a reference to `target`, whose owning
    /// object type has storage id `target_type_storage_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::error::GraphError::InvalidReference`] if
    /// the target type is not in the allow-list.
    pub fn write_checked(
        &self,
        target: Option<(ObjId, u64)>,
        out: &mut Vec<u8>,
    ) -> GraphResult<()> {
        match target {
            None => {
                out.push(NULL_SENTINEL);
                Ok(())
            }
            Some((id, type_storage_id)) => {
                if !self.allows(type_storage_id) {
                    return Err(GraphError::InvalidReference(format!(
                        "target object type (storage id {type_storage_id}) is not allowed by this reference field"
                    )));
                }
                out.extend_from_slice(id.as_bytes());
                Ok(())
            }
        }
    }
}

impl Encoding<Option<ObjId>> for ReferenceEncoding {
    fn write(&self, value: &Option<ObjId>, out: &mut Vec<u8>) {
        match value {
            None => out.push(NULL_SENTINEL),
            Some(id) => out.extend_from_slice(id.as_bytes()),
        }
    }

    fn read(&self, bytes: &[u8]) -> GraphResult<Option<ObjId>> {
        match bytes.first() {
            Some(&NULL_SENTINEL) => Ok(None),
            Some(_) => Ok(Some(ObjId::from_slice(
                bytes
                    .get(..8)
                    .ok_or_else(|| GraphError::Encoding("truncated reference encoding".to_string()))?,
            )?)),
            None => Err(GraphError::Encoding("empty reference encoding".to_string())),
        }
    }

    fn skip(&self, bytes: &[u8]) -> GraphResult<usize> {
        match bytes.first() {
            Some(&NULL_SENTINEL) => Ok(1),
            Some(_) if bytes.len() >= 8 => Ok(8),
            _ => Err(GraphError::Encoding("truncated reference encoding".to_string())),
        }
    }

    fn compare(&self, a: &Option<ObjId>, b: &Option<ObjId>) -> Ordering {
        self.encode(a).cmp(&self.encode(b))
    }

    fn default_value(&self) -> Option<ObjId> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reference_round_trips() {
        let enc = ReferenceEncoding::unrestricted();
        let bytes = enc.encode(&None);
        assert_eq!(bytes, vec![NULL_SENTINEL]);
        assert_eq!(enc.read(&bytes).unwrap(), None);
    }

    #[test]
    fn present_reference_round_trips() {
        let enc = ReferenceEncoding::unrestricted();
        let id = ObjId::from_bytes([1, 2, 3, 4, 5, 6, 7, 8]);
        let bytes = enc.encode(&Some(id));
        assert_eq!(enc.read(&bytes).unwrap(), Some(id));
    }

    #[test]
    fn restricted_allow_list_rejects_disallowed_type() {
        let enc = ReferenceEncoding::restricted(vec![3]);
        let id = ObjId::from_bytes([5, 0, 0, 0, 0, 0, 0, 1]);
        assert!(enc.write_checked(Some((id, 5)), &mut Vec::new()).is_err());
        assert!(enc.write_checked(Some((id, 3)), &mut Vec::new()).is_ok());
    }

    #[test]
    fn null_sorts_after_any_present_reference() {
        let enc = ReferenceEncoding::unrestricted();
        let id = ObjId::from_bytes([0; 8]);
        assert_eq!(enc.compare(&Some(id), &None), Ordering::Less);
    }
}
