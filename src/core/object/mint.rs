//! Object-ID minting.

use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use crate::core::keys;
use crate::core::kv::OrderedKv;
use rand::RngCore;

/// Mints a fresh `ObjId` for a new object of the type with storage id
/// `type_storage_id`, retrying on collision with an existing object.
///
/// The storage-id prefix is fixed (the order-preserving varint encoding
/// used throughout `core::keys`); the remaining bytes come from a
/// cryptographically strong RNG.
///
/// # Errors
///
/// Returns [`GraphError::Other`] after `max_attempts` collisions, and
/// propagates any KV error encountered while probing for collisions.
pub fn mint_obj_id<K: OrderedKv>(
    kv: &K,
    type_storage_id: u64,
    max_attempts: u32,
) -> GraphResult<ObjId> {
    let prefix = keys::varint::encode_uint_vec(type_storage_id);
    if prefix.len() > 8 {
        return Err(GraphError::IllegalArgument(format!(
            "storage id {type_storage_id} does not fit in an ObjId prefix"
        )));
    }

    let mut rng = rand::thread_rng();
    for _ in 0..max_attempts {
        let mut bytes = [0u8; 8];
        bytes[..prefix.len()].copy_from_slice(&prefix);
        let mut suffix = vec![0u8; 8 - prefix.len()];
        rng.fill_bytes(&mut suffix);
        bytes[prefix.len()..].copy_from_slice(&suffix);

        let candidate = ObjId::from_bytes(bytes);
        if kv.get(&keys::object_meta_key(candidate))?.is_none() {
            return Ok(candidate);
        }
    }
    Err(GraphError::Other(format!(
        "failed to mint a unique ObjId after {max_attempts} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::memory::MemoryKv;

    #[test]
    fn mints_unique_ids_with_correct_prefix() {
        let kv = MemoryKv::new();
        let id = mint_obj_id(&kv, 3, 64).unwrap();
        assert_eq!(&id.as_bytes()[..1], keys::varint::encode_uint_vec(3).as_slice());
    }

    #[test]
    fn rejects_storage_id_too_wide_for_prefix() {
        let kv = MemoryKv::new();
        assert!(mint_obj_id(&kv, u64::MAX, 1).is_err());
    }
}
