//! Reference-path resolution for field monitors.
//!
//! A monitor's path describes, hop by hop, how to walk from the object
//! that registered interest to the object whose field is actually
//! watched. Delivery runs the walk in reverse: starting from the object
//! whose field just changed, it inverts each hop to recover every
//! referrer that should be notified.
//!
//! Graph traversal here is index lookups in the KV store, the same way
//! every other cross-object query in this crate resolves references —
//! never in-memory pointer following.

use crate::core::error::GraphResult;
use crate::core::ids::ObjId;
use crate::core::index;
use crate::core::keys;
use crate::core::kv::OrderedKv;

/// One hop of a reference path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// Follow the named reference field forward: read it directly off
    /// the current object.
    Forward(u64),
    /// Follow the named reference field backward: find every object
    /// whose reference field points at the current object. Requires the
    /// field to be indexed.
    Inverse(u64),
}

impl PathStep {
    fn inverted(self) -> Self {
        match self {
            PathStep::Forward(id) => PathStep::Inverse(id),
            PathStep::Inverse(id) => PathStep::Forward(id),
        }
    }
}

/// An inclusive `ObjId` range restricting which objects may occupy a
/// given hop. `None` means unrestricted.
pub type Filter = Option<(ObjId, ObjId)>;

fn passes(filter: Filter, id: ObjId) -> bool {
    match filter {
        None => true,
        Some((lo, hi)) => id >= lo && id <= hi,
    }
}

/// Reverses a monitor's registration path into the walk delivery should
/// perform, starting from the object whose field changed.
#[must_use]
pub fn invert(path: &[PathStep]) -> Vec<PathStep> {
    path.iter().rev().map(|step| step.inverted()).collect()
}

/// Walks `path` starting from `changed`, returning every object reached
/// at the final hop. `filters[i]` restricts the objects admitted after
/// hop `i`; `filters` may be shorter than `path`, in which case trailing
/// hops are unrestricted.
///
/// # Errors
///
/// Propagates any error from the underlying KV store.
pub fn resolve<K: OrderedKv>(
    kv: &K,
    changed: ObjId,
    path: &[PathStep],
    filters: &[Filter],
) -> GraphResult<Vec<ObjId>> {
    let mut frontier = vec![changed];
    for (i, step) in path.iter().enumerate() {
        let filter = filters.get(i).copied().flatten();
        let mut next = Vec::new();
        for obj_id in &frontier {
            let reached = match step {
                PathStep::Forward(field_storage_id) => {
                    forward_hop(kv, *obj_id, *field_storage_id)?.into_iter().collect()
                }
                PathStep::Inverse(field_storage_id) => {
                    inverse_hop(kv, *obj_id, *field_storage_id)?
                }
            };
            next.extend(reached.into_iter().filter(|id| passes(filter, *id)));
        }
        frontier = next;
    }
    Ok(frontier)
}

fn forward_hop<K: OrderedKv>(
    kv: &K,
    obj_id: ObjId,
    field_storage_id: u64,
) -> GraphResult<Option<ObjId>> {
    let key = keys::object_field_key(obj_id, field_storage_id);
    let Some(bytes) = kv.get(&key)? else {
        return Ok(None);
    };
    if bytes.len() == 1 && bytes[0] == 0xFF {
        return Ok(None);
    }
    Ok(Some(ObjId::from_slice(&bytes)?))
}

fn inverse_hop<K: OrderedKv>(
    kv: &K,
    obj_id: ObjId,
    field_storage_id: u64,
) -> GraphResult<Vec<ObjId>> {
    let index = index::query_simple_index(kv, field_storage_id)?;
    Ok(index.get(obj_id.as_bytes().as_slice()).cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kv::memory::MemoryKv;

    fn id(n: u8) -> ObjId {
        ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, n])
    }

    #[test]
    fn inverting_reverses_order_and_direction() {
        let path = vec![PathStep::Forward(1), PathStep::Inverse(2)];
        let inverted = invert(&path);
        assert_eq!(inverted, vec![PathStep::Forward(2), PathStep::Inverse(1)]);
    }

    #[test]
    fn forward_hop_reads_reference_field_directly() {
        let mut kv = MemoryKv::new();
        kv.put(&keys::object_field_key(id(1), 7), id(2).as_bytes().as_slice()).unwrap();
        let resolved = resolve(&kv, id(1), &[PathStep::Forward(7)], &[]).unwrap();
        assert_eq!(resolved, vec![id(2)]);
    }

    #[test]
    fn inverse_hop_finds_referrers_via_index() {
        let mut kv = MemoryKv::new();
        index::write_simple_entry(&mut kv, 7, id(2).as_bytes().as_slice(), id(1)).unwrap();
        index::write_simple_entry(&mut kv, 7, id(2).as_bytes().as_slice(), id(3)).unwrap();
        let mut resolved = resolve(&kv, id(2), &[PathStep::Inverse(7)], &[]).unwrap();
        resolved.sort();
        assert_eq!(resolved, vec![id(1), id(3)]);
    }

    #[test]
    fn filter_restricts_admitted_objects() {
        let mut kv = MemoryKv::new();
        index::write_simple_entry(&mut kv, 7, id(2).as_bytes().as_slice(), id(1)).unwrap();
        index::write_simple_entry(&mut kv, 7, id(2).as_bytes().as_slice(), id(9)).unwrap();
        let resolved =
            resolve(&kv, id(2), &[PathStep::Inverse(7)], &[Some((id(0), id(5)))]).unwrap();
        assert_eq!(resolved, vec![id(1)]);
    }
}
