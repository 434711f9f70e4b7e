//! Buffered, re-entrant notification delivery.
//!
//! Field-change notifications are queued rather than delivered inline,
//! so that a listener which itself mutates fields doesn't interleave its
//! own notifications with the ones still pending from the outer
//! mutation. Delivery only runs once the buffer depth returns to zero;
//! a nested mutation instead grows the same queue and returns
//! immediately.

use crate::core::ids::ObjId;

/// A single queued field-change notification.
pub struct PendingFieldChange {
    pub referrer: ObjId,
    pub changed: ObjId,
    pub field_storage_id: u64,
    pub old: Vec<u8>,
    pub new: Vec<u8>,
}

/// Buffers field-change notifications across re-entrant mutations within
/// one transaction.
#[derive(Default)]
pub struct NotificationQueue {
    depth: u32,
    pending: Vec<PendingFieldChange>,
}

impl NotificationQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks entry into a mutation that may enqueue notifications.
    /// Must be paired with [`Self::leave`].
    pub fn enter(&mut self) {
        self.depth += 1;
    }

    /// Marks exit from a mutation. Returns the queued notifications,
    /// drained and sorted by field storage id then insertion order, if
    /// this was the outermost mutation; otherwise returns an empty
    /// vector, leaving the queue for the outer caller to drain.
    pub fn leave(&mut self) -> Vec<PendingFieldChange> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 {
            return Vec::new();
        }
        let mut drained = std::mem::take(&mut self.pending);
        drained.sort_by_key(|change| change.field_storage_id);
        drained
    }

    /// Enqueues a notification for later delivery.
    pub fn push(&mut self, change: PendingFieldChange) {
        self.pending.push(change);
    }

    /// Whether the queue is currently inside a mutation (non-zero
    /// depth).
    #[must_use]
    pub fn is_buffering(&self) -> bool {
        self.depth > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ObjId {
        ObjId::from_bytes([0x20, 0, 0, 0, 0, 0, 0, n])
    }

    fn change(field_storage_id: u64) -> PendingFieldChange {
        PendingFieldChange {
            referrer: id(1),
            changed: id(1),
            field_storage_id,
            old: Vec::new(),
            new: Vec::new(),
        }
    }

    #[test]
    fn nested_mutation_defers_draining_to_outer_caller() {
        let mut queue = NotificationQueue::new();
        queue.enter();
        queue.push(change(2));
        queue.enter();
        queue.push(change(1));
        assert!(queue.leave().is_empty());
        let drained = queue.leave();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].field_storage_id, 1);
        assert_eq!(drained[1].field_storage_id, 2);
    }

    #[test]
    fn single_level_mutation_drains_immediately_on_leave() {
        let mut queue = NotificationQueue::new();
        queue.enter();
        queue.push(change(5));
        let drained = queue.leave();
        assert_eq!(drained.len(), 1);
        assert!(!queue.is_buffering());
    }
}
