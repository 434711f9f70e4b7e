//! Notification & reference paths.

pub mod path;
pub mod queue;

pub use path::{Filter, PathStep};
pub use queue::NotificationQueue;

use crate::core::ids::ObjId;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Invoked synchronously when an object is created.
pub trait CreateListener: Send {
    /// Called once, right after the object's meta-data entry is written.
    fn on_create(&self, obj_id: ObjId);
}

/// Invoked before an object's keys are removed.
pub trait DeleteListener: Send {
    /// Called once per object, before its keys are removed. A nested
    /// delete of the same object triggered from inside this callback is
    /// a no-op (re-entrant delete guard).
    fn on_delete(&self, obj_id: ObjId);
}

/// Invoked when an object's stored schema changes on access.
pub trait SchemaChangeListener: Send {
    /// `old_values` holds every field the object held under the old
    /// schema, by name, as a JSON snapshot.
    fn on_schema_change(
        &self,
        obj_id: ObjId,
        old_schema_id: &str,
        new_schema_id: &str,
        old_values: &HashMap<String, JsonValue>,
    );
}

/// Invoked after a watched field's value changes.
pub trait FieldChangeListener: Send {
    /// `referrer` is the object the monitor's `path` resolved back to;
    /// `changed` is the object whose field actually changed.
    fn on_field_change(&self, referrer: ObjId, changed: ObjId, field_storage_id: u64, old: &[u8], new: &[u8]);
}

/// A registered field-change monitor.
pub struct FieldMonitor {
    /// The storage id of the watched field.
    pub field_storage_id: u64,
    /// Reference-field storage ids to walk from the registering object to
    /// the mutated field; a negative entry denotes inverse traversal.
    pub path: Vec<PathStep>,
    /// An optional key-range restriction applied to the object IDs
    /// reached after each path step (`filters[0]` restricts the
    /// initiating object).
    pub filters: Vec<Filter>,
    /// The callback to invoke for each resolved referrer.
    pub listener: Box<dyn FieldChangeListener>,
}

/// Holds every listener family registered on a transaction.
#[derive(Default)]
pub struct ListenerRegistry {
    create: Vec<Box<dyn CreateListener>>,
    delete: Vec<Box<dyn DeleteListener>>,
    schema_change: Vec<Box<dyn SchemaChangeListener>>,
    field_change: Vec<FieldMonitor>,
}

impl ListenerRegistry {
    /// Registers a create listener.
    pub fn add_create_listener(&mut self, listener: Box<dyn CreateListener>) {
        self.create.push(listener);
    }

    /// Registers a delete listener.
    pub fn add_delete_listener(&mut self, listener: Box<dyn DeleteListener>) {
        self.delete.push(listener);
    }

    /// Registers a schema-change listener.
    pub fn add_schema_change_listener(&mut self, listener: Box<dyn SchemaChangeListener>) {
        self.schema_change.push(listener);
    }

    /// Registers a field-change monitor.
    pub fn add_field_monitor(&mut self, monitor: FieldMonitor) {
        self.field_change.push(monitor);
    }

    /// Notifies every create listener.
    pub fn fire_create(&self, obj_id: ObjId) {
        for listener in &self.create {
            listener.on_create(obj_id);
        }
    }

    /// Notifies every delete listener.
    pub fn fire_delete(&self, obj_id: ObjId) {
        for listener in &self.delete {
            listener.on_delete(obj_id);
        }
    }

    /// Notifies every schema-change listener.
    pub fn fire_schema_change(
        &self,
        obj_id: ObjId,
        old_schema_id: &str,
        new_schema_id: &str,
        old_values: &HashMap<String, JsonValue>,
    ) {
        for listener in &self.schema_change {
            listener.on_schema_change(obj_id, old_schema_id, new_schema_id, old_values);
        }
    }

    /// The registered field monitors, for path resolution during
    /// delivery.
    #[must_use]
    pub fn field_monitors(&self) -> &[FieldMonitor] {
        &self.field_change
    }
}
