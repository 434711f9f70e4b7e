//! The transaction engine: lifecycle, the object data plane, and
//! field-change notification delivery.

use crate::core::codec::{Encoding, U64Encoding};
use crate::core::error::{GraphError, GraphResult};
use crate::core::ids::ObjId;
use crate::core::index;
use crate::core::keys;
use crate::core::kv::memory::MemoryKv;
use crate::core::kv::OrderedKv;
use crate::core::notify::queue::PendingFieldChange;
use crate::core::notify::{ListenerRegistry, NotificationQueue};
use crate::core::object::{mint_obj_id, ObjInfo, ObjInfoCache};
use crate::core::schema::bundle::SchemaBundle;
use crate::core::schema::model::{Field, FieldKind, ObjType, ReferencePolicy};
use crate::core::value;
use serde_json::Value as JsonValue;

/// Runs before the KV transaction commits; a failure here aborts the
/// commit and rolls back.
pub trait FallibleCallback: Send {
    /// Executes the callback.
    ///
    /// # Errors
    ///
    /// Any error aborts the commit in progress.
    fn call(&mut self) -> GraphResult<()>;
}

/// Runs at a point in the lifecycle that cannot itself fail.
pub trait SimpleCallback: Send {
    /// Executes the callback.
    fn call(&mut self);
}

/// Runs once the transaction has finished, reporting whether it
/// committed.
pub trait CompletionCallback: Send {
    /// Executes the callback with `committed = true` after a commit,
    /// `false` after a rollback.
    fn call(&mut self, committed: bool);
}

/// Lifecycle callbacks registered on a transaction.
///
/// Registration takes a caller-supplied `id` used to suppress
/// duplicates, standing in for the by-equality dedup of a callback
/// value — boxed trait objects have no meaningful `PartialEq` to
/// compare against, unlike the by-equality dedup a callback value would
/// otherwise get.
#[derive(Default)]
struct CallbackRegistry {
    before_commit: Vec<(u64, Box<dyn FallibleCallback>)>,
    before_completion: Vec<(u64, Box<dyn SimpleCallback>)>,
    after_commit: Vec<(u64, Box<dyn SimpleCallback>)>,
    after_completion: Vec<(u64, Box<dyn CompletionCallback>)>,
}

fn register<T>(list: &mut Vec<(u64, T)>, id: u64, callback: T) {
    if list.iter().any(|(existing, _)| *existing == id) {
        return;
    }
    list.push((id, callback));
}

/// The transactional object-graph engine layered over one [`OrderedKv`]
/// handle.
///
/// Every public method is expected to run on the thread that owns the
/// transaction: the engine gives itself `&mut self` methods rather than
/// interior mutability, so the borrow checker enforces the same
/// one-caller-at-a-time discipline a mutex would at runtime.
pub struct Transaction<K: OrderedKv> {
    kv: K,
    bundle: SchemaBundle,
    schema_index: u64,
    cache: ObjInfoCache,
    listeners: ListenerRegistry,
    queue: NotificationQueue,
    callbacks: CallbackRegistry,
    stale: bool,
    rollback_only: bool,
    detached: bool,
    mint_attempts: u32,
}

impl<K: OrderedKv> Transaction<K> {
    /// Opens a transaction over `kv`, using `schema_index` as the
    /// schema new objects are created under and migration targets.
    #[must_use]
    pub fn new(kv: K, bundle: SchemaBundle, schema_index: u64, cache_capacity: usize, mint_attempts: u32) -> Self {
        Self {
            kv,
            bundle,
            schema_index,
            cache: ObjInfoCache::new(cache_capacity),
            listeners: ListenerRegistry::default(),
            queue: NotificationQueue::new(),
            callbacks: CallbackRegistry::default(),
            stale: false,
            rollback_only: false,
            detached: false,
            mint_attempts,
        }
    }

    /// Registers a field-change monitor, create/delete/schema-change
    /// listener.
    pub fn listeners_mut(&mut self) -> &mut ListenerRegistry {
        &mut self.listeners
    }

    /// Registers a `before_commit` callback.
    pub fn register_before_commit(&mut self, id: u64, callback: Box<dyn FallibleCallback>) {
        register(&mut self.callbacks.before_commit, id, callback);
    }

    /// Registers a `before_completion` callback.
    pub fn register_before_completion(&mut self, id: u64, callback: Box<dyn SimpleCallback>) {
        register(&mut self.callbacks.before_completion, id, callback);
    }

    /// Registers an `after_commit` callback.
    pub fn register_after_commit(&mut self, id: u64, callback: Box<dyn SimpleCallback>) {
        register(&mut self.callbacks.after_commit, id, callback);
    }

    /// Registers an `after_completion` callback.
    pub fn register_after_completion(&mut self, id: u64, callback: Box<dyn CompletionCallback>) {
        register(&mut self.callbacks.after_completion, id, callback);
    }

    /// Marks this transaction so that the next `commit` rolls back
    /// instead and returns [`GraphError::RollbackOnlyTransaction`].
    pub fn mark_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    /// Whether this transaction has already committed or rolled back.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn ensure_active(&self) -> GraphResult<()> {
        if self.stale {
            return Err(GraphError::StaleTransaction);
        }
        Ok(())
    }

    /// Commits the transaction, running lifecycle callbacks in
    /// registration order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::StaleTransaction`] if already committed or
    /// rolled back, [`GraphError::RollbackOnlyTransaction`] if marked
    /// rollback-only (after rolling back), or propagates a
    /// `before_commit` callback's error (after rolling back) or a KV
    /// commit failure.
    pub fn commit(&mut self) -> GraphResult<()> {
        if self.detached {
            return Err(GraphError::IllegalArgument(
                "detached transactions cannot commit".to_string(),
            ));
        }
        self.ensure_active()?;
        if self.rollback_only {
            self.rollback()?;
            return Err(GraphError::RollbackOnlyTransaction);
        }
        for (_, callback) in &mut self.callbacks.before_commit {
            if let Err(err) = callback.call() {
                self.rollback()?;
                return Err(err);
            }
        }
        self.stale = true;
        for (_, callback) in &mut self.callbacks.before_completion {
            callback.call();
        }
        self.kv.commit()?;
        for (_, callback) in &mut self.callbacks.after_commit {
            callback.call();
        }
        for (_, callback) in &mut self.callbacks.after_completion {
            callback.call(true);
        }
        Ok(())
    }

    /// Rolls back the transaction. Idempotent once already stale.
    ///
    /// # Errors
    ///
    /// Propagates a KV rollback failure.
    pub fn rollback(&mut self) -> GraphResult<()> {
        if self.detached {
            return Err(GraphError::IllegalArgument(
                "detached transactions cannot roll back".to_string(),
            ));
        }
        if self.stale {
            return Ok(());
        }
        self.stale = true;
        for (_, callback) in &mut self.callbacks.before_completion {
            callback.call();
        }
        self.kv.rollback()?;
        for (_, callback) in &mut self.callbacks.after_completion {
            callback.call(false);
        }
        Ok(())
    }

    /// Creates a new object of `type_name`, under the transaction's
    /// schema, minting its `ObjId`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownType`] if `type_name` is not
    /// declared in the transaction's schema, or propagates a KV or
    /// minting failure.
    pub fn create(&mut self, type_name: &str) -> GraphResult<ObjId> {
        self.ensure_active()?;
        let obj_type = self.current_obj_type(type_name)?;
        let type_storage_id = self.bundle.type_storage_id(&obj_type)?;
        let id = mint_obj_id(&self.kv, type_storage_id, self.mint_attempts)?;

        self.kv.put(&keys::object_meta_key(id), &U64Encoding.encode(&self.schema_index))?;
        for field in &obj_type.fields {
            self.initialize_field(id, &obj_type, field)?;
        }
        for composite in &obj_type.composite_indexes {
            let bytes = self.composite_default_bytes(&obj_type, composite)?;
            let storage_id = self.bundle.composite_index_storage_id(&obj_type.name, composite)?;
            index::write_composite_entry(&mut self.kv, storage_id, &bytes, id)?;
        }
        index::add_schema_index_entry(&mut self.kv, self.schema_index, id)?;

        self.cache.put(id, ObjInfo { schema_index: self.schema_index });
        self.listeners.fire_create(id);
        Ok(id)
    }

    fn initialize_field(&mut self, id: ObjId, obj_type: &ObjType, field: &Field) -> GraphResult<()> {
        let storage_id = self.bundle.field_storage_id(&obj_type.name, field)?;
        match &field.kind {
            FieldKind::Simple { encoding, indexed } => {
                if *indexed {
                    index::write_simple_entry(&mut self.kv, storage_id, &value::default_simple_bytes(*encoding), id)?;
                }
            }
            FieldKind::Reference { indexed, .. } => {
                if *indexed {
                    index::write_simple_entry(&mut self.kv, storage_id, &value::default_reference_bytes(), id)?;
                }
            }
            FieldKind::Counter => {
                let encoded = self.kv.encode_counter(0);
                self.kv.put(&keys::object_field_key(id, storage_id), &encoded)?;
            }
            FieldKind::Set { .. } | FieldKind::List { .. } | FieldKind::Map { .. } => {}
        }
        Ok(())
    }

    fn composite_default_bytes(&self, obj_type: &ObjType, composite: &crate::core::schema::model::CompositeIndex) -> GraphResult<Vec<u8>> {
        let mut out = Vec::new();
        for name in &composite.field_names {
            let field = obj_type.field(name).ok_or_else(|| GraphError::UnknownField(name.clone()))?;
            match &field.kind {
                FieldKind::Simple { encoding, .. } => out.extend(value::default_simple_bytes(*encoding)),
                _ => return Err(GraphError::InvalidSchema(format!("composite index field '{name}' is not simple"))),
            }
        }
        Ok(out)
    }

    fn current_obj_type(&self, type_name: &str) -> GraphResult<ObjType> {
        let schema = self.bundle.schema(self.schema_index).ok_or_else(|| {
            GraphError::InconsistentDatabase(format!("schema index {} not registered", self.schema_index))
        })?;
        schema.object_type(type_name).cloned().ok_or_else(|| GraphError::UnknownType(type_name.to_string()))
    }

    fn type_storage_id_of(obj_id: ObjId) -> GraphResult<u64> {
        Ok(keys::varint::decode_uint(obj_id.as_bytes())?.0)
    }

    /// Resolves `id`'s cached (or freshly read) [`ObjInfo`].
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NoSuchObject`] if no meta-data entry
    /// exists, or propagates a KV or decoding failure.
    pub fn obj_info(&mut self, id: ObjId) -> GraphResult<ObjInfo> {
        if let Some(info) = self.cache.get(id) {
            return Ok(info);
        }
        let bytes = self
            .kv
            .get(&keys::object_meta_key(id))?
            .ok_or_else(|| GraphError::NoSuchObject(id.to_hex()))?;
        let schema_index = U64Encoding.read(&bytes)?;
        let info = ObjInfo { schema_index };
        self.cache.put(id, info);
        Ok(info)
    }

    /// Resolves the [`ObjType`] `id` is currently stored as, within
    /// `schema_index`, by matching the type-storage-id prefix of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentDatabase`] if `schema_index` is
    /// not registered or no object type in it matches the prefix.
    pub fn resolve_obj_type(&self, schema_index: u64, id: ObjId) -> GraphResult<ObjType> {
        let schema = self.bundle.schema(schema_index).ok_or_else(|| {
            GraphError::InconsistentDatabase(format!("schema index {schema_index} not registered"))
        })?;
        let target = Self::type_storage_id_of(id)?;
        for obj_type in &schema.object_types {
            if self.bundle.type_storage_id(obj_type)? == target {
                return Ok(obj_type.clone());
            }
        }
        Err(GraphError::InconsistentDatabase(format!(
            "no object type in schema {schema_index} matches storage id {target}"
        )))
    }

    pub(crate) fn reference_encoding_for(&self, schema_index: u64, policy: &ReferencePolicy) -> GraphResult<crate::core::codec::ReferenceEncoding> {
        if policy.allowed_types.is_empty() {
            return Ok(crate::core::codec::ReferenceEncoding::unrestricted());
        }
        let schema = self.bundle.schema(schema_index).ok_or_else(|| {
            GraphError::InconsistentDatabase(format!("schema index {schema_index} not registered"))
        })?;
        let mut ids = Vec::new();
        for name in &policy.allowed_types {
            let obj_type = schema.object_type(name).ok_or_else(|| GraphError::UnknownType(name.clone()))?;
            ids.push(self.bundle.type_storage_id(obj_type)?);
        }
        Ok(crate::core::codec::ReferenceEncoding::restricted(ids))
    }

    /// Runs on-access migration if `id`'s stored schema differs
    /// from the transaction's, then returns the (possibly updated)
    /// [`ObjType`] and schema index `id` is resolved under.
    ///
    /// # Errors
    ///
    /// Propagates any migration failure.
    pub(crate) fn resolve_for_access(&mut self, id: ObjId, migrate: bool) -> GraphResult<(ObjType, u64)> {
        let info = self.obj_info(id)?;
        let mut schema_index = info.schema_index;
        if migrate && schema_index != self.schema_index {
            crate::core::migration::migrate_object(self, id)?;
            schema_index = self.schema_index;
        }
        let obj_type = self.resolve_obj_type(schema_index, id)?;
        Ok((obj_type, schema_index))
    }

    /// Reads a simple or reference field.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownField`] if no such field exists, or
    /// [`GraphError::IllegalArgument`] if `name` is a counter or complex
    /// field.
    pub fn read_simple_field(&mut self, id: ObjId, name: &str, migrate: bool) -> GraphResult<JsonValue> {
        self.ensure_active()?;
        let (obj_type, schema_index) = self.resolve_for_access(id, migrate)?;
        let field = obj_type.field(name).cloned().ok_or_else(|| GraphError::UnknownField(name.to_string()))?;
        let storage_id = self.bundle.field_storage_id(&obj_type.name, &field)?;
        let key = keys::object_field_key(id, storage_id);
        match &field.kind {
            FieldKind::Simple { encoding, .. } => match self.kv.get(&key)? {
                Some(bytes) => value::decode_simple(*encoding, &bytes),
                None => value::decode_simple(*encoding, &value::default_simple_bytes(*encoding)),
            },
            FieldKind::Reference { policy, .. } => {
                let enc = self.reference_encoding_for(schema_index, policy)?;
                match self.kv.get(&key)? {
                    Some(bytes) => value::decode_reference(&enc, &bytes),
                    None => Ok(JsonValue::Null),
                }
            }
            _ => Err(GraphError::IllegalArgument(format!("'{name}' is not a simple or reference field"))),
        }
    }

    /// Writes a simple or reference field, maintaining its simple index
    /// entry, any composite indexes that cover it, and enqueuing a
    /// field-change notification.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownField`] if no such field exists,
    /// [`GraphError::DeletedObject`] if writing a reference whose target
    /// doesn't exist and `allow_deleted` is false, or
    /// [`GraphError::InvalidReference`] if the target's type is not on
    /// the field's allow-list.
    pub fn write_simple_field(&mut self, id: ObjId, name: &str, new_value: JsonValue, migrate: bool) -> GraphResult<()> {
        self.ensure_active()?;
        let (obj_type, schema_index) = self.resolve_for_access(id, migrate)?;
        let field = obj_type.field(name).cloned().ok_or_else(|| GraphError::UnknownField(name.to_string()))?;
        let storage_id = self.bundle.field_storage_id(&obj_type.name, &field)?;

        self.queue.enter();
        let result = self.write_simple_field_inner(id, &obj_type, &field, storage_id, schema_index, new_value);
        let drained = self.queue.leave();
        let deliver_result = self.deliver(drained);
        result.and(deliver_result)
    }

    fn write_simple_field_inner(
        &mut self,
        id: ObjId,
        obj_type: &ObjType,
        field: &Field,
        storage_id: u64,
        schema_index: u64,
        new_value: JsonValue,
    ) -> GraphResult<()> {
        let key = keys::object_field_key(id, storage_id);
        let (new_bytes, indexed) = match &field.kind {
            FieldKind::Simple { encoding, indexed } => {
                (value::encode_simple(*encoding, &new_value)?, *indexed)
            }
            FieldKind::Reference { policy, indexed } => {
                if let JsonValue::String(hex) = &new_value {
                    if !policy.allow_deleted {
                        let target_id = ObjId::from_slice(&hex_to_obj_id_bytes(hex)?)?;
                        if self.kv.get(&keys::object_meta_key(target_id))?.is_none() {
                            return Err(GraphError::DeletedObject(target_id.to_hex()));
                        }
                    }
                }
                let enc = self.reference_encoding_for(schema_index, policy)?;
                (value::encode_reference(&enc, &new_value)?, *indexed)
            }
            _ => return Err(GraphError::IllegalArgument(format!("'{}' is not a simple or reference field", field.name))),
        };

        let default_bytes = match &field.kind {
            FieldKind::Simple { encoding, .. } => value::default_simple_bytes(*encoding),
            FieldKind::Reference { .. } => value::default_reference_bytes(),
            _ => unreachable!(),
        };
        let old_bytes = self.kv.get(&key)?.unwrap_or_else(|| default_bytes.clone());
        if old_bytes == new_bytes {
            return Ok(());
        }

        if new_bytes == default_bytes {
            self.kv.remove(&key)?;
        } else {
            self.kv.put(&key, &new_bytes)?;
        }
        if indexed {
            index::update_simple_entry(&mut self.kv, storage_id, &old_bytes, &new_bytes, id)?;
        }
        for composite in &obj_type.composite_indexes {
            if !composite.field_names.iter().any(|n| n == &field.name) {
                continue;
            }
            let composite_storage_id = self.bundle.composite_index_storage_id(&obj_type.name, composite)?;
            let old_concat = self.composite_bytes_with_override(id, obj_type, composite, &field.name, &old_bytes)?;
            let new_concat = self.composite_bytes_with_override(id, obj_type, composite, &field.name, &new_bytes)?;
            if old_concat != new_concat {
                index::remove_composite_entry(&mut self.kv, composite_storage_id, &old_concat, id)?;
                index::write_composite_entry(&mut self.kv, composite_storage_id, &new_concat, id)?;
            }
        }
        self.queue.push(PendingFieldChange { referrer: id, changed: id, field_storage_id: storage_id, old: old_bytes, new: new_bytes });
        Ok(())
    }

    fn composite_bytes_with_override(
        &mut self,
        id: ObjId,
        obj_type: &ObjType,
        composite: &crate::core::schema::model::CompositeIndex,
        override_name: &str,
        override_bytes: &[u8],
    ) -> GraphResult<Vec<u8>> {
        let mut out = Vec::new();
        for name in &composite.field_names {
            if name == override_name {
                out.extend_from_slice(override_bytes);
                continue;
            }
            let field = obj_type.field(name).ok_or_else(|| GraphError::UnknownField(name.clone()))?;
            let storage_id = self.bundle.field_storage_id(&obj_type.name, field)?;
            let bytes = match &field.kind {
                FieldKind::Simple { encoding, .. } => self
                    .kv
                    .get(&keys::object_field_key(id, storage_id))?
                    .unwrap_or_else(|| value::default_simple_bytes(*encoding)),
                _ => return Err(GraphError::InvalidSchema(format!("composite index field '{name}' is not simple"))),
            };
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    fn deliver(&mut self, drained: Vec<PendingFieldChange>) -> GraphResult<()> {
        for change in drained {
            let monitors: Vec<usize> = (0..self.listeners.field_monitors().len())
                .filter(|i| self.listeners.field_monitors()[*i].field_storage_id == change.field_storage_id)
                .collect();
            for i in monitors {
                let (inverted, filters) = {
                    let monitor = &self.listeners.field_monitors()[i];
                    (crate::core::notify::path::invert(&monitor.path), monitor.filters.clone())
                };
                let referrers = crate::core::notify::path::resolve(&self.kv, change.changed, &inverted, &filters)?;
                let monitor = &self.listeners.field_monitors()[i];
                for referrer in referrers {
                    monitor.listener.on_field_change(referrer, change.changed, change.field_storage_id, &change.old, &change.new);
                }
            }
        }
        Ok(())
    }

    /// Reads a counter field's current value (0 if never adjusted).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownField`] or [`GraphError::IllegalArgument`]
    /// if `name` does not name a counter field.
    pub fn read_counter(&mut self, id: ObjId, name: &str, migrate: bool) -> GraphResult<i64> {
        self.ensure_active()?;
        let (obj_type, _) = self.resolve_for_access(id, migrate)?;
        let field = obj_type.field(name).ok_or_else(|| GraphError::UnknownField(name.to_string()))?;
        if !matches!(field.kind, FieldKind::Counter) {
            return Err(GraphError::IllegalArgument(format!("'{name}' is not a counter field")));
        }
        let storage_id = self.bundle.field_storage_id(&obj_type.name, field)?;
        match self.kv.get(&keys::object_field_key(id, storage_id))? {
            Some(bytes) => self.kv.decode_counter(&bytes),
            None => Ok(0),
        }
    }

    /// Atomically adjusts a counter field by `delta` and returns its new
    /// value, using an atomic counter primitive rather than a
    /// read-modify-write round trip.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownField`] or [`GraphError::IllegalArgument`]
    /// if `name` does not name a counter field.
    pub fn adjust_counter(&mut self, id: ObjId, name: &str, delta: i64, migrate: bool) -> GraphResult<i64> {
        self.ensure_active()?;
        let (obj_type, _) = self.resolve_for_access(id, migrate)?;
        let field = obj_type.field(name).ok_or_else(|| GraphError::UnknownField(name.to_string()))?;
        if !matches!(field.kind, FieldKind::Counter) {
            return Err(GraphError::IllegalArgument(format!("'{name}' is not a counter field")));
        }
        let storage_id = self.bundle.field_storage_id(&obj_type.name, field)?;
        self.kv.adjust_counter(&keys::object_field_key(id, storage_id), delta)
    }

    /// Exposes the current schema bundle, e.g. for migration planning.
    #[must_use]
    pub fn bundle(&self) -> &SchemaBundle {
        &self.bundle
    }

    /// The schema index this transaction creates objects under and
    /// migrates to.
    #[must_use]
    pub fn schema_index(&self) -> u64 {
        self.schema_index
    }

    /// Direct access to the underlying KV handle, for modules (delete,
    /// migration) implementing cross-cutting mutations.
    pub fn kv_mut(&mut self) -> &mut K {
        &mut self.kv
    }

    /// Direct read access to the underlying KV handle.
    #[must_use]
    pub fn kv(&self) -> &K {
        &self.kv
    }

    /// Invalidates a cached [`ObjInfo`], e.g. after migration or delete.
    pub fn invalidate_cache(&mut self, id: ObjId) {
        self.cache.invalidate(id);
    }

    /// Re-binds a cached [`ObjInfo`] to a new schema index, e.g. after
    /// migration.
    pub fn rebind_cache(&mut self, id: ObjId, schema_index: u64) {
        self.cache.put(id, ObjInfo { schema_index });
    }

    /// Fires every registered delete listener for `id`.
    pub fn fire_delete(&self, id: ObjId) {
        self.listeners.fire_delete(id);
    }

    /// Fires every registered schema-change listener for `id`.
    pub fn fire_schema_change(
        &self,
        id: ObjId,
        old_schema_id: &str,
        new_schema_id: &str,
        old_values: &std::collections::HashMap<String, JsonValue>,
    ) {
        self.listeners.fire_schema_change(id, old_schema_id, new_schema_id, old_values);
    }
}

fn hex_to_obj_id_bytes(hex: &str) -> GraphResult<Vec<u8>> {
    if hex.len() != 16 {
        return Err(GraphError::IllegalArgument(format!("'{hex}' is not a 16-digit ObjId hex string")));
    }
    let mut bytes = vec![0u8; 8];
    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|_| GraphError::IllegalArgument(format!("'{hex}' is not valid hex")))?;
    }
    Ok(bytes)
}

impl Transaction<MemoryKv> {
    /// Builds a detached, in-memory transaction for scratch use: it
    /// supports reads, writes, and callback registration (a no-op, since
    /// neither commit nor rollback ever run), but forbids `commit` and
    /// `rollback` themselves.
    #[must_use]
    pub fn detached(bundle: SchemaBundle, schema_index: u64, cache_capacity: usize, mint_attempts: u32) -> Self {
        let mut tx = Self::new(MemoryKv::new(), bundle, schema_index, cache_capacity, mint_attempts);
        tx.detached = true;
        tx
    }
}
