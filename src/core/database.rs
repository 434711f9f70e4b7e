//! The top-level database handle: bootstrap, schema-bundle caching, and
//! transaction construction.

use crate::core::config::{DatabaseConfig, SchemaRemovalPolicy, TransactionOptions};
use crate::core::error::{GraphError, GraphResult};
use crate::core::index;
use crate::core::kv::memory::MemoryKv;
use crate::core::kv::OrderedKv;
use crate::core::keys;
use crate::core::schema::bundle::SchemaBundle;
use crate::core::transaction::Transaction;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

type Store = BTreeMap<Vec<u8>, Vec<u8>>;

/// The object-graph database: a shared key/value store plus the cached
/// schema bundle every transaction opens against.
pub struct Database {
    store: Arc<Mutex<Store>>,
    config: DatabaseConfig,
    bundle: SchemaBundle,
    transactions_begun: u64,
}

impl Database {
    /// Opens (bootstrapping if empty) a database over a fresh in-memory
    /// store.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InconsistentDatabase`] if the store holds a
    /// format version this build doesn't recognize, or a corrupt schema
    /// or storage-id table.
    pub fn open(config: DatabaseConfig) -> GraphResult<Self> {
        let store = Arc::new(Mutex::new(Store::new()));
        Self::open_store(store, config)
    }

    /// Opens over an existing shared store, e.g. one handed back by a
    /// prior `Database` via [`Self::shared_store`].
    ///
    /// # Errors
    ///
    /// See [`Self::open`].
    pub fn open_store(store: Arc<Mutex<Store>>, config: DatabaseConfig) -> GraphResult<Self> {
        let mut kv = MemoryKv::open(Arc::clone(&store));
        let format_version = match kv.get(&keys::format_version_key())? {
            Some(bytes) => {
                let (version, _) = keys::varint::decode_uint(&bytes)?;
                if version != keys::CURRENT_FORMAT_VERSION {
                    return Err(GraphError::InconsistentDatabase(format!(
                        "on-disk format version {version} is not supported by this build (expected {})",
                        keys::CURRENT_FORMAT_VERSION
                    )));
                }
                version
            }
            None => {
                let mut bytes = Vec::new();
                keys::varint::encode_uint(keys::CURRENT_FORMAT_VERSION, &mut bytes);
                kv.put(&keys::format_version_key(), &bytes)?;
                kv.commit()?;
                keys::CURRENT_FORMAT_VERSION
            }
        };

        let bundle = load_bundle(&kv)?;
        tracing::info!(
            format_version,
            schema_count = bundle.registered_schema_indexes().len(),
            "opened object-graph database"
        );
        Ok(Self { store, config, bundle, transactions_begun: 0 })
    }

    /// A handle to the underlying shared store, for opening a sibling
    /// `Database` or a raw [`MemoryKv`] over the same data.
    #[must_use]
    pub fn shared_store(&self) -> Arc<Mutex<Store>> {
        Arc::clone(&self.store)
    }

    /// Begins a transaction, resolving or registering `options.schema_model`
    /// against the cached bundle and persisting any bundle change before
    /// the transaction is handed back.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::SchemaMismatch`] if `options.schema_model` is
    /// new and `options.allow_new_schema` is false, or propagates a KV or
    /// schema-validation failure.
    pub fn begin(&mut self, options: TransactionOptions) -> GraphResult<Transaction<MemoryKv>> {
        let (schema_index, bundle_changed) = match &options.schema_model {
            Some(model) => self.resolve_or_register_schema(model.clone(), options.allow_new_schema)?,
            None => {
                let index = self
                    .bundle
                    .registered_schema_indexes()
                    .into_iter()
                    .max()
                    .ok_or_else(|| GraphError::SchemaMismatch("no schema registered and none supplied".to_string()))?;
                (index, false)
            }
        };

        let is_first_transaction = self.transactions_begun == 0;
        self.transactions_begun += 1;
        self.maybe_collect_schemas(options.schema_removal, bundle_changed, is_first_transaction, schema_index)?;

        let kv = MemoryKv::open(Arc::clone(&self.store));
        Ok(Transaction::new(
            kv,
            self.bundle.clone(),
            schema_index,
            self.config.obj_info_cache_capacity,
            self.config.objid_mint_attempts,
        ))
    }

    /// Resolves `model` against the cached bundle, registering it if new.
    /// Returns the resolved schema index and whether the bundle changed.
    fn resolve_or_register_schema(&mut self, model: crate::core::schema::model::Schema, allow_new: bool) -> GraphResult<(u64, bool)> {
        let schema_id = model.schema_id();
        if let Some(index) = self.bundle.schema_index_of(&schema_id) {
            return Ok((index, false));
        }
        if !allow_new {
            return Err(GraphError::SchemaMismatch(format!(
                "schema '{schema_id}' is not registered and allow_new_schema is false"
            )));
        }
        let (bundle, index) = self.bundle.with_schema_added(None, model)?;
        self.persist_bundle(&bundle)?;
        self.bundle = bundle;
        Ok((index, true))
    }

    /// Applies `per_tx_policy` to decide whether to garbage-collect
    /// unreferenced schemas this transaction, then drops every registered
    /// schema (other than `in_use_schema_index`) with zero live objects
    /// in the schema index.
    fn maybe_collect_schemas(
        &mut self,
        per_tx_policy: SchemaRemovalPolicy,
        bundle_changed: bool,
        is_first_transaction: bool,
        in_use_schema_index: u64,
    ) -> GraphResult<()> {
        let should_collect = match per_tx_policy {
            SchemaRemovalPolicy::Never => false,
            SchemaRemovalPolicy::Always => true,
            SchemaRemovalPolicy::WhenBundleChanged => bundle_changed,
            SchemaRemovalPolicy::FirstTransaction => is_first_transaction,
        };
        if !should_collect {
            return Ok(());
        }

        let kv = MemoryKv::open(Arc::clone(&self.store));
        let mut unused_schema_ids = Vec::new();
        for schema_index in self.bundle.registered_schema_indexes() {
            if schema_index == in_use_schema_index {
                continue;
            }
            if index::query_schema_index(&kv, schema_index)?.is_empty() {
                let schema = self.bundle.schema(schema_index).ok_or_else(|| {
                    GraphError::InconsistentDatabase(format!("schema index {schema_index} not registered"))
                })?;
                unused_schema_ids.push(schema.schema_id());
            }
        }

        for schema_id in unused_schema_ids {
            tracing::debug!(schema_id = %schema_id, "garbage-collecting unreferenced schema");
            self.apply_schema_removal(&schema_id)?;
        }
        Ok(())
    }

    /// Explicitly removes a no-longer-used schema from the bundle.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidSchema`] if no registered schema has
    /// that `SchemaId`, or if it still has live objects in the schema
    /// index.
    pub fn remove_schema(&mut self, schema_id: &str) -> GraphResult<()> {
        let schema_index = self
            .bundle
            .schema_index_of(schema_id)
            .ok_or_else(|| GraphError::InvalidSchema(format!("no registered schema with id '{schema_id}'")))?;
        let kv = MemoryKv::open(Arc::clone(&self.store));
        let live_objects = index::query_schema_index(&kv, schema_index)?;
        if !live_objects.is_empty() {
            return Err(GraphError::InvalidSchema(format!(
                "schema '{schema_id}' still has {} live object(s) and cannot be removed",
                live_objects.len()
            )));
        }
        self.apply_schema_removal(schema_id)
    }

    fn apply_schema_removal(&mut self, schema_id: &str) -> GraphResult<()> {
        let bundle = self.bundle.with_schema_removed(schema_id)?;
        self.persist_bundle(&bundle)?;
        self.bundle = bundle;
        Ok(())
    }

    fn persist_bundle(&self, bundle: &SchemaBundle) -> GraphResult<()> {
        let mut kv = MemoryKv::open(Arc::clone(&self.store));
        for (index, bytes) in bundle.encode_schema_table() {
            kv.put(&keys::schema_table_key(index), &bytes)?;
        }
        for (storage_id, bytes) in bundle.encode_storage_id_table() {
            kv.put(&keys::storage_id_table_key(storage_id), &bytes)?;
        }
        kv.commit()
    }

    /// The currently cached schema bundle.
    #[must_use]
    pub fn bundle(&self) -> &SchemaBundle {
        &self.bundle
    }
}

fn load_bundle<K: OrderedKv>(kv: &K) -> GraphResult<SchemaBundle> {
    let (schema_lo, schema_hi) = keys::schema_table_range();
    let schema_entries = kv
        .get_range(&schema_lo, &schema_hi, false)?
        .into_iter()
        .map(|(key, value)| decode_table_entry(&key, value))
        .collect::<GraphResult<Vec<_>>>()?;

    let (storage_lo, storage_hi) = keys::storage_id_table_range();
    let storage_entries = kv
        .get_range(&storage_lo, &storage_hi, false)?
        .into_iter()
        .map(|(key, value)| decode_table_entry(&key, value))
        .collect::<GraphResult<Vec<_>>>()?;

    SchemaBundle::decode(&schema_entries, &storage_entries)
}

fn decode_table_entry(key: &[u8], value: Vec<u8>) -> GraphResult<(u64, Vec<u8>)> {
    let rest = key
        .get(1..)
        .ok_or_else(|| GraphError::InconsistentDatabase("table entry key has no payload".to_string()))?;
    let (index, _) = keys::varint::decode_uint(rest)?;
    Ok((index, value))
}
