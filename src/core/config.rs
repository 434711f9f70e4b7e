// src/core/config.rs

use crate::core::error::GraphError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Process-wide configuration for a [`crate::core::database::Database`].
///
/// Supports loading from a TOML file and provides sensible defaults for
/// every field so a caller can opt into only the settings they care about.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Capacity of the bounded object-info LRU cache.
    #[serde(default = "default_obj_info_cache_capacity")]
    pub obj_info_cache_capacity: usize,

    /// Number of attempts to mint a random `ObjId` before giving up.
    #[serde(default = "default_objid_mint_attempts")]
    pub objid_mint_attempts: u32,

    /// Default schema-removal policy applied when a transaction doesn't
    /// override it via `TransactionOptions`.
    #[serde(default = "default_schema_removal")]
    pub default_schema_removal: SchemaRemovalPolicy,
}

/// Policy for garbage-collecting unreferenced schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRemovalPolicy {
    /// Never garbage-collect unreferenced schemas.
    Never,
    /// Collect once, on the first transaction that opens the database.
    FirstTransaction,
    /// Collect whenever the schema bundle changes.
    WhenBundleChanged,
    /// Collect eagerly on every transaction close.
    Always,
}

fn default_obj_info_cache_capacity() -> usize {
    1024
}

fn default_objid_mint_attempts() -> u32 {
    64
}

fn default_schema_removal() -> SchemaRemovalPolicy {
    SchemaRemovalPolicy::Never
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            obj_info_cache_capacity: default_obj_info_cache_capacity(),
            objid_mint_attempts: default_objid_mint_attempts(),
            default_schema_removal: default_schema_removal(),
        }
    }
}

impl DatabaseConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the specified file does not exist, default configuration values
    /// are returned.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Other`] if the file exists but cannot be
    /// parsed, or [`GraphError::Io`] if it exists but cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, GraphError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|e| {
                GraphError::Other(format!(
                    "failed to parse config file '{}': {e}",
                    path.display()
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(GraphError::from(e)),
        }
    }

    /// Loads configuration from an optional TOML file path, falling back
    /// to defaults when no path is given.
    ///
    /// # Errors
    ///
    /// See [`Self::load_from_file`].
    pub fn load_or_default(optional_path: Option<&Path>) -> Result<Self, GraphError> {
        match optional_path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Per-transaction configuration recognized by [`crate::core::database::Database::begin`].
#[derive(Debug, Clone)]
pub struct TransactionOptions {
    /// The schema this transaction uses; may be empty to use whatever
    /// schema is already bound to each object it touches.
    pub schema_model: Option<crate::core::schema::model::Schema>,
    /// If false, a schema not already in the bundle causes `SchemaMismatch`.
    pub allow_new_schema: bool,
    /// Policy for garbage-collecting unreferenced schemas on this
    /// transaction's commit.
    pub schema_removal: SchemaRemovalPolicy,
    /// Opaque options forwarded verbatim to the KV backend.
    pub kv_options: PathBuf,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            schema_model: None,
            allow_new_schema: false,
            schema_removal: SchemaRemovalPolicy::Never,
            kv_options: PathBuf::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = DatabaseConfig::default();
        assert_eq!(config.obj_info_cache_capacity, 1024);
        assert_eq!(config.objid_mint_attempts, 64);
        assert_eq!(config.default_schema_removal, SchemaRemovalPolicy::Never);
    }

    #[test]
    fn test_load_from_existing_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_content = r#"
            obj_info_cache_capacity = 2048
            objid_mint_attempts = 32
            default_schema_removal = "always"
        "#;
        writeln!(temp_file, "{config_content}").unwrap();

        let config = DatabaseConfig::load_from_file(temp_file.path()).unwrap();
        assert_eq!(config.obj_info_cache_capacity, 2048);
        assert_eq!(config.objid_mint_attempts, 32);
        assert_eq!(config.default_schema_removal, SchemaRemovalPolicy::Always);
    }

    #[test]
    fn test_load_from_non_existent_file_returns_default() {
        let config = DatabaseConfig::load_from_file(Path::new("no_such_config.toml")).unwrap();
        assert_eq!(config, DatabaseConfig::default());
    }

    #[test]
    fn test_load_from_malformed_file_returns_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "not valid = = toml").unwrap();
        assert!(DatabaseConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_with_none() {
        let config = DatabaseConfig::load_or_default(None).unwrap();
        assert_eq!(config, DatabaseConfig::default());
    }
}
