pub mod codec;
pub mod common;
pub mod complex;
pub mod config;
pub mod database;
pub mod delete;
pub mod error;
pub mod ids;
pub mod index;
pub mod keys;
pub mod kv;
pub mod migration;
pub mod notify;
pub mod object;
pub mod schema;
pub mod transaction;
pub mod value;

pub use self::config::DatabaseConfig;
pub use self::database::Database;
pub use self::error::{GraphError, GraphResult};
