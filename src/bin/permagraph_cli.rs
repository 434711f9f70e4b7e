//! A small command-line driver for the object-graph engine.
//!
//! The store is in-memory only, so each invocation starts from an empty
//! database; `demo` walks through schema registration, a write, a read,
//! a commit, and a cascading delete so the engine's behavior can be
//! inspected without writing a Rust program against the library.

use clap::{Parser, Subcommand};
use permagraph::core::config::{DatabaseConfig, TransactionOptions};
use permagraph::core::database::Database;
use permagraph::core::delete::delete_object;
use permagraph::core::schema::model::{DeleteAction, Field, FieldKind, ObjType, ReferencePolicy, Schema, SimpleKind};
use permagraph::core::GraphResult;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used if absent.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a scripted walkthrough of create/write/read/migrate/delete.
    Demo,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let config = match DatabaseConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Demo => run_demo(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn person_schema() -> Schema {
    Schema {
        object_types: vec![ObjType {
            name: "Person".to_string(),
            fields: vec![
                Field {
                    name: "name".to_string(),
                    kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false },
                    requested_storage_id: None,
                },
                Field {
                    name: "friend".to_string(),
                    kind: FieldKind::Reference {
                        policy: ReferencePolicy {
                            allowed_types: vec![],
                            on_delete: DeleteAction::Nullify,
                            forward_delete: false,
                            allow_deleted: false,
                        },
                        indexed: true,
                    },
                    requested_storage_id: None,
                },
            ],
            composite_indexes: vec![],
            requested_storage_id: None,
        }],
    }
}

fn run_demo(config: DatabaseConfig) -> GraphResult<()> {
    let mut db = Database::open(config)?;
    let options = TransactionOptions { schema_model: Some(person_schema()), allow_new_schema: true, ..Default::default() };
    let mut tx = db.begin(options)?;

    let alice = tx.create("Person")?;
    let bob = tx.create("Person")?;
    tx.write_simple_field(alice, "name", serde_json::json!("Alice"), false)?;
    tx.write_simple_field(bob, "name", serde_json::json!("Bob"), false)?;
    tx.write_simple_field(bob, "friend", serde_json::json!(alice.to_hex()), false)?;
    println!("created Alice ({}) and Bob ({}), Bob.friend = Alice", alice.to_hex(), bob.to_hex());

    let bob_friend = tx.read_simple_field(bob, "friend", false)?;
    println!("read back Bob.friend = {bob_friend}");

    tx.commit()?;
    println!("committed");

    let mut tx2 = db.begin(TransactionOptions { allow_new_schema: false, ..Default::default() })?;
    delete_object(&mut tx2, alice)?;
    let bob_friend_after_delete = tx2.read_simple_field(bob, "friend", false)?;
    println!("deleted Alice; Bob.friend is now {bob_friend_after_delete}");
    tx2.commit()?;

    Ok(())
}
