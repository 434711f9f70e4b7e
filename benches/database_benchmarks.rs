//! Benchmarking suite for the object-graph engine's write and read paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use permagraph::core::config::{DatabaseConfig, TransactionOptions};
use permagraph::core::database::Database;
use permagraph::core::schema::model::{Field, FieldKind, ObjType, Schema, SimpleKind};
use std::time::Duration;

fn bench_schema() -> Schema {
    Schema {
        object_types: vec![ObjType {
            name: "Item".to_string(),
            fields: vec![
                Field {
                    name: "name".to_string(),
                    kind: FieldKind::Simple { encoding: SimpleKind::String, indexed: false },
                    requested_storage_id: None,
                },
                Field {
                    name: "value".to_string(),
                    kind: FieldKind::Simple { encoding: SimpleKind::U64, indexed: true },
                    requested_storage_id: None,
                },
            ],
            composite_indexes: vec![],
            requested_storage_id: None,
        }],
    }
}

/// Benchmark object creation plus field writes within one committed transaction.
fn bench_create_and_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("create_and_write");
    group.measurement_time(Duration::from_secs(10));

    let size = 100u64;
    group.throughput(Throughput::Elements(size));
    group.bench_function("batch_creates", |b| {
        b.iter(|| {
            let mut db = Database::open(DatabaseConfig::default()).unwrap();
            let options = TransactionOptions {
                schema_model: Some(bench_schema()),
                allow_new_schema: true,
                ..Default::default()
            };
            let mut tx = db.begin(options).unwrap();
            for i in 1..=size {
                let id = tx.create("Item").unwrap();
                tx.write_simple_field(id, "name", serde_json::json!(format!("Item{i}")), false).unwrap();
                tx.write_simple_field(id, "value", serde_json::json!(i * 10), false).unwrap();
            }
            black_box(tx.commit().unwrap());
        });
    });

    group.finish();
}

/// Benchmark repeated simple-field reads against an already-populated transaction.
fn bench_read_simple_field(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_simple_field");
    group.measurement_time(Duration::from_secs(10));

    let size = 100u64;
    group.throughput(Throughput::Elements(size));

    group.bench_function("sequential_reads", |b| {
        b.iter_batched(
            || {
                let mut db = Database::open(DatabaseConfig::default()).unwrap();
                let options = TransactionOptions {
                    schema_model: Some(bench_schema()),
                    allow_new_schema: true,
                    ..Default::default()
                };
                let mut tx = db.begin(options).unwrap();
                let ids: Vec<_> = (1..=size)
                    .map(|i| {
                        let id = tx.create("Item").unwrap();
                        tx.write_simple_field(id, "name", serde_json::json!(format!("Item{i}")), false).unwrap();
                        id
                    })
                    .collect();
                (tx, ids)
            },
            |(mut tx, ids)| {
                for id in ids {
                    black_box(tx.read_simple_field(id, "name", false).unwrap());
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_create_and_write, bench_read_simple_field);
criterion_main!(benches);
