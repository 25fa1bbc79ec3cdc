//! # Merge Benchmarks
//!
//! Performance benchmarks for the jwsync-core merge engine.
//!
//! Run with: `cargo bench -p jwsync-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use jwsync_core::schema::IdentityRule;
use jwsync_core::{
    MergeOptions, Merger, Row, Schema, SchemaVersion, Snapshot, Table, TableSchema, Value,
    content_hash,
};
use std::hint::black_box;

fn schema() -> Schema {
    Schema::new(vec![
        TableSchema::new("location", &["id", "name"])
            .with_key("id")
            .with_identity(IdentityRule::columns(&["name"])),
        TableSchema::new("note", &["id", "guid", "location_fk"])
            .with_key("id")
            .with_nullable_foreign_key("location_fk", "location")
            .with_identity(IdentityRule::columns(&["guid"])),
        TableSchema::new("tag_map", &["id", "tag", "note_fk", "position"])
            .with_key("id")
            .with_foreign_key("note_fk", "note")
            .with_identity(IdentityRule::association(&["tag", "note_fk"]))
            .with_sequence("position", "tag"),
    ])
}

fn options() -> MergeOptions {
    MergeOptions {
        min_schema_version: 1,
        max_schema_version: 1,
        ..MergeOptions::default()
    }
}

fn table(name: &str, columns: &[&str]) -> Table {
    Table::new(
        name,
        columns.iter().map(|c| (*c).to_string()).collect(),
        Some("id"),
    )
    .expect("table")
}

/// Create a snapshot with `size` notes spread over `size / 10` locations.
/// Notes whose index is below `shared` get the same guid in every device,
/// the rest are unique to `device`.
fn create_snapshot(size: usize, shared: usize, device: &str) -> Snapshot {
    let mut snapshot = Snapshot::new(SchemaVersion(1));
    let locations = (size / 10).max(1);

    let mut location = table("location", &["id", "name"]);
    for i in 0..locations {
        location
            .insert(Row::new(vec![
                Value::Integer(i as i64 + 1),
                Value::text(format!("loc-{i}")),
            ]))
            .expect("insert");
    }

    let mut note = table("note", &["id", "guid", "location_fk"]);
    let mut tag_map = table("tag_map", &["id", "tag", "note_fk", "position"]);
    for i in 0..size {
        let guid = if i < shared {
            format!("shared-{i}")
        } else {
            format!("{device}-{i}")
        };
        let key = i as i64 + 1;
        note.insert(Row::new(vec![
            Value::Integer(key),
            Value::text(guid),
            Value::Integer((i % locations) as i64 + 1),
        ]))
        .expect("insert");
        tag_map
            .insert(Row::new(vec![
                Value::Integer(key),
                Value::Integer((i % 4) as i64),
                Value::Integer(key),
                Value::Integer((i / 4) as i64),
            ]))
            .expect("insert");
    }

    snapshot.insert_table(location);
    snapshot.insert_table(note);
    snapshot.insert_table(tag_map);
    snapshot
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_merge_disjoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_disjoint");
    let schema = schema();

    for size in [100, 1000, 5000].iter() {
        let primary = create_snapshot(*size, 0, "phone");
        let secondary = create_snapshot(*size, 0, "tablet");

        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(primary, secondary),
            |b, (primary, secondary)| {
                b.iter(|| {
                    let mut merger = Merger::new(&schema, options());
                    black_box(merger.merge_snapshots(primary, secondary))
                });
            },
        );
    }

    group.finish();
}

fn bench_merge_overlapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_overlapping");
    let schema = schema();

    for size in [100, 1000, 5000].iter() {
        let primary = create_snapshot(*size, size / 2, "phone");
        let secondary = create_snapshot(*size, size / 2, "tablet");

        group.bench_with_input(
            BenchmarkId::new("half_shared", size),
            &(primary, secondary),
            |b, (primary, secondary)| {
                b.iter(|| {
                    let mut merger = Merger::new(&schema, options());
                    black_box(merger.merge_snapshots(primary, secondary))
                });
            },
        );
    }

    group.finish();
}

fn bench_merge_identical(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_identical");
    let schema = schema();

    for size in [100, 1000, 5000].iter() {
        let snapshot = create_snapshot(*size, *size, "phone");

        group.bench_with_input(BenchmarkId::from_parameter(size), &snapshot, |b, snapshot| {
            b.iter(|| {
                let mut merger = Merger::new(&schema, options());
                black_box(merger.merge_snapshots(snapshot, snapshot))
            });
        });
    }

    group.finish();
}

fn bench_content_hash(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_hash");

    for size in [1 << 16, 1 << 20, 1 << 24].iter() {
        let bytes = vec![0x5a_u8; *size];

        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| black_box(content_hash(bytes)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_merge_disjoint,
    bench_merge_overlapping,
    bench_merge_identical,
    bench_content_hash,
);
criterion_main!(benches);
