//! Performance benchmarks for the ingestion hot path
//!
//! **Benchmarks Included:**
//! - `chunking`: line-window chunking of Rust source at 1k, 10k and 100k lines
//! - `hashing`: BLAKE3 content hashing at 64 KiB, 1 MiB and 10 MiB
//! - `chunk_insert`: `SQLite` chunk upserts, 100 documents per batch
//!
//! **Run benchmarks:**
//! ```bash
//! cargo bench                      # Run all benchmarks
//! cargo bench -- chunking          # Chunker only
//! ```

use std::path::Path;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nexus_indexer::indexer::{chunk_file, hash_content, Chunk};
use nexus_indexer::storage::{init_storage, upsert_chunks, Database, FileRecord};
use nexus_indexer::{ChunkDocument, ChunkerConfig, FileStore};

/// Rust-looking source with a function every ten lines.
fn synthetic_source(lines: usize) -> String {
    let mut out = String::with_capacity(lines * 32);
    for i in 0..lines {
        if i % 10 == 0 {
            out.push_str(&format!("pub fn handler_{i}(input: &str) -> usize {{\n"));
        } else {
            out.push_str(&format!("    let value_{i} = input.len() + {i};\n"));
        }
    }
    out
}

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");
    group.sample_size(10);
    group.measurement_time(std::time::Duration::from_secs(5));

    for lines in &[1_000usize, 10_000, 100_000] {
        let source = synthetic_source(*lines);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &source, |b, source| {
            b.iter(|| {
                chunk_file(
                    black_box(Path::new("src/lib.rs")),
                    black_box(source),
                    ChunkerConfig::default(),
                )
            });
        });
    }

    group.finish();
}

fn bench_hashing(c: &mut Criterion) {
    let mut group = c.benchmark_group("hashing");
    group.sample_size(10);

    for size in &[64 * 1024usize, 1024 * 1024, 10 * 1024 * 1024] {
        let bytes = vec![b'x'; *size];
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| hash_content(black_box(bytes)));
        });
    }

    group.finish();
}

fn bench_chunk_insert(c: &mut Criterion) {
    let db = Database::open_in_memory().expect("failed to open database");
    init_storage(&db).expect("failed to init storage");
    let file_id = db
        .insert(&FileRecord::new("src/lib.rs", "hash", 0, 0))
        .expect("failed to insert file");

    let documents: Vec<ChunkDocument> = (0..100)
        .map(|i| {
            let chunk = Chunk {
                start_line: i * 10 + 1,
                end_line: i * 10 + 10,
                content: format!("fn bench_{i}() {{}}"),
                symbol: Some(format!("bench_{i}")),
                kind: Some("function".to_string()),
            };
            ChunkDocument::new(file_id, "src/lib.rs".to_string(), Some("rust".to_string()), chunk, 0)
        })
        .collect();

    let mut group = c.benchmark_group("chunk_insert");
    group.sample_size(10);
    group.bench_function("batch_100", |b| {
        b.iter(|| {
            db.with_transaction(|conn| upsert_chunks(conn, black_box(&documents)))
                .expect("insert failed")
        });
    });
    group.finish();
}

criterion_group!(benches, bench_chunking, bench_hashing, bench_chunk_insert);
criterion_main!(benches);
