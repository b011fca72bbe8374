//! Criterion benchmarks for the typegraph-core compile pipeline and runtime.
//!
//! Fixtures are pre-parsed outside the benchmark loop to measure only
//! compilation and payload decoding, not JSON parsing or file I/O.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::Value;
use std::fs;
use std::path::Path;

use typegraph_core::runtime::{decode, encode};
use typegraph_core::{compile_document, CompileOptions, DecodeOptions};

/// Load and parse a fixture document from the shared test fixtures directory.
fn load_fixture(name: &str) -> Value {
    let fixtures_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/schemas");
    let path = Path::new(fixtures_dir).join(name);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

fn bench_compile_petstore(c: &mut Criterion) {
    let doc = load_fixture("petstore.json");
    let options = CompileOptions::default();

    c.bench_function("compile/petstore", |b| {
        b.iter(|| compile_document(black_box(&doc), black_box(&options)).unwrap())
    });
}

fn bench_compile_recursive(c: &mut Criterion) {
    let doc = load_fixture("recursive.json");
    let options = CompileOptions::default();

    c.bench_function("compile/recursive", |b| {
        b.iter(|| compile_document(black_box(&doc), black_box(&options)).unwrap())
    });
}

fn bench_decode_encode_pet(c: &mut Criterion) {
    let graph = compile_document(&load_fixture("petstore.json"), &CompileOptions::default()).unwrap();
    let options = DecodeOptions::default();
    let payload = serde_json::json!({
        "id": "123e4567-e89b-12d3-a456-426614174000",
        "name": "Tom",
        "kind": "kitten",
        "indoor": true
    });

    c.bench_function("runtime/pet_roundtrip", |b| {
        b.iter(|| {
            let pet = decode(&graph, "Pet", black_box(&payload), &options).unwrap();
            encode(&graph, "Pet", &pet, &options).unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_compile_petstore,
    bench_compile_recursive,
    bench_decode_encode_pet,
);
criterion_main!(benches);
