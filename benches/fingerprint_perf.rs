//! Criterion benchmarks for directory fingerprinting and validation.
//!
//! Performance targets:
//! - Fingerprint, 50 small files: < 5ms
//! - Fingerprint, 500 small files: < 50ms
//! - Validate, 500 small files: < 50ms

use std::hint::black_box;
use std::path::Path;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tempfile::TempDir;

use skv::core::hash::fingerprint;
use skv::core::vendor::{Limits, VendorStore};

fn build_skill(files: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("SKILL.md"), "# bench\n").unwrap();
    for i in 0..files {
        let sub = dir.path().join(format!("group-{}", i % 10));
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(
            sub.join(format!("file-{i}.md")),
            format!("line {i}\n").repeat(32),
        )
        .unwrap();
    }
    dir
}

fn fingerprint_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");
    for files in [50usize, 500] {
        let skill = build_skill(files);
        group.throughput(Throughput::Elements(files as u64));
        group.bench_with_input(BenchmarkId::from_parameter(files), skill.path(), |b, path| {
            b.iter(|| fingerprint(black_box(path)).unwrap());
        });
    }
    group.finish();
}

fn validate_benchmarks(c: &mut Criterion) {
    let skill = build_skill(500);
    let store = VendorStore::new(Path::new("/unused"), Limits::default());
    c.bench_function("validate/500", |b| {
        b.iter(|| store.validate(black_box(skill.path())).unwrap());
    });
}

criterion_group!(benches, fingerprint_benchmarks, validate_benchmarks);
criterion_main!(benches);
