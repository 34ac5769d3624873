use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipdedup::{LineChunker, MemoryIndex, ParsedAddress, Pipeline, PipelineConfig, WarningLog};
use std::hint::black_box;

/// Newline-delimited addresses, every `invalid_every`-th line garbage
fn generate_input(count: usize, invalid_every: usize) -> Vec<u8> {
    let mut out = String::with_capacity(count * 16);
    for i in 0..count {
        if invalid_every > 0 && i % invalid_every == 0 {
            out.push_str("not-an-address\n");
        } else if i % 3 == 0 {
            out.push_str(&format!("2001:db8::{:x}\n", i % 50_000));
        } else {
            out.push_str(&format!("10.{}.{}.{}\n", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff));
        }
    }
    out.into_bytes()
}

fn bench_parse_and_digest(c: &mut Criterion) {
    let input = generate_input(10_000, 50);
    let lines: Vec<&[u8]> = input.split(|&b| b == b'\n').filter(|l| !l.is_empty()).collect();

    let mut group = c.benchmark_group("parse_and_digest");
    group.throughput(Throughput::Elements(lines.len() as u64));
    group.bench_function("mixed_v4_v6", |b| {
        b.iter(|| {
            for line in &lines {
                if let Some(addr) = ParsedAddress::parse_bytes(line) {
                    black_box(addr.digest());
                }
            }
        });
    });
    group.finish();
}

fn bench_chunker(c: &mut Criterion) {
    let input = generate_input(100_000, 0);

    let mut group = c.benchmark_group("line_chunker");
    group.throughput(Throughput::Bytes(input.len() as u64));
    for block_size in [4 * 1024, 64 * 1024, 1024 * 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(block_size),
            &block_size,
            |b, &block_size| {
                b.iter(|| {
                    let mut chunker = LineChunker::new();
                    let mut lines = 0usize;
                    for block in input.chunks(block_size) {
                        if let Some(batch) = chunker.push_block(block) {
                            lines += batch.len();
                        }
                    }
                    if let Some(batch) = chunker.finish() {
                        lines += batch.len();
                    }
                    black_box(lines)
                });
            },
        );
    }
    group.finish();
}

fn bench_pipeline_memory_index(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("ips.txt");
    let content = generate_input(200_000, 1_000);
    std::fs::write(&input, &content).unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.throughput(Throughput::Bytes(content.len() as u64));
    for workers in [1, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let config = PipelineConfig {
                    workers,
                    memory_report_interval_secs: 0,
                    ..Default::default()
                };
                let report = Pipeline::new(config, MemoryIndex::new(), WarningLog::new(Vec::new(), 10))
                    .run(&input)
                    .unwrap();
                black_box(report.unique_addresses)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_parse_and_digest,
    bench_chunker,
    bench_pipeline_memory_index
);
criterion_main!(benches);
