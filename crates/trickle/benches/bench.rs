use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use trickle::{make_chunk, resolve};

fn bench_make_chunk(c: &mut Criterion) {
    let mut group = c.benchmark_group("make_chunk");
    for len in [10, 1024, 100 * 1024, 1024 * 1024] {
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_function(format!("{len}"), |b| {
            b.iter(|| black_box(make_chunk(black_box(len))))
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for path in ["/", "/5k", "/2M/100"] {
        group.bench_function(path, |b| b.iter(|| black_box(resolve(black_box(path)))));
    }
    group.finish();
}

criterion_group!(benches, bench_make_chunk, bench_resolve);
criterion_main!(benches);
