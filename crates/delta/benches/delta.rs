use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use delta::{apply_delta, compute_delta, Signature};

fn content(len: usize) -> Vec<u8> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state as u8
        })
        .collect()
}

fn bench_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("delta");
    for &len in &[64 * 1024, 1024 * 1024] {
        let base = content(len);
        let mut target = base.clone();
        for i in (0..len).step_by(len / 8) {
            target[i] ^= 0x5a;
        }
        let signature = Signature::generate(&base, 512).unwrap();
        group.throughput(Throughput::Bytes(len as u64));

        group.bench_with_input(BenchmarkId::new("signature", len), &base, |b, base| {
            b.iter(|| Signature::generate(black_box(base), 512).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("compute", len), &target, |b, target| {
            b.iter(|| compute_delta(black_box(&signature), black_box(target)))
        });
        let delta = compute_delta(&signature, &target);
        group.bench_with_input(BenchmarkId::new("apply", len), &delta, |b, delta| {
            b.iter(|| apply_delta(black_box(&base), black_box(delta)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_delta);
criterion_main!(benches);
