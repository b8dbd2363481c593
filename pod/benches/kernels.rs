use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
use podrom_pod::{accumulate, accumulate_t, PodParams};
use rand_xoshiro::Xoshiro256Plus;

fn criterion_kernels(c: &mut Criterion) {
    let mut rng = Xoshiro256Plus::seed_from_u64(42);
    let n_h = 10_000;
    let n_l = 10;
    let n_t = 20;
    let basis = Array2::random_using((n_h, n_l), Uniform::new(-1., 1.), &mut rng);
    let samples = Array2::random_using((1000, n_l), Uniform::new(-1., 1.), &mut rng);

    let mut group = c.benchmark_group("kernels");
    group.sample_size(10);
    group.bench_function("accumulate-1000-samples", |b| {
        b.iter(|| black_box(accumulate(&samples, &basis).unwrap()))
    });
    group.bench_function("accumulate_t-50-trajectories", |b| {
        b.iter(|| black_box(accumulate_t(&samples, &basis, n_t).unwrap()))
    });

    let snapshots = Array2::random_using((2000, 100), Uniform::new(-1., 1.), &mut rng);
    group.bench_function("pod-2000x100", |b| {
        b.iter(|| black_box(PodParams::new(1e-6).extract(&snapshots).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, criterion_kernels);
criterion_main!(benches);
