use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{array, Array2, ArrayView1, ArrayView2};
use podrom::{DatasetParams, EnsembleRegressor, LinearRegressor, Mesh, PodModel, PodParams, SplitRatios};

fn u(x: &ArrayView2<f64>, _t: f64, mu: &ArrayView1<f64>) -> Array2<f64> {
    x.mapv(|xi| mu[0] * (-xi / mu[1]).exp() + (mu[0] * xi).sin())
}

fn criterion_predict(c: &mut Criterion) {
    let mesh = Mesh::linear((0., 1., 1000), None, None).unwrap();
    let mut model = PodModel::new("target/benches/predict", 1, mesh, 0).unwrap().seed(42);
    let params = DatasetParams::new(&array![1., 0.5], &array![2., 1.], 200).pod(PodParams::new(1e-8));
    let dataset = model.generate_dataset(&u, &params).unwrap();
    let ensemble = EnsembleRegressor::params()
        .n_members(10)
        .build(Box::new(LinearRegressor::params().build().unwrap()))
        .unwrap();
    model.set_regressor(Box::new(ensemble));
    model
        .train(&dataset.x_train, &dataset.v_train, 1, &SplitRatios::default(), 0)
        .unwrap();

    let mut group = c.benchmark_group("predict");
    group.sample_size(10);
    group.bench_function("predict-with-uncertainty-100-draws", |b| {
        b.iter(|| black_box(model.predict_with_uncertainty(&dataset.x_test, 100).unwrap()))
    });
    group.bench_function("predict-heavy", |b| {
        b.iter(|| black_box(model.predict_heavy(&dataset.x_train).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, criterion_predict);
criterion_main!(benches);
