use ndarray::{array, s, Array2, ArrayView1, ArrayView2};
use podrom::metrics::re_s;
use podrom::{
    DatasetParams, EnsembleRegressor, FileFormat, Mesh, MlpRegressor, PodModel, PodParams, Result,
    SplitRatios,
};

/// 1D advected gaussian bump: the center moves at speed mu_0, the width is mu_1
fn bump(x: &ArrayView2<f64>, t: f64, mu: &ArrayView1<f64>) -> Array2<f64> {
    let center = 0.2 + mu[0] * t;
    x.mapv(|xi| (-(xi - center).powi(2) / (2. * mu[1] * mu[1])).exp())
}

fn main() -> Result<()> {
    let mesh = Mesh::linear((0., 1., 200), None, None)?;
    let mut model = PodModel::new("target/demos/unsteady_rom", 1, mesh, 20)?.seed(42);

    let params = DatasetParams::new(&array![0.2, 0.05], &array![0.5, 0.1], 60)
        .time_range(0., 1.)
        .split(SplitRatios::new(0.7, 0.15, 0.15))
        .pod(PodParams::new(1e-6))
        .format(FileFormat::Json);
    let dataset = model.generate_dataset(&bump, &params)?;
    println!("POD basis with {:?} modes", model.n_l());

    let ensemble = EnsembleRegressor::params()
        .n_members(5)
        .build(Box::new(MlpRegressor::params().hidden(32).build()?))?;
    model.set_regressor(Box::new(ensemble));
    let logs = model.train(
        &dataset.x_train,
        &dataset.v_train,
        2000,
        &SplitRatios::new(0.7, 0.15, 0.15),
        500,
    )?;
    if let Some(last) = logs.last() {
        println!("Last training log: {last:?}");
    }

    let (mean, std) = model.predict_with_uncertainty(&dataset.x_test, 50)?;
    println!("Test relative error: {:e}", re_s(&dataset.u_test, &mean));
    let first = model.restruct_single(&std.slice(s![.., ..20]))?;
    println!("Max std of the first test trajectory: {}", first.fold(0., |a: f64, &b| a.max(b)));
    Ok(())
}
