//! Regression surrogates mapping regression inputs `(t, mu)` to POD coefficients.
//!
//! The reduced-order model only relies on the [Regressor] capability trait so any
//! surrogate can be plugged in. Trained regressors are persisted as json files,
//! the concrete type being recorded thanks to the [typetag](https://docs.rs/typetag) crate.
//!
//! Three adapters are provided:
//! * [LinearRegressor]: ridge least squares, deterministic,
//! * [MlpRegressor]: one hidden layer neural network trained with Adam, deterministic,
//! * [EnsembleRegressor]: bootstrap ensemble of any regressor, stochastic.
mod ensemble;
mod linear;
mod logger;
mod mlp;

pub use ensemble::*;
pub use linear::*;
pub use logger::*;
pub use mlp::*;

use crate::errors::Result;
use log::info;
use ndarray::{Array2, ArrayView2};
use rand_xoshiro::Xoshiro256Plus;
use std::fs;
use std::path::Path;

/// A trait for a regression surrogate of the POD coefficients
#[typetag::serde(tag = "type")]
pub trait Regressor: std::fmt::Display + Send + Sync {
    /// Trains the regressor on (n, n_d) inputs `x` and (n, n_L) targets `y`
    /// for the given number of `epochs` (closed form regressors ignore it),
    /// reporting progress to the `logger`.
    fn fit(&mut self, x: &ArrayView2<f64>, y: &ArrayView2<f64>, epochs: usize, logger: &mut Logger) -> Result<()>;

    /// Predicts (n, n_L) coefficients at (n, n_d) inputs
    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Draws one (n, n_L) coefficients sample at (n, n_d) inputs.
    ///
    /// Deterministic regressors return their prediction.
    fn predict_sample(&self, x: &ArrayView2<f64>, _rng: &mut Xoshiro256Plus) -> Result<Array2<f64>> {
        self.predict(x)
    }

    /// Whether [Regressor::predict_sample] draws random samples
    fn is_stochastic(&self) -> bool {
        false
    }

    /// Returns an untrained regressor with the same hyperparameters
    /// and its random generator seeded with `seed`.
    fn spawn(&self, seed: u64) -> Box<dyn Regressor>;
}

/// Saves the regressor in a json file
pub fn save<P: AsRef<Path>>(regressor: &dyn Regressor, path: P) -> Result<()> {
    let bytes = serde_json::to_vec(regressor)?;
    fs::write(path.as_ref(), bytes)?;
    info!("Regressor {} saved in {}", regressor, path.as_ref().display());
    Ok(())
}

/// Loads a regressor from a json file written by [save]
pub fn load<P: AsRef<Path>>(path: P) -> Result<Box<dyn Regressor>> {
    let data = fs::read(path.as_ref())?;
    let regressor: Box<dyn Regressor> = serde_json::from_slice(&data)?;
    info!("Regressor {} loaded from {}", regressor, path.as_ref().display());
    Ok(regressor)
}
