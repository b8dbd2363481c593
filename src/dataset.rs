use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Training and test data of a reduced-order model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PodDataset {
    /// (n_train, n_d) regression inputs
    pub x_train: Array2<f64>,
    /// (n_train, n_L) POD coefficients
    pub v_train: Array2<f64>,
    /// (n_h, n_train) snapshots
    pub u_train: Array2<f64>,
    /// (n_test, n_d) regression inputs
    pub x_test: Array2<f64>,
    /// (n_test, n_L) POD coefficients
    pub v_test: Array2<f64>,
    /// (n_h, n_test) snapshots
    pub u_test: Array2<f64>,
}

impl PodDataset {
    /// Number of training rows
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    /// Number of test rows
    pub fn n_test(&self) -> usize {
        self.x_test.nrows()
    }
}

/// Rows of `a` at `indices`
pub(crate) fn select_rows(a: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    a.select(Axis(0), indices)
}
