use crate::errors::{PodromError, Result};
use crate::metrics::mse;
use crate::regressor::{Logger, Regressor};
use crate::utils::NormalizedData;
use linfa::ParamGuard;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nugget added to the normal equations diagonal to improve numerical stability
const NUGGET: f64 = 1e-12;

/// A set of validated linear regressor parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressorValidParams {
    /// ridge penalty
    alpha: f64,
}

impl Default for LinearRegressorValidParams {
    fn default() -> Self {
        LinearRegressorValidParams { alpha: 1e-8 }
    }
}

impl LinearRegressorValidParams {
    /// Get ridge penalty
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

/// Linear regressor parameters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearRegressorParams(LinearRegressorValidParams);

impl LinearRegressorParams {
    /// Set ridge penalty
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.0.alpha = alpha;
        self
    }

    /// Checks parameters and returns an untrained regressor
    pub fn build(self) -> Result<LinearRegressor> {
        Ok(LinearRegressor::new(self.check()?))
    }
}

impl ParamGuard for LinearRegressorParams {
    type Checked = LinearRegressorValidParams;
    type Error = PodromError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if !(self.0.alpha >= 0. && self.0.alpha.is_finite()) {
            return Err(PodromError::InvalidValueError(format!(
                "ridge penalty should be a non negative number, got {}",
                self.0.alpha
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct LinearState {
    x_mean: Array1<f64>,
    x_std: Array1<f64>,
    y_mean: Array1<f64>,
    /// (n_d, n_L) coefficients on standardized inputs
    weights: Array2<f64>,
}

/// Ridge least squares regression `y = y_mean + ((x - x_mean) / x_std).W`
/// where `W` solves `(X^T.X + alpha.I).W = X^T.(y - y_mean)` by Cholesky factorization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressor {
    params: LinearRegressorValidParams,
    state: Option<LinearState>,
}

impl LinearRegressor {
    /// Default parameters
    pub fn params() -> LinearRegressorParams {
        LinearRegressorParams::default()
    }

    /// Untrained regressor with given parameters
    pub fn new(params: LinearRegressorValidParams) -> Self {
        LinearRegressor { params, state: None }
    }

    /// (n_d, n_L) coefficients on standardized inputs once trained
    pub fn weights(&self) -> Option<&Array2<f64>> {
        self.state.as_ref().map(|s| &s.weights)
    }
}

impl fmt::Display for LinearRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Linear(alpha={})", self.params.alpha)
    }
}

#[typetag::serde]
impl Regressor for LinearRegressor {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &ArrayView2<f64>, _epochs: usize, logger: &mut Logger) -> Result<()> {
        if x.nrows() != y.nrows() || x.nrows() == 0 {
            return Err(PodromError::ShapeError(format!(
                "inputs and targets should have the same positive number of rows, got {} and {}",
                x.nrows(),
                y.nrows()
            )));
        }
        let xnorm = NormalizedData::new(x)?;
        let y_mean = y
            .mean_axis(Axis(0))
            .ok_or_else(|| PodromError::ShapeError("empty targets".to_string()))?;
        let yc = y - &y_mean;
        let n_d = x.ncols();
        let a = xnorm.data.t().dot(&xnorm.data) + Array2::<f64>::eye(n_d) * (self.params.alpha + NUGGET);
        let b = xnorm.data.t().dot(&yc);
        let chol = a.cholesky()?;
        let z = chol.solve_triangular(&b, UPLO::Lower)?;
        let weights = chol.t().solve_triangular(&z, UPLO::Upper)?;
        self.state = Some(LinearState {
            x_mean: xnorm.mean,
            x_std: xnorm.std,
            y_mean,
            weights,
        });
        let loss = mse(&self.predict(x)?, y);
        logger.log_final(loss, &*self)
    }

    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PodromError::RegressorError(format!("{self} is not trained")))?;
        if x.ncols() != state.x_mean.len() {
            return Err(PodromError::ShapeError(format!(
                "inputs should have {} columns, got {}",
                state.x_mean.len(),
                x.ncols()
            )));
        }
        let xn = (x - &state.x_mean) / &state.x_std;
        Ok(xn.dot(&state.weights) + &state.y_mean)
    }

    fn spawn(&self, _seed: u64) -> Box<dyn Regressor> {
        Box::new(LinearRegressor::new(self.params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_linear_fit_exact() {
        let x = array![[0., 1.], [1., 0.], [2., 3.], [3., 1.], [4., 4.]];
        // y0 = 1 + 2 x0 - x1, y1 = -3 x1
        let y = array![[0., -3.], [3., 0.], [2., -9.], [6., -3.], [5., -12.]];
        let mut regressor = LinearRegressor::params().alpha(0.).build().unwrap();
        let mut logger = Logger::new(1, 1);
        regressor.fit(&x.view(), &y.view(), 1, &mut logger).unwrap();
        assert_eq!(logger.logs().len(), 1);
        assert!(logger.logs()[0].loss < 1e-12);
        let pred = regressor.predict(&array![[10., -1.]].view()).unwrap();
        assert_abs_diff_eq!(pred, array![[22., 3.]], epsilon = 1e-8);
        assert!(!regressor.is_stochastic());
    }

    #[test]
    fn test_linear_errors() {
        let regressor = LinearRegressor::params().build().unwrap();
        assert!(matches!(
            regressor.predict(&array![[1.]].view()),
            Err(PodromError::RegressorError(_))
        ));
        assert!(LinearRegressor::params().alpha(-1.).build().is_err());
        let mut regressor = regressor;
        let res = regressor.fit(
            &array![[1.], [2.]].view(),
            &array![[1.]].view(),
            1,
            &mut Logger::silent(1),
        );
        assert!(matches!(res, Err(PodromError::ShapeError(_))));
    }
}
