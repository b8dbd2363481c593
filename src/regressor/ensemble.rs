use crate::errors::{PodromError, Result};
use crate::metrics::mse;
use crate::regressor::{Logger, Regressor};
use linfa::ParamGuard;
use log::debug;
use ndarray::{Array2, ArrayView2, Axis};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A set of validated ensemble parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnsembleValidParams {
    /// number of members
    n_members: usize,
    /// whether members are trained on bootstrap resamples of the data
    bootstrap: bool,
    /// seed of members seeds and resamples
    seed: u64,
}

impl Default for EnsembleValidParams {
    fn default() -> Self {
        EnsembleValidParams {
            n_members: 5,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl EnsembleValidParams {
    /// Get number of members
    pub fn n_members(&self) -> usize {
        self.n_members
    }

    /// Whether members are trained on bootstrap resamples
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Get seed
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Ensemble parameters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnsembleParams(EnsembleValidParams);

impl EnsembleParams {
    /// Set number of members
    pub fn n_members(mut self, n_members: usize) -> Self {
        self.0.n_members = n_members;
        self
    }

    /// Train members on bootstrap resamples (default) or on the whole data
    pub fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.0.bootstrap = bootstrap;
        self
    }

    /// Set seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }

    /// Checks parameters and returns an untrained ensemble of `template` replicas
    pub fn build(self, template: Box<dyn Regressor>) -> Result<EnsembleRegressor> {
        Ok(EnsembleRegressor::new(template, self.check()?))
    }
}

impl ParamGuard for EnsembleParams {
    type Checked = EnsembleValidParams;
    type Error = PodromError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        if self.0.n_members == 0 {
            return Err(PodromError::InvalidValueError(
                "ensemble should have at least one member".to_string(),
            ));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Ensemble of independently trained replicas of a template regressor.
///
/// The prediction is the members mean while a sample is the prediction
/// of a randomly chosen member, the spread of the members giving the
/// regression uncertainty.
#[derive(Serialize, Deserialize)]
pub struct EnsembleRegressor {
    params: EnsembleValidParams,
    template: Box<dyn Regressor>,
    members: Vec<Box<dyn Regressor>>,
}

impl EnsembleRegressor {
    /// Default parameters
    pub fn params() -> EnsembleParams {
        EnsembleParams::default()
    }

    /// Untrained ensemble with given parameters
    pub fn new(template: Box<dyn Regressor>, params: EnsembleValidParams) -> Self {
        EnsembleRegressor {
            params,
            template,
            members: Vec::new(),
        }
    }

    /// Trained members
    pub fn members(&self) -> &[Box<dyn Regressor>] {
        &self.members
    }

    fn check_trained(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(PodromError::RegressorError(format!("{self} is not trained")));
        }
        Ok(())
    }
}

impl fmt::Display for EnsembleRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ensemble({}x{})", self.params.n_members, self.template)
    }
}

#[typetag::serde]
impl Regressor for EnsembleRegressor {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &ArrayView2<f64>, epochs: usize, logger: &mut Logger) -> Result<()> {
        let n = x.nrows();
        if n != y.nrows() || n == 0 {
            return Err(PodromError::ShapeError(format!(
                "inputs and targets should have the same positive number of rows, got {} and {}",
                n,
                y.nrows()
            )));
        }
        let mut rng = Xoshiro256Plus::seed_from_u64(self.params.seed);
        let resamples: Vec<(u64, Vec<usize>)> = (0..self.params.n_members)
            .map(|_| {
                let seed = rng.gen::<u64>();
                let indices = if self.params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                (seed, indices)
            })
            .collect();
        let mut members: Vec<Box<dyn Regressor>> =
            resamples.iter().map(|(seed, _)| self.template.spawn(*seed)).collect();
        members
            .par_iter_mut()
            .zip(resamples.par_iter())
            .enumerate()
            .map(|(k, (member, (_, indices)))| {
                let xb = x.select(Axis(0), indices);
                let yb = y.select(Axis(0), indices);
                member.fit(&xb.view(), &yb.view(), epochs, &mut Logger::silent(epochs))?;
                debug!("Ensemble member {k} trained");
                Ok(())
            })
            .collect::<Result<Vec<_>>>()?;
        self.members = members;
        let loss = mse(&self.predict(x)?, y);
        logger.log_final(loss, &*self)
    }

    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        self.check_trained()?;
        let mut mean: Option<Array2<f64>> = None;
        for member in &self.members {
            let pred = member.predict(x)?;
            mean = Some(match mean {
                Some(acc) => acc + pred,
                None => pred,
            });
        }
        mean.map(|m| m / self.members.len() as f64)
            .ok_or_else(|| PodromError::RegressorError(format!("{self} is not trained")))
    }

    fn predict_sample(&self, x: &ArrayView2<f64>, rng: &mut Xoshiro256Plus) -> Result<Array2<f64>> {
        self.check_trained()?;
        let k = rng.gen_range(0..self.members.len());
        self.members[k].predict(x)
    }

    fn is_stochastic(&self) -> bool {
        true
    }

    fn spawn(&self, seed: u64) -> Box<dyn Regressor> {
        let mut params = self.params.clone();
        params.seed = seed;
        Box::new(EnsembleRegressor::new(self.template.spawn(seed), params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regressor::{LinearRegressor, MlpRegressor};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    fn data() -> (Array2<f64>, Array2<f64>) {
        let x = Array::linspace(0., 1., 20).insert_axis(Axis(1));
        let y = x.mapv(|v: f64| (3. * v).sin());
        (x, y)
    }

    #[test]
    fn test_ensemble_mean_and_samples() {
        let (x, y) = data();
        let mut ensemble = EnsembleRegressor::params()
            .n_members(4)
            .seed(0)
            .build(Box::new(LinearRegressor::params().build().unwrap()))
            .unwrap();
        ensemble.fit(&x.view(), &y.view(), 1, &mut Logger::silent(1)).unwrap();
        assert_eq!(ensemble.members().len(), 4);
        assert!(ensemble.is_stochastic());

        let xtest = array![[0.1], [0.9]];
        let preds: Vec<Array2<f64>> = ensemble
            .members()
            .iter()
            .map(|m| m.predict(&xtest.view()).unwrap())
            .collect();
        let mean = preds.iter().fold(Array2::zeros((2, 1)), |acc, p| acc + p) / 4.;
        assert_abs_diff_eq!(ensemble.predict(&xtest.view()).unwrap(), mean, epsilon = 1e-12);

        let mut rng = Xoshiro256Plus::seed_from_u64(1);
        for _ in 0..10 {
            let sample = ensemble.predict_sample(&xtest.view(), &mut rng).unwrap();
            assert!(preds.iter().any(|p| (p - &sample).mapv(f64::abs).sum() < 1e-14));
        }
    }

    #[test]
    fn test_ensemble_reproducible() {
        let (x, y) = data();
        let template = MlpRegressor::params().hidden(3).build().unwrap();
        let mut e1 = EnsembleRegressor::params().n_members(3).build(Box::new(template)).unwrap();
        let mut e2 = e1.spawn(42);
        e1.fit(&x.view(), &y.view(), 30, &mut Logger::silent(30)).unwrap();
        e2.fit(&x.view(), &y.view(), 30, &mut Logger::silent(30)).unwrap();
        assert_abs_diff_eq!(
            e1.predict(&x.view()).unwrap(),
            e2.predict(&x.view()).unwrap(),
            epsilon = 0.
        );
        assert!(EnsembleRegressor::params()
            .n_members(0)
            .build(Box::new(LinearRegressor::params().build().unwrap()))
            .is_err());
    }
}
