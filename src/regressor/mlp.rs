use crate::errors::{PodromError, Result};
use crate::regressor::{Logger, Regressor};
use crate::utils::NormalizedData;
use linfa::ParamGuard;
use ndarray::{Array1, Array2, ArrayView2, Axis, Zip};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};
use std::fmt;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// A set of validated MLP regressor parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpValidParams {
    /// number of hidden units
    hidden: usize,
    /// Adam learning rate
    learning_rate: f64,
    /// L2 penalty on the weights
    lambda: f64,
    /// weights initialization seed
    seed: u64,
}

impl Default for MlpValidParams {
    fn default() -> Self {
        MlpValidParams {
            hidden: 32,
            learning_rate: 1e-2,
            lambda: 0.,
            seed: 42,
        }
    }
}

impl MlpValidParams {
    /// Get number of hidden units
    pub fn hidden(&self) -> usize {
        self.hidden
    }

    /// Get learning rate
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Get L2 penalty
    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Get initialization seed
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// MLP regressor parameters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MlpParams(MlpValidParams);

impl MlpParams {
    /// Set number of hidden units
    pub fn hidden(mut self, hidden: usize) -> Self {
        self.0.hidden = hidden;
        self
    }

    /// Set Adam learning rate
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.0.learning_rate = learning_rate;
        self
    }

    /// Set L2 penalty on the weights
    pub fn lambda(mut self, lambda: f64) -> Self {
        self.0.lambda = lambda;
        self
    }

    /// Set weights initialization seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }

    /// Checks parameters and returns an untrained regressor
    pub fn build(self) -> Result<MlpRegressor> {
        Ok(MlpRegressor::new(self.check()?))
    }
}

impl ParamGuard for MlpParams {
    type Checked = MlpValidParams;
    type Error = PodromError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let p = &self.0;
        if p.hidden == 0 {
            return Err(PodromError::InvalidValueError(
                "number of hidden units should be positive".to_string(),
            ));
        }
        if !(p.learning_rate > 0. && p.learning_rate.is_finite()) {
            return Err(PodromError::InvalidValueError(format!(
                "learning rate should be positive, got {}",
                p.learning_rate
            )));
        }
        if !(p.lambda >= 0. && p.lambda.is_finite()) {
            return Err(PodromError::InvalidValueError(format!(
                "L2 penalty should be non negative, got {}",
                p.lambda
            )));
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Weights of the `x -> tanh(x.W1 + b1).W2 + b2` network
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Network {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

impl Network {
    /// Xavier uniform initialization, zero biases
    fn init(n_in: usize, n_hidden: usize, n_out: usize, rng: &mut Xoshiro256Plus) -> Self {
        let l1 = (6. / (n_in + n_hidden) as f64).sqrt();
        let l2 = (6. / (n_hidden + n_out) as f64).sqrt();
        Network {
            w1: Array2::random_using((n_in, n_hidden), Uniform::new(-l1, l1), rng),
            b1: Array1::zeros(n_hidden),
            w2: Array2::random_using((n_hidden, n_out), Uniform::new(-l2, l2), rng),
            b2: Array1::zeros(n_out),
        }
    }

    fn zeros_like(&self) -> Self {
        Network {
            w1: Array2::zeros(self.w1.raw_dim()),
            b1: Array1::zeros(self.b1.raw_dim()),
            w2: Array2::zeros(self.w2.raw_dim()),
            b2: Array1::zeros(self.b2.raw_dim()),
        }
    }

    /// Returns hidden activations and outputs
    fn forward(&self, x: &ArrayView2<f64>) -> (Array2<f64>, Array2<f64>) {
        let hidden = (x.dot(&self.w1) + &self.b1).mapv(f64::tanh);
        let out = hidden.dot(&self.w2) + &self.b2;
        (hidden, out)
    }

    /// Mean squared error loss (plus L2 penalty) and its gradient
    fn loss_grad(&self, x: &ArrayView2<f64>, y: &ArrayView2<f64>, lambda: f64) -> (f64, Network) {
        let (hidden, out) = self.forward(x);
        let residual = out - y;
        let n = residual.len() as f64;
        let penalty = lambda * (self.w1.mapv(|w| w * w).sum() + self.w2.mapv(|w| w * w).sum());
        let loss = residual.mapv(|r| r * r).sum() / n + penalty;

        let d_out = residual * (2. / n);
        let w2 = hidden.t().dot(&d_out) + &self.w2 * (2. * lambda);
        let b2 = d_out.sum_axis(Axis(0));
        let mut d_hidden = d_out.dot(&self.w2.t());
        Zip::from(&mut d_hidden).and(&hidden).for_each(|d, &h| *d *= 1. - h * h);
        let w1 = x.t().dot(&d_hidden) + &self.w1 * (2. * lambda);
        let b1 = d_hidden.sum_axis(Axis(0));
        (loss, Network { w1, b1, w2, b2 })
    }
}

/// Adam first and second moments estimates
struct Adam {
    m: Network,
    v: Network,
    step: i32,
}

impl Adam {
    fn new(net: &Network) -> Self {
        Adam {
            m: net.zeros_like(),
            v: net.zeros_like(),
            step: 0,
        }
    }

    fn update(&mut self, net: &mut Network, grad: &Network, lr: f64) {
        self.step += 1;
        let c1 = 1. - BETA1.powi(self.step);
        let c2 = 1. - BETA2.powi(self.step);
        let update2 = |p: &mut Array2<f64>, m: &mut Array2<f64>, v: &mut Array2<f64>, g: &Array2<f64>| {
            Zip::from(p).and(m).and(v).and(g).for_each(|p, m, v, &g| {
                *m = BETA1 * *m + (1. - BETA1) * g;
                *v = BETA2 * *v + (1. - BETA2) * g * g;
                *p -= lr * (*m / c1) / ((*v / c2).sqrt() + ADAM_EPS);
            });
        };
        let update1 = |p: &mut Array1<f64>, m: &mut Array1<f64>, v: &mut Array1<f64>, g: &Array1<f64>| {
            Zip::from(p).and(m).and(v).and(g).for_each(|p, m, v, &g| {
                *m = BETA1 * *m + (1. - BETA1) * g;
                *v = BETA2 * *v + (1. - BETA2) * g * g;
                *p -= lr * (*m / c1) / ((*v / c2).sqrt() + ADAM_EPS);
            });
        };
        update2(&mut net.w1, &mut self.m.w1, &mut self.v.w1, &grad.w1);
        update1(&mut net.b1, &mut self.m.b1, &mut self.v.b1, &grad.b1);
        update2(&mut net.w2, &mut self.m.w2, &mut self.v.w2, &grad.w2);
        update1(&mut net.b2, &mut self.m.b2, &mut self.v.b2, &grad.b2);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct MlpState {
    x_norm: (Array1<f64>, Array1<f64>),
    y_norm: (Array1<f64>, Array1<f64>),
    network: Network,
}

/// One hidden layer perceptron with tanh activation trained by full-batch Adam
/// on standardized inputs and outputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MlpRegressor {
    params: MlpValidParams,
    state: Option<MlpState>,
}

impl MlpRegressor {
    /// Default parameters
    pub fn params() -> MlpParams {
        MlpParams::default()
    }

    /// Untrained regressor with given parameters
    pub fn new(params: MlpValidParams) -> Self {
        MlpRegressor { params, state: None }
    }
}

impl fmt::Display for MlpRegressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mlp(hidden={}, lr={}, lambda={})",
            self.params.hidden, self.params.learning_rate, self.params.lambda
        )
    }
}

#[typetag::serde]
impl Regressor for MlpRegressor {
    fn fit(&mut self, x: &ArrayView2<f64>, y: &ArrayView2<f64>, epochs: usize, logger: &mut Logger) -> Result<()> {
        if x.nrows() != y.nrows() || x.nrows() == 0 {
            return Err(PodromError::ShapeError(format!(
                "inputs and targets should have the same positive number of rows, got {} and {}",
                x.nrows(),
                y.nrows()
            )));
        }
        let xnorm = NormalizedData::new(x)?;
        let ynorm = NormalizedData::new(y)?;
        let mut rng = Xoshiro256Plus::seed_from_u64(self.params.seed);
        let network = Network::init(x.ncols(), self.params.hidden, y.ncols(), &mut rng);
        let mut adam = Adam::new(&network);
        let mut state = MlpState {
            x_norm: (xnorm.mean, xnorm.std),
            y_norm: (ynorm.mean, ynorm.std),
            network,
        };
        for epoch in 1..=epochs {
            let (loss, grad) = state
                .network
                .loss_grad(&xnorm.data.view(), &ynorm.data.view(), self.params.lambda);
            if !loss.is_finite() {
                return Err(PodromError::RegressorError(format!(
                    "{self} training diverged at epoch {epoch}"
                )));
            }
            adam.update(&mut state.network, &grad, self.params.learning_rate);
            if logger.should_log(epoch) {
                self.state = Some(state.clone());
                logger.log_epoch(epoch, loss, &*self)?;
            }
        }
        self.state = Some(state);
        Ok(())
    }

    fn predict(&self, x: &ArrayView2<f64>) -> Result<Array2<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| PodromError::RegressorError(format!("{self} is not trained")))?;
        let (x_mean, x_std) = &state.x_norm;
        if x.ncols() != x_mean.len() {
            return Err(PodromError::ShapeError(format!(
                "inputs should have {} columns, got {}",
                x_mean.len(),
                x.ncols()
            )));
        }
        let xn = (x - x_mean) / x_std;
        let (_, out) = state.network.forward(&xn.view());
        let (y_mean, y_std) = &state.y_norm;
        Ok(out * y_std + y_mean)
    }

    fn spawn(&self, seed: u64) -> Box<dyn Regressor> {
        let mut params = self.params.clone();
        params.seed = seed;
        Box::new(MlpRegressor::new(params))
    }
}
