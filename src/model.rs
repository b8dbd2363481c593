use crate::dataset::{select_rows, PodDataset};
use crate::errors::{PodromError, Result};
use crate::field::FieldDescriptor;
use crate::mesh::Mesh;
use crate::metrics::{mse, re_s};
use crate::parameters::{ConvertParams, DatasetParams, FileFormat, SplitRatios};
use crate::persistence::{self, BasisTag, LoadedModel, ModelCheckpoint, SetupData, TrainData};
use crate::regressor::{Logger, Regressor, TrainingLogs, ValidationErrors};
use crate::snapshots::{HifiFunction, SnapshotGenerator};
use crate::utils::{column_bounds, random_split, tail_split};

use env_logger::{Builder, Env};
use linfa::ParamGuard;
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayBase, ArrayD, ArrayView2, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng};
use podrom_doe::{Lhs, LhsKind, SamplingMethod};
use podrom_pod::{accumulate, accumulate_t, Moments, PodBasis, PodParams};
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Env variable to set the log level of the model (default `info`)
pub const PODROM_LOG: &str = "PODROM_LOG";

fn init_logger() {
    let env = Env::new().filter_or(PODROM_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();
}

// Random streams derived from the model seed
const STREAM_LHS: usize = 0;
const STREAM_SPLIT: usize = 1;
const STREAM_NOISE: usize = 2;
const STREAM_TRAIN: usize = 3;
const STREAM_MC: usize = 4;
const STREAM_HEAVY: usize = 5;

/// Lifecycle of a [PodModel]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelState {
    /// No basis yet
    Uninitialized,
    /// Basis and dataset available
    DatasetReady,
    /// Regressor trained against the current basis
    Trained,
}

/// Mean and standard deviation of an ensemble of predicted fields
#[derive(Clone, Debug, PartialEq)]
pub enum FieldMoments {
    /// (n_h,) statistics of steady fields
    Steady {
        /// mean field
        mean: Array1<f64>,
        /// standard deviation field
        std: Array1<f64>,
    },
    /// (n_h, n_t) statistics of trajectories
    Unsteady {
        /// mean trajectory
        mean: Array2<f64>,
        /// standard deviation trajectory
        std: Array2<f64>,
    },
}

/// Reduced-order model of a parametric field: a POD basis compressing the field
/// and a regressor predicting the POD coefficients from `(t, mu)` inputs.
///
/// ```no_run
/// use podrom::{DatasetParams, LinearRegressor, Mesh, PodModel, SplitRatios};
/// use ndarray::{array, Array2, ArrayView1, ArrayView2};
///
/// let u = |x: &ArrayView2<f64>, _t: f64, mu: &ArrayView1<f64>| -> Array2<f64> {
///     x.mapv(|xi| mu[0] * xi + mu[1] * xi * xi)
/// };
/// let mesh = Mesh::linear((0., 1., 50), None, None).unwrap();
/// let mut model = PodModel::new("target/model", 1, mesh, 0).unwrap().seed(42);
/// let params = DatasetParams::new(&array![1., 1.], &array![2., 2.], 100);
/// let dataset = model.generate_dataset(&u, &params).unwrap();
/// model.set_regressor(Box::new(LinearRegressor::params().build().unwrap()));
/// model
///     .train(&dataset.x_train, &dataset.v_train, 1, &SplitRatios::default(), 1)
///     .unwrap();
/// let (mean, std) = model.predict_with_uncertainty(&dataset.x_test, 10).unwrap();
/// ```
pub struct PodModel {
    resdir: PathBuf,
    mesh: Mesh,
    field: FieldDescriptor,
    seed: u64,
    format: FileFormat,
    state: ModelState,
    pod: Option<PodBasis<f64>>,
    pod_sig: Option<Array1<f64>>,
    n_d: Option<usize>,
    input_bounds: Option<Array2<f64>>,
    regressor: Option<Box<dyn Regressor>>,
}

impl PodModel {
    /// Constructor of a model of `n_v` variables over the `mesh` nodes with
    /// `n_t` time steps (0 when steady).
    ///
    /// `resdir` is created if needed and the setup checkpoint is written.
    pub fn new<P: AsRef<Path>>(resdir: P, n_v: usize, mesh: Mesh, n_t: usize) -> Result<Self> {
        init_logger();
        let field = FieldDescriptor::new(n_v, mesh.n_xyz(), n_t)?;
        let model = Self::from_setup(resdir.as_ref(), mesh, field);
        fs::create_dir_all(&model.resdir)?;
        let setup = SetupData {
            n_v,
            mesh: model.mesh.clone(),
            n_t,
        };
        persistence::save(&setup, &model.resdir.join(persistence::SETUP_DATA_NAME), FileFormat::Json)?;
        Ok(model)
    }

    fn from_setup(resdir: &Path, mesh: Mesh, field: FieldDescriptor) -> Self {
        PodModel {
            resdir: resdir.to_path_buf(),
            mesh,
            field,
            seed: 0,
            format: FileFormat::default(),
            state: ModelState::Uninitialized,
            pod: None,
            pod_sig: None,
            n_d: None,
            input_bounds: None,
            regressor: None,
        }
    }

    /// Sets the seed of every random draw of the model
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Random generator of the given stream
    fn stream(&self, index: usize) -> Xoshiro256Plus {
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
        for _ in 0..index {
            rng.jump();
        }
        rng
    }

    /// Current state
    pub fn state(&self) -> ModelState {
        self.state
    }

    /// Results directory
    pub fn resdir(&self) -> &Path {
        &self.resdir
    }

    /// Spatial mesh
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Field description
    pub fn field(&self) -> &FieldDescriptor {
        &self.field
    }

    /// POD basis once extracted
    pub fn basis(&self) -> Option<&PodBasis<f64>> {
        self.pod.as_ref()
    }

    /// Number of POD modes once extracted
    pub fn n_l(&self) -> Option<usize> {
        self.pod.as_ref().map(|pod| pod.n_l())
    }

    /// Number of regression inputs once known
    pub fn n_d(&self) -> Option<usize> {
        self.n_d
    }

    /// (n_h,) POD residual signature once extracted
    pub fn pod_sig(&self) -> Option<&Array1<f64>> {
        self.pod_sig.as_ref()
    }

    /// (n_d, 2) bounds of the training inputs once known
    pub fn input_bounds(&self) -> Option<&Array2<f64>> {
        self.input_bounds.as_ref()
    }

    /// Installed regressor
    pub fn regressor(&self) -> Option<&dyn Regressor> {
        self.regressor.as_deref()
    }

    /// Installs the regressor to be trained
    pub fn set_regressor(&mut self, regressor: Box<dyn Regressor>) {
        info!("Regressor {regressor} installed");
        self.regressor = Some(regressor);
        if self.state == ModelState::Trained {
            self.state = ModelState::DatasetReady;
        }
    }

    /// Latin hypercube sampling of `n_s` parameters between `mu_min` and `mu_max`
    pub fn sample_mu(
        &self,
        n_s: usize,
        mu_min: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        mu_max: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        kind: LhsKind,
    ) -> Result<Array2<f64>> {
        if mu_min.len() != mu_max.len() {
            return Err(PodromError::ShapeError(format!(
                "parameters bounds should have the same length, got {} and {}",
                mu_min.len(),
                mu_max.len()
            )));
        }
        let xlimits = ndarray::stack(Axis(1), &[mu_min.view(), mu_max.view()])
            .map_err(|err| PodromError::ShapeError(err.to_string()))?;
        let lhs = Lhs::try_new_with_rng(&xlimits, self.stream(STREAM_LHS))?.kind(kind);
        Ok(lhs.sample(n_s))
    }

    /// Regression inputs of `n_s` sampled parameters, used to run large
    /// prediction tasks without evaluating the high-fidelity solution.
    pub fn generate_hifi_inputs(
        &self,
        n_s: usize,
        mu_min: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        mu_max: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        t_min: f64,
        t_max: f64,
    ) -> Result<Array2<f64>> {
        let mu = self.sample_mu(n_s, mu_min, mu_max, LhsKind::default())?;
        Ok(SnapshotGenerator::new(&self.mesh, self.field).generate_inputs(&mu, t_min, t_max))
    }

    /// Generates a dataset from the high-fidelity function `u`: latin hypercube sampling
    /// of the parameters, train/test split of the samples, generation of the (noisy)
    /// training snapshots and noise-free test snapshots, POD basis extraction on
    /// the training snapshots and projection.
    ///
    /// The dataset is saved as training checkpoint, or loaded from it when `use_cache` is set.
    pub fn generate_dataset(&mut self, u: &impl HifiFunction, params: &DatasetParams) -> Result<PodDataset> {
        let params = params.check_ref()?;
        self.format = params.format();
        if params.use_cache() && persistence::find_train_data(&self.resdir, self.format).is_some() {
            info!("Reusing cached training data");
            return self.load_train_data();
        }
        let n_mu = params.mu_min().len();
        let n_d = if self.field.has_t() { n_mu + 1 } else { n_mu };
        let mu = self.sample_mu(params.n_s(), params.mu_min(), params.mu_max(), params.lhs_kind())?;
        let (train_idx, test_idx) = random_split(params.n_s(), params.split().test, &mut self.stream(STREAM_SPLIT))?;
        let mu_train = select_rows(&mu, &train_idx);
        let mu_test = select_rows(&mu, &test_idx);
        info!(
            "Generating dataset from {} training and {} test samples",
            mu_train.nrows(),
            mu_test.nrows()
        );

        let (t_min, t_max) = params.time_range();
        let (u_noise, x_noise) = params.noise();
        let noise_seed = self.stream(STREAM_NOISE).gen::<u64>();
        let train = SnapshotGenerator::new(&self.mesh, self.field)
            .seed(noise_seed)
            .noise(u_noise, x_noise)
            .generate(u, &mu_train, t_min, t_max)?;
        let (x_test, u_test) = if mu_test.nrows() > 0 {
            let test = SnapshotGenerator::new(&self.mesh, self.field).generate(u, &mu_test, t_min, t_max)?;
            (test.x_v, test.u)
        } else {
            (Array2::zeros((0, n_d)), Array2::zeros((self.field.n_h(), 0)))
        };

        let pod = self.extract_basis(params.pod(), &train.u)?;
        let v_train = pod.project(&train.u)?;
        let v_test = pod.project(&u_test)?;
        let pod_sig = pod.residual_signature(&train.u)?;
        let dataset = PodDataset {
            x_train: train.x_v,
            v_train,
            u_train: train.u,
            x_test,
            v_test,
            u_test,
        };
        self.install_dataset(pod, pod_sig, &dataset)?;
        self.save_train_data(&dataset)?;
        Ok(dataset)
    }

    /// Builds a dataset from externally computed fields: `u_mesh` is the
    /// (n_st * n_xyz, n_v) stack of the node values of each of the n_st snapshots,
    /// the ith snapshot corresponding to the ith row of the (n_st, n_d) inputs `x_v`.
    ///
    /// The basis is extracted from all the snapshots before a random train/test split
    /// of the inputs and coefficients, test fields being the reconstructed test coefficients.
    pub fn convert_dataset(
        &mut self,
        u_mesh: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        params: &ConvertParams,
    ) -> Result<PodDataset> {
        let params = params.check_ref()?;
        self.format = params.format();
        if params.use_cache() && persistence::find_train_data(&self.resdir, self.format).is_some() {
            info!("Reusing cached training data");
            return self.load_train_data();
        }
        let (n_v, n_xyz) = (self.field.n_v, self.field.n_xyz);
        let n_st = x_v.nrows();
        if u_mesh.dim() != (n_st * n_xyz, n_v) {
            return Err(PodromError::ShapeError(format!(
                "mesh values should be a ({}, {n_v}) array for {n_st} snapshots, got {:?}",
                n_st * n_xyz,
                u_mesh.dim()
            )));
        }
        let mut u = Array2::zeros((self.field.n_h(), n_st));
        for (i, mut col) in u.columns_mut().into_iter().enumerate() {
            let block = u_mesh.slice(s![i * n_xyz..(i + 1) * n_xyz, ..]);
            // variable-wise dof ordering
            col.assign(&Array1::from_iter(block.t().iter().copied()));
        }

        let pod = self.extract_basis(params.pod(), &u)?;
        let v = pod.project(&u)?;
        let pod_sig = pod.residual_signature(&u)?;
        let (train_idx, test_idx) = random_split(n_st, params.split().test, &mut self.stream(STREAM_SPLIT))?;
        let x_v = x_v.to_owned();
        let v_test = select_rows(&v, &test_idx);
        let u_test = pod.reconstruct(&v_test)?;
        let dataset = PodDataset {
            x_train: select_rows(&x_v, &train_idx),
            v_train: select_rows(&v, &train_idx),
            u_train: u.select(Axis(1), &train_idx),
            x_test: select_rows(&x_v, &test_idx),
            v_test,
            u_test,
        };
        self.install_dataset(pod, pod_sig, &dataset)?;
        if params.save_cache() {
            self.save_train_data(&dataset)?;
        }
        Ok(dataset)
    }

    /// Direct POD, or incremental POD over trajectories when requested for a time-dependent field
    fn extract_basis(&self, params: &PodParams<f64>, u: &Array2<f64>) -> Result<PodBasis<f64>> {
        let incremental = params.check_ref()?.is_incremental();
        let pod = if incremental && self.field.has_t() {
            params.extract_blocks(&self.field.to_blocks(u)?)?
        } else {
            if incremental {
                warn!("Incremental POD requires a time-dependent field, using direct POD");
            }
            params.extract(u)?
        };
        debug!("POD energy ratio: {}", pod.energy_ratio());
        Ok(pod)
    }

    fn install_dataset(&mut self, pod: PodBasis<f64>, pod_sig: Array1<f64>, dataset: &PodDataset) -> Result<()> {
        info!(
            "Dataset ready: n_L = {}, {} training and {} test rows",
            pod.n_l(),
            dataset.n_train(),
            dataset.n_test()
        );
        self.n_d = Some(dataset.x_train.ncols());
        self.input_bounds = Some(column_bounds(&dataset.x_train));
        self.pod = Some(pod);
        self.pod_sig = Some(pod_sig);
        self.state = ModelState::DatasetReady;
        Ok(())
    }

    /// Trains the regressor on (n, n_d) inputs `x_v` and (n, n_L) coefficients `v`.
    ///
    /// A validation part of fraction `val / (train + val)` is held out: randomly
    /// for steady fields, as the last trajectories for time-dependent fields.
    /// Errors on coefficients and on reconstructed fields are logged every `freq` epochs.
    /// The trained regressor is saved as model checkpoint.
    pub fn train(
        &mut self,
        x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        v: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        epochs: usize,
        split: &SplitRatios,
        freq: usize,
    ) -> Result<TrainingLogs> {
        if self.state == ModelState::Uninitialized {
            return Err(PodromError::StateError(
                "a dataset should be generated, converted or loaded before training".to_string(),
            ));
        }
        if self.regressor.is_none() {
            return Err(PodromError::StateError("no regressor installed".to_string()));
        }
        let (pod, n_d) = self.reduction()?;
        split.check()?;
        if x_v.nrows() != v.nrows() || x_v.ncols() != n_d || v.ncols() != pod.n_l() {
            return Err(PodromError::ShapeError(format!(
                "expected ({n}, {n_d}) inputs and ({n}, {}) coefficients, got {:?} and {:?}",
                pod.n_l(),
                x_v.dim(),
                v.dim(),
                n = x_v.nrows()
            )));
        }

        let val_fraction = split.val_fraction();
        let (fit_idx, val_idx) = if self.field.has_t() {
            tail_split(x_v.nrows(), self.field.n_t, val_fraction)?
        } else {
            random_split(x_v.nrows(), val_fraction, &mut self.stream(STREAM_TRAIN))?
        };
        let (x_v, v) = (x_v.to_owned(), v.to_owned());
        let (x_fit, v_fit) = (select_rows(&x_v, &fit_idx), select_rows(&v, &fit_idx));
        let (x_val, v_val) = (select_rows(&x_v, &val_idx), select_rows(&v, &val_idx));
        let u_fit = pod.reconstruct(&v_fit)?;
        let u_val = pod.reconstruct(&v_val)?;
        info!(
            "Training on {} rows, validating on {} rows for {epochs} epochs",
            x_fit.nrows(),
            x_val.nrows()
        );

        let mut logger = Logger::new(epochs, freq);
        logger.set_val_err_fn(|regressor: &dyn Regressor| {
            let v_fit_pred = regressor.predict(&x_fit.view())?;
            let u_fit_pred = pod.reconstruct(&v_fit_pred)?;
            let (mse_v, re_v) = if x_val.nrows() > 0 {
                let v_val_pred = regressor.predict(&x_val.view())?;
                let u_val_pred = pod.reconstruct(&v_val_pred)?;
                (Some(mse(&v_val, &v_val_pred)), Some(re_s(&u_val, &u_val_pred)))
            } else {
                (None, None)
            };
            Ok(ValidationErrors {
                mse: mse(&v_fit, &v_fit_pred),
                mse_v,
                re: re_s(&u_fit, &u_fit_pred),
                re_v,
            })
        });
        let regressor = self
            .regressor
            .as_mut()
            .ok_or_else(|| PodromError::StateError("no regressor installed".to_string()))?;
        regressor.fit(&x_fit.view(), &v_fit.view(), epochs, &mut logger)?;
        let logs = logger.into_logs();

        self.state = ModelState::Trained;
        self.save_model()?;
        Ok(logs)
    }

    /// Basis and number of inputs, cloned
    fn reduction(&self) -> Result<(PodBasis<f64>, usize)> {
        match (&self.pod, self.n_d) {
            (Some(pod), Some(n_d)) => Ok((pod.clone(), n_d)),
            _ => Err(PodromError::StateError("no POD basis available".to_string())),
        }
    }

    fn trained(&self) -> Result<(&PodBasis<f64>, &dyn Regressor)> {
        match (self.state, &self.pod, self.regressor.as_deref()) {
            (ModelState::Trained, Some(pod), Some(regressor)) => Ok((pod, regressor)),
            _ => Err(PodromError::StateError(format!(
                "model should be trained to predict, current state is {:?}",
                self.state
            ))),
        }
    }

    fn check_inputs(&self, x_v: &ArrayView2<f64>) -> Result<()> {
        if let Some(n_d) = self.n_d {
            if x_v.ncols() != n_d {
                return Err(PodromError::ShapeError(format!(
                    "inputs should have {n_d} columns, got {}",
                    x_v.ncols()
                )));
            }
        }
        if let Some(bounds) = &self.input_bounds {
            let outside = x_v
                .rows()
                .into_iter()
                .filter(|row| {
                    row.iter()
                        .zip(bounds.rows())
                        .any(|(x, b)| *x < b[0] || *x > b[1])
                })
                .count();
            if outside > 0 {
                warn!("{outside} inputs outside of the training bounds, extrapolating");
            }
        }
        Ok(())
    }

    /// Predicted (n, n_L) POD coefficients at (n, n_d) inputs
    pub fn predict_v(&self, x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array2<f64>> {
        let (pod, regressor) = self.trained()?;
        let x_v = x_v.view();
        self.check_inputs(&x_v)?;
        let v = regressor.predict(&x_v)?;
        check_coefficients(&v, x_v.nrows(), pod.n_l())?;
        Ok(v)
    }

    /// Predicted (n_h, n) fields at (n, n_d) inputs
    pub fn predict(&self, x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array2<f64>> {
        let (pod, _) = self.trained()?;
        Ok(pod.reconstruct(&self.predict_v(x_v)?)?)
    }

    /// One (n_h, n) random draw of the predicted fields
    pub fn predict_sample(
        &self,
        x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<Array2<f64>> {
        let (pod, regressor) = self.trained()?;
        let x_v = x_v.view();
        self.check_inputs(&x_v)?;
        let v = regressor.predict_sample(&x_v, rng)?;
        check_coefficients(&v, x_v.nrows(), pod.n_l())?;
        Ok(pod.reconstruct(&v)?)
    }

    /// Monte-Carlo estimation of the (n_h, n) mean and standard deviation of the
    /// predicted fields from `n_mc` random draws, the POD residual signature being
    /// added to the standard deviation.
    ///
    /// Draws are computed in parallel, each with its own random generator
    /// derived from the model seed.
    pub fn predict_with_uncertainty(
        &self,
        x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        n_mc: usize,
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        if n_mc == 0 {
            return Err(PodromError::InvalidValueError(
                "number of Monte-Carlo draws should be positive".to_string(),
            ));
        }
        let (pod, regressor) = self.trained()?;
        let x_v = x_v.view();
        self.check_inputs(&x_v)?;
        let pod_sig = self
            .pod_sig
            .clone()
            .unwrap_or_else(|| Array1::zeros(pod.n_h()))
            .insert_axis(Axis(1));
        if !regressor.is_stochastic() {
            debug!("Deterministic regressor, the predicted uncertainty is the POD residual only");
            let v = regressor.predict(&x_v)?;
            check_coefficients(&v, x_v.nrows(), pod.n_l())?;
            let mean = pod.reconstruct(&v)?;
            let std = Array2::zeros(mean.raw_dim()) + &pod_sig;
            return Ok((mean, std));
        }
        let mut rng = self.stream(STREAM_MC);
        let seeds: Vec<u64> = (0..n_mc).map(|_| rng.gen()).collect();
        let shape = (pod.n_h(), x_v.nrows());
        let moments = seeds
            .par_iter()
            .try_fold(
                || Moments::<f64, Ix2>::new(shape),
                |mut acc, seed| -> Result<Moments<f64, Ix2>> {
                    let mut rng = Xoshiro256Plus::seed_from_u64(*seed);
                    let v = regressor.predict_sample(&x_v, &mut rng)?;
                    check_coefficients(&v, x_v.nrows(), pod.n_l())?;
                    acc.add(&pod.reconstruct(&v)?);
                    Ok(acc)
                },
            )
            .try_reduce(|| Moments::new(shape), |a, b| Ok(a.merge(b)))?;
        let (mean, std) = moments.mean_std();
        Ok((mean, std + &pod_sig))
    }

    /// Mean and standard deviation of the fields predicted over a large set of inputs:
    /// one random draw per input, then reduction across inputs, by trajectory for
    /// time-dependent fields (the inputs being ordered as generated).
    pub fn predict_heavy(&self, x_v: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<FieldMoments> {
        let (pod, regressor) = self.trained()?;
        let x_v = x_v.view();
        self.check_inputs(&x_v)?;
        let v = regressor.predict_sample(&x_v, &mut self.stream(STREAM_HEAVY))?;
        check_coefficients(&v, x_v.nrows(), pod.n_l())?;
        if self.field.has_t() {
            let (mean, std) = accumulate_t(&v, pod.basis(), self.field.n_t)?.mean_std();
            Ok(FieldMoments::Unsteady { mean, std })
        } else {
            let (mean, std) = accumulate(&v, pod.basis())?.mean_std();
            Ok(FieldMoments::Steady { mean, std })
        }
    }

    /// Restructures (n_h, n_st) fields into (n_v, n_xyz, n_s) or (n_v, n_xyz, n_t, n_s)
    pub fn restruct(&self, u: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<ArrayD<f64>> {
        self.field.restruct(u)
    }

    /// Restructures the fields of one sample into (n_v, n_xyz) or (n_v, n_xyz, n_t)
    pub fn restruct_single(&self, u: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<ArrayD<f64>> {
        self.field.restruct_single(u)
    }

    /// Saves basis, residual signature, inputs bounds and dataset as training checkpoint
    pub fn save_train_data(&self, dataset: &PodDataset) -> Result<()> {
        let (pod, n_d) = self.reduction()?;
        let data = TrainData {
            n_l: pod.n_l(),
            n_d,
            pod,
            pod_sig: self.pod_sig.clone().unwrap_or_else(|| Array1::zeros(self.field.n_h())),
            input_bounds: self
                .input_bounds
                .clone()
                .unwrap_or_else(|| column_bounds(&dataset.x_train)),
            dataset: dataset.clone(),
        };
        let path = persistence::train_data_path(&self.resdir, self.format);
        persistence::save(&data, &path, self.format)
    }

    /// Loads the training checkpoint and returns its dataset
    pub fn load_train_data(&mut self) -> Result<PodDataset> {
        let (path, format) = persistence::find_train_data(&self.resdir, self.format).ok_or_else(|| {
            PodromError::MissingArtifactError(format!("can't find train data in {}", self.resdir.display()))
        })?;
        let data: TrainData = persistence::load(&path, format)?;
        if data.pod.n_h() != self.field.n_h() || data.pod.n_l() != data.n_l {
            return Err(PodromError::IncompatibleArtifact(format!(
                "training data basis is ({}, {}) while the model has n_h = {}",
                data.pod.n_h(),
                data.pod.n_l(),
                self.field.n_h()
            )));
        }
        self.format = format;
        self.n_d = Some(data.n_d);
        self.input_bounds = Some(data.input_bounds);
        self.pod = Some(data.pod);
        self.pod_sig = Some(data.pod_sig);
        self.state = ModelState::DatasetReady;
        Ok(data.dataset)
    }

    /// Saves the trained regressor tagged with the current basis
    pub fn save_model(&self) -> Result<()> {
        let (pod, regressor) = match (&self.pod, self.regressor.as_deref()) {
            (Some(pod), Some(regressor)) => (pod, regressor),
            _ => {
                return Err(PodromError::StateError(
                    "a basis and a regressor are required to save the model".to_string(),
                ))
            }
        };
        let checkpoint = ModelCheckpoint {
            basis_tag: BasisTag::new(pod.basis()),
            regressor,
        };
        persistence::save(&checkpoint, &self.resdir.join(persistence::MODEL_NAME), FileFormat::Json)
    }

    /// Loads the regressor checkpoint, the training data being loaded first.
    pub fn load_model(&mut self) -> Result<()> {
        let pod = self.pod.as_ref().ok_or_else(|| {
            PodromError::StateError("training data should be loaded before the model".to_string())
        })?;
        let loaded: LoadedModel = persistence::load(&self.resdir.join(persistence::MODEL_NAME), FileFormat::Json)?;
        let tag = BasisTag::new(pod.basis());
        if loaded.basis_tag != tag {
            return Err(PodromError::IncompatibleArtifact(format!(
                "regressor was trained against basis {:?} but the loaded basis is {:?}",
                loaded.basis_tag, tag
            )));
        }
        self.regressor = Some(loaded.regressor);
        self.state = ModelState::Trained;
        Ok(())
    }

    /// Recreates a trained model from the checkpoints of `resdir`
    pub fn load<P: AsRef<Path>>(resdir: P) -> Result<PodModel> {
        init_logger();
        let resdir = resdir.as_ref();
        let setup: SetupData =
            persistence::load(&resdir.join(persistence::SETUP_DATA_NAME), FileFormat::Json)?;
        let field = FieldDescriptor::new(setup.n_v, setup.mesh.n_xyz(), setup.n_t)?;
        let mut model = Self::from_setup(resdir, setup.mesh, field);
        model.load_train_data()?;
        model.load_model()?;
        info!("Model loaded from {}", resdir.display());
        Ok(model)
    }
}

/// Regressor outputs must have one row per input and one column per mode
fn check_coefficients(v: &Array2<f64>, n_rows: usize, n_l: usize) -> Result<()> {
    if v.dim() != (n_rows, n_l) {
        return Err(PodromError::ShapeError(format!(
            "regressor returned {:?} coefficients, expected ({n_rows}, {n_l})",
            v.dim()
        )));
    }
    Ok(())
}
