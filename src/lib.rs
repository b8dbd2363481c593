//! This library implements non-intrusive reduced-order models (ROM) of parametric,
//! possibly time-dependent, fields computed by an expensive high-fidelity solver.
//!
//! A [PodModel] chains the following steps:
//! * sampling of the parameters space with a latin hypercube ([podrom_doe]),
//! * generation of the snapshots of the high-fidelity solution ([SnapshotGenerator]),
//! * extraction of a Proper Orthogonal Decomposition basis of the snapshots ([podrom_pod]),
//! * training of a [regressor] mapping the inputs `(t, mu)` to the POD coefficients,
//! * prediction of full fields with their uncertainty, estimated by Monte-Carlo
//!   draws of stochastic regressors plus the POD residual.
//!
//! Datasets, basis and trained regressors are checkpointed in a results directory
//! so that a model can be reloaded with [PodModel::load].
//!
//! # Example
//!
//! ```no_run
//! use podrom::{DatasetParams, LinearRegressor, Mesh, PodModel, PodParams, SplitRatios};
//! use ndarray::{array, Array2, ArrayView1, ArrayView2};
//!
//! // u(x, mu) = mu_0 * exp(-x / mu_1) over [0, 1]
//! let u = |x: &ArrayView2<f64>, _t: f64, mu: &ArrayView1<f64>| -> Array2<f64> {
//!     x.mapv(|xi| mu[0] * (-xi / mu[1]).exp())
//! };
//! let mesh = Mesh::linear((0., 1., 100), None, None).unwrap();
//! let mut model = PodModel::new("target/rom", 1, mesh, 0).unwrap().seed(42);
//!
//! let params = DatasetParams::new(&array![1., 0.5], &array![2., 1.], 200)
//!     .pod(PodParams::new(1e-6));
//! let dataset = model.generate_dataset(&u, &params).unwrap();
//!
//! model.set_regressor(Box::new(LinearRegressor::params().build().unwrap()));
//! let logs = model
//!     .train(&dataset.x_train, &dataset.v_train, 1, &SplitRatios::default(), 1)
//!     .unwrap();
//! println!("{:?}", logs.last());
//!
//! let (mean, std) = model.predict_with_uncertainty(&dataset.x_test, 100).unwrap();
//! ```
//!
//! Logging goes through the [log](https://docs.rs/log) facade, plug a logger
//! implementation such as `env_logger` to see training progress.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod dataset;
mod errors;
mod field;
mod mesh;
pub mod metrics;
mod model;
mod parameters;
mod persistence;
pub mod regressor;
mod snapshots;
mod utils;

pub use dataset::PodDataset;
pub use errors::*;
pub use field::FieldDescriptor;
pub use mesh::{AxisSpec, Mesh};
pub use model::*;
pub use parameters::*;
pub use persistence::BasisTag;
pub use regressor::{EnsembleRegressor, LinearRegressor, MlpRegressor, Regressor};
pub use snapshots::*;

pub use podrom_doe::{Lhs, LhsKind, SamplingMethod};
pub use podrom_pod::{PodBasis, PodParams};
