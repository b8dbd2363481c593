//! This library implements the [Proper Orthogonal Decomposition](https://en.wikipedia.org/wiki/Proper_orthogonal_decomposition)
//! (POD) of a snapshots matrix, that is the extraction of a low-rank orthonormal basis
//! capturing most of the energy of a set of high-dimensional full fields, as well as
//! the parallel kernels used to go back and forth between the full field space and
//! the coefficient space spanned by the basis.
//!
//! Basis extraction is parameterized by [PodParams] and produces a [PodBasis]:
//!
//! ```
//! use podrom_pod::PodParams;
//! use ndarray::array;
//!
//! // three snapshots of a field described by four degrees of freedom
//! let u = array![[1., 2., 3.], [2., 4., 6.], [0., 0., 0.], [1., 2., 3.1]];
//! let pod = PodParams::new(1e-3).extract(&u).unwrap();
//! assert_eq!(pod.n_l(), 1);
//! let v = pod.project(&u).unwrap();
//! let u_pod = pod.reconstruct(&v).unwrap();
//! ```
//!
//! An incremental strategy (see [PodParams::init_tolerance]) reduces trajectory blocks
//! independently before merging them. It is experimental and only used when explicitly requested.
//!
//! The [kernels] module provides streaming mean/standard deviation estimation over
//! ensembles of reconstructed fields.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod basis;
mod errors;
pub mod kernels;
mod parameters;

pub use basis::*;
pub use errors::*;
pub use kernels::{accumulate, accumulate_t, mean_std, Moments};
pub use parameters::*;
