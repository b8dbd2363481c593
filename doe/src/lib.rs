/*!
This library implements the design of experiments used to train reduced-order models,
that is the [Latin Hypercube sampling](https://en.wikipedia.org/wiki/Latin_hypercube_sampling)
of the non-spatial parameters `mu` of a parametric field.

A DoE method is a way to generate a set of points (i.e. a DoE) within a design (or sample) space `xlimits`.
The design space is defined as a 2D ndarray `(nx, 2)`, specifying lower bound and upper bound
of each `nx` components of the samples `x`.

Example:
```
use podrom_doe::{Lhs, LhsKind, SamplingMethod};
use ndarray::arr2;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

// Design space is defined as [5., 10.] x [0., 1.], samples are 2-dimensional.
let xlimits = arr2(&[[5., 10.], [0., 1.]]);
// We generate five samples using centered Latin Hypercube sampling.
let samples = Lhs::new(&xlimits).kind(LhsKind::Centered).sample(5);
// or else with a random location within each stratum and a seeded generator
let samples = Lhs::new(&xlimits)
    .kind(LhsKind::Classic)
    .with_rng(Xoshiro256Plus::seed_from_u64(42))
    .sample(5);
```

Bounds given as separate `lower`/`upper` vectors are handled by [lhs_sample] which
checks their consistency.
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod errors;
mod lhs;
mod traits;

pub use errors::*;
pub use lhs::*;
pub use traits::*;
