use crate::errors::{DoeError, Result};
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};

/// Sampling method allowing to generate a DoE in a given sample space
///
/// A sampling method is able to generate a set of `ns` samples in a given sample space.
/// where the sample space is defined by `[lower_bound_xi, upper_bound_xi]^nx`
/// within `R^nx` where `nx` is the dimension of the sample space: x = (x_i) with i in [1, nx].
pub trait SamplingMethod<F: Float> {
    /// Returns the bounds of the sample space
    ///
    /// # Returns
    ///
    /// * A (nx, 2) matrix where the ith row is the interval of the ith components of a sample.
    fn sampling_space(&self) -> &Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[0., 1.]^nx`
    ///
    /// # Parameters
    ///
    /// * `ns`: number of samples
    ///
    /// # Returns
    ///
    /// * A (ns, nx) matrix of samples where nx is the dimension of the sample space
    ///   each sample belongs to `[0., 1.]^nx` hypercube
    fn normalized_sample(&self, ns: usize) -> Array2<F>;

    /// Generates a (ns, nx)-shaped array of samples belonging to `[lower_bound_xi, upper_bound_xi]^nx`
    ///
    /// # Parameters
    ///
    /// * `ns`: number of samples
    ///
    /// # Returns
    ///
    /// * A (ns, nx) matrix where nx is the dimension of the sample space.
    ///   each sample belongs to `[lower_bound_xi, upper_bound_xi]^nx` where bounds
    ///   are defined as returned values of `sampling_space` function.
    fn sample(&self, ns: usize) -> Array2<F> {
        let xlimits = self.sampling_space();
        let lower = xlimits.column(0);
        let scaler = &xlimits.column(1) - &lower;
        self.normalized_sample(ns) * scaler + lower
    }
}

/// Checks a (nx, 2) design space: two columns and `lower <= upper` on every row.
pub fn check_xlimits<F: Float>(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
    if xlimits.ncols() != 2 {
        return Err(DoeError::ShapeError(format!(
            "xlimits must have 2 columns (lower, upper), got {}",
            xlimits.ncols()
        )));
    }
    let mut bad = None;
    Zip::indexed(xlimits.column(0))
        .and(xlimits.column(1))
        .for_each(|i, lo, up| {
            if bad.is_none() && !(*lo <= *up) {
                bad = Some(i);
            }
        });
    match bad {
        Some(i) => Err(DoeError::InvalidBounds(format!(
            "lower bound {} of component {i} is not lower than or equal to upper bound {}",
            xlimits[[i, 0]],
            xlimits[[i, 1]]
        ))),
        None => Ok(()),
    }
}
