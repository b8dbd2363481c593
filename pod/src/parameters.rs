use crate::errors::{PodError, Result};
use linfa::{Float, ParamGuard};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated POD parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct PodValidParams<F: Float> {
    /// Relative energy allowed to be discarded by the truncation
    pub(crate) tolerance: F,
    /// Explicit rank of the basis, bypasses the energy criterion when given
    pub(crate) rank: Option<usize>,
    /// Truncation tolerance of the per-block bases, enables the incremental strategy
    pub(crate) init_tolerance: Option<F>,
}

impl<F: Float> Default for PodValidParams<F> {
    fn default() -> PodValidParams<F> {
        PodValidParams {
            tolerance: F::cast(1e-10),
            rank: None,
            init_tolerance: None,
        }
    }
}

impl<F: Float> PodValidParams<F> {
    /// Get the truncation tolerance
    pub fn tolerance(&self) -> F {
        self.tolerance
    }

    /// Get the requested rank if any
    pub fn rank(&self) -> Option<usize> {
        self.rank
    }

    /// Get the per-block tolerance of the incremental strategy if enabled
    pub fn init_tolerance(&self) -> Option<F> {
        self.init_tolerance
    }

    /// Whether the incremental (block-wise) strategy is requested
    pub fn is_incremental(&self) -> bool {
        self.init_tolerance.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
/// The set of hyperparameters that can be specified for the
/// [POD basis extraction](crate::PodBasis).
pub struct PodParams<F: Float>(pub(crate) PodValidParams<F>);

impl<F: Float> Default for PodParams<F> {
    fn default() -> Self {
        Self(PodValidParams::default())
    }
}

impl<F: Float> PodParams<F> {
    /// A constructor for POD parameters given the truncation tolerance
    pub fn new(tolerance: F) -> PodParams<F> {
        Self(PodValidParams {
            tolerance,
            ..Default::default()
        })
    }

    /// Set the relative energy allowed to be discarded.
    ///
    /// The basis size is the smallest `n_L` such that
    /// `sum(sigma_i^2, i > n_L) / sum(sigma_i^2) < tolerance`.
    pub fn tolerance(mut self, tolerance: F) -> Self {
        self.0.tolerance = tolerance;
        self
    }

    /// Set an explicit basis size, the energy criterion is then skipped.
    /// `None` or `Some(0)` restores the energy criterion.
    pub fn rank(mut self, rank: Option<usize>) -> Self {
        self.0.rank = rank.filter(|&r| r > 0);
        self
    }

    /// Enable the experimental incremental strategy where each trajectory block
    /// is first reduced with `init_tolerance` before the merged bases are reduced
    /// with `tolerance`.
    pub fn init_tolerance(mut self, init_tolerance: Option<F>) -> Self {
        self.0.init_tolerance = init_tolerance;
        self
    }
}

impl<F: Float> From<PodValidParams<F>> for PodParams<F> {
    fn from(valid: PodValidParams<F>) -> Self {
        PodParams(valid)
    }
}

impl<F: Float> ParamGuard for PodParams<F> {
    type Checked = PodValidParams<F>;
    type Error = PodError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let tol = self.0.tolerance;
        if !(tol >= F::zero() && tol <= F::one()) {
            return Err(PodError::InvalidValueError(format!(
                "POD tolerance should be in [0, 1], got {tol}"
            )));
        }
        if let Some(init) = self.0.init_tolerance {
            if !(init >= F::zero() && init <= F::one()) {
                return Err(PodError::InvalidValueError(format!(
                    "POD block tolerance should be in [0, 1], got {init}"
                )));
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_params_check() {
        assert!(PodParams::new(1e-8).check().is_ok());
        assert!(PodParams::new(-1e-3).check().is_err());
        assert!(PodParams::new(2.).check().is_err());
        assert!(PodParams::new(1e-3)
            .init_tolerance(Some(f64::NAN))
            .check()
            .is_err());
    }

    #[test]
    fn test_pod_params_rank() {
        let params = PodParams::<f64>::default().rank(Some(0)).check().unwrap();
        assert_eq!(params.rank(), None);
        let params = PodParams::<f64>::default().rank(Some(3)).check().unwrap();
        assert_eq!(params.rank(), Some(3));
        assert!(!params.is_incremental());
    }
}
