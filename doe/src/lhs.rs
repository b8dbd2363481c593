use crate::errors::{DoeError, Result};
use crate::traits::check_xlimits;
use crate::SamplingMethod;
use linfa::Float;
use log::debug;
use ndarray::{stack, Array, Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2, Zip};
use ndarray_rand::{rand::seq::SliceRandom, rand::Rng, rand::SeedableRng};
use rand_xoshiro::Xoshiro256Plus;
use std::sync::{Arc, RwLock};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Kinds of Latin Hypercube Design
///
/// `Classic` draws each point uniformly inside its stratum while `Centered`
/// (default) picks the stratum midpoints.
#[derive(Clone, Debug, Default, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum LhsKind {
    /// sample is choosen randomly within its latin hypercube intervals
    Classic,
    /// sample is the middle of its latin hypercube intervals
    #[default]
    Centered,
}

type RngRef<R> = Arc<RwLock<R>>;

/// The LHS design is built as follows: each dimension space is divided into ns sections
/// where ns is the number of sampling points, and one point in selected in each section.
/// The selection method gives different kind of LHS (see [LhsKind]).
///
/// Strata are then randomly permuted dimension-wise to decorrelate the components.
/// Each dimension is processed in parallel with its own random stream derived
/// from the generator, the design only depends on the generator state.
#[derive(Clone, Debug)]
pub struct Lhs<F: Float, R: Rng> {
    /// Sampling space definition as a (nx, 2) matrix
    /// The ith row is the [lower_bound, upper_bound] of xi, the ith component of x
    xlimits: Array2<F>,
    /// The requested kind of LHS
    kind: LhsKind,
    /// Random generator used for reproducibility
    rng: RngRef<R>,
}

/// LHS with default random generator
impl<F: Float> Lhs<F, Xoshiro256Plus> {
    /// Constructor given a design space given a (nx, 2) matrix \[\[lower bound, upper bound\], ...\]
    ///
    /// ```
    /// use podrom_doe::Lhs;
    /// use ndarray::arr2;
    ///
    /// let doe = Lhs::new(&arr2(&[[0.0, 1.0], [5.0, 10.0]]));
    /// ```
    ///
    /// **Panics** if xlimits is not a valid design space, see [Lhs::try_new].
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Self {
        Self::new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }

    /// Fallible constructor: xlimits must have 2 columns and lower bounds
    /// lower than or equal to upper bounds.
    pub fn try_new(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        Self::try_new_with_rng(xlimits, Xoshiro256Plus::from_entropy())
    }
}

impl<F: Float, R: Rng> SamplingMethod<F> for Lhs<F, R> {
    fn sampling_space(&self) -> &Array2<F> {
        &self.xlimits
    }

    fn normalized_sample(&self, ns: usize) -> Array2<F> {
        let nx = self.xlimits.nrows();
        let seeds: Array1<u64> = {
            let mut rng = self.rng.write().unwrap();
            (0..nx).map(|_| rng.gen::<u64>()).collect()
        };
        let kind = self.kind;
        let mut lhs = Array2::zeros((ns, nx));
        Zip::from(lhs.columns_mut())
            .and(&seeds)
            .par_for_each(|mut col, seed| {
                let mut rng = Xoshiro256Plus::seed_from_u64(*seed);
                col.assign(&stratified_column(ns, kind, &mut rng).mapv(F::cast));
            });
        debug!("{kind:?} LHS of {ns} points in dimension {nx}");
        lhs
    }
}

impl<F: Float, R: Rng> Lhs<F, R> {
    /// Constructor with given design space and random generator.
    /// * `xlimits`: (nx, 2) matrix where nx is the dimension of the samples and the ith row
    ///   is the definition interval of the ith component of x.
    /// * `rng`: random generator used to draw strata locations and permutations
    ///
    /// **Panics** if xlimits is not a valid design space.
    pub fn new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Self {
        match Self::try_new_with_rng(xlimits, rng) {
            Ok(lhs) => lhs,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible constructor with given design space and random generator.
    pub fn try_new_with_rng(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>, rng: R) -> Result<Self> {
        check_xlimits(xlimits)?;
        Ok(Lhs {
            xlimits: xlimits.to_owned(),
            kind: LhsKind::default(),
            rng: Arc::new(RwLock::new(rng)),
        })
    }

    /// Sets the kind of LHS
    pub fn kind(mut self, kind: LhsKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the random generator
    pub fn with_rng<R2: Rng>(self, rng: R2) -> Lhs<F, R2> {
        Lhs {
            xlimits: self.xlimits,
            kind: self.kind,
            rng: Arc::new(RwLock::new(rng)),
        }
    }
}

/// Draws one point per stratum of `[0, 1]` cut in `ns` equal intervals
/// and returns them randomly permuted.
fn stratified_column(ns: usize, kind: LhsKind, rng: &mut Xoshiro256Plus) -> Array1<f64> {
    let cut = Array::linspace(0., 1., ns + 1);
    let mut points: Vec<f64> = (0..ns)
        .map(|i| {
            let (a, b) = (cut[i], cut[i + 1]);
            match kind {
                LhsKind::Centered => (a + b) / 2.,
                LhsKind::Classic => a + rng.gen::<f64>() * (b - a),
            }
        })
        .collect();
    points.shuffle(rng);
    Array1::from(points)
}

/// Generates `ns` centered LHS samples between `lower` and `upper` bounds
/// using a random generator seeded with `seed`.
///
/// Returns a (ns, dim) matrix where dim is the length of the bounds.
///
/// ```
/// use podrom_doe::lhs_sample;
/// use ndarray::array;
///
/// let mu = lhs_sample(10, &array![0., 100.], &array![1., 200.], 42).unwrap();
/// assert_eq!(mu.dim(), (10, 2));
/// ```
pub fn lhs_sample<F: Float>(
    ns: usize,
    lower: &ArrayBase<impl Data<Elem = F>, Ix1>,
    upper: &ArrayBase<impl Data<Elem = F>, Ix1>,
    seed: u64,
) -> Result<Array2<F>> {
    if lower.len() != upper.len() {
        return Err(DoeError::ShapeError(format!(
            "lower and upper bounds should have the same length, got {} and {}",
            lower.len(),
            upper.len()
        )));
    }
    let xlimits = stack(Axis(1), &[lower.view(), upper.view()])
        .map_err(|err| DoeError::ShapeError(err.to_string()))?;
    let lhs = Lhs::try_new_with_rng(&xlimits, Xoshiro256Plus::seed_from_u64(seed))?;
    Ok(lhs.sample(ns))
}

/// Returns the stratum index of each value of a normalized column cut in `ns` intervals.
pub fn strata_indices<F: Float>(col: &ArrayBase<impl Data<Elem = F>, Ix1>, ns: usize) -> Vec<usize> {
    col.iter()
        .map(|v| {
            let k = (*v * F::cast(ns)).floor().to_usize().unwrap_or(0);
            k.min(ns.saturating_sub(1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, array};

    fn assert_stratified(doe: &Array2<f64>) {
        let ns = doe.nrows();
        for col in doe.columns() {
            let mut strata = strata_indices(&col, ns);
            strata.sort_unstable();
            assert_eq!(strata, (0..ns).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_centered_lhs() {
        let xlimits = arr2(&[[5., 10.], [0., 1.]]);
        let actual = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(0))
            .kind(LhsKind::Centered)
            .sample(5);
        let mut col0 = actual.column(0).to_vec();
        col0.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(
            Array1::from(col0),
            array![5.5, 6.5, 7.5, 8.5, 9.5],
            epsilon = 1e-12
        );
        let mut col1 = actual.column(1).to_vec();
        col1.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_abs_diff_eq!(
            Array1::from(col1),
            array![0.1, 0.3, 0.5, 0.7, 0.9],
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_classic_lhs_stratification() {
        let xlimits = arr2(&[[0., 1.], [0., 1.], [0., 1.]]);
        let doe = Lhs::new(&xlimits)
            .with_rng(Xoshiro256Plus::seed_from_u64(42))
            .kind(LhsKind::Classic)
            .sample(17);
        assert_eq!(doe.dim(), (17, 3));
        assert_stratified(&doe);
    }

    #[test]
    fn test_lhs_reproducible() {
        let xlimits = arr2(&[[-1., 1.], [0., 3.]]);
        let doe1 = Lhs::new(&xlimits)
            .kind(LhsKind::Classic)
            .with_rng(Xoshiro256Plus::seed_from_u64(7))
            .sample(9);
        let doe2 = Lhs::new(&xlimits)
            .kind(LhsKind::Classic)
            .with_rng(Xoshiro256Plus::seed_from_u64(7))
            .sample(9);
        assert_abs_diff_eq!(doe1, doe2, epsilon = 0.);
    }

    #[test]
    fn test_lhs_sample_bounds() {
        let lower = array![5., -2., 100.];
        let upper = array![10., 2., 300.];
        let doe = lhs_sample(20, &lower, &upper, 1111).unwrap();
        assert_eq!(doe.dim(), (20, 3));
        for row in doe.rows() {
            for j in 0..3 {
                assert!(row[j] >= lower[j] && row[j] <= upper[j]);
            }
        }
        let normalized = (&doe - &lower) / (&upper - &lower);
        assert_stratified(&normalized);
    }

    #[test]
    fn test_lhs_sample_shape_error() {
        let res = lhs_sample(5, &array![0., 1.], &array![1.], 0);
        assert!(matches!(res, Err(DoeError::ShapeError(_))));
    }

    #[test]
    fn test_lhs_invalid_bounds() {
        let res = lhs_sample(5, &array![2.], &array![1.], 0);
        assert!(matches!(res, Err(DoeError::InvalidBounds(_))));
        assert!(Lhs::try_new(&arr2(&[[0., 1., 2.]])).is_err());
    }

    #[test]
    fn test_lhs_single_point() {
        let doe = lhs_sample(1, &array![0., 10.], &array![2., 20.], 3).unwrap();
        assert_abs_diff_eq!(doe, array![[1., 15.]], epsilon = 1e-12);
    }
}
