//! Parallel reduction kernels accumulating statistics over ensembles of
//! reconstructed full fields without materializing the whole ensemble.
//!
//! Each coefficient sample `v_i` is expanded into the full field `V.v_i` and
//! added to a running sum and a running sum of squares, both taken relatively
//! to the first field of the accumulator. Samples are processed
//! in parallel, each worker folding into its own accumulator, and accumulators
//! are finally merged, the result only depends on the floating point summation order.
use crate::errors::{PodError, Result};
use linfa::Float;
use ndarray::{s, Array, ArrayBase, Data, Dimension, IntoDimension, Ix1, Ix2, Zip};
use rayon::prelude::*;

/// Streaming sum and sum of squares of same-shaped fields.
///
/// Sums are accumulated relatively to a shift, the first added field, so that
/// `n.sum_sq - sum^2` does not suffer from cancellation when the fields are
/// close to each other: identical fields give an exactly zero deviation.
#[derive(Clone, Debug, PartialEq)]
pub struct Moments<F: Float, D: Dimension> {
    shift: Array<F, D>,
    sum: Array<F, D>,
    sum_sq: Array<F, D>,
    count: usize,
}

impl<F: Float, D: Dimension> Moments<F, D> {
    /// Empty accumulator for fields of the given shape
    pub fn new<Sh: IntoDimension<Dim = D>>(shape: Sh) -> Self {
        let dim = shape.into_dimension();
        Moments {
            shift: Array::zeros(dim.clone()),
            sum: Array::zeros(dim.clone()),
            sum_sq: Array::zeros(dim),
            count: 0,
        }
    }

    /// Adds one field to the accumulator.
    ///
    /// **Panics** if the field shape differs from the accumulator one.
    pub fn add(&mut self, field: &ArrayBase<impl Data<Elem = F>, D>) {
        if self.count == 0 {
            self.shift.assign(field);
        }
        Zip::from(&mut self.sum)
            .and(&mut self.sum_sq)
            .and(&self.shift)
            .and(field)
            .for_each(|s, sq, &c, &x| {
                let d = x - c;
                *s += d;
                *sq += d * d;
            });
        self.count += 1;
    }

    /// Merges two accumulators of the same shape, `other` sums being moved
    /// to the shift of `self`.
    pub fn merge(mut self, other: Self) -> Self {
        if other.count == 0 {
            return self;
        }
        if self.count == 0 {
            return other;
        }
        let n = F::cast(other.count);
        Zip::from(&mut self.sum)
            .and(&mut self.sum_sq)
            .and(&self.shift)
            .and(&other.shift)
            .and(&other.sum)
            .and(&other.sum_sq)
            .for_each(|s, sq, &c, &oc, &os, &osq| {
                let delta = oc - c;
                *s += os + n * delta;
                *sq += osq + F::cast(2.) * delta * os + n * delta * delta;
            });
        self.count += other.count;
        self
    }

    /// Number of accumulated fields
    pub fn count(&self) -> usize {
        self.count
    }

    /// Reference field the sums are relative to
    pub fn shift(&self) -> &Array<F, D> {
        &self.shift
    }

    /// Running sum of the differences to [Moments::shift]
    pub fn sum(&self) -> &Array<F, D> {
        &self.sum
    }

    /// Running sum of the squared differences to [Moments::shift]
    pub fn sum_sq(&self) -> &Array<F, D> {
        &self.sum_sq
    }

    /// Sample mean of the accumulated fields
    pub fn mean(&self) -> Array<F, D> {
        self.mean_std().0
    }

    /// Bessel-corrected sample standard deviation of the accumulated fields
    pub fn std(&self) -> Array<F, D> {
        self.mean_std().1
    }

    /// Sample mean and standard deviation, see [mean_std]
    pub fn mean_std(&self) -> (Array<F, D>, Array<F, D>) {
        let (mean, std) = mean_std(&self.sum, &self.sum_sq, self.count);
        (mean + &self.shift, std)
    }
}

/// Mean and Bessel-corrected standard deviation from running sums over `n` samples:
/// `mean = sum / n` and `std = sqrt((n.sum_sq - sum^2) / (n.(n - 1)))`.
///
/// The variance is clamped to zero before the square root and non finite values
/// (e.g. `n = 1`) are set to zero: this masks ill-conditioned estimates, it does
/// not mean the uncertainty is zero.
pub fn mean_std<F: Float, D: Dimension>(
    sum: &ArrayBase<impl Data<Elem = F>, D>,
    sum_sq: &ArrayBase<impl Data<Elem = F>, D>,
    n: usize,
) -> (Array<F, D>, Array<F, D>) {
    let nf = F::cast(n);
    let denom = nf * (nf - F::one());
    let mut mean = Array::zeros(sum.raw_dim());
    let mut std = Array::zeros(sum.raw_dim());
    Zip::from(&mut mean)
        .and(&mut std)
        .and(sum)
        .and(sum_sq)
        .for_each(|m, sd, &s, &sq| {
            let mv = s / nf;
            *m = if mv.is_finite() { mv } else { F::zero() };
            let var = ((nf * sq - s * s) / denom).max(F::zero());
            let v = var.sqrt();
            *sd = if v.is_finite() { v } else { F::zero() };
        });
    (mean, std)
}

/// Accumulates the (n_h,) full fields `basis.v_i` of (n, n_L) coefficient `samples`.
pub fn accumulate<F: Float>(
    samples: &ArrayBase<impl Data<Elem = F>, Ix2>,
    basis: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Result<Moments<F, Ix1>> {
    check_modes(samples.ncols(), basis.ncols())?;
    let (samples, basis) = (samples.view(), basis.view());
    let n_h = basis.nrows();
    Ok((0..samples.nrows())
        .into_par_iter()
        .fold(
            || Moments::new(n_h),
            |mut acc, i| {
                acc.add(&basis.dot(&samples.row(i)));
                acc
            },
        )
        .reduce(|| Moments::new(n_h), Moments::merge))
}

/// Accumulates trajectories: (n_s * n_t, n_L) coefficient `samples` are grouped by
/// blocks of `n_t` consecutive rows, each block is expanded into (n_h, n_t) full fields.
pub fn accumulate_t<F: Float>(
    samples: &ArrayBase<impl Data<Elem = F>, Ix2>,
    basis: &ArrayBase<impl Data<Elem = F>, Ix2>,
    n_t: usize,
) -> Result<Moments<F, Ix2>> {
    check_modes(samples.ncols(), basis.ncols())?;
    if n_t == 0 || samples.nrows() % n_t != 0 {
        return Err(PodError::ShapeError(format!(
            "{} samples cannot be split into trajectories of {} time steps",
            samples.nrows(),
            n_t
        )));
    }
    let (samples, basis) = (samples.view(), basis.view());
    let n_h = basis.nrows();
    let n_s = samples.nrows() / n_t;
    Ok((0..n_s)
        .into_par_iter()
        .fold(
            || Moments::new((n_h, n_t)),
            |mut acc, i| {
                let block = samples.slice(s![i * n_t..(i + 1) * n_t, ..]);
                acc.add(&basis.dot(&block.t()));
                acc
            },
        )
        .reduce(|| Moments::new((n_h, n_t)), Moments::merge))
}

fn check_modes(n_samples_modes: usize, n_basis_modes: usize) -> Result<()> {
    if n_samples_modes != n_basis_modes {
        return Err(PodError::ShapeError(format!(
            "coefficients have {n_samples_modes} modes but the basis has {n_basis_modes}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2, Axis};
    use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
    use rand_xoshiro::Xoshiro256Plus;

    #[test]
    fn test_accumulate_matches_direct() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let basis = Array2::random_using((8, 3), Uniform::new(-1., 1.), &mut rng);
        let samples = Array2::random_using((50, 3), Uniform::new(-1., 1.), &mut rng);
        let moments = accumulate(&samples, &basis).unwrap();
        assert_eq!(moments.count(), 50);

        let fields = basis.dot(&samples.t());
        let mean = fields.mean_axis(Axis(1)).unwrap();
        let std = fields.std_axis(Axis(1), 1.);
        let (m, s) = moments.mean_std();
        assert_abs_diff_eq!(m, mean, epsilon = 1e-12);
        assert_abs_diff_eq!(s, std, epsilon = 1e-10);
    }

    #[test]
    fn test_accumulate_t_matches_direct() {
        let mut rng = Xoshiro256Plus::seed_from_u64(0);
        let (n_h, n_t, n_s) = (6, 4, 7);
        let basis = Array2::random_using((n_h, 2), Uniform::new(-1., 1.), &mut rng);
        let samples = Array2::random_using((n_s * n_t, 2), Uniform::new(-1., 1.), &mut rng);
        let moments = accumulate_t(&samples, &basis, n_t).unwrap();
        assert_eq!(moments.count(), n_s);
        assert_eq!(moments.sum().dim(), (n_h, n_t));

        let fields = basis.dot(&samples.t());
        for t in 0..n_t {
            let cols: Vec<usize> = (0..n_s).map(|i| i * n_t + t).collect();
            let at_t = fields.select(Axis(1), &cols);
            let mean = moments.mean();
            assert_abs_diff_eq!(
                mean.column(t),
                at_t.mean_axis(Axis(1)).unwrap(),
                epsilon = 1e-12
            );
            let std = moments.std();
            assert_abs_diff_eq!(std.column(t), at_t.std_axis(Axis(1), 1.), epsilon = 1e-10);
        }
    }

    #[test]
    fn test_single_sample_std_is_zero() {
        let basis = array![[1., 0.], [0., 1.], [1., 1.]];
        let moments = accumulate(&array![[2., -3.]], &basis).unwrap();
        let (mean, std) = moments.mean_std();
        assert_abs_diff_eq!(mean, array![2., -3., -1.], epsilon = 1e-14);
        assert_eq!(std, Array1::zeros(3));
    }

    #[test]
    fn test_identical_samples_std_is_zero() {
        let basis = array![[0.3, 0.1], [0.7, -2.], [1e3, 1e-3]];
        let samples = array![[0.1, 0.2]].broadcast((100, 2)).unwrap().to_owned();
        let std = accumulate(&samples, &basis).unwrap().std();
        assert!(std.iter().all(|v: &f64| v.is_finite() && *v >= 0.));
        assert_abs_diff_eq!(std, Array1::zeros(3), epsilon = 0.);

        let samples = array![[1e3, -7.1]].broadcast((14, 2)).unwrap().to_owned();
        let moments = accumulate_t(&samples, &basis, 7).unwrap();
        assert_abs_diff_eq!(moments.std(), Array2::zeros((3, 7)), epsilon = 0.);
    }

    #[test]
    fn test_merge_identical_fields() {
        let field = array![0.1, 1e8 + 0.3, -2.7];
        let mut a = Moments::new(3);
        let mut b = Moments::new(3);
        for _ in 0..3 {
            a.add(&field);
        }
        for _ in 0..97 {
            b.add(&field);
        }
        let m = a.merge(b).merge(Moments::new(3));
        assert_eq!(m.count(), 100);
        let (mean, std) = m.mean_std();
        assert_eq!(mean, field);
        assert_eq!(std, Array1::zeros(3));
    }

    #[test]
    fn test_merge() {
        let mut a = Moments::new(2);
        a.add(&array![1., 2.]);
        let mut b = Moments::new(2);
        b.add(&array![3., 4.]);
        b.add(&array![5., 6.]);
        let m = a.merge(b);
        assert_eq!(m.count(), 3);
        assert_abs_diff_eq!(m.mean(), array![3., 4.], epsilon = 1e-14);
        assert_abs_diff_eq!(m.std(), array![2., 2.], epsilon = 1e-12);
    }

    #[test]
    fn test_kernel_shape_errors() {
        let basis = Array2::<f64>::zeros((3, 2));
        assert!(accumulate(&Array2::zeros((4, 3)), &basis).is_err());
        assert!(accumulate_t(&Array2::zeros((5, 2)), &basis, 2).is_err());
        assert!(accumulate_t(&Array2::zeros((4, 2)), &basis, 0).is_err());
    }
}
