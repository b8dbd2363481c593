use crate::errors::{PodromError, Result};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use ndarray_rand::rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256Plus;
use serde::{Deserialize, Serialize};

/// Data standardized column-wise with its mean and standard deviation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct NormalizedData {
    /// normalized data
    pub data: Array2<f64>,
    /// mean vector computed from data
    pub mean: Array1<f64>,
    /// standard deviation vector computed from data
    pub std: Array1<f64>,
}

impl NormalizedData {
    /// Constructor
    pub fn new(x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<NormalizedData> {
        let (data, mean, std) = normalize(x)?;
        Ok(NormalizedData { data, mean, std })
    }
}

/// Standardizes columns, constant columns (or single rows) are only centered.
pub(crate) fn normalize(x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>)> {
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| PodromError::ShapeError("cannot normalize empty data".to_string()))?;
    let mut x_std = if x.nrows() > 1 {
        x.std_axis(Axis(0), 1.)
    } else {
        Array1::ones(x.ncols())
    };
    x_std.mapv_inplace(|v| if v == 0. || !v.is_finite() { 1. } else { v });
    let xnorm = (x - &x_mean) / &x_std;
    Ok((xnorm, x_mean, x_std))
}

/// Randomly shuffles `0..n` and returns (kept, held out) indices, the held out part
/// having `ceil(fraction * n)` elements.
pub(crate) fn random_split(n: usize, fraction: f64, rng: &mut Xoshiro256Plus) -> Result<(Vec<usize>, Vec<usize>)> {
    let n_out = (fraction * n as f64 - 1e-9).ceil().max(0.) as usize;
    if n_out >= n {
        return Err(PodromError::InvalidValueError(format!(
            "splitting {n} samples with a {fraction} fraction leaves no sample to train on"
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let held_out = indices.split_off(n - n_out);
    Ok((indices, held_out))
}

/// Splits `n_rows` rows grouped in trajectories of `n_t` rows into a contiguous head
/// and tail, the tail having `fraction` of the trajectories (rounded down).
pub(crate) fn tail_split(n_rows: usize, n_t: usize, fraction: f64) -> Result<(Vec<usize>, Vec<usize>)> {
    if n_rows % n_t.max(1) != 0 {
        return Err(PodromError::ShapeError(format!(
            "{n_rows} rows cannot be split into trajectories of {n_t} time steps"
        )));
    }
    let n_traj = n_rows / n_t.max(1);
    let n_tail = (fraction * n_traj as f64 + 1e-9).floor() as usize;
    if n_tail >= n_traj {
        return Err(PodromError::InvalidValueError(format!(
            "splitting {n_traj} trajectories with a {fraction} fraction leaves no trajectory to train on"
        )));
    }
    let n_head = (n_traj - n_tail) * n_t.max(1);
    Ok(((0..n_head).collect(), (n_head..n_rows).collect()))
}

/// Per column [min, max] bounds as a (ncols, 2) matrix
pub(crate) fn column_bounds(x: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Array2<f64> {
    let mut bounds = Array2::zeros((x.ncols(), 2));
    for (j, col) in x.columns().into_iter().enumerate() {
        bounds[[j, 0]] = col.fold(f64::INFINITY, |a, &b| a.min(b));
        bounds[[j, 1]] = col.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    }
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use ndarray_rand::rand::SeedableRng;

    #[test]
    fn test_normalized_data() {
        let x = array![[1., 2.], [3., 2.], [5., 2.]];
        let xnorm = NormalizedData::new(&x).unwrap();
        assert_abs_diff_eq!(xnorm.mean, array![3., 2.], epsilon = 1e-15);
        assert_abs_diff_eq!(xnorm.std, array![2., 1.], epsilon = 1e-15);
        assert_abs_diff_eq!(xnorm.data.column(0), array![-1., 0., 1.], epsilon = 1e-15);
        assert!(NormalizedData::new(&Array2::<f64>::zeros((0, 2))).is_err());
    }

    #[test]
    fn test_random_split() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let (train, test) = random_split(10, 0.25, &mut rng).unwrap();
        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);
        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
        let (train, test) = random_split(4, 0., &mut rng).unwrap();
        assert_eq!((train.len(), test.len()), (4, 0));
        assert!(random_split(2, 0.9, &mut rng).is_err());
    }

    #[test]
    fn test_tail_split() {
        let (head, tail) = tail_split(20, 4, 0.3).unwrap();
        assert_eq!(head, (0..16).collect::<Vec<_>>());
        assert_eq!(tail, (16..20).collect::<Vec<_>>());
        assert!(tail_split(8, 4, 1.).is_err());
        assert!(matches!(tail_split(22, 4, 0.3), Err(PodromError::ShapeError(_))));
    }

    #[test]
    fn test_column_bounds() {
        let x = array![[1., -2.], [3., 5.], [0., 1.]];
        assert_abs_diff_eq!(column_bounds(&x), array![[0., 3.], [-2., 5.]], epsilon = 0.);
    }
}
