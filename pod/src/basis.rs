use crate::errors::{PodError, Result};
use crate::parameters::{PodParams, PodValidParams};
use linfa::{Float, ParamGuard};
use linfa_linalg::svd::*;
use log::{debug, info, warn};
use ndarray::{concatenate, Array1, Array2, ArrayBase, ArrayView2, Axis, Data, Ix2, Ix3, Zip};
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// An orthonormal reduced basis `V` of shape (n_h, n_L) extracted from a snapshots
/// matrix `U` of shape (n_h, n_st) such that `u_L(mu) = V.v(mu) ~= u_h(mu)`.
///
/// The singular values of the retained modes are kept alongside the basis.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct PodBasis<F: Float> {
    /// (n_h, n_L) matrix with orthonormal columns
    basis: Array2<F>,
    /// singular values of the retained modes in decreasing order
    singular_values: Array1<F>,
    /// relative energy discarded by the truncation
    discarded_energy: F,
}

impl<F: Float> PodBasis<F> {
    /// Builds a basis from already orthonormal columns (e.g. loaded from a checkpoint).
    pub fn new(basis: Array2<F>, singular_values: Array1<F>, discarded_energy: F) -> Result<Self> {
        if basis.ncols() != singular_values.len() {
            return Err(PodError::ShapeError(format!(
                "basis has {} modes but {} singular values were given",
                basis.ncols(),
                singular_values.len()
            )));
        }
        Ok(PodBasis {
            basis,
            singular_values,
            discarded_energy,
        })
    }

    /// Returns parameters to extract a basis with the given truncation tolerance
    pub fn params(tolerance: F) -> PodParams<F> {
        PodParams::new(tolerance)
    }

    /// The (n_h, n_L) basis matrix
    pub fn basis(&self) -> &Array2<F> {
        &self.basis
    }

    /// Singular values of the retained modes
    pub fn singular_values(&self) -> &Array1<F> {
        &self.singular_values
    }

    /// Relative energy not captured by the retained modes
    pub fn discarded_energy(&self) -> F {
        self.discarded_energy
    }

    /// Relative energy captured by the retained modes
    pub fn energy_ratio(&self) -> F {
        F::one() - self.discarded_energy
    }

    /// Number of degrees of freedom of the full field
    pub fn n_h(&self) -> usize {
        self.basis.nrows()
    }

    /// Number of retained modes
    pub fn n_l(&self) -> usize {
        self.basis.ncols()
    }

    /// Projects (n_h, n_st) snapshots onto the basis, returns (n_st, n_L) coefficients `v = (V^T.U)^T`
    pub fn project(&self, u: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.check_rows(u.nrows())?;
        Ok(self.basis.t().dot(u).reversed_axes())
    }

    /// Reconstructs (n_h, n_st) full fields from (n_st, n_L) coefficients `U = V.v^T`
    pub fn reconstruct(&self, v: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        if v.ncols() != self.n_l() {
            return Err(PodError::ShapeError(format!(
                "coefficients should have {} columns, got {}",
                self.n_l(),
                v.ncols()
            )));
        }
        Ok(self.basis.dot(&v.t()))
    }

    /// Per-DOF reconstruction error statistic of the snapshots `u`:
    /// for each entry the standard deviation of the pair (u, V.V^T.u),
    /// averaged over the snapshots.
    pub fn residual_signature(&self, u: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        let v = self.project(u)?;
        let u_pod = self.reconstruct(&v)?;
        let two = F::cast(2.);
        let mut sig = Array2::zeros(u.raw_dim());
        Zip::from(&mut sig)
            .and(u)
            .and(&u_pod)
            .for_each(|s, &a, &b| *s = (a - b).abs() / two);
        Ok(sig
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(self.n_h())))
    }

    fn check_rows(&self, nrows: usize) -> Result<()> {
        if nrows != self.n_h() {
            return Err(PodError::ShapeError(format!(
                "snapshots should have {} rows, got {}",
                self.n_h(),
                nrows
            )));
        }
        Ok(())
    }
}

impl<F: Float> PodParams<F> {
    /// Extracts the basis of (n_h, n_st) snapshots with a single SVD.
    pub fn extract(&self, u: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<PodBasis<F>> {
        let params = self.check_ref()?;
        svd_truncated(&u.view(), params.tolerance, params.rank)
    }

    /// Extracts the basis of (n_h, n_t, n_s) structured snapshots.
    ///
    /// Without `init_tolerance`, this is the direct extraction on the flattened
    /// snapshots matrix. Otherwise each trajectory block (n_h, n_t) is reduced
    /// with `init_tolerance`, the block bases weighted by their singular values
    /// are merged and the result is reduced with `tolerance`.
    /// The energy discarded by this incremental strategy is bounded by
    /// `tolerance + init_tolerance` relatively to the direct method.
    pub fn extract_blocks(&self, u_struct: &ArrayBase<impl Data<Elem = F>, Ix3>) -> Result<PodBasis<F>> {
        let params = self.check_ref()?;
        let (n_h, n_t, n_s) = u_struct.dim();
        let Some(init_tolerance) = params.init_tolerance else {
            let flat = u_struct
                .view()
                .permuted_axes([0, 2, 1])
                .as_standard_layout()
                .into_owned()
                .into_shape((n_h, n_s * n_t))
                .map_err(|err| PodError::ShapeError(err.to_string()))?;
            return svd_truncated(&flat.view(), params.tolerance, params.rank);
        };
        incremental(u_struct, params, init_tolerance)
    }
}

fn incremental<F: Float>(
    u_struct: &ArrayBase<impl Data<Elem = F>, Ix3>,
    params: &PodValidParams<F>,
    init_tolerance: F,
) -> Result<PodBasis<F>> {
    let n_s = u_struct.dim().2;
    if n_s == 0 {
        return Err(PodError::EmptySnapshots(
            "no trajectory to extract a basis from".to_string(),
        ));
    }
    warn!("Incremental POD on {n_s} blocks is experimental");
    let u_struct = u_struct.view();
    let blocks = (0..n_s)
        .into_par_iter()
        .map(|k| {
            let block = u_struct.index_axis(Axis(2), k);
            let pod = svd_truncated(&block, init_tolerance, None)?;
            Ok(&pod.basis * &pod.singular_values)
        })
        .collect::<Result<Vec<_>>>()?;
    let views: Vec<ArrayView2<F>> = blocks.iter().map(|b| b.view()).collect();
    let merged = concatenate(Axis(1), &views).map_err(|err| PodError::ShapeError(err.to_string()))?;
    debug!("Merged block bases into {} columns", merged.ncols());
    svd_truncated(&merged.view(), params.tolerance, params.rank)
}

/// Economy SVD of `u` truncated either at `rank` or with the energy criterion.
fn svd_truncated<F: Float>(u: &ArrayView2<F>, tolerance: F, rank: Option<usize>) -> Result<PodBasis<F>> {
    let (n_h, n_st) = u.dim();
    if n_h == 0 || n_st == 0 {
        return Err(PodError::EmptySnapshots(format!(
            "cannot extract a basis from a ({n_h}, {n_st}) snapshots matrix"
        )));
    }
    if u.iter().any(|v| !v.is_finite()) {
        return Err(PodError::InvalidValueError(
            "snapshots contain non finite values".to_string(),
        ));
    }
    let (w, sigma, _) = u.svd(true, false)?;
    let w = w.ok_or_else(|| PodError::InvalidValueError("left singular vectors not computed".to_string()))?;

    // svd does not sort the singular values
    let mut order: Vec<usize> = (0..sigma.len()).collect();
    order.sort_by(|&a, &b| {
        sigma[b]
            .abs()
            .partial_cmp(&sigma[a].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let sigma = sigma.select(Axis(0), &order).mapv(|s| s.abs());
    let energies = sigma.mapv(|s| s * s);
    let total = energies.sum();

    // tails[i] = energy of the modes beyond the first i + 1 ones
    let k = sigma.len();
    let mut tails = Array1::zeros(k);
    let mut acc = F::zero();
    for i in (0..k).rev() {
        tails[i] = acc;
        acc += energies[i];
    }
    let ratio = |i: usize| {
        if total > F::zero() {
            tails[i] / total
        } else {
            F::zero()
        }
    };

    let n_l = match rank {
        Some(r) => r.min(k),
        None => (0..k).find(|&i| ratio(i) < tolerance).map_or(k, |i| i + 1),
    }
    .max(1);

    let kept: Vec<usize> = order[..n_l].to_vec();
    let basis = w.select(Axis(1), &kept);
    let discarded_energy = ratio(n_l - 1);
    info!("POD basis: n_L = {n_l} modes out of {k} (discarded energy = {discarded_energy:e})");
    PodBasis::new(basis, sigma.slice(ndarray::s![..n_l]).to_owned(), discarded_energy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array, Array3};
    use ndarray_rand::{rand::SeedableRng, rand_distr::Uniform, RandomExt};
    use rand_xoshiro::Xoshiro256Plus;

    fn random_matrix(shape: (usize, usize), seed: u64) -> Array2<f64> {
        let mut rng = Xoshiro256Plus::seed_from_u64(seed);
        Array::random_using(shape, Uniform::new(-1., 1.), &mut rng)
    }

    fn assert_orthonormal(pod: &PodBasis<f64>) {
        let gram = pod.basis().t().dot(pod.basis());
        assert_abs_diff_eq!(gram, Array2::eye(pod.n_l()), epsilon = 1e-8);
    }

    #[test]
    fn test_full_rank_round_trip() {
        let u = random_matrix((20, 6), 42);
        let pod = PodParams::new(0.).extract(&u).unwrap();
        assert_eq!(pod.n_l(), 6);
        assert_orthonormal(&pod);
        let v = pod.project(&u).unwrap();
        assert_eq!(v.dim(), (6, 6));
        let u_rec = pod.reconstruct(&v).unwrap();
        assert_abs_diff_eq!(u_rec, u, epsilon = 1e-10);
        assert_abs_diff_eq!(pod.residual_signature(&u).unwrap(), Array1::zeros(20), epsilon = 1e-10);
    }

    #[test]
    fn test_singular_values_sorted() {
        let u = random_matrix((15, 8), 0);
        let pod = PodParams::new(0.).extract(&u).unwrap();
        let s = pod.singular_values();
        for i in 1..s.len() {
            assert!(s[i - 1] >= s[i]);
        }
    }

    #[test]
    fn test_truncation_bound() {
        // columns with decreasing scales
        let mut u = random_matrix((30, 10), 3);
        for (j, mut col) in u.columns_mut().into_iter().enumerate() {
            col *= 10f64.powi(-(j as i32));
        }
        let tol = 1e-4;
        let pod = PodParams::new(tol).extract(&u).unwrap();
        assert!(pod.n_l() < 10);
        assert_orthonormal(&pod);
        assert!(pod.discarded_energy() < tol);
        let u_rec = pod.reconstruct(&pod.project(&u).unwrap()).unwrap();
        let err = (&u - &u_rec).mapv(|v| v * v).sum();
        let total = u.mapv(|v| v * v).sum();
        assert!(err / total < tol);
    }

    #[test]
    fn test_rank_one() {
        let x = array![0.1, 0.5, 0.9];
        let mus = array![1., 2., -3., 4.5, 0.2];
        let mut u = Array2::zeros((3, 5));
        for (j, mu) in mus.iter().enumerate() {
            u.column_mut(j).assign(&(&x * *mu));
        }
        let pod = PodParams::new(1e-10).extract(&u).unwrap();
        assert_eq!(pod.n_l(), 1);
        let u_rec = pod.reconstruct(&pod.project(&u).unwrap()).unwrap();
        assert_abs_diff_eq!(u_rec, u, epsilon = 1e-12);
    }

    #[test]
    fn test_explicit_rank() {
        let u = random_matrix((12, 7), 5);
        let pod = PodParams::new(1e-10).rank(Some(3)).extract(&u).unwrap();
        assert_eq!(pod.n_l(), 3);
        assert_orthonormal(&pod);
        let pod = PodParams::new(1e-10).rank(Some(100)).extract(&u).unwrap();
        assert_eq!(pod.n_l(), 7);
    }

    #[test]
    fn test_degenerate_snapshots() {
        let pod = PodParams::new(1e-10).extract(&Array2::<f64>::zeros((4, 3))).unwrap();
        assert_eq!(pod.n_l(), 1);
        let pod = PodParams::new(0.5).extract(&array![[1.], [2.], [3.]]).unwrap();
        assert_eq!(pod.n_l(), 1);
        assert_orthonormal(&pod);
        assert!(matches!(
            PodParams::new(0.1).extract(&Array2::<f64>::zeros((4, 0))),
            Err(PodError::EmptySnapshots(_))
        ));
    }

    #[test]
    fn test_shape_errors() {
        let u = random_matrix((5, 3), 1);
        let pod = PodParams::new(0.).extract(&u).unwrap();
        assert!(pod.project(&random_matrix((4, 3), 2)).is_err());
        assert!(pod.reconstruct(&random_matrix((2, 7), 2)).is_err());
    }

    #[test]
    fn test_incremental_matches_direct() {
        let (n_h, n_t, n_s) = (25, 6, 4);
        let modes = random_matrix((n_h, 3), 11);
        let coefs = random_matrix((3, n_t * n_s), 12);
        let u = modes.dot(&coefs);
        let mut u_struct = Array3::zeros((n_h, n_t, n_s));
        for k in 0..n_s {
            for t in 0..n_t {
                u_struct
                    .slice_mut(ndarray::s![.., t, k])
                    .assign(&u.column(k * n_t + t));
            }
        }
        let direct = PodParams::new(1e-10).extract(&u).unwrap();
        let blocks = PodParams::new(1e-10)
            .init_tolerance(Some(1e-12))
            .extract_blocks(&u_struct)
            .unwrap();
        assert_eq!(direct.n_l(), 3);
        assert_eq!(blocks.n_l(), direct.n_l());
        assert_orthonormal(&blocks);
        let u_rec = blocks.reconstruct(&blocks.project(&u).unwrap()).unwrap();
        assert_abs_diff_eq!(u_rec, u, epsilon = 1e-8);

        let flat = PodParams::new(1e-10).extract_blocks(&u_struct).unwrap();
        assert_eq!(flat.n_l(), 3);
    }
}
