//! Generation of high-fidelity snapshots over a set of parameter samples.
//!
//! For a steady field, each parameter sample `mu_i` gives one snapshot `u(x, 0, mu_i)`.
//! For a time-dependent field, each sample gives a trajectory of `n_t` snapshots
//! `u(x, t_j, mu_i)` on a uniform time grid, the regression inputs being `[t_j, mu_i]`.
//!
//! Optional gaussian noise can be injected on the parameters (`x_noise`) and on the
//! snapshots (`u_noise`), noise-free snapshots are always returned alongside.
use crate::errors::{PodromError, Result};
use crate::field::FieldDescriptor;
use crate::mesh::Mesh;
use log::{debug, info};
use ndarray::{concatenate, s, Array, Array1, Array2, Array3, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;
use rayon::prelude::*;

/// A trait for the high-fidelity solution function `u(x, t, mu)`.
///
/// `x` is the (dim, n_xyz) matrix of the mesh nodes coordinates, `t` the time
/// (0 for steady fields) and `mu` the parameters. The function returns the
/// (n_v, n_xyz) values of the solution variables at the nodes.
pub trait HifiFunction: Sync {
    /// Evaluates the solution
    fn eval(&self, x: &ArrayView2<f64>, t: f64, mu: &ArrayView1<f64>) -> anyhow::Result<Array2<f64>>;
}

impl<T> HifiFunction for T
where
    T: Fn(&ArrayView2<f64>, f64, &ArrayView1<f64>) -> Array2<f64> + Sync,
{
    fn eval(&self, x: &ArrayView2<f64>, t: f64, mu: &ArrayView1<f64>) -> anyhow::Result<Array2<f64>> {
        Ok(self(x, t, mu))
    }
}

/// Generated snapshots
#[derive(Clone, Debug)]
pub struct Snapshots {
    /// (n_st, n_d) regression inputs, `[t, mu]` rows when time-dependent
    pub x_v: Array2<f64>,
    /// (n_h, n_st) snapshots matrix
    pub u: Array2<f64>,
    /// (n_h, n_t, n_s) snapshots organized by trajectory (n_t = 1 when steady)
    pub u_struct: Array3<f64>,
    /// (n_h, n_st) snapshots evaluated without noise
    pub u_clean: Array2<f64>,
}

/// Snapshots generator of a given field over a mesh
#[derive(Clone, Debug)]
pub struct SnapshotGenerator<'a> {
    mesh: &'a Mesh,
    field: FieldDescriptor,
    seed: u64,
    u_noise: f64,
    x_noise: f64,
}

/// The snapshots of one parameter sample
struct SampleBlock {
    x: Array2<f64>,
    u: Array2<f64>,
    u_clean: Array2<f64>,
}

impl<'a> SnapshotGenerator<'a> {
    /// Constructor, noise-free by default
    pub fn new(mesh: &'a Mesh, field: FieldDescriptor) -> Self {
        SnapshotGenerator {
            mesh,
            field,
            seed: 0,
            u_noise: 0.,
            x_noise: 0.,
        }
    }

    /// Sets the seed of the noise random generators
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets relative noise levels on outputs and inputs
    pub fn noise(mut self, u_noise: f64, x_noise: f64) -> Self {
        self.u_noise = u_noise;
        self.x_noise = x_noise;
        self
    }

    /// Regular time grid, a single `0` step when steady
    fn times(&self, t_min: f64, t_max: f64) -> Array1<f64> {
        if self.field.has_t() {
            Array::linspace(t_min, t_max, self.field.n_t)
        } else {
            Array1::zeros(1)
        }
    }

    /// Builds the (n_st, n_d) regression inputs of the (n_s, n_mu) parameter samples
    /// without evaluating the solution.
    pub fn generate_inputs(
        &self,
        mu: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        t_min: f64,
        t_max: f64,
    ) -> Array2<f64> {
        let times = self.times(t_min, t_max);
        let blocks: Vec<Array2<f64>> = mu.rows().into_iter().map(|mu_i| self.inputs(&times, &mu_i)).collect();
        stack_rows(&blocks, self.n_d(mu.ncols()))
    }

    fn n_d(&self, n_mu: usize) -> usize {
        if self.field.has_t() {
            n_mu + 1
        } else {
            n_mu
        }
    }

    fn inputs(&self, times: &Array1<f64>, mu_i: &ArrayView1<f64>) -> Array2<f64> {
        let n_mu = mu_i.len();
        let mut x = Array2::zeros((times.len(), self.n_d(n_mu)));
        for (j, mut row) in x.rows_mut().into_iter().enumerate() {
            if self.field.has_t() {
                row[0] = times[j];
                row.slice_mut(s![1..]).assign(mu_i);
            } else {
                row.assign(mu_i);
            }
        }
        x
    }

    /// Evaluates `u` for each of the (n_s, n_mu) parameter samples, between `t_min`
    /// and `t_max` when the field is time-dependent.
    ///
    /// Samples are processed in parallel, each one with its own random generator
    /// seeded from the generator seed.
    pub fn generate(
        &self,
        u: &impl HifiFunction,
        mu: &ArrayBase<impl Data<Elem = f64>, Ix2>,
        t_min: f64,
        t_max: f64,
    ) -> Result<Snapshots> {
        if self.mesh.n_xyz() != self.field.n_xyz {
            return Err(PodromError::ShapeError(format!(
                "mesh has {} nodes but the field is defined over {}",
                self.mesh.n_xyz(),
                self.field.n_xyz
            )));
        }
        let n_s = mu.nrows();
        if n_s == 0 {
            return Err(PodromError::ShapeError("no parameter sample to evaluate".to_string()));
        }
        let times = self.times(t_min, t_max);
        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
        let seeds: Vec<u64> = (0..n_s).map(|_| rng.gen()).collect();
        let mu = mu.view();
        info!(
            "Generating {} snapshots ({} samples x {} steps, n_h = {})",
            n_s * times.len(),
            n_s,
            times.len(),
            self.field.n_h()
        );

        let blocks = (0..n_s)
            .into_par_iter()
            .map(|i| {
                let mut rng = Xoshiro256Plus::seed_from_u64(seeds[i]);
                self.sample_block(u, i, &mu.row(i), &times, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        let n_d = self.n_d(mu.ncols());
        let x_v = stack_rows(&blocks.iter().map(|b| b.x.clone()).collect::<Vec<_>>(), n_d);
        let u_views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.u.view()).collect();
        let u_mat = concatenate(Axis(1), &u_views).map_err(|err| PodromError::ShapeError(err.to_string()))?;
        let clean_views: Vec<ArrayView2<f64>> = blocks.iter().map(|b| b.u_clean.view()).collect();
        let u_clean =
            concatenate(Axis(1), &clean_views).map_err(|err| PodromError::ShapeError(err.to_string()))?;
        let u_struct = self.field.to_blocks(&u_mat)?;
        Ok(Snapshots {
            x_v,
            u: u_mat,
            u_struct,
            u_clean,
        })
    }

    fn sample_block(
        &self,
        u: &impl HifiFunction,
        index: usize,
        mu_i: &ArrayView1<f64>,
        times: &Array1<f64>,
        rng: &mut Xoshiro256Plus,
    ) -> Result<SampleBlock> {
        let mu_noisy = if self.x_noise > 0. {
            let mut dev = mu_i.std(0.);
            if dev == 0. {
                dev = mu_i.get(0).map_or(0., |v| v.abs());
            }
            let perturbation: Array1<f64> = Array1::random_using(mu_i.len(), StandardNormal, rng);
            Some(mu_i + &(perturbation * self.x_noise * dev))
        } else {
            None
        };
        let n_h = self.field.n_h();
        let mut block_u = Array2::zeros((n_h, times.len()));
        let mut block_clean = Array2::zeros((n_h, times.len()));
        for (j, &t) in times.iter().enumerate() {
            let clean = self.evaluate(u, index, t, mu_i)?;
            let mut noisy = match &mu_noisy {
                Some(mu_p) => self.evaluate(u, index, t, &mu_p.view())?,
                None => clean.clone(),
            };
            if self.u_noise > 0. {
                let dev = noisy.std(0.);
                let perturbation: Array1<f64> = Array1::random_using(n_h, StandardNormal, rng);
                noisy += &(perturbation * self.u_noise * dev);
            }
            block_u.column_mut(j).assign(&noisy);
            block_clean.column_mut(j).assign(&clean);
        }
        let x = self.inputs(times, &mu_noisy.as_ref().map_or(mu_i.view(), |m| m.view()));
        debug!("Sample {index} evaluated");
        Ok(SampleBlock {
            x,
            u: block_u,
            u_clean: block_clean,
        })
    }

    /// Evaluates `u` and flattens its (n_v, n_xyz) output into a (n_h,) vector
    fn evaluate(&self, u: &impl HifiFunction, index: usize, t: f64, mu: &ArrayView1<f64>) -> Result<Array1<f64>> {
        let out = u
            .eval(&self.mesh.x(), t, mu)
            .map_err(|err| PodromError::EvaluationError {
                index,
                message: err.to_string(),
            })?;
        let expected = (self.field.n_v, self.field.n_xyz);
        if out.dim() != expected {
            return Err(PodromError::ShapeError(format!(
                "high-fidelity function should return a {expected:?} array, got {:?}",
                out.dim()
            )));
        }
        if out.iter().any(|v| !v.is_finite()) {
            return Err(PodromError::EvaluationError {
                index,
                message: format!("non finite value at t = {t}"),
            });
        }
        out.as_standard_layout()
            .into_owned()
            .into_shape(self.field.n_h())
            .map_err(|err| PodromError::ShapeError(err.to_string()))
    }
}

fn stack_rows(blocks: &[Array2<f64>], ncols: usize) -> Array2<f64> {
    let nrows = blocks.iter().map(|b| b.nrows()).sum();
    let mut x = Array2::zeros((nrows, ncols));
    let mut start = 0;
    for b in blocks {
        x.slice_mut(s![start..start + b.nrows(), ..]).assign(b);
        start += b.nrows();
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn linear_u(x: &ArrayView2<f64>, t: f64, mu: &ArrayView1<f64>) -> Array2<f64> {
        x.mapv(|xi| mu[0] * xi + t)
    }

    #[test]
    fn test_steady_snapshots() {
        let mesh = Mesh::new(&array![[0.1], [0.5], [0.9]]).unwrap();
        let field = FieldDescriptor::new(1, 3, 0).unwrap();
        let mu = array![[1.], [2.], [-3.], [4.5], [0.2]];
        let snaps = SnapshotGenerator::new(&mesh, field).generate(&linear_u, &mu, 0., 0.).unwrap();
        assert_eq!(snaps.u.dim(), (3, 5));
        assert_eq!(snaps.u_struct.dim(), (3, 1, 5));
        assert_abs_diff_eq!(snaps.x_v, mu, epsilon = 0.);
        assert_abs_diff_eq!(snaps.u.column(2), array![-0.3, -1.5, -2.7], epsilon = 1e-14);
        assert_abs_diff_eq!(snaps.u, snaps.u_clean, epsilon = 0.);
    }

    #[test]
    fn test_time_dependent_interleaving() {
        let mesh = Mesh::linear((0., 1., 4), None, None).unwrap();
        let field = FieldDescriptor::new(2, 4, 3).unwrap();
        let u = |x: &ArrayView2<f64>, t: f64, mu: &ArrayView1<f64>| {
            let row = x.row(0).mapv(|xi| mu[0] * xi + 10. * t);
            concatenate(Axis(0), &[row.view().insert_axis(Axis(0)), (-&row).view().insert_axis(Axis(0))]).unwrap()
        };
        let mu = array![[1., 7.], [2., 8.]];
        let snaps = SnapshotGenerator::new(&mesh, field).generate(&u, &mu, 0., 2.).unwrap();
        assert_eq!(snaps.x_v.dim(), (6, 3));
        assert_eq!(snaps.u.dim(), (8, 6));
        assert_eq!(snaps.u_struct.dim(), (8, 3, 2));
        // columns ordered [s0_t0, s0_t1, s0_t2, s1_t0, ...]
        assert_abs_diff_eq!(snaps.x_v.row(4), array![1., 2., 8.], epsilon = 1e-15);
        assert_abs_diff_eq!(snaps.u[[3, 4]], 2. * 1. + 10., epsilon = 1e-14);
        assert_abs_diff_eq!(snaps.u[[7, 4]], -(2. * 1. + 10.), epsilon = 1e-14);
        assert_abs_diff_eq!(snaps.u_struct[[3, 1, 1]], snaps.u[[3, 4]], epsilon = 0.);

        let x_v = SnapshotGenerator::new(&mesh, field).generate_inputs(&mu, 0., 2.);
        assert_abs_diff_eq!(x_v, snaps.x_v, epsilon = 0.);
        let r = field.restruct(&snaps.u).unwrap();
        assert_eq!(r.shape(), &[2, 4, 3, 2]);
        assert_abs_diff_eq!(r[[1, 3, 1, 1]], snaps.u[[7, 4]], epsilon = 0.);
    }

    #[test]
    fn test_noisy_snapshots_reproducible() {
        let mesh = Mesh::linear((0., 1., 10), None, None).unwrap();
        let field = FieldDescriptor::new(1, 10, 0).unwrap();
        let mu = array![[1., 2.], [3., 3.], [0.5, -1.]];
        let generator = SnapshotGenerator::new(&mesh, field).seed(42).noise(0.1, 0.05);
        let s1 = generator.generate(&linear_u, &mu, 0., 0.).unwrap();
        let s2 = generator.generate(&linear_u, &mu, 0., 0.).unwrap();
        assert_abs_diff_eq!(s1.u, s2.u, epsilon = 0.);
        assert_abs_diff_eq!(s1.x_v, s2.x_v, epsilon = 0.);
        assert!((&s1.u - &s1.u_clean).mapv(f64::abs).sum() > 0.);
        assert!((&s1.x_v - &mu).mapv(f64::abs).sum() > 0.);
        // identical components: the deviation falls back to the first component
        assert!((s1.x_v[[1, 0]] - 3.).abs() > 0.);
    }

    #[test]
    fn test_generation_errors() {
        let mesh = Mesh::linear((0., 1., 3), None, None).unwrap();
        let mu = array![[1.], [2.], [3.]];
        let field = FieldDescriptor::new(1, 3, 0).unwrap();
        let failing = |x: &ArrayView2<f64>, _t: f64, mu: &ArrayView1<f64>| {
            if mu[0] > 2.5 {
                x.mapv(|_| f64::NAN)
            } else {
                x.to_owned()
            }
        };
        let res = SnapshotGenerator::new(&mesh, field).generate(&failing, &mu, 0., 0.);
        assert!(matches!(res, Err(PodromError::EvaluationError { index: 2, .. })));

        let two_vars = FieldDescriptor::new(2, 3, 0).unwrap();
        let res = SnapshotGenerator::new(&mesh, two_vars).generate(&linear_u, &mu, 0., 0.);
        assert!(matches!(res, Err(PodromError::ShapeError(_))));

        struct Oracle;
        impl HifiFunction for Oracle {
            fn eval(&self, _x: &ArrayView2<f64>, _t: f64, _mu: &ArrayView1<f64>) -> anyhow::Result<Array2<f64>> {
                anyhow::bail!("solver diverged")
            }
        }
        let res = SnapshotGenerator::new(&mesh, field).generate(&Oracle, &mu, 0., 0.);
        match res {
            Err(PodromError::EvaluationError { message, .. }) => assert_eq!(message, "solver diverged"),
            _ => panic!("expected an evaluation error"),
        }
    }
}
