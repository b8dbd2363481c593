use crate::errors::{PodromError, Result};
use ndarray::{Array3, ArrayBase, ArrayD, Data, Ix2, IxDyn};
use serde::{Deserialize, Serialize};

/// Description of the solution field: `n_v` variables over `n_xyz` nodes
/// and `n_t` time steps (`n_t == 0` for steady problems).
///
/// Degrees of freedom are ordered variable-wise: `dof = v * n_xyz + node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// number of solution variables
    pub n_v: usize,
    /// number of mesh nodes
    pub n_xyz: usize,
    /// number of time steps, 0 when steady
    pub n_t: usize,
}

impl FieldDescriptor {
    /// Constructor, checks that there is at least one variable and one node
    pub fn new(n_v: usize, n_xyz: usize, n_t: usize) -> Result<Self> {
        if n_v == 0 || n_xyz == 0 {
            return Err(PodromError::ShapeError(format!(
                "field should have at least one variable and one node, got n_v={n_v}, n_xyz={n_xyz}"
            )));
        }
        Ok(FieldDescriptor { n_v, n_xyz, n_t })
    }

    /// Number of degrees of freedom `n_v * n_xyz`
    pub fn n_h(&self) -> usize {
        self.n_v * self.n_xyz
    }

    /// Whether the field depends on time
    pub fn has_t(&self) -> bool {
        self.n_t > 0
    }

    /// Number of snapshots per parameter sample (1 when steady)
    pub fn n_steps(&self) -> usize {
        self.n_t.max(1)
    }

    /// Number of parameter samples of a (n_h, n_st) snapshots matrix.
    pub fn n_samples(&self, n_st: usize) -> Result<usize> {
        if n_st % self.n_steps() != 0 {
            return Err(PodromError::ShapeError(format!(
                "{n_st} snapshots cannot be split into trajectories of {} time steps",
                self.n_steps()
            )));
        }
        Ok(n_st / self.n_steps())
    }

    /// Reorganizes (n_h, n_s * n_t) snapshots with columns `[s0_t0, s0_t1, ..., s1_t0, ...]`
    /// into (n_h, n_t, n_s) trajectory blocks.
    pub fn to_blocks(&self, u: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Array3<f64>> {
        self.check_rows(u.nrows())?;
        let n_s = self.n_samples(u.ncols())?;
        let n_t = self.n_steps();
        let blocks = u
            .as_standard_layout()
            .into_owned()
            .into_shape((self.n_h(), n_s, n_t))
            .map_err(|err| PodromError::ShapeError(err.to_string()))?
            .permuted_axes([0, 2, 1]);
        Ok(blocks.as_standard_layout().into_owned())
    }

    /// Restructures DOFs and snapshots of a (n_h, n_st) matrix:
    /// (n_v, n_xyz, n_s) when steady, (n_v, n_xyz, n_t, n_s) otherwise.
    ///
    /// ```
    /// use podrom::FieldDescriptor;
    /// use ndarray::Array2;
    ///
    /// let field = FieldDescriptor::new(2, 3, 4).unwrap();
    /// let u = Array2::<f64>::zeros((6, 20));
    /// assert_eq!(field.restruct(&u).unwrap().shape(), &[2, 3, 4, 5]);
    /// ```
    pub fn restruct(&self, u: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<ArrayD<f64>> {
        self.check_rows(u.nrows())?;
        let n_s = self.n_samples(u.ncols())?;
        let u = u.as_standard_layout().into_owned();
        let restructed = if self.has_t() {
            u.into_shape(IxDyn(&[self.n_v, self.n_xyz, n_s, self.n_t]))
                .map_err(|err| PodromError::ShapeError(err.to_string()))?
                .permuted_axes(IxDyn(&[0, 1, 3, 2]))
        } else {
            u.into_shape(IxDyn(&[self.n_v, self.n_xyz, n_s]))
                .map_err(|err| PodromError::ShapeError(err.to_string()))?
        };
        Ok(restructed.as_standard_layout().into_owned())
    }

    /// Restructures the snapshots of a single parameter sample:
    /// (n_h, 1) to (n_v, n_xyz) when steady, (n_h, n_t) to (n_v, n_xyz, n_t) otherwise.
    pub fn restruct_single(&self, u: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<ArrayD<f64>> {
        self.check_rows(u.nrows())?;
        if u.ncols() != self.n_steps() {
            return Err(PodromError::ShapeError(format!(
                "single sample snapshots should have {} columns, got {}",
                self.n_steps(),
                u.ncols()
            )));
        }
        let shape = if self.has_t() {
            vec![self.n_v, self.n_xyz, self.n_t]
        } else {
            vec![self.n_v, self.n_xyz]
        };
        u.as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&shape))
            .map_err(|err| PodromError::ShapeError(err.to_string()))
    }

    pub(crate) fn check_rows(&self, nrows: usize) -> Result<()> {
        if nrows != self.n_h() {
            return Err(PodromError::ShapeError(format!(
                "snapshots should have n_h={} rows, got {nrows}",
                self.n_h()
            )));
        }
        Ok(())
    }
}
