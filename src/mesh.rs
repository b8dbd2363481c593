use crate::errors::{PodromError, Result};
use ndarray::{Array, Array2, ArrayBase, ArrayView2, Data, Ix2};
use serde::{Deserialize, Serialize};

/// Spatial discretization: ordered nodes coordinates stored as a (n_xyz, dim) matrix
/// with dim in 1..=3.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    coords: Array2<f64>,
}

/// Regular grid specification along one axis: (min, max, number of nodes)
pub type AxisSpec = (f64, f64, usize);

impl Mesh {
    /// Constructor from (n_xyz, dim) node coordinates
    pub fn new(coords: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Mesh> {
        let (n_xyz, dim) = coords.dim();
        if n_xyz == 0 {
            return Err(PodromError::ShapeError("mesh should have at least one node".to_string()));
        }
        if !(1..=3).contains(&dim) {
            return Err(PodromError::ShapeError(format!(
                "mesh dimension should be 1, 2 or 3, got {dim}"
            )));
        }
        Ok(Mesh {
            coords: coords.to_owned(),
        })
    }

    /// Regular tensor grid where x varies fastest, then y, then z.
    ///
    /// ```
    /// use podrom::Mesh;
    ///
    /// let mesh = Mesh::linear((0., 1., 3), Some((0., 2., 2)), None).unwrap();
    /// assert_eq!(mesh.n_xyz(), 6);
    /// assert_eq!(mesh.dim(), 2);
    /// ```
    pub fn linear(x: AxisSpec, y: Option<AxisSpec>, z: Option<AxisSpec>) -> Result<Mesh> {
        if z.is_some() && y.is_none() {
            return Err(PodromError::ShapeError(
                "z axis given without y axis".to_string(),
            ));
        }
        let axes: Vec<AxisSpec> = [Some(x), y, z].into_iter().flatten().collect();
        if let Some((min, max, _)) = axes.iter().find(|(min, max, _)| !(min <= max)) {
            return Err(PodromError::InvalidValueError(format!(
                "axis bounds should satisfy min <= max, got [{min}, {max}]"
            )));
        }
        let grids: Vec<_> = axes
            .iter()
            .map(|&(min, max, n)| Array::linspace(min, max, n))
            .collect();
        let n_xyz: usize = grids.iter().map(|g| g.len()).product();
        let mut coords = Array2::zeros((n_xyz, grids.len()));
        for (k, mut node) in coords.rows_mut().into_iter().enumerate() {
            let mut rem = k;
            for (d, grid) in grids.iter().enumerate() {
                node[d] = grid[rem % grid.len()];
                rem /= grid.len();
            }
        }
        Mesh::new(&coords)
    }

    /// Number of nodes
    pub fn n_xyz(&self) -> usize {
        self.coords.nrows()
    }

    /// Space dimension
    pub fn dim(&self) -> usize {
        self.coords.ncols()
    }

    /// (n_xyz, dim) node coordinates
    pub fn coords(&self) -> &Array2<f64> {
        &self.coords
    }

    /// (dim, n_xyz) coordinates as expected by high-fidelity functions
    pub fn x(&self) -> ArrayView2<f64> {
        self.coords.t()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_linear_mesh_1d() {
        let mesh = Mesh::linear((0., 1., 5), None, None).unwrap();
        assert_eq!(mesh.dim(), 1);
        let x = mesh.x();
        assert_abs_diff_eq!(x.row(0), array![0., 0.25, 0.5, 0.75, 1.], epsilon = 1e-15);
    }

    #[test]
    fn test_linear_mesh_2d() {
        let mesh = Mesh::linear((0., 1., 2), Some((10., 30., 3)), None).unwrap();
        assert_abs_diff_eq!(
            mesh.coords(),
            &array![[0., 10.], [1., 10.], [0., 20.], [1., 20.], [0., 30.], [1., 30.]],
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_linear_mesh_3d() {
        let mesh = Mesh::linear((0., 1., 2), Some((0., 1., 3)), Some((0., 1., 4))).unwrap();
        assert_eq!(mesh.n_xyz(), 24);
        assert_eq!(mesh.dim(), 3);
    }

    #[test]
    fn test_invalid_meshes() {
        assert!(Mesh::new(&Array2::<f64>::zeros((0, 1))).is_err());
        assert!(Mesh::new(&Array2::<f64>::zeros((3, 4))).is_err());
        assert!(Mesh::linear((1., 0., 3), None, None).is_err());
        assert!(Mesh::linear((0., 1., 3), None, Some((0., 1., 2))).is_err());
        assert!(Mesh::linear((0., 1., 0), None, None).is_err());
    }
}
