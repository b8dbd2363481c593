use thiserror::Error;

/// A result type for POD basis extraction and reduction kernels
pub type Result<T> = std::result::Result<T, PodError>;

/// An error when extracting a POD basis or running reduction kernels
#[derive(Error, Debug)]
pub enum PodError {
    /// When the snapshot matrix has no column or no row
    #[error("Empty snapshots: {0}")]
    EmptySnapshots(String),
    /// When matrices dimensions are inconsistent
    #[error("Shape error: {0}")]
    ShapeError(String),
    /// When a parameter value is invalid
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
}
