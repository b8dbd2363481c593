use thiserror::Error;

/// A result type for design of experiments
pub type Result<T> = std::result::Result<T, DoeError>;

/// An error when building a design of experiments
#[derive(Error, Debug)]
pub enum DoeError {
    /// When bounds or samples dimensions are inconsistent
    #[error("Shape error: {0}")]
    ShapeError(String),
    /// When a lower bound is greater than its upper bound
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
}
