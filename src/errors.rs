use thiserror::Error;

/// A result type for reduced-order model operations
pub type Result<T> = std::result::Result<T, PodromError>;

/// An error when building or using a reduced-order model
#[derive(Error, Debug)]
pub enum PodromError {
    /// When array dimensions are not consistent
    #[error("Shape error: {0}")]
    ShapeError(String),
    /// When an operation is called in the wrong model state
    #[error("State error: {0}")]
    StateError(String),
    /// When a checkpoint file is missing
    #[error("Missing artifact: {0}")]
    MissingArtifactError(String),
    /// When the high-fidelity function fails
    #[error("Evaluation error at sample {index}: {message}")]
    EvaluationError {
        /// index of the failing parameter sample
        index: usize,
        /// reason of the failure
        message: String,
    },
    /// When checkpoints do not belong to the same model
    #[error("Incompatible artifact: {0}")]
    IncompatibleArtifact(String),
    /// When a parameter value is invalid
    #[error("InvalidValue error: {0}")]
    InvalidValueError(String),
    /// When the regressor fails
    #[error("Regressor error: {0}")]
    RegressorError(String),
    /// When sampling fails
    #[error(transparent)]
    DoeError(#[from] podrom_doe::DoeError),
    /// When basis extraction or reduction kernels fail
    #[error(transparent)]
    PodError(#[from] podrom_pod::PodError),
    /// When linear algebra computation fails
    #[error(transparent)]
    LinalgError(#[from] linfa_linalg::LinalgError),
    /// When a linfa error occurs
    #[error(transparent)]
    LinfaError(#[from] linfa::error::Error),
    /// When error during saving or loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// When error during json (de)serialization
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
    /// When error during binary (de)serialization
    #[error("Binary error: {0}")]
    BinaryError(#[from] bincode::Error),
}
