use thiserror::Error;

#[derive(Error, Debug)]
pub enum TargetingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl TargetingError {
    /// True for errors that should block the current wizard step rather than
    /// be reported as a collaborator failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, TargetingError::Validation(_))
    }
}
