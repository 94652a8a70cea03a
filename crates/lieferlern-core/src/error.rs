use thiserror::Error;

/// Validation failures raised before any learned state is touched.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("Invalid state key: {0}")]
    InvalidState(String),
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Invalid timestamp for {field}: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("Invalid thresholds for {dimension}: {reason}")]
    InvalidThresholds {
        dimension: &'static str,
        reason: String,
    },
    #[error("Invalid score weights: {0}")]
    InvalidWeights(String),
}

impl CoreError {
    /// Name of the offending input field, if the error is tied to one.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            CoreError::MissingField(field)
            | CoreError::OutOfRange { field, .. }
            | CoreError::InvalidTimestamp { field, .. } => Some(field),
            CoreError::InvalidThresholds { dimension, .. } => Some(dimension),
            CoreError::InvalidState(_) => Some("state"),
            CoreError::InvalidAction(_) => Some("action"),
            CoreError::InvalidWeights(_) => Some("weights"),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
