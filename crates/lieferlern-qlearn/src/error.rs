use lieferlern_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QLearnError {
    #[error("Snapshot deserialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Invalid configuration for {field}: {reason}")]
    Config { field: &'static str, reason: String },
    #[error("Reward must be finite, got {0}")]
    NonFiniteReward(f64),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Internal error: {0}")]
    Internal(&'static str),
}

impl QLearnError {
    pub(crate) fn config(field: &'static str, reason: impl Into<String>) -> Self {
        QLearnError::Config {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field, if known.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            QLearnError::Config { field, .. } => Some(field),
            QLearnError::NonFiniteReward(_) => Some("reward"),
            QLearnError::InvalidAction(_) => Some("action"),
            QLearnError::Core(e) => e.field(),
            QLearnError::Snapshot(_) | QLearnError::Internal(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, QLearnError>;
