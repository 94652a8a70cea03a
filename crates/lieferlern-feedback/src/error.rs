use lieferlern_core::CoreError;
use lieferlern_qlearn::QLearnError;
use thiserror::Error;

use crate::source::SourceError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] CoreError),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("upstream unavailable: {source}")]
    Upstream {
        /// Supplier whose data was requested, if the call was per supplier.
        supplier_id: Option<u64>,
        #[source]
        source: SourceError,
    },
    #[error(transparent)]
    Learning(#[from] QLearnError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Stable category for API responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::NotFound { .. } => "not_found",
            EngineError::Upstream { .. } => "upstream_unavailable",
            EngineError::Learning(QLearnError::Core(_) | QLearnError::Config { .. }) => {
                "validation"
            }
            EngineError::Learning(_) | EngineError::Store(_) => "internal",
        }
    }

    /// Offending input field, when the error is tied to one.
    #[must_use]
    pub fn field(&self) -> Option<&'static str> {
        match self {
            EngineError::Validation(e) => e.field(),
            EngineError::Learning(e) => e.field(),
            EngineError::NotFound { .. }
            | EngineError::Upstream { .. }
            | EngineError::Store(_) => None,
        }
    }
}

pub(crate) fn upstream(supplier_id: Option<u64>) -> impl FnOnce(SourceError) -> EngineError {
    move |source| EngineError::Upstream {
        supplier_id,
        source,
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
