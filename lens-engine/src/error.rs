use thiserror::Error;

/// The error taxonomy exposed at the `Engine` boundary.
///
/// Validation errors (`InvalidDocument`, `InvalidQuery`, ...) are always
/// returned synchronously, before any side effect. `StorageUnavailable`
/// covers failures from the underlying index engine that this layer
/// cannot recover from on its own.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("document is invalid: {reason}")]
    InvalidDocument { reason: String },

    #[error("query has no non-empty clause")]
    InvalidQuery,

    #[error("document with hash '{hash}' is already indexed")]
    AlreadyIndexed { hash: String },

    #[error("no document found for hash '{hash}'")]
    NotFound { hash: String },

    #[error("search returned no results")]
    NoResults,

    #[error("queue has been stopped, engine is no longer accepting writes")]
    QueueStopped,

    #[error("index storage is unavailable: {source}")]
    StorageUnavailable {
        #[source]
        source: anyhow::Error,
    },

    #[error("content analysis failed: {source}")]
    AnalysisFailed {
        #[source]
        source: anyhow::Error,
    },

    #[error("search deadline exceeded")]
    DeadlineExceeded,
}

impl LensError {
    pub fn storage(source: impl Into<anyhow::Error>) -> Self {
        LensError::StorageUnavailable {
            source: source.into(),
        }
    }

    pub fn analysis(source: impl Into<anyhow::Error>) -> Self {
        LensError::AnalysisFailed {
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LensError>;
