//! Error taxonomy for the pricing engine
//!
//! Contract violations (missing features, domain violations, malformed
//! pools) surface immediately to the caller; nothing here is retried
//! internally. Early stopping during a fit is control flow, not an error.

use thiserror::Error;

/// Result type alias for pricing engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes surfaced by the pricing engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A required factor or target column is absent from the input.
    #[error("missing feature `{0}`")]
    MissingFeature(&'static str),

    /// A value is outside its valid domain (non-positive exposure, unseen
    /// categorical level, expense rates summing to >= 1).
    #[error("domain error: {0}")]
    Domain(String),

    /// An empty or malformed train/validation pool.
    #[error("training error: {0}")]
    Training(String),

    /// A persisted model artifact that cannot be used (wrong version, wrong
    /// model kind, corrupt contents).
    #[error("model artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Domain error with a formatted message.
    pub fn domain(msg: impl Into<String>) -> Self {
        Error::Domain(msg.into())
    }

    /// Training error with a formatted message.
    pub fn training(msg: impl Into<String>) -> Self {
        Error::Training(msg.into())
    }
}
