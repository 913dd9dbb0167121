//! Error types for the highlight engine

use thiserror::Error;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error type
///
/// Anchor errors are scoped to a single annotation and never abort a
/// restoration pass. Storage errors on load fail open to an empty set.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Malformed anchor path: {0}")]
    MalformedAnchor(String),

    #[error("Unresolvable anchor for text {0:?}")]
    UnresolvableAnchor(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Legacy migration incomplete: {migrated} migrated, {failed} not found")]
    MigrationPartialFailure { migrated: usize, failed: usize },

    #[error("Range boundary is outside the anchor root")]
    OutsideRoot,

    #[error("Document parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether this error only affects a single annotation
    pub fn is_per_annotation(&self) -> bool {
        matches!(
            self,
            EngineError::MalformedAnchor(_)
                | EngineError::UnresolvableAnchor(_)
                | EngineError::OutsideRoot
        )
    }
}

impl From<roxmltree::Error> for EngineError {
    fn from(err: roxmltree::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}
