//! Typed error taxonomy for the composition engine.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Closed set of failure modes the engine can produce.
///
/// Per-file failures that map to [`EngineError::NotFound`] or a non-fatal
/// [`EngineError::IntegrityMismatch`] are caught by callers and folded into
/// `ValidationIssue`s rather than propagated; every other variant aborts the
/// preparation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("source file not found: {0}")]
    NotFound(PathBuf),

    #[error("integrity mismatch for {path}: expected {expected}, got {actual}")]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("capability unsupported: {0}")]
    CapabilityUnsupported(String),

    #[error("CAS object {hash} could not be materialized at {dst} after all fallbacks")]
    CasMissing { hash: String, dst: PathBuf },

    #[error("operation cancelled")]
    Cancelled,

    #[error("source unreadable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("preparation aborted: {0}")]
    PreparationAborted(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl EngineError {
    /// Whether this error is fatal to the whole preparation, as opposed to
    /// recoverable at the level of a single file group.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EngineError::NotFound(_))
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}
