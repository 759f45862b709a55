//! Error taxonomy for the engine surface.
//!
//! Every boundary operation returns `Result<_, EngineError>`. Cell-level
//! coercion failures are deliberately absent: a cell that fails to coerce
//! degrades to `Cell::Null` inside the affected column and is never
//! surfaced as an error.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed job or mapping descriptor, unsupported format, missing
    /// merge keys. Reported before any work is performed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Input bytes could not be decoded or parsed, including spreadsheet
    /// sub-formats without an enabled reader capability.
    #[error("decode error: {0}")]
    Decode(String),

    /// Diff preconditions violated: row count or column set mismatch.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Failure while writing an output artifact. Reported per mapping
    /// entry; already-written entries are not rolled back.
    #[error("failed to write artifact {path}: {message}")]
    Artifact { path: PathBuf, message: String },
}

impl EngineError {
    pub fn artifact(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        EngineError::Artifact {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
