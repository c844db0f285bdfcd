//! Centralized error types for mboxner.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxner library.
#[derive(Error, Debug)]
pub enum NerError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified mailbox does not exist.
    #[error("MBOX file not found: {0}")]
    MailboxNotFound(PathBuf),

    /// Bad command-line or config-file input, detected before any processing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The entity-book root is missing a per-category subdirectory.
    ///
    /// Raised at load time, before inference, so that a run which cannot be
    /// persisted never wastes model work.
    #[error("Missing entity-book category directory: {0}")]
    MissingCategoryDir(PathBuf),

    /// The NER backend raised during a whole-batch invocation.
    #[error("Batch inference failed: {0}")]
    BatchInference(String),

    /// The NER backend raised for a single message.
    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Convenience alias for `Result<T, NerError>`.
pub type Result<T> = std::result::Result<T, NerError>;

impl NerError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `NerError`
/// when no path context is available (rare — prefer `NerError::io`).
impl From<std::io::Error> for NerError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
