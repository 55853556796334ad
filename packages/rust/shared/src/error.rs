//! Error types for feedgen.
//!
//! Library crates use [`FeedgenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-pair probe failures are never represented here: they are values
//! ([`crate::ProbeOutcome`]) recorded in the support matrix.

use std::path::PathBuf;

/// Top-level error type for all feedgen operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedgenError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Feed catalog could not be loaded or violates its schema.
    #[error("catalog error: {message}")]
    Catalog { message: String },

    /// Network/HTTP error while building a client.
    #[error("network error: {0}")]
    Network(String),

    /// An artifact could not be produced or written.
    #[error("emission error ({artifact}): {message}")]
    Emission { artifact: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (schema mismatch, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedgenError>;

impl FeedgenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a catalog error from any displayable message.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog {
            message: msg.into(),
        }
    }

    /// Create an emission error for the named artifact.
    pub fn emission(artifact: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Emission {
            artifact: artifact.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
