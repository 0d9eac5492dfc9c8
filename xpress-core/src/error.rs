//! Structured error types for the xpress workspace.

use thiserror::Error;

/// Unified error type for all xpress operations.
///
/// Each variant is a distinct failure class so callers can tell a bad
/// configuration apart from bad numbers or a malformed file.
#[derive(Debug, Error)]
pub enum XpressError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Contradictory or insufficient configuration, detected before any
    /// numeric work begins.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A numeric precondition failed and excluding the offending rows or
    /// columns would leave nothing usable.
    #[error("data error: {0}")]
    Data(String),

    /// Malformed input record or inconsistent matrix dimensions.
    #[error("format error: {0}")]
    Format(String),
}

impl XpressError {
    /// Attach a path to an I/O error, keeping its kind.
    pub fn io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        XpressError::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.display(), err),
        ))
    }
}

/// Convenience alias used throughout the xpress workspace.
pub type Result<T> = std::result::Result<T, XpressError>;
