//! Error types for TopicDoc.
//!
//! Library crates use [`TopicDocError`] via `thiserror` at their public
//! boundaries; component-level errors (fetch, discovery, generation) live in
//! their own crates and convert into this type when they cross into the
//! pipeline. The CLI wraps everything with `color-eyre`.

use std::path::PathBuf;

/// Top-level error type for all TopicDoc operations.
#[derive(Debug, thiserror::Error)]
pub enum TopicDocError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error outside the per-URL fetch path.
    #[error("network error: {0}")]
    Network(String),

    /// Parse error (model JSON output, HTML, etc.).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A generative model call failed.
    #[error("generation error: {0}")]
    Generation(String),

    /// Document synthesis failed. Fatal to the run.
    #[error("synthesis failed for '{subject}' ({mode}): {message}")]
    Synthesis {
        subject: String,
        mode: String,
        message: String,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TopicDocError>;

impl TopicDocError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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
