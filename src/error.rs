//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = RemiError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, parsing, or corpus IO.
#[derive(Debug, Error)]
pub enum RemiError {
    /// Encoder or ingest configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The input file could not be read or parsed as MusicXML.
    #[error("failed to parse {path:?}: {message}")]
    Parse {
        /// Source file that failed to parse.
        path: PathBuf,
        /// Human-readable description of the failure.
        message: String,
    },
    /// The file parsed but contains no pitched musical content.
    #[error("no musical content in {path:?}")]
    EmptyScore {
        /// Source file containing no notes.
        path: PathBuf,
    },
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RemiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl RemiError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Helper constructor for per-file parse failures.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for errors scoped to a single input file.
    ///
    /// Per-file errors are logged and counted by the batch loop; everything
    /// else aborts the run.
    #[must_use]
    pub fn is_per_file(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::EmptyScore { .. })
    }
}
