//! Error types for clipmux.
//!
//! Both engines fail fast: the first unrecoverable error aborts the whole
//! operation and no partial output is returned. Retrying (e.g. re-fetching a
//! source buffer) is a caller concern and stays out of this crate.

use std::io;
use thiserror::Error;

/// Result type for clipmux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for clipmux operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The input could not be parsed as a container, or it has no tracks.
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// A duration precondition failed: the source reports a non-positive
    /// total duration, or the requested segment duration is non-positive.
    #[error("Invalid duration: {reason}")]
    InvalidDuration {
        /// Why the duration was rejected.
        reason: String,
    },

    /// Processing completed but produced no usable output.
    #[error("Extraction failure: {0}")]
    ExtractionFailure(String),

    /// `combine` was called with no sources.
    #[error("No sources provided")]
    EmptyInput,

    /// Sources passed to `combine` disagree on timescale or track layout.
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an invalid container error.
    pub fn invalid_container(msg: impl Into<String>) -> Self {
        Self::InvalidContainer(msg.into())
    }

    /// Create an invalid duration error.
    pub fn invalid_duration(reason: impl Into<String>) -> Self {
        Self::InvalidDuration {
            reason: reason.into(),
        }
    }

    /// Create an extraction failure error.
    pub fn extraction_failure(msg: impl Into<String>) -> Self {
        Self::ExtractionFailure(msg.into())
    }

    /// Create a format mismatch error.
    pub fn format_mismatch(msg: impl Into<String>) -> Self {
        Self::FormatMismatch(msg.into())
    }
}
