//! Error types.

use thiserror::Error;

/// Error type for analysis operations.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Decode or WAV I/O failure while reading a comparison file.
    #[error("Media error: {0}")]
    Media(#[from] vocalise_media::MediaError),
}

/// Result type.
pub type Result<T> = std::result::Result<T, AnalysisError>;
