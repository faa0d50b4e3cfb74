//! Error types.

use thiserror::Error;

/// Error type for decode and WAV I/O.
#[derive(Error, Debug)]
pub enum MediaError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container probe or codec failure.
    #[error("Decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// The container holds no decodable audio track.
    #[error("No audio track found")]
    NoAudioTrack,

    /// The track does not declare a sample rate.
    #[error("Unknown sample rate")]
    UnknownSampleRate,

    /// WAV read/write failure.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// The file is not a canonical 16-bit PCM WAV.
    #[error("Malformed WAV file: {0}")]
    MalformedWav(String),
}

/// Result type.
pub type Result<T> = std::result::Result<T, MediaError>;
