//! Error types.

use thiserror::Error;

/// Error type for capture, recording, and playback sessions.
#[derive(Error, Debug)]
pub enum SessionError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Decode failure in the playback path.
    #[error("Media error: {0}")]
    Media(#[from] vocalise_media::MediaError),

    /// Operation not valid in the current session state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No microphone available. Requires user action, never retried.
    #[error("No audio input device available")]
    NoInputDevice,

    /// No playback device available. Requires user action, never retried.
    #[error("No audio output device available")]
    NoOutputDevice,

    /// The device offers a sample format this pipeline does not handle.
    #[error("Unsupported sample format: {0}")]
    UnsupportedSampleFormat(String),

    /// Failed to enumerate devices.
    #[error("Failed to enumerate audio devices")]
    Devices(#[from] cpal::DevicesError),

    /// Failed to get device config.
    #[error("Failed to get audio device config")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),

    /// Failed to build a stream.
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    /// Failed to start a stream.
    #[error("Failed to start audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    /// Failed to pause a stream.
    #[error("Failed to pause audio stream")]
    PauseStream(#[from] cpal::PauseStreamError),

    /// WAV write failure while recording to file.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type.
pub type Result<T> = std::result::Result<T, SessionError>;
