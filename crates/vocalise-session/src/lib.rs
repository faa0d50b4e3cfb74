//! # Vocalise Session
//!
//! The hardware-facing sessions of the vocalise core:
//!
//! - [`RecordingSession`]: microphone capture -> per-block pitch estimation
//!   -> time-aligned `(reference, observed)` accumulation -> score at stop
//! - [`KeyShiftPlayer`]: decode -> time-domain pitch shift -> output sink,
//!   with live semitone control and transport events
//! - [`WavRecorder`]: microphone straight to a canonical WAV file
//!
//! Exactly one recording session and one playback session are meant to be
//! active at a time; both are explicitly owned objects that release their
//! device handles on stop and on drop.

pub mod capture;
pub mod error;
pub mod player;
pub mod recorder;
pub mod recording;

pub use capture::{MicCapture, CAPTURE_BLOCK, CAPTURE_SAMPLE_RATE};
pub use error::{Result, SessionError};
pub use player::{KeyShiftPlayer, PlayerEvent};
pub use recorder::WavRecorder;
pub use recording::{LiveReading, RecordingConfig, RecordingSession, RecordingState};
