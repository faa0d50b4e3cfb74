//! # Vocalise
//!
//! Karaoke-style vocal practice core: a streaming time-domain
//! pitch-shift/time-stretch engine, live microphone pitch tracking aligned
//! against a precomputed reference contour, and performance scoring.
//!
//! This umbrella crate re-exports the subsystem crates:
//!
//! - [`core`](vocalise_core): sample queues, latest-value cells, contours
//! - [`media`](vocalise_media): decode and canonical WAV I/O
//! - [`stretch`](vocalise_stretch): the time-stretch/pitch-shift engine
//! - [`analysis`](vocalise_analysis): YIN estimation, contour extraction,
//!   scoring, vibrato, difficulty tiers
//! - [`session`](vocalise_session): recording and playback sessions
//!
//! # A practice session, end to end
//!
//! ```no_run
//! use vocalise::analysis::ContourExtractor;
//! use vocalise::session::{RecordingConfig, RecordingSession};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Analyze the backing track once.
//! let contour = ContourExtractor::new()
//!     .extract(Path::new("song.mp3"), |pct| println!("{pct}%"));
//!
//! // 2. Record against it.
//! let mut session = RecordingSession::new(RecordingConfig::default());
//! session.start(contour)?;
//! // ... the user sings ...
//! let score = session.stop()?;
//! println!("total: {}", score.total);
//! # Ok(())
//! # }
//! ```
//!
//! # Key-shifted playback
//!
//! ```no_run
//! use vocalise::session::KeyShiftPlayer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut player = KeyShiftPlayer::new();
//! player.play("song.mp3")?;
//! player.set_semitones(2); // up a whole step, tempo unchanged
//! # Ok(())
//! # }
//! ```

pub use vocalise_analysis as analysis;
pub use vocalise_core as core;
pub use vocalise_media as media;
pub use vocalise_session as session;
pub use vocalise_stretch as stretch;

pub use vocalise_analysis::{
    compare_files, CompareWeights, ContourExtractor, FileComparison, FrequencyEstimator,
    ScoreAnalyzer, ScoreConfig, ScoreResult, ScoringTier, SongDifficulty, VibratoInfo,
    YinEstimator,
};
pub use vocalise_core::{PitchContour, PitchPair, SampleQueue, CONTOUR_HOP_MS};
pub use vocalise_session::{
    KeyShiftPlayer, PlayerEvent, RecordingConfig, RecordingSession, RecordingState, WavRecorder,
};
pub use vocalise_stretch::{semitone_ratio, StretchStream};
