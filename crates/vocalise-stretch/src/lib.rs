//! # Vocalise Stretch
//!
//! Streaming time-domain time-stretch and pitch-shift for interleaved 16-bit
//! PCM. The engine locates the dominant pitch period by bounded
//! autocorrelation over the vocal range and removes or duplicates whole
//! periods under a triangular overlap-add crossfade, so key changes stay
//! cheap enough for live playback - no FFT vocoder involved.
//!
//! # Example
//!
//! ```
//! use vocalise_stretch::{semitone_ratio, StretchStream};
//!
//! let mut stream = StretchStream::new(44_100, 1);
//! stream.set_pitch(semitone_ratio(2)); // up two semitones, tempo unchanged
//!
//! stream.write(&[0i16; 4096]);
//! let mut out = [0i16; 4096];
//! let frames = stream.read(&mut out);
//! # let _ = frames;
//! ```

mod semitone;
mod stream;

pub use semitone::{clamp_semitones, key_label, semitone_ratio, MAX_SEMITONES, MIN_SEMITONES};
pub use stream::StretchStream;
