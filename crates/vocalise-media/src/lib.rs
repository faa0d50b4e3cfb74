//! # Vocalise Media
//!
//! Decode and file I/O for the vocalise core:
//!
//! - [`AudioReader`]: streaming packet-by-packet decode of any
//!   symphonia-supported container into interleaved 16-bit PCM, with coarse
//!   seeking for transport control
//! - [`decode_file`]: whole-track convenience decode
//! - [`wav`]: canonical 16-bit PCM WAV read/write (44-byte
//!   RIFF/WAVE/`fmt `/`data` header) plus raw data-chunk access for the
//!   byte-window similarity metrics

pub mod decode;
pub mod error;
pub mod wav;

pub use decode::{decode_file, AudioReader, DecodedAudio};
pub use error::{MediaError, Result};
