//! # Vocalise Core
//!
//! Shared primitives for the vocalise audio pipeline:
//!
//! - **Sample queues**: growable interleaved 16-bit PCM queues with explicit
//!   logical-length vs. capacity tracking ([`SampleQueue`])
//! - **Latest-value cells**: lock-free single-slot publication for values the
//!   UI polls ([`LatestCell`])
//! - **Pitch contours**: fixed-cadence reference pitch sequences and the
//!   `(reference, observed)` pairs accumulated while recording
//!
//! Everything here operates on plain slices and owned buffers - no audio
//! hardware or codec dependencies.

pub mod buffer;
pub mod cell;
pub mod contour;

pub use buffer::SampleQueue;
pub use cell::LatestCell;
pub use contour::{PitchContour, PitchPair, CONTOUR_HOP_MS};

/// Lock-free `f32` cell for parameters shared with audio threads.
pub use atomic_float::AtomicF32;
