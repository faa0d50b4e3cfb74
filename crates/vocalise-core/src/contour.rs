//! Reference pitch contours and accumulated pitch pairs.

use serde::{Deserialize, Serialize};

/// Contour cadence: one pitch value per 100 ms of track time.
pub const CONTOUR_HOP_MS: u64 = 100;

/// Time-ordered pitch sequence at the fixed [`CONTOUR_HOP_MS`] cadence.
///
/// An entry of `0.0` means the window was unvoiced (silence is a valid
/// value, not an error). Contours are built once by the extractor and only
/// borrowed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PitchContour {
    hz: Vec<f32>,
}

impl PitchContour {
    /// Wrap a sequence of Hz values (0.0 = unvoiced).
    pub fn from_hz(hz: Vec<f32>) -> Self {
        Self { hz }
    }

    /// An empty contour, the degrade-gracefully result of a failed analysis.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of 100 ms steps.
    pub fn len(&self) -> usize {
        self.hz.len()
    }

    /// True when there is nothing to align against.
    pub fn is_empty(&self) -> bool {
        self.hz.is_empty()
    }

    /// Pitch at `index`, or `None` past the end of the contour.
    pub fn get(&self, index: usize) -> Option<f32> {
        self.hz.get(index).copied()
    }

    /// Step index for a time offset in milliseconds.
    pub fn index_at_ms(elapsed_ms: u64) -> usize {
        (elapsed_ms / CONTOUR_HOP_MS) as usize
    }

    /// Covered duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.hz.len() as u64 * CONTOUR_HOP_MS
    }

    /// The raw Hz sequence.
    pub fn as_slice(&self) -> &[f32] {
        &self.hz
    }
}

/// One aligned `(reference, observed)` pitch sample, in Hz.
///
/// `observed` is `0.0` when the estimator reported no pitch for the block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchPair {
    /// Reference contour value at this time step.
    pub reference: f32,
    /// Pitch estimated from the microphone block.
    pub observed: f32,
}

impl PitchPair {
    /// Absolute deviation between the two pitches in Hz.
    pub fn error_hz(&self) -> f32 {
        (self.reference - self.observed).abs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_follows_cadence() {
        assert_eq!(PitchContour::index_at_ms(0), 0);
        assert_eq!(PitchContour::index_at_ms(99), 0);
        assert_eq!(PitchContour::index_at_ms(100), 1);
        assert_eq!(PitchContour::index_at_ms(1_050), 10);
    }

    #[test]
    fn duration_matches_length() {
        let contour = PitchContour::from_hz(vec![0.0; 30]);
        assert_eq!(contour.duration_ms(), 3_000);
        assert_eq!(contour.len(), 30);
    }

    #[test]
    fn get_is_bounds_checked() {
        let contour = PitchContour::from_hz(vec![440.0, 0.0]);
        assert_eq!(contour.get(0), Some(440.0));
        assert_eq!(contour.get(1), Some(0.0));
        assert_eq!(contour.get(2), None);
    }

    #[test]
    fn pair_error_is_absolute() {
        let pair = PitchPair {
            reference: 440.0,
            observed: 452.5,
        };
        assert!((pair.error_hz() - 12.5).abs() < f32::EPSILON);
    }
}
