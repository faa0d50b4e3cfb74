//! Vibrato detection over an observed pitch sequence.
//!
//! Works on the 100 ms contour cadence: oscillation rate is estimated from
//! direction changes of the voiced pitch trace and depth from the mean
//! absolute step. The result is supplementary feedback only - it never
//! feeds the headline total.

use serde::{Deserialize, Serialize};

/// Minimum voiced samples before vibrato analysis is meaningful (2 s).
const MIN_VOICED_SAMPLES: usize = 20;

/// Seconds represented by one contour step.
const STEP_SECONDS: f64 = 0.1;

/// Outcome of vibrato analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VibratoInfo {
    /// Sustained periodic oscillation in the expected vocal range.
    pub present: bool,
    /// Estimated oscillation rate, Hz.
    pub rate_hz: f64,
    /// Estimated oscillation depth, Hz of pitch deviation.
    pub depth_hz: f64,
    /// Auxiliary sub-score in `[0, 1]`; 0.5 is neutral (no vibrato).
    pub score: f64,
}

impl Default for VibratoInfo {
    fn default() -> Self {
        Self {
            present: false,
            rate_hz: 0.0,
            depth_hz: 0.0,
            score: 0.5,
        }
    }
}

/// Analyze the voiced portion of `pitches` (values below
/// `silence_threshold_hz` are skipped) for sustained small oscillation.
pub fn detect_vibrato(pitches: &[f32], silence_threshold_hz: f32) -> VibratoInfo {
    let voiced: Vec<f32> = pitches
        .iter()
        .copied()
        .filter(|&hz| hz >= silence_threshold_hz)
        .collect();
    if voiced.len() < MIN_VOICED_SAMPLES {
        return VibratoInfo::default();
    }

    let steps: Vec<f32> = voiced.windows(2).map(|w| w[1] - w[0]).collect();

    // Count direction reversals of the pitch trace.
    let mut reversals = 0usize;
    let mut last_step = 0.0f32;
    for &step in &steps {
        if (step > 0.0 && last_step < 0.0) || (step < 0.0 && last_step > 0.0) {
            reversals += 1;
        }
        if step != 0.0 {
            last_step = step;
        }
    }

    let duration = voiced.len() as f64 * STEP_SECONDS;
    let rate_hz = (reversals as f64 / 2.0) / duration;
    let depth_hz = steps.iter().map(|s| s.abs() as f64).sum::<f64>() / steps.len() as f64;

    let present = (3.0..=8.0).contains(&rate_hz) && (5.0..=30.0).contains(&depth_hz);
    let score = if !present {
        0.5
    } else if (4.0..=7.0).contains(&rate_hz) && (8.0..=20.0).contains(&depth_hz) {
        1.0
    } else {
        0.8
    };

    VibratoInfo {
        present,
        rate_hz,
        depth_hz,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_tone_has_no_vibrato() {
        let info = detect_vibrato(&vec![440.0; 50], 80.0);
        assert!(!info.present);
        assert_eq!(info.score, 0.5);
    }

    #[test]
    fn modulated_tone_is_flagged() {
        // 5 Hz triangle modulation, +/-12 Hz around 440: one reversal per
        // 0.1 s step alternation at the contour cadence.
        let pitches: Vec<f32> = (0..60)
            .map(|i| if i % 2 == 0 { 440.0 - 12.0 } else { 440.0 + 12.0 })
            .collect();
        let info = detect_vibrato(&pitches, 80.0);
        assert!(info.present, "rate {} depth {}", info.rate_hz, info.depth_hz);
        assert!(info.score >= 0.8);
    }

    #[test]
    fn too_short_a_trace_is_neutral() {
        let info = detect_vibrato(&[440.0; 10], 80.0);
        assert!(!info.present);
        assert_eq!(info.score, 0.5);
    }

    #[test]
    fn silence_is_skipped_before_analysis() {
        let mut pitches = vec![0.0f32; 40];
        pitches.extend([440.0; 5]);
        let info = detect_vibrato(&pitches, 80.0);
        assert!(!info.present);
    }
}
