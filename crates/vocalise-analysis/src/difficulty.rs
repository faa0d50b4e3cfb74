//! Difficulty tiers and song profiling.

use serde::{Deserialize, Serialize};
use vocalise_core::PitchContour;

/// Scoring difficulty selected by the user. Easier tiers inflate the base
/// score, harder tiers deflate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoringTier {
    VeryEasy,
    Easy,
    #[default]
    Normal,
    Hard,
    VeryHard,
}

impl ScoringTier {
    /// Multiplier applied to the base score.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::VeryEasy => 1.30,
            Self::Easy => 1.15,
            Self::Normal => 1.00,
            Self::Hard => 0.85,
            Self::VeryHard => 0.70,
        }
    }

    /// Adjust a base score for this tier: multiply, clamp to `[0, 100]`,
    /// and promote a result in `[95, 100)` to exactly 100 half of the time.
    /// The promotion is a deliberate product rule, not a measurement fix.
    pub fn adjust(self, base_score: u8) -> u8 {
        self.adjust_with(base_score, rand::random::<bool>)
    }

    /// [`ScoringTier::adjust`] with the promotion coin injected, for
    /// deterministic callers and tests.
    pub fn adjust_with(self, base_score: u8, promote: impl FnOnce() -> bool) -> u8 {
        let scaled = (base_score as f64 * self.multiplier()) as i64;
        let mut adjusted = scaled.clamp(0, 100) as u8;
        if (95..100).contains(&adjusted) && promote() {
            adjusted = 100;
        }
        adjusted
    }
}

/// How demanding a song is to sing, derived from its reference contour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongDifficulty {
    /// Composite difficulty, 0-100.
    pub score: u8,
    /// Range between the lowest and highest voiced pitch, in semitones.
    pub range_semitones: u32,
    /// Mean voiced pitch, Hz.
    pub mean_hz: f64,
    /// Fraction of voiced steps above the mean pitch.
    pub high_note_ratio: f64,
    /// Suggested score multiplier for this song (0.85-1.3).
    pub suggested_multiplier: f64,
}

impl SongDifficulty {
    /// Profile a reference contour. Values below `silence_threshold_hz` are
    /// ignored; an all-silent contour profiles as a neutral mid difficulty.
    pub fn profile(contour: &PitchContour, silence_threshold_hz: f32) -> Self {
        let voiced: Vec<f32> = contour
            .as_slice()
            .iter()
            .copied()
            .filter(|&hz| hz >= silence_threshold_hz)
            .collect();
        if voiced.is_empty() {
            return Self {
                score: 40,
                range_semitones: 0,
                mean_hz: 0.0,
                high_note_ratio: 0.0,
                suggested_multiplier: 1.0,
            };
        }

        let highest = voiced.iter().cloned().fold(f32::MIN, f32::max);
        let lowest = voiced.iter().cloned().fold(f32::MAX, f32::min);
        let mean_hz = voiced.iter().map(|&v| v as f64).sum::<f64>() / voiced.len() as f64;
        let range_semitones = semitone_span(lowest, highest);
        let high_note_ratio =
            voiced.iter().filter(|&&hz| (hz as f64) > mean_hz).count() as f64 / voiced.len() as f64;

        // Wide range dominates; high tessitura and a top-heavy melody add on.
        let range_score = (range_semitones as f64 / 24.0 * 50.0).clamp(0.0, 50.0);
        let pitch_score = match mean_hz {
            m if m >= 400.0 => 30.0,
            m if m >= 350.0 => 20.0,
            m if m >= 300.0 => 10.0,
            _ => 5.0,
        };
        let high_note_score = (high_note_ratio * 20.0).clamp(0.0, 20.0);
        let score = (range_score + pitch_score + high_note_score) as u8;

        let suggested_multiplier = match score {
            s if s >= 80 => 1.30,
            s if s >= 60 => 1.15,
            s if s >= 40 => 1.00,
            s if s >= 20 => 0.90,
            _ => 0.85,
        };

        Self {
            score,
            range_semitones,
            mean_hz,
            high_note_ratio,
            suggested_multiplier,
        }
    }
}

/// Whole semitones spanned by two frequencies.
fn semitone_span(a: f32, b: f32) -> u32 {
    if a <= 0.0 || b <= 0.0 {
        return 0;
    }
    let ratio = (a.max(b) / a.min(b)) as f64;
    (12.0 * ratio.log2()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_table() {
        assert_eq!(ScoringTier::VeryEasy.multiplier(), 1.30);
        assert_eq!(ScoringTier::Easy.multiplier(), 1.15);
        assert_eq!(ScoringTier::Normal.multiplier(), 1.00);
        assert_eq!(ScoringTier::Hard.multiplier(), 0.85);
        assert_eq!(ScoringTier::VeryHard.multiplier(), 0.70);
    }

    #[test]
    fn adjust_clamps_at_both_ends() {
        assert_eq!(ScoringTier::VeryEasy.adjust_with(100, || false), 100);
        assert_eq!(ScoringTier::VeryEasy.adjust_with(90, || false), 100);
        assert_eq!(ScoringTier::VeryHard.adjust_with(0, || false), 0);
        assert_eq!(ScoringTier::VeryHard.adjust_with(100, || false), 70);
    }

    #[test]
    fn normal_96_lands_in_the_documented_set() {
        // 96 at NORMAL stays 96 or is promoted to exactly 100, nothing else.
        for _ in 0..32 {
            let adjusted = ScoringTier::Normal.adjust(96);
            assert!(adjusted == 96 || adjusted == 100, "got {adjusted}");
        }
        assert_eq!(ScoringTier::Normal.adjust_with(96, || false), 96);
        assert_eq!(ScoringTier::Normal.adjust_with(96, || true), 100);
    }

    #[test]
    fn promotion_only_applies_to_the_95_100_band() {
        assert_eq!(ScoringTier::Normal.adjust_with(94, || true), 94);
        assert_eq!(ScoringTier::Normal.adjust_with(100, || true), 100);
        assert_eq!(ScoringTier::Normal.adjust_with(95, || true), 100);
    }

    #[test]
    fn wide_range_profiles_harder_than_narrow() {
        let narrow = PitchContour::from_hz(vec![220.0, 225.0, 230.0, 222.0, 228.0]);
        let wide = PitchContour::from_hz(vec![110.0, 220.0, 440.0, 550.0, 330.0]);
        let narrow_profile = SongDifficulty::profile(&narrow, 80.0);
        let wide_profile = SongDifficulty::profile(&wide, 80.0);
        assert!(wide_profile.score > narrow_profile.score);
        assert!(wide_profile.range_semitones >= 24);
    }

    #[test]
    fn silent_contour_is_neutral() {
        let profile = SongDifficulty::profile(&PitchContour::from_hz(vec![0.0; 40]), 80.0);
        assert_eq!(profile.range_semitones, 0);
        assert_eq!(profile.suggested_multiplier, 1.0);
    }
}
