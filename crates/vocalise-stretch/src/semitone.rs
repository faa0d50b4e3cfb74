//! Twelve-tone equal temperament key offsets.

/// Lowest supported key offset in semitones.
pub const MIN_SEMITONES: i32 = -6;

/// Highest supported key offset in semitones.
pub const MAX_SEMITONES: i32 = 6;

/// Frequency ratio for a key offset of `semitones` under 12-TET: `2^(n/12)`.
pub fn semitone_ratio(semitones: i32) -> f32 {
    2.0_f32.powf(semitones as f32 / 12.0)
}

/// Clamp a requested key offset into the supported `[-6, +6]` range.
pub fn clamp_semitones(semitones: i32) -> i32 {
    semitones.clamp(MIN_SEMITONES, MAX_SEMITONES)
}

/// Display label for a key offset: "+2", "-1", or "0" for the original key.
pub fn key_label(semitones: i32) -> String {
    if semitones > 0 {
        format!("+{semitones}")
    } else {
        format!("{semitones}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unity_at_zero() {
        assert_relative_eq!(semitone_ratio(0), 1.0);
    }

    #[test]
    fn octave_is_double() {
        assert_relative_eq!(semitone_ratio(12), 2.0, epsilon = 1e-6);
        assert_relative_eq!(semitone_ratio(-12), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn whole_supported_range() {
        for n in MIN_SEMITONES..=MAX_SEMITONES {
            let expected = 2.0_f32.powf(n as f32 / 12.0);
            assert_relative_eq!(semitone_ratio(n), expected);
        }
        // Adjacent offsets differ by the same factor throughout
        let step = semitone_ratio(1);
        for n in MIN_SEMITONES..MAX_SEMITONES {
            assert_relative_eq!(
                semitone_ratio(n + 1) / semitone_ratio(n),
                step,
                epsilon = 1e-5
            );
        }
    }

    #[test]
    fn clamping() {
        assert_eq!(clamp_semitones(9), 6);
        assert_eq!(clamp_semitones(-13), -6);
        assert_eq!(clamp_semitones(3), 3);
    }

    #[test]
    fn labels() {
        assert_eq!(key_label(2), "+2");
        assert_eq!(key_label(-5), "-5");
        assert_eq!(key_label(0), "0");
    }
}
