//! Hardware-free end-to-end tests of the practice pipeline:
//! synthesize a track -> extract the reference contour -> score a take
//! against it -> apply difficulty scaling, plus the offline half of the
//! key-shift path (decode -> stretch).
//!
//! Run with:
//! ```bash
//! cargo test -p vocalise --test practice_flow
//! ```

use std::path::PathBuf;
use vocalise::analysis::{compare_files, CompareWeights, ContourExtractor};
use vocalise::{
    semitone_ratio, PitchContour, PitchPair, ScoreAnalyzer, ScoreConfig, ScoringTier,
    SongDifficulty, StretchStream,
};

const RATE: u32 = 22_050;

/// A slow upward sweep, the kind of contour a sustained vocal line produces.
fn sine_sweep(start_hz: f32, end_hz: f32, duration_secs: f32, amplitude: f32) -> Vec<i16> {
    let frames = (RATE as f32 * duration_secs) as usize;
    let mut phase = 0.0f64;
    (0..frames)
        .map(|i| {
            let progress = i as f32 / frames as f32;
            let freq = start_hz + (end_hz - start_hz) * progress;
            phase += 2.0 * std::f64::consts::PI * freq as f64 / RATE as f64;
            (phase.sin() as f32 * amplitude) as i16
        })
        .collect()
}

fn write_track(dir: &tempfile::TempDir, name: &str, samples: &[i16]) -> PathBuf {
    let path = dir.path().join(name);
    vocalise::media::wav::write_wav(&path, samples, RATE, 1).unwrap();
    path
}

#[test]
fn sweep_recorded_against_itself_scores_at_least_95() {
    let dir = tempfile::tempdir().unwrap();
    let track = write_track(&dir, "sweep.wav", &sine_sweep(200.0, 300.0, 3.0, 12_000.0));

    let mut progress = Vec::new();
    let contour = ContourExtractor::new().extract(&track, |p| progress.push(p));

    // 3 s at the 100 ms cadence.
    assert_eq!(contour.len(), 30);
    assert_eq!(progress.last(), Some(&100));
    let voiced = contour.as_slice().iter().filter(|&&hz| hz > 0.0).count();
    assert!(voiced >= 28, "sweep should be voiced nearly throughout");

    // Reference == observed: the ideal take.
    let pairs: Vec<PitchPair> = contour
        .as_slice()
        .iter()
        .map(|&hz| PitchPair {
            reference: hz,
            observed: hz,
        })
        .collect();

    let result = ScoreAnalyzer::from_pairs(&pairs, ScoreConfig::default()).analyze();
    assert!(result.total >= 95, "got {}", result.total);
    assert!(result.pitch_accuracy > 0.99);
}

#[test]
fn detuned_take_scores_below_the_ideal_take() {
    let dir = tempfile::tempdir().unwrap();
    let track = write_track(&dir, "line.wav", &sine_sweep(220.0, 260.0, 3.0, 12_000.0));
    let contour = ContourExtractor::new().extract(&track, |_| {});

    let ideal: Vec<PitchPair> = contour
        .as_slice()
        .iter()
        .map(|&hz| PitchPair {
            reference: hz,
            observed: hz,
        })
        .collect();
    // A take that is consistently a fourth sharp (well past 50 Hz off).
    let sharp: Vec<PitchPair> = contour
        .as_slice()
        .iter()
        .map(|&hz| PitchPair {
            reference: hz,
            observed: hz * 4.0 / 3.0,
        })
        .collect();

    let config = ScoreConfig::default();
    let ideal_total = ScoreAnalyzer::from_pairs(&ideal, config).analyze().total;
    let sharp_total = ScoreAnalyzer::from_pairs(&sharp, config).analyze().total;
    assert!(sharp_total < ideal_total, "{sharp_total} !< {ideal_total}");
}

#[test]
fn difficulty_scaling_sits_on_top_of_the_base_score() {
    let base = 96u8;
    // Deterministic coin: the documented outcomes for NORMAL are {96, 100}.
    assert_eq!(ScoringTier::Normal.adjust_with(base, || false), 96);
    assert_eq!(ScoringTier::Normal.adjust_with(base, || true), 100);
    // The hardest tier deflates out of the promotion band entirely.
    assert_eq!(ScoringTier::VeryHard.adjust_with(base, || true), 67);
}

#[test]
fn song_difficulty_profiles_from_the_extracted_contour() {
    let dir = tempfile::tempdir().unwrap();
    let track = write_track(&dir, "wide.wav", &sine_sweep(150.0, 420.0, 3.0, 12_000.0));
    let contour = ContourExtractor::new().extract(&track, |_| {});

    let profile = SongDifficulty::profile(&contour, 80.0);
    assert!(profile.range_semitones >= 12, "sweep spans over an octave");
    assert!(profile.score > 0);
}

#[test]
fn key_shift_of_a_decoded_track_preserves_duration() {
    let dir = tempfile::tempdir().unwrap();
    let track = write_track(&dir, "tone.wav", &sine_sweep(230.0, 230.0, 2.0, 12_000.0));
    let decoded = vocalise::media::decode_file(&track).unwrap();

    let mut stretch = StretchStream::new(decoded.sample_rate, decoded.channels);
    stretch.set_pitch(semitone_ratio(3));
    for chunk in decoded.samples.chunks(4_096) {
        stretch.write(chunk);
    }
    stretch.flush();

    let mut output = Vec::new();
    let mut buf = [0i16; 4_096];
    loop {
        let frames = stretch.read(&mut buf);
        if frames == 0 {
            break;
        }
        output.extend_from_slice(&buf[..frames]);
    }

    let input_frames = decoded.samples.len() as i64;
    assert!(
        (output.len() as i64 - input_frames).unsigned_abs() < 8_192,
        "expected ~{input_frames} frames, got {}",
        output.len()
    );
}

#[test]
fn file_comparison_of_a_take_against_its_own_track_is_perfect() {
    let dir = tempfile::tempdir().unwrap();
    let track = write_track(&dir, "ref.wav", &sine_sweep(210.0, 280.0, 2.0, 12_000.0));

    let result = compare_files(&track, &track, 50.0, CompareWeights::default()).unwrap();
    assert_eq!(result.total, 100);
}

#[test]
fn empty_contour_from_a_broken_source_still_flows_through_scoring() {
    let contour = ContourExtractor::new().extract(std::path::Path::new("/no/such/file"), |_| {});
    assert_eq!(contour, PitchContour::empty());

    // Nothing to align against -> no pairs -> zero score, no panic.
    let result = ScoreAnalyzer::from_pairs(&[], ScoreConfig::default()).analyze();
    assert_eq!(result.total, 0);
}
