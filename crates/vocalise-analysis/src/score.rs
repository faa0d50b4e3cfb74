//! Pair-based performance scoring.
//!
//! The headline total follows the shipped formula: pitch similarity within a
//! tolerance, energy similarity of the two pitch sequences' RMS, averaged
//! and scaled to 100. The richer diagnostics (onset-aligned rhythm, volume
//! stability, duration banding) are reported as named sub-scores alongside
//! it and never feed the total.

use crate::vibrato::{detect_vibrato, VibratoInfo};
use serde::{Deserialize, Serialize};
use vocalise_core::PitchPair;

/// Tuning knobs for pair-based scoring.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Maximum deviation still counted as a pitch match, Hz.
    pub tolerance_hz: f32,
    /// Pitches below this are treated as silence, Hz.
    pub silence_threshold_hz: f32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            tolerance_hz: 50.0,
            silence_threshold_hz: 80.0,
        }
    }
}

/// Final session score: total plus named sub-scores, all in `[0, 1]` except
/// the `[0, 100]` integer total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Headline score, 0-100.
    pub total: u8,
    /// Fraction of aligned pairs within tolerance.
    pub pitch_accuracy: f32,
    /// RMS proximity of the two pitch sequences.
    pub energy_similarity: f32,
    /// Onset-timing agreement after DTW alignment.
    pub rhythm_match: f32,
    /// Steadiness of the voiced pitches (coefficient-of-variation banding).
    pub volume_stability: f32,
    /// Length-ratio banding between the two sequences.
    pub duration_match: f32,
    /// Supplementary vibrato analysis of the observed sequence.
    pub vibrato: VibratoInfo,
}

/// Grade bands for per-section feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SectionGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Bad,
}

impl SectionGrade {
    fn from_score(score: f32) -> Self {
        match score {
            s if s >= 90.0 => Self::Excellent,
            s if s >= 80.0 => Self::Good,
            s if s >= 70.0 => Self::Fair,
            s if s >= 60.0 => Self::Poor,
            _ => Self::Bad,
        }
    }
}

/// Score for one fixed-length window of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionScore {
    /// Window index.
    pub index: usize,
    /// Start step (100 ms units) inclusive.
    pub start: usize,
    /// End step exclusive.
    pub end: usize,
    /// Pitch accuracy within the window.
    pub pitch_accuracy: f32,
    /// Rhythm agreement within the window.
    pub rhythm_match: f32,
    /// Weighted window score, 0-100.
    pub score: f32,
    /// Grade band of the window score.
    pub grade: SectionGrade,
}

/// Scores an accumulated session of aligned pitch pairs.
pub struct ScoreAnalyzer {
    reference: Vec<f32>,
    observed: Vec<f32>,
    config: ScoreConfig,
}

impl ScoreAnalyzer {
    /// Analyzer over two parallel pitch sequences.
    pub fn new(reference: Vec<f32>, observed: Vec<f32>, config: ScoreConfig) -> Self {
        Self {
            reference,
            observed,
            config,
        }
    }

    /// Analyzer over the pairs drained from a recording session.
    pub fn from_pairs(pairs: &[PitchPair], config: ScoreConfig) -> Self {
        Self::new(
            pairs.iter().map(|p| p.reference).collect(),
            pairs.iter().map(|p| p.observed).collect(),
            config,
        )
    }

    /// Run the full analysis.
    pub fn analyze(&self) -> ScoreResult {
        let pitch_accuracy = self.pitch_similarity();
        let energy_similarity = self.energy_similarity();
        let total = if self.reference.is_empty() || self.observed.is_empty() {
            0
        } else {
            (100.0 * (pitch_accuracy + energy_similarity) / 2.0).round() as u8
        };

        ScoreResult {
            total: total.min(100),
            pitch_accuracy,
            energy_similarity,
            rhythm_match: self.rhythm_match(),
            volume_stability: self.volume_stability(),
            duration_match: self.duration_match(),
            vibrato: detect_vibrato(&self.observed, self.config.silence_threshold_hz),
        }
    }

    /// Fraction of index-aligned pairs whose pitches agree within tolerance.
    /// The longer sequence is truncated to the shorter.
    pub fn pitch_similarity(&self) -> f32 {
        let len = self.reference.len().min(self.observed.len());
        if len == 0 {
            return 0.0;
        }
        let matched = self
            .reference
            .iter()
            .zip(&self.observed)
            .take(len)
            .filter(|(&r, &o)| (r - o).abs() <= self.config.tolerance_hz)
            .count();
        matched as f32 / len as f32
    }

    /// Proximity of the RMS of the two pitch sequences.
    pub fn energy_similarity(&self) -> f32 {
        proximity(rms(&self.reference), rms(&self.observed))
    }

    /// Onset timing agreement: voice onsets are detected in both sequences,
    /// DTW-aligned, and penalized by their timing offsets (one second of
    /// offset saturates the penalty).
    fn rhythm_match(&self) -> f32 {
        let reference = onsets(&self.reference, self.config.silence_threshold_hz);
        let observed = onsets(&self.observed, self.config.silence_threshold_hz);
        if reference.is_empty() || observed.is_empty() {
            return 0.5;
        }

        let alignment = dtw_align(&reference, &observed, |a, b| {
            (reference[a] as f64 - observed[b] as f64).abs()
        });
        if alignment.is_empty() {
            return 0.5;
        }

        let total_error: f64 = alignment
            .iter()
            .map(|&(i, j)| {
                let offset_steps = (reference[i] as f64 - observed[j] as f64).abs();
                (offset_steps / 10.0).min(1.0)
            })
            .sum();
        (1.0 - total_error / alignment.len() as f64) as f32
    }

    /// Coefficient-of-variation banding over the voiced observed pitches.
    fn volume_stability(&self) -> f32 {
        let voiced: Vec<f32> = self
            .observed
            .iter()
            .copied()
            .filter(|&hz| hz >= self.config.silence_threshold_hz)
            .collect();
        if voiced.len() < 2 {
            return 0.5;
        }

        let mean = voiced.iter().sum::<f32>() / voiced.len() as f32;
        let variance =
            voiced.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / voiced.len() as f32;
        let cv = if mean > 0.0 {
            variance.sqrt() / mean
        } else {
            1.0
        };

        match cv {
            c if c < 0.2 => 1.0,
            c if c < 0.3 => 0.9,
            c if c < 0.5 => 0.7,
            c if c < 0.7 => 0.5,
            _ => 0.3,
        }
    }

    /// Length-ratio banding: singing far shorter or longer than the
    /// reference is penalized in steps.
    fn duration_match(&self) -> f32 {
        if self.reference.is_empty() {
            return 0.0;
        }
        let ratio = self.observed.len() as f32 / self.reference.len() as f32;
        match ratio {
            r if (0.9..=1.1).contains(&r) => 1.0,
            r if (0.8..=1.2).contains(&r) => 0.8,
            r if (0.7..=1.3).contains(&r) => 0.6,
            r if (0.6..=1.4).contains(&r) => 0.4,
            _ => 0.2,
        }
    }

    /// Score fixed-length windows of the session (default window length is
    /// 50 steps = 5 s). Pitch accuracy weighs 0.7 and rhythm 0.3 per window.
    pub fn section_scores(&self, section_len: usize) -> Vec<SectionScore> {
        let len = self.reference.len().min(self.observed.len());
        if len == 0 || section_len == 0 {
            return Vec::new();
        }

        let mut sections = Vec::new();
        let mut start = 0;
        let mut index = 0;
        while start < len {
            let end = (start + section_len).min(len);
            let window = ScoreAnalyzer::new(
                self.reference[start..end].to_vec(),
                self.observed[start..end].to_vec(),
                self.config,
            );
            let pitch_accuracy = window.pitch_similarity();
            let rhythm_match = window.rhythm_match();
            let score = (pitch_accuracy * 0.7 + rhythm_match * 0.3) * 100.0;

            sections.push(SectionScore {
                index,
                start,
                end,
                pitch_accuracy,
                rhythm_match,
                score,
                grade: SectionGrade::from_score(score),
            });
            index += 1;
            start = end;
        }
        sections
    }
}

/// `1 - |a-b| / max(a,b)`, and 0 when the max is 0.
pub(crate) fn proximity(a: f64, b: f64) -> f32 {
    let max = a.max(b);
    if max > 0.0 {
        (1.0 - (a - b).abs() / max) as f32
    } else {
        0.0
    }
}

pub(crate) fn rms(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values.iter().map(|&v| (v as f64) * (v as f64)).sum();
    (sum / values.len() as f64).sqrt()
}

/// Indices where a sequence transitions from silence to voice.
fn onsets(pitches: &[f32], silence_threshold: f32) -> Vec<usize> {
    let mut onsets = Vec::new();
    let mut was_voiced = false;
    for (i, &hz) in pitches.iter().enumerate() {
        let voiced = hz >= silence_threshold;
        if voiced && !was_voiced {
            onsets.push(i);
        }
        was_voiced = voiced;
    }
    onsets
}

/// Classic DTW alignment of two index sequences under a caller-supplied
/// cost, returning the matched index pairs along the optimal path.
fn dtw_align(
    a: &[usize],
    b: &[usize],
    cost: impl Fn(usize, usize) -> f64,
) -> Vec<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    let mut dtw = vec![vec![f64::INFINITY; m + 1]; n + 1];
    dtw[0][0] = 0.0;
    for i in 1..=n {
        for j in 1..=m {
            let c = cost(i - 1, j - 1);
            dtw[i][j] = c + dtw[i - 1][j].min(dtw[i][j - 1]).min(dtw[i - 1][j - 1]);
        }
    }

    let mut alignment = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 && j > 0 {
        alignment.push((i - 1, j - 1));
        let diagonal = dtw[i - 1][j - 1];
        let up = dtw[i - 1][j];
        let left = dtw[i][j - 1];
        if diagonal <= up && diagonal <= left {
            i -= 1;
            j -= 1;
        } else if up <= left {
            i -= 1;
        } else {
            j -= 1;
        }
    }
    alignment.reverse();
    alignment
}
