//! File-to-file comparison scoring.
//!
//! Both files are decoded to mono 16-bit PCM (the same bytes a canonical
//! WAV `data` chunk would carry), pitch-tracked per 2048-sample block, and
//! compared on pitch accuracy plus three byte-level similarity metrics:
//! RMS energy, "spectral centroid", and "spectral rolloff". The latter two
//! operate on raw PCM bytes as amplitude proxies - an approximation carried
//! over unchanged for score compatibility, which is also why the default
//! weights leave them computed but unused.

use crate::error::Result;
use crate::estimator::FrequencyEstimator;
use crate::score::proximity;
use crate::yin::YinEstimator;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use vocalise_media::{decode_file, wav};

/// Block length for per-block pitch extraction, samples.
const PITCH_BLOCK: usize = 2_048;

/// Byte window length for the byte-level metrics.
const BYTE_WINDOW: usize = 2_048;

/// Rolloff threshold: the point below which 85% of summed amplitude lies.
const ROLLOFF_FRACTION: f64 = 0.85;

/// Weights combining the four similarity metrics into the total.
///
/// The default weighs pitch and energy 50/50; centroid and rolloff are
/// computed and reported but excluded from the total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompareWeights {
    pub pitch: f64,
    pub energy: f64,
    pub centroid: f64,
    pub rolloff: f64,
}

impl Default for CompareWeights {
    fn default() -> Self {
        Self {
            pitch: 0.5,
            energy: 0.5,
            centroid: 0.0,
            rolloff: 0.0,
        }
    }
}

/// Similarity breakdown of two audio files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileComparison {
    /// Weighted total, 0-100.
    pub total: u8,
    /// Fraction of block-aligned pitch estimates within tolerance.
    pub pitch_similarity: f32,
    /// RMS proximity over raw PCM bytes.
    pub energy_similarity: f32,
    /// Byte-window centroid proximity (amplitude-proxy approximation).
    pub centroid_similarity: f32,
    /// Byte rolloff-point proximity (amplitude-proxy approximation).
    pub rolloff_similarity: f32,
}

/// Compare a reference track against a recorded take.
///
/// `tolerance_hz` bounds what counts as a pitch match (50 Hz is the
/// conventional default).
pub fn compare_files(
    reference: &Path,
    recorded: &Path,
    tolerance_hz: f32,
    weights: CompareWeights,
) -> Result<FileComparison> {
    let reference_pcm = load_mono(reference)?;
    let recorded_pcm = load_mono(recorded)?;

    let reference_pitches = block_pitches(&reference_pcm.samples, reference_pcm.sample_rate);
    let recorded_pitches = block_pitches(&recorded_pcm.samples, recorded_pcm.sample_rate);
    let pitch_similarity = pitch_accuracy(&reference_pitches, &recorded_pitches, tolerance_hz);

    let reference_bytes = pcm_bytes(&reference_pcm.samples);
    let recorded_bytes = pcm_bytes(&recorded_pcm.samples);
    let energy_similarity = proximity(byte_rms(&reference_bytes), byte_rms(&recorded_bytes));
    let centroid_similarity = proximity(
        byte_centroid(&reference_bytes),
        byte_centroid(&recorded_bytes),
    );
    let rolloff_similarity =
        proximity(byte_rolloff(&reference_bytes), byte_rolloff(&recorded_bytes));

    let weighted = pitch_similarity as f64 * weights.pitch
        + energy_similarity as f64 * weights.energy
        + centroid_similarity as f64 * weights.centroid
        + rolloff_similarity as f64 * weights.rolloff;
    let total = (weighted * 100.0).round().clamp(0.0, 100.0) as u8;

    debug!(
        pitch_similarity,
        energy_similarity, centroid_similarity, rolloff_similarity, total, "compared files"
    );

    Ok(FileComparison {
        total,
        pitch_similarity,
        energy_similarity,
        centroid_similarity,
        rolloff_similarity,
    })
}

struct MonoPcm {
    samples: Vec<i16>,
    sample_rate: u32,
}

/// Decode any supported container to mono PCM. Canonical WAV files skip the
/// decoder and read the data chunk directly.
fn load_mono(path: &Path) -> Result<MonoPcm> {
    if path.extension().and_then(|e| e.to_str()) == Some("wav") {
        if let Ok((samples, spec)) = wav::read_wav(path) {
            let mono = if spec.channels <= 1 {
                samples
            } else {
                samples
                    .chunks(spec.channels as usize)
                    .map(|f| {
                        (f.iter().map(|&s| s as i32).sum::<i32>() / f.len() as i32) as i16
                    })
                    .collect()
            };
            return Ok(MonoPcm {
                samples: mono,
                sample_rate: spec.sample_rate,
            });
        }
    }
    let decoded = decode_file(path)?;
    Ok(MonoPcm {
        samples: decoded.to_mono(),
        sample_rate: decoded.sample_rate,
    })
}

/// Voiced pitch per 2048-sample block; unvoiced blocks are dropped, matching
/// the file-comparison convention of only scoring where pitch was found.
fn block_pitches(samples: &[i16], sample_rate: u32) -> Vec<f32> {
    let mut yin = YinEstimator::new(sample_rate);
    samples
        .chunks(PITCH_BLOCK)
        .filter_map(|block| yin.estimate_block(block))
        .collect()
}

fn pitch_accuracy(reference: &[f32], recorded: &[f32], tolerance_hz: f32) -> f32 {
    let len = reference.len().min(recorded.len());
    if len == 0 {
        return 0.0;
    }
    let matched = reference
        .iter()
        .zip(recorded)
        .take(len)
        .filter(|(&r, &u)| (r - u).abs() <= tolerance_hz)
        .count();
    matched as f32 / len as f32
}

/// The exact little-endian bytes a canonical WAV data chunk would hold.
fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// RMS over raw bytes interpreted as signed amplitudes.
fn byte_rms(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let sum: f64 = bytes.iter().map(|&b| (b as i8 as f64).powi(2)).sum();
    (sum / bytes.len() as f64).sqrt()
}

/// Byte-window "centroid": amplitude-weighted mean of the in-window byte
/// index, averaged over windows. Not a frequency-domain transform.
fn byte_centroid(bytes: &[u8]) -> f64 {
    let mut weighted = 0.0f64;
    let mut total = 0.0f64;
    for window in bytes.chunks(BYTE_WINDOW) {
        for (i, &b) in window.iter().enumerate() {
            let amplitude = (b as i8 as f64).abs();
            weighted += i as f64 * amplitude;
            total += amplitude;
        }
    }
    if total > 0.0 {
        weighted / total
    } else {
        0.0
    }
}

/// Byte "rolloff": the index (scaled to the window length) below which 85%
/// of the summed absolute amplitude lies. Not a frequency-domain transform.
fn byte_rolloff(bytes: &[u8]) -> f64 {
    let total: f64 = bytes.iter().map(|&b| (b as i8 as f64).abs()).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = total * ROLLOFF_FRACTION;
    let mut cumulative = 0.0f64;
    for (i, &b) in bytes.iter().enumerate() {
        cumulative += (b as i8 as f64).abs();
        if cumulative >= threshold {
            // Window-local index stands in for a frequency bin.
            return (i % BYTE_WINDOW) as f64;
        }
    }
    BYTE_WINDOW as f64
}
