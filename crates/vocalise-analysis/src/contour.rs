//! Whole-track reference contour extraction.

use crate::estimator::FrequencyEstimator;
use crate::yin::YinEstimator;
use std::path::Path;
use tracing::{debug, warn};
use vocalise_core::{PitchContour, CONTOUR_HOP_MS};
use vocalise_media::AudioReader;

/// Analysis frame length in samples, per estimated contour step.
const FRAME_SIZE: usize = 2_048;

/// Extracts a [`PitchContour`] from a fully available track.
///
/// The track is decoded once, downmixed to mono, and fed through a
/// [`FrequencyEstimator`] at one frame per 100 ms of track time. Progress is
/// reported as 0-99 while decoding and exactly 100 once on completion.
///
/// Decode failure - before or mid-track - degrades to an **empty** contour
/// rather than an error, so a broken file still leaves the caller in a
/// usable state.
#[derive(Debug, Default)]
pub struct ContourExtractor {
    _private: (),
}

impl ContourExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract with the bundled YIN estimator.
    pub fn extract(&self, path: &Path, on_progress: impl FnMut(u8)) -> PitchContour {
        self.extract_with(path, on_progress, YinEstimator::new)
    }

    /// Extract with a caller-supplied estimator, constructed for the track's
    /// native sample rate.
    pub fn extract_with<E, F>(
        &self,
        path: &Path,
        mut on_progress: F,
        make_estimator: impl FnOnce(u32) -> E,
    ) -> PitchContour
    where
        E: FrequencyEstimator,
        F: FnMut(u8),
    {
        let (mono, sample_rate) = match self.decode_mono(path, &mut on_progress) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(?path, error = %e, "contour extraction degraded to empty");
                on_progress(100);
                return PitchContour::empty();
            }
        };

        let mut estimator = make_estimator(sample_rate);
        let hop = (sample_rate as u64 * CONTOUR_HOP_MS / 1_000) as usize;
        let steps = mono.len().div_ceil(hop);

        let mut hz = Vec::with_capacity(steps);
        for step in 0..steps {
            let start = step * hop;
            let end = (start + FRAME_SIZE).min(mono.len());
            let pitch = estimator.estimate_block(&mono[start..end]).unwrap_or(0.0);
            hz.push(if pitch > 0.0 { pitch } else { 0.0 });
        }

        debug!(?path, steps = hz.len(), "extracted reference contour");
        on_progress(100);
        PitchContour::from_hz(hz)
    }

    fn decode_mono(
        &self,
        path: &Path,
        on_progress: &mut impl FnMut(u8),
    ) -> vocalise_media::Result<(Vec<i16>, u32)> {
        let mut reader = AudioReader::open(path)?;
        let sample_rate = reader.sample_rate();
        let channels = reader.channels();
        let duration_ms = reader.duration_ms();

        let mut mono = Vec::new();
        while let Some(block) = reader.next_block()? {
            if channels == 1 {
                mono.extend_from_slice(block.samples);
            } else {
                mono.extend(block.samples.chunks(channels).map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / frame.len() as i32) as i16
                }));
            }

            if let Some(total) = duration_ms.filter(|&t| t > 0) {
                let pct = (block.timestamp_ms * 100 / total).min(99) as u8;
                on_progress(pct);
            }
        }
        Ok((mono, sample_rate))
    }
}
