//! The frequency-estimation seam.
//!
//! Both the contour extractor and the live recording pipeline talk to a
//! [`FrequencyEstimator`], not to a concrete algorithm. The bundled
//! implementation is [`crate::YinEstimator`]; anything that can turn a PCM
//! block into "a fundamental, or nothing" satisfies the contract.

/// Estimates the fundamental frequency of fixed-size PCM blocks.
///
/// Implementations are constructed for a specific sample rate and invoked
/// once per block (1024-2048 samples). Silence or aperiodic input yields
/// `None` - never an error.
pub trait FrequencyEstimator {
    /// The sample rate this estimator was built for, in Hz.
    fn sample_rate(&self) -> u32;

    /// Estimate the fundamental of a mono frame of `f32` samples in
    /// `[-1, 1]`. Returns `None` when no pitch is present.
    fn estimate(&mut self, frame: &[f32]) -> Option<f32>;

    /// Estimate the fundamental of a mono 16-bit PCM block.
    fn estimate_block(&mut self, block: &[i16]) -> Option<f32> {
        let frame: Vec<f32> = block.iter().map(|&s| s as f32 / 32_768.0).collect();
        self.estimate(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<f32>);

    impl FrequencyEstimator for Fixed {
        fn sample_rate(&self) -> u32 {
            22_050
        }
        fn estimate(&mut self, _frame: &[f32]) -> Option<f32> {
            self.0
        }
    }

    #[test]
    fn block_conversion_reaches_estimate() {
        let mut est = Fixed(Some(440.0));
        assert_eq!(est.estimate_block(&[0i16; 1024]), Some(440.0));
        let mut none = Fixed(None);
        assert_eq!(none.estimate_block(&[0i16; 1024]), None);
    }
}
