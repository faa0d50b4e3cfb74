//! # Vocalise Analysis
//!
//! Everything between raw PCM and a score:
//!
//! - **Frequency estimation**: the [`FrequencyEstimator`] seam and the
//!   bundled YIN implementation ([`YinEstimator`])
//! - **Reference contours**: whole-track extraction at a fixed 100 ms
//!   cadence ([`ContourExtractor`])
//! - **Scoring**: pair-based live scoring ([`ScoreAnalyzer`]) and
//!   file-to-file comparison ([`compare_files`]), with vibrato detection and
//!   difficulty-tier adjustment on top

pub mod compare;
pub mod contour;
pub mod difficulty;
pub mod error;
pub mod estimator;
pub mod score;
pub mod vibrato;
pub mod yin;

pub use compare::{compare_files, CompareWeights, FileComparison};
pub use contour::ContourExtractor;
pub use difficulty::{ScoringTier, SongDifficulty};
pub use error::{AnalysisError, Result};
pub use estimator::FrequencyEstimator;
pub use score::{ScoreAnalyzer, ScoreConfig, ScoreResult, SectionGrade, SectionScore};
pub use vibrato::{detect_vibrato, VibratoInfo};
pub use yin::YinEstimator;
