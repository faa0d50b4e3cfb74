//! The live recording and alignment pipeline.
//!
//! State machine: Idle -> Recording -> Stopped. While recording, two
//! concurrent units run against single-writer session state:
//!
//! - the **estimation loop** drains microphone blocks, estimates a pitch per
//!   block, aligns it against the reference contour by elapsed time, and
//!   stages `(reference, observed)` pairs through a small spill buffer
//! - the **tick loop** publishes elapsed milliseconds on a steady 100 ms
//!   cadence for the UI
//!
//! Current pitch and error are latest-value-only: the UI reads whatever was
//! published most recently, and lost intermediates are fine at human
//! timescales.

use crate::capture::{BlockAssembler, MicCapture, CAPTURE_BLOCK};
use crate::error::{Result, SessionError};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use vocalise_analysis::{FrequencyEstimator, ScoreAnalyzer, ScoreConfig, ScoreResult, YinEstimator};
use vocalise_core::{LatestCell, PitchContour, PitchPair};

/// Recording session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordingState {
    /// No recording has run yet.
    Idle = 0,
    /// Microphone, estimation, and tick loops are live.
    Recording = 1,
    /// A recording ran and was stopped.
    Stopped = 2,
}

impl From<u8> for RecordingState {
    fn from(value: u8) -> Self {
        match value {
            1 => RecordingState::Recording,
            2 => RecordingState::Stopped,
            _ => RecordingState::Idle,
        }
    }
}

/// Session tuning.
#[derive(Debug, Clone, Copy)]
pub struct RecordingConfig {
    /// Samples per estimation block.
    pub block_size: usize,
    /// Pairs staged before spilling into the session buffer.
    pub spill_capacity: usize,
    /// Scoring configuration handed to the analyzer at stop.
    pub score: ScoreConfig,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            block_size: CAPTURE_BLOCK,
            spill_capacity: 10,
            score: ScoreConfig::default(),
        }
    }
}

/// Latest pitch reading for display. Last-write-wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveReading {
    /// Most recent observed pitch, Hz (0.0 when unvoiced).
    pub pitch_hz: f32,
    /// Absolute deviation from the reference at that moment, Hz.
    pub error_hz: f32,
}

/// One live recording session against a reference contour.
///
/// At most one session should be active per microphone; the session owns
/// the capture handle and releases it on stop and on drop.
pub struct RecordingSession {
    state: AtomicU8,
    elapsed_ms: Arc<AtomicU64>,
    reading: Arc<LatestCell<LiveReading>>,
    config: RecordingConfig,
    active: Option<ActiveRecording>,
}

struct ActiveRecording {
    capture: MicCapture,
    stop_flag: Arc<AtomicBool>,
    estimation: JoinHandle<Vec<PitchPair>>,
    tick: JoinHandle<()>,
}

impl RecordingSession {
    /// New idle session.
    pub fn new(config: RecordingConfig) -> Self {
        Self {
            state: AtomicU8::new(RecordingState::Idle as u8),
            elapsed_ms: Arc::new(AtomicU64::new(0)),
            reading: Arc::new(LatestCell::default()),
            config,
            active: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> RecordingState {
        RecordingState::from(self.state.load(Ordering::Acquire))
    }

    /// Elapsed recording time in milliseconds, updated on the 100 ms tick.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::Relaxed)
    }

    /// Most recent pitch/error reading.
    pub fn reading(&self) -> LiveReading {
        self.reading.get()
    }

    /// Start recording against `contour`.
    ///
    /// Fails with [`SessionError::InvalidState`] when already recording and
    /// with [`SessionError::NoInputDevice`] when no microphone is available.
    pub fn start(&mut self, contour: PitchContour) -> Result<()> {
        if self.state() == RecordingState::Recording {
            return Err(SessionError::InvalidState(
                "recording is already in progress".into(),
            ));
        }

        self.elapsed_ms.store(0, Ordering::Relaxed);
        self.reading.publish(LiveReading::default());

        let (capture, consumer) = MicCapture::start()?;
        let sample_rate = capture.sample_rate();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let started = Instant::now();

        let tick = {
            let stop = Arc::clone(&stop_flag);
            let elapsed = Arc::clone(&self.elapsed_ms);
            std::thread::Builder::new()
                .name("vocalise-tick".into())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        std::thread::sleep(Duration::from_millis(100));
                        elapsed.store(started.elapsed().as_millis() as u64, Ordering::Relaxed);
                    }
                })?
        };

        let estimation = {
            let stop = Arc::clone(&stop_flag);
            let reading = Arc::clone(&self.reading);
            let config = self.config;
            let assembler = BlockAssembler::new(consumer, config.block_size);
            let spawned = std::thread::Builder::new()
                .name("vocalise-estimation".into())
                .spawn(move || {
                    let estimator = YinEstimator::new(sample_rate);
                    run_estimation_loop(
                        assembler, estimator, contour, config, started, stop, reading,
                    )
                });
            match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    // Unwind the tick thread and the microphone before failing.
                    stop_flag.store(true, Ordering::Release);
                    let _ = tick.join();
                    return Err(e.into());
                }
            }
        };

        self.active = Some(ActiveRecording {
            capture,
            stop_flag,
            estimation,
            tick,
        });
        self.state
            .store(RecordingState::Recording as u8, Ordering::Release);
        info!(sample_rate, "recording started");
        Ok(())
    }

    /// Stop recording: cancel capture and tick, flush the spill buffer, and
    /// score the accumulated pairs.
    ///
    /// Fails with [`SessionError::InvalidState`] unless currently recording.
    pub fn stop(&mut self) -> Result<ScoreResult> {
        let Some(active) = self.active.take() else {
            return Err(SessionError::InvalidState(
                "no recording in progress".into(),
            ));
        };
        let pairs = shutdown(active);
        self.state
            .store(RecordingState::Stopped as u8, Ordering::Release);

        let result = ScoreAnalyzer::from_pairs(&pairs, self.config.score).analyze();
        info!(
            pairs = pairs.len(),
            total = result.total,
            "recording stopped and scored"
        );
        Ok(result)
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("recording session dropped while live; releasing capture");
            let _ = shutdown(active);
        }
    }
}

/// Signal the workers, release the microphone, and collect the pairs.
fn shutdown(active: ActiveRecording) -> Vec<PitchPair> {
    active.stop_flag.store(true, Ordering::Release);
    drop(active.capture);
    let _ = active.tick.join();
    active.estimation.join().unwrap_or_default()
}

/// The estimation loop body. Runs until the stop flag is raised, then
/// flushes the spill buffer and returns every accumulated pair.
#[allow(clippy::too_many_arguments)]
fn run_estimation_loop<E: FrequencyEstimator>(
    mut assembler: BlockAssembler,
    mut estimator: E,
    contour: PitchContour,
    config: RecordingConfig,
    started: Instant,
    stop: Arc<AtomicBool>,
    reading: Arc<LatestCell<LiveReading>>,
) -> Vec<PitchPair> {
    let mut accumulator = PairAccumulator::new(config.spill_capacity);

    while !stop.load(Ordering::Acquire) {
        let Some(block) = assembler.next_block() else {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        };

        let observed = estimator.estimate_block(block).unwrap_or(0.0);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let index = PitchContour::index_at_ms(elapsed_ms);

        if let Some(reference) = contour.get(index) {
            let pair = PitchPair {
                reference,
                observed,
            };
            reading.publish(LiveReading {
                pitch_hz: observed,
                error_hz: pair.error_hz(),
            });
            accumulator.push(pair);
        }
    }

    accumulator.finish()
}

/// Stages pairs through a small spill buffer so the session vector grows in
/// amortized chunks rather than per estimate.
struct PairAccumulator {
    spill: Vec<PitchPair>,
    pairs: Vec<PitchPair>,
    capacity: usize,
}

impl PairAccumulator {
    fn new(capacity: usize) -> Self {
        Self {
            spill: Vec::with_capacity(capacity),
            pairs: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    fn push(&mut self, pair: PitchPair) {
        self.spill.push(pair);
        if self.spill.len() >= self.capacity {
            self.pairs.append(&mut self.spill);
        }
    }

    /// Flush the spill remainder and hand back everything accumulated.
    fn finish(mut self) -> Vec<PitchPair> {
        self.pairs.append(&mut self.spill);
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_while_idle_is_rejected() {
        let mut session = RecordingSession::new(RecordingConfig::default());
        assert_eq!(session.state(), RecordingState::Idle);
        assert!(matches!(
            session.stop(),
            Err(SessionError::InvalidState(_))
        ));
        // Still idle, not corrupted.
        assert_eq!(session.state(), RecordingState::Idle);
    }

    #[test]
    fn accumulator_spills_in_chunks() {
        let mut acc = PairAccumulator::new(10);
        for i in 0..9 {
            acc.push(PitchPair {
                reference: i as f32,
                observed: 0.0,
            });
        }
        assert_eq!(acc.pairs.len(), 0, "below capacity nothing spills");
        acc.push(PitchPair {
            reference: 9.0,
            observed: 0.0,
        });
        assert_eq!(acc.pairs.len(), 10, "capacity reached, spill flushed");

        acc.push(PitchPair {
            reference: 10.0,
            observed: 0.0,
        });
        let all = acc.finish();
        assert_eq!(all.len(), 11, "finish flushes the partial spill");
        assert_eq!(all[10].reference, 10.0);
    }

    #[test]
    fn initial_reading_is_zeroed() {
        let session = RecordingSession::new(RecordingConfig::default());
        let reading = session.reading();
        assert_eq!(reading.pitch_hz, 0.0);
        assert_eq!(reading.error_hz, 0.0);
        assert_eq!(session.elapsed_ms(), 0);
    }

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            RecordingState::Idle,
            RecordingState::Recording,
            RecordingState::Stopped,
        ] {
            assert_eq!(RecordingState::from(state as u8), state);
        }
    }
}
