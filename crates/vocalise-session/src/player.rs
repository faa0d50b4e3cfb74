//! Key-shift playback: decode -> stretch -> sink.
//!
//! The controller owns a worker thread running the decode/process loop; the
//! cpal output stream lives entirely on that thread and pulls from a
//! bounded ring. A full ring blocks the worker - backpressure from the
//! hardware sink is what paces decode. Pitch changes land on the next
//! processed block; no restart, no re-decode.

use crate::error::{Result, SessionError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Receiver, Sender};
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};
use vocalise_core::AtomicF32;
use vocalise_media::AudioReader;
use vocalise_stretch::{clamp_semitones, key_label, semitone_ratio, StretchStream};

/// Sentinel for "no seek requested".
const NO_SEEK: u64 = u64::MAX;

/// Playback state notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playing/paused flags changed.
    StateChanged { playing: bool, paused: bool },
    /// Playback position advanced.
    Position {
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// The track played to its end (after the final flush).
    Completed,
    /// The playback loop aborted.
    Error(String),
}

/// Transport + key-change controller for one track at a time.
///
/// All transport calls are cheap flag flips; the worker thread notices them
/// between blocks. `stop` joins the worker, which releases the decoder and
/// the output stream on every exit path.
pub struct KeyShiftPlayer {
    semitones: Arc<AtomicI32>,
    pitch_ratio: Arc<AtomicF32>,
    paused: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    seek_request: Arc<AtomicU64>,
    position_ms: Arc<AtomicU64>,
    duration_ms: Arc<AtomicU64>,
    events_tx: Sender<PlayerEvent>,
    events_rx: Receiver<PlayerEvent>,
    worker: Option<JoinHandle<()>>,
}

impl KeyShiftPlayer {
    /// New controller with the key at the original pitch.
    pub fn new() -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            semitones: Arc::new(AtomicI32::new(0)),
            pitch_ratio: Arc::new(AtomicF32::new(1.0)),
            paused: Arc::new(AtomicBool::new(false)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            seek_request: Arc::new(AtomicU64::new(NO_SEEK)),
            position_ms: Arc::new(AtomicU64::new(0)),
            duration_ms: Arc::new(AtomicU64::new(0)),
            events_tx,
            events_rx,
            worker: None,
        }
    }

    /// Event stream for UI consumption.
    pub fn events(&self) -> Receiver<PlayerEvent> {
        self.events_rx.clone()
    }

    /// Start playing `source`, stopping any current playback first.
    pub fn play(&mut self, source: impl Into<PathBuf>) -> Result<()> {
        self.stop();

        let source = source.into();
        self.stop_flag.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.seek_request.store(NO_SEEK, Ordering::Release);
        self.position_ms.store(0, Ordering::Release);
        self.duration_ms.store(0, Ordering::Release);

        let ctx = WorkerContext {
            source,
            pitch_ratio: Arc::clone(&self.pitch_ratio),
            paused: Arc::clone(&self.paused),
            stop_flag: Arc::clone(&self.stop_flag),
            seek_request: Arc::clone(&self.seek_request),
            position_ms: Arc::clone(&self.position_ms),
            duration_ms: Arc::clone(&self.duration_ms),
            events: self.events_tx.clone(),
        };

        self.worker = Some(
            std::thread::Builder::new()
                .name("vocalise-playback".into())
                .spawn(move || {
                    let events = ctx.events.clone();
                    let _ = events.send(PlayerEvent::StateChanged {
                        playing: true,
                        paused: false,
                    });
                    match run_playback(ctx) {
                        Ok(true) => {
                            let _ = events.send(PlayerEvent::Completed);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(error = %e, "playback aborted");
                            let _ = events.send(PlayerEvent::Error(e.to_string()));
                        }
                    }
                    let _ = events.send(PlayerEvent::StateChanged {
                        playing: false,
                        paused: false,
                    });
                })?,
        );
        Ok(())
    }

    /// Halt the sink without tearing down decode state. No-op when not
    /// playing or already paused.
    pub fn pause(&self) {
        if self.worker.is_some() && !self.paused.swap(true, Ordering::AcqRel) {
            let _ = self.events_tx.send(PlayerEvent::StateChanged {
                playing: true,
                paused: true,
            });
        }
    }

    /// Resume after a pause. No-op when not paused.
    pub fn resume(&self) {
        if self.worker.is_some() && self.paused.swap(false, Ordering::AcqRel) {
            let _ = self.events_tx.send(PlayerEvent::StateChanged {
                playing: true,
                paused: false,
            });
        }
    }

    /// Stop playback and release every decoder/sink resource. Idempotent.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            debug!("playback worker joined");
        }
        self.paused.store(false, Ordering::Release);
    }

    /// Request a coarse seek to `position_ms`.
    pub fn seek(&self, position_ms: u64) {
        self.seek_request.store(position_ms, Ordering::Release);
    }

    /// Set the key offset in semitones, clamped to `[-6, +6]`. Applies to
    /// the next processed block without restarting playback.
    pub fn set_semitones(&self, semitones: i32) -> i32 {
        let clamped = clamp_semitones(semitones);
        if self.semitones.swap(clamped, Ordering::AcqRel) != clamped {
            let ratio = semitone_ratio(clamped);
            self.pitch_ratio.store(ratio, Ordering::Release);
            info!(semitones = clamped, ratio, key = %key_label(clamped), "key changed");
        }
        clamped
    }

    /// Raise the key one semitone. Returns the new offset.
    pub fn pitch_up(&self) -> i32 {
        self.set_semitones(self.semitones() + 1)
    }

    /// Lower the key one semitone. Returns the new offset.
    pub fn pitch_down(&self) -> i32 {
        self.set_semitones(self.semitones() - 1)
    }

    /// Back to the original key.
    pub fn reset_pitch(&self) -> i32 {
        self.set_semitones(0)
    }

    /// Current key offset in semitones.
    pub fn semitones(&self) -> i32 {
        self.semitones.load(Ordering::Acquire)
    }

    /// True while the worker is live and not paused.
    pub fn is_playing(&self) -> bool {
        self.worker.is_some() && !self.paused.load(Ordering::Acquire)
    }

    /// Current position in milliseconds.
    pub fn position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::Acquire)
    }

    /// Track duration in milliseconds, 0 while unknown.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms.load(Ordering::Acquire)
    }
}

impl Default for KeyShiftPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KeyShiftPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the worker thread needs, moved in at spawn.
struct WorkerContext {
    source: PathBuf,
    pitch_ratio: Arc<AtomicF32>,
    paused: Arc<AtomicBool>,
    stop_flag: Arc<AtomicBool>,
    seek_request: Arc<AtomicU64>,
    position_ms: Arc<AtomicU64>,
    duration_ms: Arc<AtomicU64>,
    events: Sender<PlayerEvent>,
}

/// The decode/process/sink loop. Returns `Ok(true)` when the track played
/// to completion, `Ok(false)` when stopped. All resources are scoped to
/// this function, so every exit path releases them.
fn run_playback(ctx: WorkerContext) -> Result<bool> {
    let mut reader = AudioReader::open(&ctx.source)?;
    let sample_rate = reader.sample_rate();
    let channels = reader.channels();
    let duration_ms = reader.duration_ms();
    ctx.duration_ms
        .store(duration_ms.unwrap_or(0), Ordering::Release);

    // Half a second of sink buffer; the output callback drains it and the
    // worker blocks on the other end when it is full.
    let ring_capacity = (sample_rate as usize / 2) * channels;
    let (producer, consumer) = HeapRb::<i16>::new(ring_capacity).split();
    let sink = OutputSink::start(sample_rate, channels, consumer)?;

    let mut stretch = StretchStream::new(sample_rate, channels);
    let mut sink_feed = SinkFeed {
        producer,
        stop_flag: ctx.stop_flag.as_ref(),
    };
    let mut drain_buf = vec![0i16; 4_096 * channels];
    let mut was_paused = false;

    loop {
        if ctx.stop_flag.load(Ordering::Acquire) {
            return Ok(false);
        }

        let paused = ctx.paused.load(Ordering::Acquire);
        if paused != was_paused {
            if paused {
                sink.pause()?;
            } else {
                sink.resume()?;
            }
            was_paused = paused;
        }
        if paused {
            std::thread::sleep(Duration::from_millis(50));
            continue;
        }

        let seek = ctx.seek_request.swap(NO_SEEK, Ordering::AcqRel);
        if seek != NO_SEEK {
            reader.seek_ms(seek)?;
            ctx.position_ms.store(seek, Ordering::Release);
        }

        match reader.next_block()? {
            Some(block) => {
                stretch.set_pitch(ctx.pitch_ratio.load(Ordering::Acquire));
                stretch.write(block.samples);

                let position = block.timestamp_ms;
                ctx.position_ms.store(position, Ordering::Release);
                let _ = ctx.events.send(PlayerEvent::Position {
                    position_ms: position,
                    duration_ms,
                });

                while stretch.available() > 0 {
                    let frames = stretch.read(&mut drain_buf);
                    if !sink_feed.push(&drain_buf[..frames * channels]) {
                        return Ok(false);
                    }
                }
            }
            None => {
                // End of stream: flush the stretch tail before completing.
                stretch.flush();
                while stretch.available() > 0 {
                    let frames = stretch.read(&mut drain_buf);
                    if !sink_feed.push(&drain_buf[..frames * channels]) {
                        return Ok(false);
                    }
                }
                sink_feed.wait_for_drain();
                return Ok(true);
            }
        }
    }
}

/// Producer side of the sink ring with blocking backpressure.
struct SinkFeed<'a> {
    producer: HeapProd<i16>,
    stop_flag: &'a AtomicBool,
}

impl SinkFeed<'_> {
    /// Push all of `samples`, sleeping while the ring is full. Returns
    /// `false` when a stop request interrupted the push.
    fn push(&mut self, samples: &[i16]) -> bool {
        let mut offset = 0;
        while offset < samples.len() {
            offset += self.producer.push_slice(&samples[offset..]);
            if offset < samples.len() {
                if self.stop_flag.load(Ordering::Acquire) {
                    return false;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        true
    }

    /// Block until the sink has consumed everything queued (or stop).
    fn wait_for_drain(&self) {
        while self.producer.occupied_len() > 0 {
            if self.stop_flag.load(Ordering::Acquire) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// The cpal output stream, confined to the worker thread.
struct OutputSink {
    stream: cpal::Stream,
}

impl OutputSink {
    fn start(sample_rate: u32, channels: usize, consumer: HeapCons<i16>) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(SessionError::NoOutputDevice)?;

        let config = cpal::StreamConfig {
            channels: channels as u16,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let sample_format = device.default_output_config()?.sample_format();
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_output_stream::<f32>(&device, &config, consumer)?,
            cpal::SampleFormat::I16 => build_output_stream::<i16>(&device, &config, consumer)?,
            cpal::SampleFormat::U16 => build_output_stream::<u16>(&device, &config, consumer)?,
            format => {
                return Err(SessionError::UnsupportedSampleFormat(format!("{format:?}")));
            }
        };
        stream.play()?;
        Ok(Self { stream })
    }

    fn pause(&self) -> Result<()> {
        self.stream.pause()?;
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        self.stream.play()?;
        Ok(())
    }
}

fn build_output_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: HeapCons<i16>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for slot in data.iter_mut() {
                let sample = consumer.try_pop().unwrap_or(0);
                *slot = T::from_sample(sample as f32 / 32_768.0);
            }
        },
        move |err| warn!(error = %err, "output stream error"),
        None,
    )?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_offset_clamps_and_steps() {
        let player = KeyShiftPlayer::new();
        assert_eq!(player.semitones(), 0);

        assert_eq!(player.set_semitones(9), 6);
        assert_eq!(player.set_semitones(-20), -6);

        player.reset_pitch();
        for expected in 1..=6 {
            assert_eq!(player.pitch_up(), expected);
        }
        assert_eq!(player.pitch_up(), 6, "clamped at +6");

        player.reset_pitch();
        for expected in (-6..=-1).rev() {
            assert_eq!(player.pitch_down(), expected);
        }
        assert_eq!(player.pitch_down(), -6, "clamped at -6");
    }

    #[test]
    fn ratio_tracks_offset() {
        let player = KeyShiftPlayer::new();
        player.set_semitones(6);
        let ratio = player.pitch_ratio.load(Ordering::Acquire);
        assert!((ratio - 2.0f32.powf(0.5)).abs() < 1e-5);

        player.reset_pitch();
        assert!((player.pitch_ratio.load(Ordering::Acquire) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn transport_flags_before_play_are_noops() {
        let mut player = KeyShiftPlayer::new();
        assert!(!player.is_playing());
        player.pause();
        player.resume();
        player.stop();
        assert!(!player.is_playing());
        assert_eq!(player.position_ms(), 0);
        // No state events were emitted by the no-op calls.
        assert!(player.events().try_recv().is_err());
    }

    #[test]
    fn play_on_missing_file_reports_error_event() {
        let mut player = KeyShiftPlayer::new();
        let events = player.events();
        player.play("/nonexistent/track.mp3").unwrap();

        let mut saw_error = false;
        for _ in 0..100 {
            match events.recv_timeout(Duration::from_millis(100)) {
                Ok(PlayerEvent::Error(_)) => {
                    saw_error = true;
                    break;
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
        assert!(saw_error, "expected an error event for a missing source");
        player.stop();
    }
}
