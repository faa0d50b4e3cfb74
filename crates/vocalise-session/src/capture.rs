//! Microphone capture into a lock-free ring.
//!
//! The cpal input callback converts whatever the device delivers into mono
//! 16-bit samples and pushes them into an SPSC ring buffer; the estimation
//! thread drains fixed-size blocks out the other end. Samples that arrive
//! while the ring is full are dropped - the consumer is supposed to keep up,
//! and a latest-sample pipeline has no use for stale backlog.

use crate::error::{Result, SessionError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use tracing::{debug, warn};

/// Sample rate requested from the microphone, Hz.
pub const CAPTURE_SAMPLE_RATE: u32 = 22_050;

/// Samples per estimation block.
pub const CAPTURE_BLOCK: usize = 1_024;

/// Ring capacity in samples (~1 s at the capture rate).
const RING_CAPACITY: usize = 32_768;

/// Wrapper to hold `cpal::Stream` in a `Send` context.
///
/// # Safety
/// `cpal::Stream` is `!Send` due to platform internals. This is safe because
/// the stream is never touched after construction - dropping it from another
/// thread only tears the stream down.
struct StreamHandle(#[allow(dead_code)] cpal::Stream);

unsafe impl Send for StreamHandle {}

/// A running microphone capture.
///
/// Dropping the handle releases the microphone.
pub struct MicCapture {
    _stream: StreamHandle,
    sample_rate: u32,
}

impl MicCapture {
    /// Open the default input device and start capturing mono 16-bit
    /// samples into the returned consumer.
    ///
    /// [`CAPTURE_SAMPLE_RATE`] mono is requested first; when the device
    /// refuses, its default configuration is used instead and multi-channel
    /// input is downmixed. The actual rate is reported by
    /// [`MicCapture::sample_rate`].
    pub fn start() -> Result<(Self, HeapCons<i16>)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(SessionError::NoInputDevice)?;

        let default_config = device.default_input_config()?;
        let (config, sample_format) = match preferred_config(&device) {
            Some(config) => (config, cpal::SampleFormat::F32),
            None => (default_config.config(), default_config.sample_format()),
        };

        let (producer, consumer) = HeapRb::<i16>::new(RING_CAPACITY).split();
        let channels = config.channels as usize;

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_input_stream::<f32>(&device, &config, producer)?,
            cpal::SampleFormat::I16 => build_input_stream::<i16>(&device, &config, producer)?,
            cpal::SampleFormat::U16 => build_input_stream::<u16>(&device, &config, producer)?,
            format => {
                return Err(SessionError::UnsupportedSampleFormat(format!("{format:?}")));
            }
        };
        stream.play()?;

        debug!(
            sample_rate = config.sample_rate.0,
            channels, "microphone capture started"
        );

        Ok((
            Self {
                _stream: StreamHandle(stream),
                sample_rate: config.sample_rate.0,
            },
            consumer,
        ))
    }

    /// The rate the device actually delivers, Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Try for the canonical capture format: mono at [`CAPTURE_SAMPLE_RATE`].
fn preferred_config(device: &cpal::Device) -> Option<cpal::StreamConfig> {
    let supported = device.supported_input_configs().ok()?;
    for range in supported {
        if range.channels() == 1
            && range.sample_format() == cpal::SampleFormat::F32
            && range.min_sample_rate().0 <= CAPTURE_SAMPLE_RATE
            && range.max_sample_rate().0 >= CAPTURE_SAMPLE_RATE
        {
            return Some(
                range
                    .with_sample_rate(cpal::SampleRate(CAPTURE_SAMPLE_RATE))
                    .config(),
            );
        }
    }
    None
}

fn build_input_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: HeapProd<i16>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<i16> = Vec::new();

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _| {
            scratch.clear();
            scratch.extend(data.chunks(channels).map(|frame| {
                let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                ((sum / channels as f32) * 32_767.0).clamp(-32_768.0, 32_767.0) as i16
            }));
            let pushed = producer.push_slice(&scratch);
            if pushed < scratch.len() {
                warn!(dropped = scratch.len() - pushed, "capture ring full");
            }
        },
        move |err| warn!(error = %err, "capture stream error"),
        None,
    )?;
    Ok(stream)
}

/// Assembles fixed-size blocks out of a capture ring.
pub(crate) struct BlockAssembler {
    consumer: HeapCons<i16>,
    block: Vec<i16>,
    filled: usize,
}

impl BlockAssembler {
    pub(crate) fn new(consumer: HeapCons<i16>, block_size: usize) -> Self {
        Self {
            consumer,
            block: vec![0; block_size],
            filled: 0,
        }
    }

    /// Pull whatever is available; returns a full block when one completes,
    /// `None` when more samples are needed.
    pub(crate) fn next_block(&mut self) -> Option<&[i16]> {
        if self.consumer.occupied_len() == 0 && self.filled < self.block.len() {
            return None;
        }
        let read = self.consumer.pop_slice(&mut self.block[self.filled..]);
        self.filled += read;
        if self.filled == self.block.len() {
            self.filled = 0;
            Some(&self.block)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_emits_fixed_blocks() {
        let (mut producer, consumer) = HeapRb::<i16>::new(8_192).split();
        let mut assembler = BlockAssembler::new(consumer, 1_024);

        assert!(assembler.next_block().is_none());

        producer.push_slice(&vec![7i16; 1_000]);
        assert!(assembler.next_block().is_none());

        producer.push_slice(&vec![7i16; 1_100]);
        let block = assembler.next_block().expect("one full block");
        assert_eq!(block.len(), 1_024);
        assert!(block.iter().all(|&s| s == 7));

        let second = assembler.next_block().expect("second full block");
        assert_eq!(second.len(), 1_024);
        // 2100 - 2048 = 52 samples remain buffered
        assert!(assembler.next_block().is_none());
    }
}
