//! Streaming and whole-track decode via symphonia.

use crate::error::{MediaError, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::{debug, warn};

/// A fully decoded track: interleaved 16-bit samples at the source rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples.
    pub samples: Vec<i16>,
    /// Source sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count of the interleaved data.
    pub channels: usize,
}

impl DecodedAudio {
    /// Track duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1_000 / self.sample_rate as u64
    }

    /// Downmix to mono by averaging channels.
    pub fn to_mono(&self) -> Vec<i16> {
        if self.channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(self.channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / frame.len() as i32) as i16
            })
            .collect()
    }
}

/// One decoded packet's worth of interleaved samples, borrowed from the
/// reader's scratch buffer.
pub struct DecodedBlock<'a> {
    /// Interleaved 16-bit samples.
    pub samples: &'a [i16],
    /// Presentation time of the packet, milliseconds from track start.
    pub timestamp_ms: u64,
}

/// Streaming decoder: pulls one packet at a time so callers can process,
/// play, or cancel mid-track without holding the whole file in memory.
pub struct AudioReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    duration_ms: Option<u64>,
    time_base: Option<symphonia::core::units::TimeBase>,
    sample_buf: Option<SampleBuffer<i16>>,
}

impl AudioReader {
    /// Probe and open `path`, selecting the first decodable audio track.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(MediaError::NoAudioTrack)?;

        let track_id = track.id;
        let params = &track.codec_params;
        let sample_rate = params.sample_rate.ok_or(MediaError::UnknownSampleRate)?;
        let channels = params.channels.map_or(1, |c| c.count());
        let time_base = params.time_base;
        let duration_ms = match (params.n_frames, time_base) {
            (Some(frames), Some(tb)) => {
                let time = tb.calc_time(frames);
                Some(time.seconds * 1_000 + (time.frac * 1_000.0) as u64)
            }
            (Some(frames), None) => Some(frames * 1_000 / sample_rate as u64),
            _ => None,
        };

        let decoder =
            symphonia::default::get_codecs().make(params, &DecoderOptions::default())?;

        debug!(
            ?path,
            sample_rate, channels, ?duration_ms, "opened audio source"
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration_ms,
            time_base,
            sample_buf: None,
        })
    }

    /// Source sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the decoded stream.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Declared track duration, when the container knows it.
    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Decode the next packet. Returns `Ok(None)` at end of stream;
    /// packets from other tracks and recoverably corrupt packets are
    /// skipped.
    pub fn next_block(&mut self) -> Result<Option<DecodedBlock<'_>>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }
            let ts = packet.ts();

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(error = %e, "skipping corrupt packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames() as u64;
            let buf = self
                .sample_buf
                .get_or_insert_with(|| SampleBuffer::<i16>::new(frames.max(4_096), spec));
            if buf.capacity() < frames as usize * spec.channels.count() {
                *buf = SampleBuffer::<i16>::new(frames, spec);
            }
            buf.copy_interleaved_ref(decoded);

            let timestamp_ms = match self.time_base {
                Some(tb) => {
                    let time = tb.calc_time(ts);
                    time.seconds * 1_000 + (time.frac * 1_000.0) as u64
                }
                None => ts * 1_000 / self.sample_rate as u64,
            };

            let samples = self.sample_buf.as_ref().map(|b| b.samples()).unwrap_or(&[]);
            return Ok(Some(DecodedBlock {
                samples,
                timestamp_ms,
            }));
        }
    }

    /// Coarse seek to `position_ms`. The decoder is reset so the next block
    /// starts clean at the new position.
    pub fn seek_ms(&mut self, position_ms: u64) -> Result<()> {
        let time = Time::new(position_ms / 1_000, (position_ms % 1_000) as f64 / 1_000.0);
        self.format.seek(
            SeekMode::Coarse,
            SeekTo::Time {
                time,
                track_id: Some(self.track_id),
            },
        )?;
        self.decoder.reset();
        Ok(())
    }
}

/// Decode a whole file into memory.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let mut reader = AudioReader::open(path)?;
    let sample_rate = reader.sample_rate();
    let channels = reader.channels();

    let mut samples = Vec::new();
    while let Some(block) = reader.next_block()? {
        samples.extend_from_slice(block.samples);
    }

    debug!(
        samples = samples.len(),
        sample_rate, channels, "decoded track"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
