//! Streaming period-based time-stretch / pitch-shift.
//!
//! The stream owns three growable queues of interleaved frames:
//!
//! - `input`: raw samples as written by the producer
//! - `output`: finished samples waiting for `read`
//! - `pitch_queue`: stretched samples awaiting the pitch pass when the
//!   pitch ratio departs from 1.0
//!
//! Speed and pitch are decoupled by running two period-based passes. The
//! speed pass consumes input at `speed / pitch` and the pitch pass then
//! resamples whole periods out of its own queue, so changing pitch never
//! changes duration. A window is only processed once `2 * max_period` input
//! frames are buffered; anything shorter stays queued until the next write
//! or a flush.

use tracing::debug;
use vocalise_core::SampleQueue;

/// Lower bound of the assumed vocal range, Hz. Bounds the period search.
const VOCAL_MIN_HZ: u32 = 65;

/// Upper bound of the assumed vocal range, Hz.
const VOCAL_MAX_HZ: u32 = 400;

/// Streams above this rate are decimated before the coarse period search so
/// its cost stays bounded, then refined at full resolution.
const AMDF_RATE: u32 = 4_000;

/// Ratios within this distance of 1.0 take the straight-copy path.
const UNITY_TOLERANCE: f32 = 1.0e-5;

/// Floor for speed/pitch ratios; keeps the period arithmetic finite.
const MIN_RATIO: f32 = 1.0e-3;

/// Result of one bounded autocorrelation search.
struct PeriodMatch {
    period: usize,
    /// Best normalized mismatch (lower is a better match).
    min_diff: u64,
    /// Worst normalized mismatch seen in the range.
    max_diff: u64,
}

/// Which queue a period search runs over.
#[derive(Clone, Copy)]
enum PeriodSource {
    Input,
    PitchQueue,
}

/// Streaming time-stretch / pitch-shift engine for interleaved 16-bit PCM.
///
/// Single-producer state: `write`, `read`, and `flush` all take `&mut self`,
/// so concurrent producers are rejected at compile time.
pub struct StretchStream {
    sample_rate: u32,
    channels: usize,

    input: SampleQueue,
    output: SampleQueue,
    pitch_queue: SampleQueue,
    /// Mono scratch for the decimated period search.
    down_sample: Vec<i16>,

    min_period: usize,
    max_period: usize,
    /// Frames a window must reach before it is processed (`2 * max_period`).
    max_required: usize,

    remaining_input_to_copy: usize,
    prev_period: usize,
    prev_min_diff: u64,

    speed: f32,
    pitch: f32,
    volume: f32,
}

impl StretchStream {
    /// Create a stream for `channels`-channel audio at `sample_rate` Hz.
    ///
    /// # Panics
    /// Panics if `sample_rate` is below the vocal search range or `channels`
    /// is zero.
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        assert!(channels > 0, "stretch stream needs at least one channel");
        assert!(
            sample_rate >= 2 * VOCAL_MAX_HZ,
            "sample rate too low for the vocal period search"
        );

        let min_period = (sample_rate / VOCAL_MAX_HZ) as usize;
        let max_period = (sample_rate / VOCAL_MIN_HZ) as usize;
        let max_required = 2 * max_period;

        Self {
            sample_rate,
            channels,
            input: SampleQueue::with_capacity(max_required, channels),
            output: SampleQueue::with_capacity(max_required, channels),
            pitch_queue: SampleQueue::with_capacity(max_required, channels),
            down_sample: vec![0; max_required],
            min_period,
            max_period,
            max_required,
            remaining_input_to_copy: 0,
            prev_period: 0,
            prev_min_diff: 0,
            speed: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }

    /// Playback speed ratio (1.0 = unchanged tempo).
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the playback speed ratio. Takes effect on the next write.
    pub fn set_speed(&mut self, speed: f32) {
        let speed = speed.max(MIN_RATIO);
        if speed != self.speed {
            debug!(speed, "stretch speed changed");
            self.speed = speed;
        }
    }

    /// Pitch ratio (1.0 = original key).
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Set the pitch ratio. Takes effect on the next write; duration is
    /// unaffected.
    pub fn set_pitch(&mut self, pitch: f32) {
        let pitch = pitch.max(MIN_RATIO);
        if pitch != self.pitch {
            debug!(pitch, "stretch pitch changed");
            self.pitch = pitch;
        }
    }

    /// Output gain applied on `read`, 1.0 = unity.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.max(0.0);
    }

    /// Frames currently ready for `read`.
    pub fn available(&self) -> usize {
        self.output.len()
    }

    /// Append interleaved samples and run the stream processing. Never
    /// blocks; zero-length input is a no-op. Buffers grow as required and
    /// allocation failure is fatal.
    ///
    /// # Panics
    /// Panics if `samples.len()` is not a multiple of the channel count.
    pub fn write(&mut self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        self.input.push_interleaved(samples);
        self.process_input();
    }

    /// Drain up to `out.len() / channels` frames of finished audio into
    /// `out`, shifting the remainder to the queue front. Returns the number
    /// of frames written, 0 when nothing is ready.
    pub fn read(&mut self, out: &mut [i16]) -> usize {
        let frames = self.output.read_into(out);
        if self.volume != 1.0 && frames > 0 {
            for sample in &mut out[..frames * self.channels] {
                let scaled = (*sample as f32 * self.volume).round() as i32;
                *sample = scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            }
        }
        frames
    }

    /// End-of-stream flush: force unity ratios for whatever input is still
    /// queued, copy it straight to the output along with any samples parked
    /// in the pitch queue, then restore the configured ratios. Preserves the
    /// trailing tail that is shorter than a processing window.
    pub fn flush(&mut self) {
        let remaining = self.input.len();
        if remaining > 0 {
            self.output.push_interleaved(self.input.samples());
            self.input.clear();
        }
        if !self.pitch_queue.is_empty() {
            self.output.push_interleaved(self.pitch_queue.samples());
            self.pitch_queue.clear();
        }
        self.remaining_input_to_copy = 0;
    }

    fn process_input(&mut self) {
        let output_before_pass = self.output.len();
        let rate = self.speed / self.pitch;

        if (rate - 1.0).abs() > UNITY_TOLERANCE {
            self.change_speed(rate);
        } else {
            self.output.push_interleaved(self.input.samples());
            self.input.clear();
        }

        if self.pitch != 1.0 {
            self.adjust_pitch(output_before_pass);
        }
    }

    /// Period-based speed change: consume input at `rate`, emitting skipped
    /// or duplicated periods under overlap-add crossfades.
    fn change_speed(&mut self, rate: f32) {
        if self.input.len() < self.max_required {
            return;
        }
        let frames = self.input.len();
        let mut position = 0;

        loop {
            if self.remaining_input_to_copy > 0 {
                position += self.copy_input_to_output(position);
            } else {
                let period = self.find_pitch_period(PeriodSource::Input, position, true);
                if rate > 1.0 {
                    position += period + self.skip_pitch_period(position, rate, period);
                } else {
                    position += self.insert_pitch_period(position, rate, period);
                }
            }
            if position + self.max_required > frames {
                break;
            }
        }

        self.input.drain_front(position);
    }

    /// Copy a chunk of pending straight-through input, bounded per call so a
    /// long run cannot starve the period search.
    fn copy_input_to_output(&mut self, position: usize) -> usize {
        let frames = self.remaining_input_to_copy.min(self.max_required);
        let start = position * self.channels;
        self.output
            .push_interleaved(&self.input.samples()[start..start + frames * self.channels]);
        self.remaining_input_to_copy -= frames;
        frames
    }

    /// Speed-up: crossfade one period into the next, dropping a period of
    /// input. For rates below 2.0 the surplus input is scheduled to be
    /// copied through unchanged.
    fn skip_pitch_period(&mut self, position: usize, rate: f32, period: usize) -> usize {
        let new_frames = if rate >= 2.0 {
            (period as f32 / (rate - 1.0)) as usize
        } else {
            self.remaining_input_to_copy =
                (period as f32 * (2.0 - rate) / (rate - 1.0)) as usize;
            period
        };

        let ch = self.channels;
        let src = self.input.samples();
        let down = &src[position * ch..][..new_frames * ch];
        let up = &src[(position + period) * ch..][..new_frames * ch];
        let dst = self.output.append_frames(new_frames);
        overlap_add(dst, ch, down, up);
        new_frames
    }

    /// Slow-down: emit the period, then crossfade a duplicate of it. For
    /// rates above 0.5 the surplus is scheduled as straight copy.
    fn insert_pitch_period(&mut self, position: usize, rate: f32, period: usize) -> usize {
        let new_frames = if rate < 0.5 {
            (period as f32 * rate / (1.0 - rate)) as usize
        } else {
            self.remaining_input_to_copy =
                (period as f32 * (2.0 * rate - 1.0) / (1.0 - rate)) as usize;
            period
        };

        let ch = self.channels;
        let start = position * ch;
        self.output
            .push_interleaved(&self.input.samples()[start..start + period * ch]);

        let src = self.input.samples();
        let down = &src[(position + period) * ch..][..new_frames * ch];
        let up = &src[position * ch..][..new_frames * ch];
        let dst = self.output.append_frames(new_frames);
        overlap_add(dst, ch, down, up);
        new_frames
    }

    /// Pitch pass: move freshly stretched output into the pitch queue, then
    /// re-emit it period by period at the configured pitch ratio. Operates
    /// on whole detected periods so duration is untouched.
    fn adjust_pitch(&mut self, output_before_pass: usize) {
        if self.output.len() == output_before_pass {
            return;
        }
        self.move_output_to_pitch_queue(output_before_pass);

        let pitch = self.pitch;
        let ch = self.channels;
        let mut position = 0;

        while self.pitch_queue.len() - position >= self.max_required {
            let period = self.find_pitch_period(PeriodSource::PitchQueue, position, false);
            let new_period = ((period as f32 / pitch) as usize).max(1);

            if pitch >= 1.0 {
                // Shorten: crossfade the period with its own tail.
                let src = self.pitch_queue.samples();
                let down = &src[position * ch..][..new_period * ch];
                let up = &src[(position + period - new_period) * ch..][..new_period * ch];
                let dst = self.output.append_frames(new_period);
                overlap_add(dst, ch, down, up);
            } else {
                // Lengthen: stretch the period across itself with separation.
                let separation = new_period - period;
                let src = self.pitch_queue.samples();
                let ramp = &src[position * ch..][..period * ch];
                let dst = self.output.append_frames(new_period);
                overlap_add_with_separation(dst, ch, separation, ramp);
            }
            position += period;
        }

        self.pitch_queue.drain_front(position);
    }

    fn move_output_to_pitch_queue(&mut self, output_before_pass: usize) {
        let start = output_before_pass * self.channels;
        self.pitch_queue
            .push_interleaved(&self.output.samples()[start..]);
        self.output.truncate(output_before_pass);
    }

    /// Locate the dominant pitch period in a `max_required`-frame window.
    ///
    /// Long windows are decimated for a coarse search and refined at full
    /// resolution. With `prefer_new` the previous period wins over a new
    /// candidate of comparable match quality, which suppresses octave jumps
    /// between adjacent windows.
    fn find_pitch_period(
        &mut self,
        source: PeriodSource,
        position: usize,
        prefer_new: bool,
    ) -> usize {
        let ch = self.channels;
        let skip = if self.sample_rate > AMDF_RATE {
            (self.sample_rate / AMDF_RATE) as usize
        } else {
            1
        };

        let window = {
            let queue = match source {
                PeriodSource::Input => &self.input,
                PeriodSource::PitchQueue => &self.pitch_queue,
            };
            &queue.samples()[position * ch..(position + self.max_required) * ch]
        };

        let matched = if ch == 1 && skip == 1 {
            find_period_in_range(window, self.min_period, self.max_period)
        } else {
            let values = downmix_window(&mut self.down_sample, window, ch, skip);
            let coarse = find_period_in_range(
                &self.down_sample[..values],
                (self.min_period / skip).max(1),
                (self.max_period / skip).max(1),
            );
            if skip == 1 {
                coarse
            } else {
                // Refine around the decimated estimate at full resolution.
                let estimate = coarse.period * skip;
                let lo = estimate.saturating_sub(skip * 4).max(self.min_period);
                let hi = (estimate + skip * 4).min(self.max_period);
                if ch == 1 {
                    find_period_in_range(window, lo, hi)
                } else {
                    let values = downmix_window(&mut self.down_sample, window, ch, 1);
                    find_period_in_range(&self.down_sample[..values], lo, hi)
                }
            }
        };

        let chosen = if previous_period_better(&matched, self.prev_period, self.prev_min_diff, prefer_new)
        {
            self.prev_period
        } else {
            matched.period
        };
        self.prev_min_diff = matched.min_diff;
        self.prev_period = matched.period;
        chosen
    }
}

/// Brute-force normalized-difference period search over a mono window.
///
/// The window must hold at least `2 * max_period` samples.
fn find_period_in_range(samples: &[i16], min_period: usize, max_period: usize) -> PeriodMatch {
    let mut best_period = 0usize;
    let mut worst_period = 255usize;
    let mut min_diff = 1u64;
    let mut max_diff = 0u64;

    for period in min_period..=max_period {
        let mut diff = 0u64;
        for i in 0..period {
            diff += (samples[i] as i64 - samples[period + i] as i64).unsigned_abs();
        }
        // Cross-multiplied comparison of diff/period without division.
        if diff * (best_period as u64) < min_diff * period as u64 {
            min_diff = diff;
            best_period = period;
        }
        if diff * worst_period as u64 > max_diff * period as u64 {
            max_diff = diff;
            worst_period = period;
        }
    }

    PeriodMatch {
        period: best_period,
        min_diff: min_diff / best_period.max(1) as u64,
        max_diff: max_diff / worst_period as u64,
    }
}

/// Hysteresis rule for the period search.
fn previous_period_better(
    matched: &PeriodMatch,
    prev_period: usize,
    prev_min_diff: u64,
    prefer_new: bool,
) -> bool {
    if matched.min_diff == 0 || prev_period == 0 {
        return false;
    }
    if prefer_new {
        if matched.max_diff > matched.min_diff * 3 {
            // A distinct dip in this window: trust it.
            return false;
        }
        if matched.min_diff * 2 <= prev_min_diff * 3 {
            return false;
        }
    } else if matched.min_diff <= prev_min_diff {
        return false;
    }
    true
}

/// Downmix an interleaved window to mono, averaging `channels * skip`
/// samples per output value. Returns the number of values produced.
fn downmix_window(dst: &mut [i16], src: &[i16], channels: usize, skip: usize) -> usize {
    let samples_per_value = channels * skip;
    let values = src.len() / samples_per_value;
    for (i, out) in dst.iter_mut().take(values).enumerate() {
        let start = i * samples_per_value;
        let sum: i32 = src[start..start + samples_per_value]
            .iter()
            .map(|&s| s as i32)
            .sum();
        *out = (sum / samples_per_value as i32) as i16;
    }
    values.min(dst.len())
}

/// Triangular overlap-add: fade `down` out while fading `up` in across the
/// destination window.
fn overlap_add(out: &mut [i16], channels: usize, down: &[i16], up: &[i16]) {
    let frames = out.len() / channels;
    if frames == 0 {
        return;
    }
    for i in 0..frames {
        let fade_out = (frames - i) as i32;
        let fade_in = i as i32;
        for c in 0..channels {
            let idx = i * channels + c;
            let mixed = down[idx] as i32 * fade_out + up[idx] as i32 * fade_in;
            out[idx] = (mixed / frames as i32) as i16;
        }
    }
}

/// Overlap-add that lengthens one period by `separation` frames: the source
/// fades out over the first `period` frames while a copy of it, delayed by
/// `separation`, fades in underneath.
fn overlap_add_with_separation(out: &mut [i16], channels: usize, separation: usize, ramp: &[i16]) {
    let period = ramp.len() / channels;
    if period == 0 {
        return;
    }
    for t in 0..period + separation {
        for c in 0..channels {
            let mut mixed = 0i32;
            if t < period {
                mixed += ramp[t * channels + c] as i32 * (period - t) as i32;
            }
            if t >= separation {
                let delayed = t - separation;
                mixed += ramp[delayed * channels + c] as i32 * delayed as i32;
            }
            out[t * channels + c] = (mixed / period as i32) as i16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semitone_ratio;

    fn sine(freq: f32, rate: u32, frames: usize, amplitude: f32) -> Vec<i16> {
        (0..frames)
            .map(|i| {
                let t = i as f32 / rate as f32;
                (amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()) as i16
            })
            .collect()
    }

    fn drain_all(stream: &mut StretchStream) -> Vec<i16> {
        let mut collected = Vec::new();
        let mut chunk = [0i16; 4096];
        loop {
            let frames = stream.read(&mut chunk);
            if frames == 0 {
                break;
            }
            collected.extend_from_slice(&chunk[..frames]);
        }
        collected
    }

    #[test]
    fn unity_ratios_pass_through() {
        let mut stream = StretchStream::new(44_100, 1);
        let input = sine(220.0, 44_100, 8_192, 12_000.0);
        stream.write(&input);

        let mut out = vec![0i16; input.len()];
        let frames = stream.read(&mut out);
        assert_eq!(frames, input.len());
        assert_eq!(out, input);
    }

    #[test]
    fn zero_length_write_is_noop() {
        let mut stream = StretchStream::new(44_100, 2);
        stream.set_speed(1.5);
        stream.write(&[]);
        assert_eq!(stream.available(), 0);
    }

    #[test]
    fn silence_survives_any_ratio() {
        for &(speed, pitch) in &[(2.0, 1.0), (0.5, 1.0), (1.0, 1.4142), (1.0, 0.7071)] {
            let mut stream = StretchStream::new(44_100, 1);
            stream.set_speed(speed);
            stream.set_pitch(pitch);
            stream.write(&vec![0i16; 44_100]);
            stream.flush();
            let out = drain_all(&mut stream);
            assert!(out.iter().all(|&s| s == 0), "speed={speed} pitch={pitch}");
        }
    }

    #[test]
    fn double_speed_halves_duration() {
        let rate = 44_100;
        let frames = 2 * rate as usize;
        let mut stream = StretchStream::new(rate, 1);
        stream.set_speed(2.0);

        for chunk in sine(220.0, rate, frames, 14_000.0).chunks(4_410) {
            stream.write(chunk);
        }
        stream.flush();
        let out = drain_all(&mut stream);

        let expected = frames / 2;
        let tolerance = 4_096; // flush passes the last sub-window through 1:1
        assert!(
            (out.len() as i64 - expected as i64).unsigned_abs() < tolerance,
            "expected ~{expected}, got {}",
            out.len()
        );
    }

    #[test]
    fn half_speed_doubles_duration() {
        let rate = 44_100;
        let frames = rate as usize;
        let mut stream = StretchStream::new(rate, 1);
        stream.set_speed(0.5);

        stream.write(&sine(196.0, rate, frames, 14_000.0));
        stream.flush();
        let out = drain_all(&mut stream);

        let expected = frames * 2;
        assert!(
            (out.len() as i64 - expected as i64).unsigned_abs() < 4_096,
            "expected ~{expected}, got {}",
            out.len()
        );
    }

    #[test]
    fn pitch_shift_preserves_duration() {
        let rate = 44_100;
        let frames = rate as usize;
        for &n in &[-6, -3, 3, 6] {
            let mut stream = StretchStream::new(rate, 1);
            stream.set_pitch(semitone_ratio(n));

            stream.write(&sine(261.6, rate, frames, 14_000.0));
            stream.flush();
            let out = drain_all(&mut stream);

            assert!(
                (out.len() as i64 - frames as i64).unsigned_abs() < 8_192,
                "offset {n}: expected ~{frames}, got {}",
                out.len()
            );
        }
    }

    #[test]
    fn flush_then_read_drains_to_empty() {
        let mut stream = StretchStream::new(44_100, 1);
        stream.set_pitch(semitone_ratio(4));
        stream.write(&sine(330.0, 44_100, 10_000, 10_000.0));
        stream.flush();

        let _ = drain_all(&mut stream);
        let mut out = [0i16; 512];
        assert_eq!(stream.read(&mut out), 0);
        assert_eq!(stream.available(), 0);
    }

    #[test]
    fn short_tail_is_preserved_by_flush() {
        let mut stream = StretchStream::new(44_100, 1);
        stream.set_speed(1.3);
        // Shorter than one processing window: nothing is emitted until flush.
        stream.write(&[500i16; 512]);
        assert_eq!(stream.available(), 0);

        stream.flush();
        assert_eq!(stream.available(), 512);
    }

    #[test]
    fn interleaved_stereo_keeps_frame_alignment() {
        let mut stream = StretchStream::new(44_100, 2);
        stream.set_speed(1.5);
        // Left channel constant positive, right channel constant negative.
        let mut input = Vec::with_capacity(88_200);
        for _ in 0..44_100 {
            input.push(8_000i16);
            input.push(-8_000i16);
        }
        stream.write(&input);
        stream.flush();

        let mut out = vec![0i16; 131_072];
        let frames = stream.read(&mut out);
        assert!(frames > 0);
        for frame in out[..frames * 2].chunks(2) {
            assert!(frame[0] >= 0, "left went negative: {}", frame[0]);
            assert!(frame[1] <= 0, "right went positive: {}", frame[1]);
        }
    }

    #[test]
    fn volume_scales_output() {
        let mut stream = StretchStream::new(44_100, 1);
        stream.set_volume(0.5);
        stream.write(&[10_000i16; 4_096]);
        let mut out = [0i16; 256];
        let frames = stream.read(&mut out);
        assert!(frames > 0);
        assert!(out[..frames].iter().all(|&s| (s - 5_000).abs() <= 1));
    }
}
