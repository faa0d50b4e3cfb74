//! Growable interleaved PCM sample queues.
//!
//! A [`SampleQueue`] is a logical FIFO of interleaved 16-bit frames backed by
//! a flat `Vec<i16>`. Length and capacity are tracked in *frames* (one sample
//! per channel), and capacity only ever grows: when an append would overflow,
//! the allocation is enlarged by half its current size plus whatever the
//! append still needs, so repeated growth stays amortized.
//!
//! Allocation failure aborts the process (standard `Vec` growth semantics);
//! the streaming engines treat that as fatal by contract.

/// Growable queue of interleaved 16-bit PCM frames.
#[derive(Debug, Clone)]
pub struct SampleQueue {
    data: Vec<i16>,
    channels: usize,
    /// Logical length in frames. Invariant: `len * channels <= data.len()`.
    len: usize,
}

impl SampleQueue {
    /// Create an empty queue for `channels`-channel interleaved audio.
    ///
    /// # Panics
    /// Panics if `channels` is zero.
    pub fn new(channels: usize) -> Self {
        Self::with_capacity(0, channels)
    }

    /// Create a queue with room for `frames` frames preallocated.
    pub fn with_capacity(frames: usize, channels: usize) -> Self {
        assert!(channels > 0, "sample queue needs at least one channel");
        Self {
            data: vec![0; frames * channels],
            channels,
            len: 0,
        }
    }

    /// Number of channels per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Logical length in frames.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated capacity in frames. Never shrinks.
    pub fn capacity(&self) -> usize {
        self.data.len() / self.channels
    }

    /// The queued samples, interleaved.
    pub fn samples(&self) -> &[i16] {
        &self.data[..self.len * self.channels]
    }

    /// Mutable view of the queued samples, interleaved.
    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.data[..self.len * self.channels]
    }

    /// Drop all queued frames. Capacity is retained.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Ensure room for `additional` more frames, growing by
    /// `capacity / 2 + additional` when the current allocation is too small.
    pub fn reserve(&mut self, additional: usize) {
        let needed = self.len + additional;
        let cap = self.capacity();
        if needed > cap {
            let new_cap = cap + cap / 2 + additional;
            self.data.resize(new_cap * self.channels, 0);
        }
    }

    /// Append interleaved samples to the back of the queue.
    ///
    /// # Panics
    /// Panics if `samples.len()` is not a multiple of the channel count.
    pub fn push_interleaved(&mut self, samples: &[i16]) {
        assert!(
            samples.len() % self.channels == 0,
            "interleaved sample count must be a whole number of frames"
        );
        let frames = samples.len() / self.channels;
        self.reserve(frames);
        let start = self.len * self.channels;
        self.data[start..start + samples.len()].copy_from_slice(samples);
        self.len += frames;
    }

    /// Append `frames` zero-initialized frames and return the new region for
    /// the caller to fill (used for overlap-add writes into the queue tail).
    pub fn append_frames(&mut self, frames: usize) -> &mut [i16] {
        self.reserve(frames);
        let start = self.len * self.channels;
        let end = start + frames * self.channels;
        self.data[start..end].fill(0);
        self.len += frames;
        &mut self.data[start..end]
    }

    /// Remove the first `frames` frames, shifting the remainder to the front.
    ///
    /// # Panics
    /// Panics if `frames` exceeds the queued length.
    pub fn drain_front(&mut self, frames: usize) {
        assert!(frames <= self.len, "cannot drain past the queued length");
        if frames == 0 {
            return;
        }
        let remaining = (self.len - frames) * self.channels;
        self.data
            .copy_within(frames * self.channels..self.len * self.channels, 0);
        self.len -= frames;
        debug_assert!(remaining == self.len * self.channels);
    }

    /// Cut the queue back to `frames` frames, dropping the tail. A no-op when
    /// the queue is already shorter.
    pub fn truncate(&mut self, frames: usize) {
        self.len = self.len.min(frames);
    }

    /// Copy up to `out.len() / channels` frames into `out`, remove them from
    /// the queue, and return the number of frames copied. Returns 0 when the
    /// queue is empty.
    pub fn read_into(&mut self, out: &mut [i16]) -> usize {
        let frames = (out.len() / self.channels).min(self.len);
        if frames == 0 {
            return 0;
        }
        let samples = frames * self.channels;
        out[..samples].copy_from_slice(&self.data[..samples]);
        self.drain_front(frames);
        frames
    }
}
