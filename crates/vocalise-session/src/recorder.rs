//! Capture-to-file recording.
//!
//! Writes the microphone straight to a canonical 16-bit PCM WAV file, the
//! input format the file-to-file comparison path consumes. The header is
//! finalized on stop and on drop, so a crash-free exit always leaves a
//! readable file.

use crate::capture::{BlockAssembler, MicCapture, CAPTURE_BLOCK};
use crate::error::{Result, SessionError};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

/// Records the default microphone to a WAV file.
pub struct WavRecorder {
    path: PathBuf,
    active: Option<ActiveCapture>,
}

struct ActiveCapture {
    capture: MicCapture,
    stop_flag: Arc<AtomicBool>,
    writer: JoinHandle<Result<u32>>,
}

impl WavRecorder {
    /// Recorder that will write to `path` once started.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active: None,
        }
    }

    /// Open the microphone and start writing.
    ///
    /// Fails with [`SessionError::InvalidState`] when already recording.
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(SessionError::InvalidState(
                "file recording is already in progress".into(),
            ));
        }

        let (capture, consumer) = MicCapture::start()?;
        let spec = WavSpec {
            channels: 1,
            sample_rate: capture.sample_rate(),
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&self.path, spec)?;
        let stop_flag = Arc::new(AtomicBool::new(false));

        let writer_thread = {
            let stop = Arc::clone(&stop_flag);
            let mut assembler = BlockAssembler::new(consumer, CAPTURE_BLOCK);
            std::thread::Builder::new()
                .name("vocalise-file-writer".into())
                .spawn(move || -> Result<u32> {
                    let mut written = 0u32;
                    loop {
                        match assembler.next_block() {
                            Some(block) => {
                                for &sample in block {
                                    writer.write_sample(sample)?;
                                }
                                written += block.len() as u32;
                            }
                            None => {
                                if stop.load(Ordering::Acquire) {
                                    break;
                                }
                                std::thread::sleep(Duration::from_millis(5));
                            }
                        }
                    }
                    writer.finalize()?;
                    Ok(written)
                })?
        };

        info!(path = %self.path.display(), "file recording started");
        self.active = Some(ActiveCapture {
            capture,
            stop_flag,
            writer: writer_thread,
        });
        Ok(())
    }

    /// Stop, finalize the WAV header, and return the sample count written.
    pub fn stop(&mut self) -> Result<u32> {
        let Some(active) = self.active.take() else {
            return Err(SessionError::InvalidState(
                "no file recording in progress".into(),
            ));
        };
        // Release the microphone first so the writer drains what is left.
        drop(active.capture);
        active.stop_flag.store(true, Ordering::Release);
        let written = active
            .writer
            .join()
            .map_err(|_| SessionError::InvalidState("writer thread panicked".into()))??;
        info!(path = %self.path.display(), samples = written, "file recording stopped");
        Ok(written)
    }

    /// True while capturing.
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Destination file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WavRecorder {
    fn drop(&mut self) {
        if self.active.is_some() {
            let _ = self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_without_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut recorder = WavRecorder::new(dir.path().join("take.wav"));
        assert!(!recorder.is_recording());
        assert!(matches!(
            recorder.stop(),
            Err(SessionError::InvalidState(_))
        ));
    }
}
