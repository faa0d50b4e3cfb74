//! Canonical 16-bit PCM WAV read/write.
//!
//! The on-disk layout is the classic 44-byte header - `RIFF` size `WAVE`,
//! a 16-byte `fmt ` chunk (PCM, format tag 1), then a single `data` chunk -
//! all little-endian. The byte-window similarity metrics read the data
//! chunk raw, so [`read_data_bytes`] exposes it without sample conversion.

use crate::error::{MediaError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Read;
use std::path::Path;

/// Canonical header length in bytes.
pub const WAV_HEADER_LEN: usize = 44;

/// Write interleaved 16-bit samples as a canonical PCM WAV file.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    {
        let mut writer_i16 = writer.get_i16_writer(samples.len() as u32);
        for &sample in samples {
            writer_i16.write_sample(sample);
        }
        writer_i16.flush()?;
    }
    writer.finalize()?;
    Ok(())
}

/// Read a 16-bit PCM WAV file into interleaved samples.
pub fn read_wav(path: &Path) -> Result<(Vec<i16>, WavSpec)> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int {
        return Err(MediaError::MalformedWav(format!(
            "expected 16-bit integer PCM, got {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((samples, spec))
}

/// Read the raw `data` chunk of a canonical WAV file as bytes.
///
/// Validates the fixed header layout (magics at their canonical offsets)
/// and returns everything after byte 44. The bytes are *not* decoded into
/// samples - the energy/centroid/rolloff comparisons operate on them as
/// amplitude proxies.
pub fn read_data_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;

    if bytes.len() < WAV_HEADER_LEN {
        return Err(MediaError::MalformedWav(format!(
            "file shorter than the {WAV_HEADER_LEN}-byte header"
        )));
    }
    for (offset, magic) in [(0usize, b"RIFF" as &[u8]), (8, b"WAVE"), (12, b"fmt "), (36, b"data")]
    {
        if &bytes[offset..offset + 4] != magic {
            return Err(MediaError::MalformedWav(format!(
                "missing {:?} chunk at offset {offset}",
                String::from_utf8_lossy(magic)
            )));
        }
    }

    let declared = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]) as usize;
    let mut data = bytes.split_off(WAV_HEADER_LEN);
    data.truncate(declared);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<i16> = (-50..50).map(|i| i * 100).collect();

        write_wav(&path, &samples, 22_050, 1).unwrap();
        let (read_back, spec) = read_wav(&path).unwrap();
        assert_eq!(read_back, samples);
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
    }

    #[test]
    fn header_layout_is_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.wav");
        let samples = vec![0i16; 256];
        write_wav(&path, &samples, 44_100, 1).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        // fmt chunk length 16, PCM format tag 1, mono
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 1);
        assert_eq!(
            u32::from_le_bytes(bytes[24..28].try_into().unwrap()),
            44_100
        );
        // byte rate = rate * channels * 16/8, block align, bits per sample
        assert_eq!(
            u32::from_le_bytes(bytes[28..32].try_into().unwrap()),
            88_200
        );
        assert_eq!(u16::from_le_bytes(bytes[32..34].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(bytes[34..36].try_into().unwrap()), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(
            u32::from_le_bytes(bytes[40..44].try_into().unwrap()) as usize,
            samples.len() * 2
        );
        assert_eq!(bytes.len(), WAV_HEADER_LEN + samples.len() * 2);
    }

    #[test]
    fn data_bytes_skip_the_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.wav");
        // 0x0102 little-endian = bytes [0x02, 0x01]
        write_wav(&path, &[0x0102i16; 4], 22_050, 1).unwrap();

        let data = read_data_bytes(&path).unwrap();
        assert_eq!(data, vec![0x02, 0x01, 0x02, 0x01, 0x02, 0x01, 0x02, 0x01]);
    }

    #[test]
    fn rejects_non_wav_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.wav");
        std::fs::write(&path, vec![0u8; 100]).unwrap();
        assert!(matches!(
            read_data_bytes(&path),
            Err(MediaError::MalformedWav(_))
        ));
    }
}
