//! Canonical RIFF/WAVE framing for mono 16-bit PCM.

use std::io::Cursor;

use crate::error::{Error, Result};

/// Size of the canonical PCM header written by [`encode_pcm16`].
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BITS_PER_SAMPLE / 8;
const PCM_FORMAT_TAG: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Header fields of a canonical mono PCM16 WAV stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub chunk_size: u32,
    pub subchunk1_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavInfo {
    /// Header the encoder writes for `sample_count` samples at `sample_rate`.
    ///
    /// Fails when a size or rate field would not fit its 32-bit slot.
    pub fn for_samples(sample_count: usize, sample_rate: u32) -> Result<Self> {
        let too_large = || {
            Error::AudioError(format!(
                "{sample_count} samples at {sample_rate} Hz do not fit a WAV header"
            ))
        };
        let data_size = sample_count
            .checked_mul(BLOCK_ALIGN as usize)
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(too_large)?;
        let chunk_size = data_size.checked_add(36).ok_or_else(too_large)?;
        let byte_rate = sample_rate
            .checked_mul(BLOCK_ALIGN as u32)
            .ok_or_else(too_large)?;

        Ok(Self {
            chunk_size,
            subchunk1_size: FMT_CHUNK_LEN,
            audio_format: PCM_FORMAT_TAG,
            num_channels: CHANNELS,
            sample_rate,
            byte_rate,
            block_align: BLOCK_ALIGN,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size,
        })
    }

    /// Read the canonical header back out of an encoded stream.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(Error::InvalidInput(format!(
                "WAV stream too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(Error::InvalidInput("Missing RIFF/WAVE magic".to_string()));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(Error::InvalidInput(
                "Not a canonical 44-byte PCM header".to_string(),
            ));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };

        Ok(Self {
            chunk_size: u32_at(4),
            subchunk1_size: u32_at(16),
            audio_format: u16_at(20),
            num_channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.data_size as usize / BLOCK_ALIGN as usize
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&self.chunk_size.to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&self.subchunk1_size.to_le_bytes());
        out.extend_from_slice(&self.audio_format.to_le_bytes());
        out.extend_from_slice(&self.num_channels.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.byte_rate.to_le_bytes());
        out.extend_from_slice(&self.block_align.to_le_bytes());
        out.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        out.extend_from_slice(b"data");
        out.extend_from_slice(&self.data_size.to_le_bytes());
    }
}

/// Encode PCM16 samples into a single, complete WAV stream.
pub fn encode_pcm16(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let info = WavInfo::for_samples(samples.len(), sample_rate)?;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + info.data_size as usize);
    info.write_header(&mut out);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    Ok(out)
}

/// Encode float PCM in [-1, 1]; out-of-range and non-finite samples are clamped.
pub fn encode_f32(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let pcm: Vec<i16> = samples.iter().map(|&s| f32_to_i16(s)).collect();
    encode_pcm16(&pcm, sample_rate)
}

fn f32_to_i16(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Read the format of a WAV stream produced by an external tool.
pub fn read_wav_spec(wav_bytes: &[u8]) -> Result<hound::WavSpec> {
    Ok(hound::WavReader::new(Cursor::new(wav_bytes))?.spec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_fields_follow_sample_count() {
        for (count, rate) in [(0usize, 16_000u32), (1, 24_000), (480, 22_050), (24_000, 24_000)] {
            let samples = vec![0i16; count];
            let bytes = encode_pcm16(&samples, rate).unwrap();
            let info = WavInfo::parse(&bytes).unwrap();

            assert_eq!(info.num_channels, 1);
            assert_eq!(info.bits_per_sample, 16);
            assert_eq!(info.sample_rate, rate);
            assert_eq!(info.data_size as usize, count * 2);
            assert_eq!(info.chunk_size as usize, 36 + count * 2);
            assert_eq!(info.byte_rate, rate * 2);
            assert_eq!(info.block_align, 2);
            assert_eq!(info.subchunk1_size, 16);
            assert_eq!(info.audio_format, 1);
            assert_eq!(bytes.len(), WAV_HEADER_LEN + count * 2);
            assert_eq!(info, WavInfo::for_samples(count, rate).unwrap());
        }
    }

    #[test]
    fn payload_is_little_endian() {
        let bytes = encode_pcm16(&[1, -2, i16::MAX], 16_000).unwrap();
        assert_eq!(&bytes[44..], &[0x01, 0x00, 0xFE, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn float_samples_are_clamped() {
        let bytes = encode_f32(&[2.0, -2.0, f32::NAN, 0.5], 24_000).unwrap();
        let pcm: Vec<i16> = bytes[44..]
            .chunks(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(pcm, vec![32767, -32768, 0, 16383]);
    }

    #[test]
    fn hound_reads_encoded_stream() {
        let bytes = encode_f32(&[0.0, 0.25, -0.25, 0.0], 24_000).unwrap();
        let spec = read_wav_spec(&bytes).unwrap();
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
    }

    #[test]
    fn extreme_rates_and_lengths_fit_or_fail_cleanly() {
        let info = WavInfo::for_samples(1, i32::MAX as u32).unwrap();
        assert_eq!(info.byte_rate, u32::MAX - 1);

        assert!(WavInfo::for_samples(0, u32::MAX).is_err());
        assert!(WavInfo::for_samples(usize::MAX, 16_000).is_err());
        // data fits in 32 bits but the RIFF chunk size does not
        let count = (u32::MAX as usize - 30) / 2;
        assert!(WavInfo::for_samples(count, 16_000).is_err());
        assert!(!WavInfo::for_samples(0, u32::MAX).unwrap_err().is_client_error());
    }

    #[test]
    fn parse_rejects_truncated_stream() {
        assert!(WavInfo::parse(b"RIFF").is_err());
    }
}
