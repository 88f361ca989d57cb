//! WAV file parsing
//!
//! Only what the dialer needs to turn a synthesized prompt on disk into an
//! [`AudioBuffer`]: RIFF/WAVE, integer PCM, 8/16-bit, mono or stereo.

use super::buffer::{AudioBuffer, TELEPHONY_SAMPLE_RATE};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid WAV file: {0}")]
    InvalidFormat(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),
}

/// WAV audio format
#[derive(Debug, Clone, PartialEq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    fn bytes_per_frame(&self) -> usize {
        (self.bits_per_sample / 8) as usize * self.channels as usize
    }
}

/// Parsed WAV file
#[derive(Debug, Clone)]
pub struct WavFile {
    pub format: WavFormat,
    pub data: Vec<u8>,
}

impl WavFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, WavError> {
        let mut file = File::open(path)?;
        Self::from_reader(&mut file)
    }

    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self, WavError> {
        let mut riff_header = [0u8; 12];
        reader.read_exact(&mut riff_header)?;

        if &riff_header[0..4] != b"RIFF" {
            return Err(WavError::InvalidFormat("Missing RIFF signature".to_string()));
        }
        if &riff_header[8..12] != b"WAVE" {
            return Err(WavError::InvalidFormat("Not a WAVE file".to_string()));
        }

        let mut format: Option<WavFormat> = None;
        let mut data: Option<Vec<u8>> = None;

        while format.is_none() || data.is_none() {
            let mut chunk_header = [0u8; 8];
            if reader.read_exact(&mut chunk_header).is_err() {
                break;
            }

            let chunk_size = u32::from_le_bytes([
                chunk_header[4],
                chunk_header[5],
                chunk_header[6],
                chunk_header[7],
            ]) as usize;

            match &chunk_header[0..4] {
                b"fmt " => format = Some(Self::parse_fmt_chunk(reader, chunk_size)?),
                b"data" => {
                    // streamed writers leave 0xFFFFFFFF here; take what is actually there
                    let mut audio = Vec::new();
                    reader.by_ref().take(chunk_size as u64).read_to_end(&mut audio)?;
                    data = Some(audio);
                }
                _ => {
                    reader.seek(SeekFrom::Current(chunk_size as i64))?;
                }
            }

            // Chunks are word-aligned
            if chunk_size % 2 != 0 {
                reader.seek(SeekFrom::Current(1))?;
            }
        }

        let format =
            format.ok_or_else(|| WavError::InvalidFormat("Missing fmt chunk".to_string()))?;
        let data = data.ok_or_else(|| WavError::InvalidFormat("Missing data chunk".to_string()))?;

        Ok(WavFile { format, data })
    }

    fn parse_fmt_chunk<R: Read + Seek>(reader: &mut R, chunk_size: usize) -> Result<WavFormat, WavError> {
        if chunk_size < 16 {
            return Err(WavError::InvalidFormat("fmt chunk too small".to_string()));
        }

        let mut fmt = [0u8; 16];
        reader.read_exact(&mut fmt)?;
        // WAVEFORMATEX extension
        reader.seek(SeekFrom::Current((chunk_size - 16) as i64))?;

        let audio_format = u16::from_le_bytes([fmt[0], fmt[1]]);
        let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
        let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
        let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

        if audio_format != 1 {
            return Err(WavError::UnsupportedFormat(format!(
                "only integer PCM (1) is supported, got {}",
                audio_format
            )));
        }
        if channels == 0 || channels > 2 {
            return Err(WavError::UnsupportedFormat(format!(
                "{} channels",
                channels
            )));
        }
        if sample_rate == 0 {
            return Err(WavError::InvalidFormat("sample rate 0".to_string()));
        }
        if bits_per_sample != 8 && bits_per_sample != 16 {
            return Err(WavError::UnsupportedFormat(format!(
                "{} bits per sample",
                bits_per_sample
            )));
        }

        Ok(WavFormat {
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    /// Interleaved samples widened to signed 16-bit
    fn samples_i16(&self) -> Vec<i16> {
        let frames = self.data.len() / self.format.bytes_per_frame().max(1);
        let usable = frames * self.format.bytes_per_frame();
        let data = &self.data[..usable];

        match self.format.bits_per_sample {
            // 8-bit WAV is unsigned
            8 => data.iter().map(|&b| ((b as i16) - 128) << 8).collect(),
            _ => data
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect(),
        }
    }

    /// Down-mix and resample into the telephony format the packetizer expects
    pub fn into_telephony_buffer(self) -> AudioBuffer {
        let mut samples = self.samples_i16();

        if self.format.channels == 2 {
            samples = samples
                .chunks_exact(2)
                .map(|c| ((c[0] as i32 + c[1] as i32) / 2) as i16)
                .collect();
        }

        if self.format.sample_rate != TELEPHONY_SAMPLE_RATE {
            samples = resample_linear(&samples, self.format.sample_rate, TELEPHONY_SAMPLE_RATE);
        }

        AudioBuffer::new(samples)
    }
}

/// Linear-interpolation resampler; good enough for speech prompts
fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if samples.is_empty() || from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let last = samples[samples.len() - 1];

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            if idx + 1 >= samples.len() {
                return last;
            }
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[idx + 1] as f64;
            (a + (b - a) * frac) as i16
        })
        .collect()
}
