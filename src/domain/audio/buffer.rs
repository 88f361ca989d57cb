//! Telephony audio buffer

use std::time::Duration;

/// G.711 runs at 8 kHz
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Mono, 16-bit linear PCM at 8 kHz.
///
/// This is the hand-off format between whatever produced the prompt (a
/// speech synthesizer, a file) and the packetizer. Conversion into it is
/// the producer's job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioBuffer {
    samples: Vec<i16>,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Build from little-endian 16-bit PCM bytes; a trailing odd byte is dropped
    pub fn from_pcm16_le(bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        Self { samples }
    }

    /// `duration` of silence
    pub fn silence(duration: Duration) -> Self {
        let count = (duration.as_millis() as u64 * TELEPHONY_SAMPLE_RATE as u64 / 1000) as usize;
        Self {
            samples: vec![0; count],
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_micros(self.samples.len() as u64 * 1_000_000 / TELEPHONY_SAMPLE_RATE as u64)
    }
}

impl From<Vec<i16>> for AudioBuffer {
    fn from(samples: Vec<i16>) -> Self {
        Self::new(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pcm16_le() {
        let buffer = AudioBuffer::from_pcm16_le(&[0x01, 0x00, 0xff, 0xff, 0x7f]);
        assert_eq!(buffer.samples(), &[1, -1]);
    }

    #[test]
    fn test_duration() {
        let buffer = AudioBuffer::silence(Duration::from_millis(100));
        assert_eq!(buffer.len(), 800);
        assert_eq!(buffer.duration(), Duration::from_millis(100));
        assert!(AudioBuffer::default().is_empty());
    }
}
