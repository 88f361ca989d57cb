//! G.711 Audio Codec Implementation
//!
//! G.711 is a narrowband audio codec that provides toll-quality audio at 64 kbit/s.
//! It includes two companding laws:
//! - μ-law (PCMU): North America and Japan, payload type 0
//! - A-law (PCMA): Europe and the rest of the world, payload type 8

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// G.711 Codec Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum G711Type {
    /// μ-law (PCMU) - Payload Type 0
    #[default]
    PCMU,
    /// A-law (PCMA) - Payload Type 8
    PCMA,
}

impl G711Type {
    /// Get RTP payload type
    pub fn payload_type(&self) -> u8 {
        match self {
            G711Type::PCMU => 0,
            G711Type::PCMA => 8,
        }
    }

    pub fn from_payload_type(pt: u8) -> Option<Self> {
        match pt {
            0 => Some(G711Type::PCMU),
            8 => Some(G711Type::PCMA),
            _ => None,
        }
    }

    /// Get clock rate (always 8000 Hz for G.711)
    pub fn clock_rate(&self) -> u32 {
        8000
    }

    /// Get codec name as used in `a=rtpmap`
    pub fn name(&self) -> &'static str {
        match self {
            G711Type::PCMU => "PCMU",
            G711Type::PCMA => "PCMA",
        }
    }

    /// Encoded value of a zero sample
    pub fn silence(&self) -> u8 {
        match self {
            G711Type::PCMU => 0xFF,
            G711Type::PCMA => 0xD5,
        }
    }

    pub fn encode(&self, pcm: &[i16]) -> Bytes {
        match self {
            G711Type::PCMU => PcmuCodec::encode(pcm),
            G711Type::PCMA => PcmaCodec::encode(pcm),
        }
    }

    pub fn decode(&self, data: &[u8]) -> Vec<i16> {
        match self {
            G711Type::PCMU => PcmuCodec::decode(data),
            G711Type::PCMA => PcmaCodec::decode(data),
        }
    }
}

impl fmt::Display for G711Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// G.711 μ-law (PCMU) Codec
pub struct PcmuCodec;

impl PcmuCodec {
    /// Segment (exponent) for a biased magnitude, indexed by `mag >> 7`
    const ULAW_COMPRESS_TABLE: [u8; 256] = [
        0, 0, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 3,
        4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4,
        5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
        5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5,
        6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
        6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
        6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
        6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
        7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
    ];

    /// μ-law decompression lookup table
    const ULAW_DECOMPRESS_TABLE: [i16; 256] = [
        -32124, -31100, -30076, -29052, -28028, -27004, -25980, -24956,
        -23932, -22908, -21884, -20860, -19836, -18812, -17788, -16764,
        -15996, -15484, -14972, -14460, -13948, -13436, -12924, -12412,
        -11900, -11388, -10876, -10364, -9852, -9340, -8828, -8316,
        -7932, -7676, -7420, -7164, -6908, -6652, -6396, -6140,
        -5884, -5628, -5372, -5116, -4860, -4604, -4348, -4092,
        -3900, -3772, -3644, -3516, -3388, -3260, -3132, -3004,
        -2876, -2748, -2620, -2492, -2364, -2236, -2108, -1980,
        -1884, -1820, -1756, -1692, -1628, -1564, -1500, -1436,
        -1372, -1308, -1244, -1180, -1116, -1052, -988, -924,
        -876, -844, -812, -780, -748, -716, -684, -652,
        -620, -588, -556, -524, -492, -460, -428, -396,
        -372, -356, -340, -324, -308, -292, -276, -260,
        -244, -228, -212, -196, -180, -164, -148, -132,
        -120, -112, -104, -96, -88, -80, -72, -64,
        -56, -48, -40, -32, -24, -16, -8, 0,
        32124, 31100, 30076, 29052, 28028, 27004, 25980, 24956,
        23932, 22908, 21884, 20860, 19836, 18812, 17788, 16764,
        15996, 15484, 14972, 14460, 13948, 13436, 12924, 12412,
        11900, 11388, 10876, 10364, 9852, 9340, 8828, 8316,
        7932, 7676, 7420, 7164, 6908, 6652, 6396, 6140,
        5884, 5628, 5372, 5116, 4860, 4604, 4348, 4092,
        3900, 3772, 3644, 3516, 3388, 3260, 3132, 3004,
        2876, 2748, 2620, 2492, 2364, 2236, 2108, 1980,
        1884, 1820, 1756, 1692, 1628, 1564, 1500, 1436,
        1372, 1308, 1244, 1180, 1116, 1052, 988, 924,
        876, 844, 812, 780, 748, 716, 684, 652,
        620, 588, 556, 524, 492, 460, 428, 396,
        372, 356, 340, 324, 308, 292, 276, 260,
        244, 228, 212, 196, 180, 164, 148, 132,
        120, 112, 104, 96, 88, 80, 72, 64,
        56, 48, 40, 32, 24, 16, 8, 0,
    ];

    const BIAS: i32 = 0x84;
    const CLIP: i32 = 32635;

    /// Compand one sample: sign, 3-bit segment, 4-bit mantissa, complemented
    pub fn encode_sample(sample: i16) -> u8 {
        // i32 so that i16::MIN has a magnitude
        let sample = sample as i32;
        let sign: u8 = if sample < 0 { 0x80 } else { 0x00 };
        let mag = sample.abs().min(Self::CLIP) + Self::BIAS;

        let exponent = Self::ULAW_COMPRESS_TABLE[(mag >> 7) as usize];
        let mantissa = ((mag >> (exponent + 3)) & 0x0F) as u8;

        !(sign | (exponent << 4) | mantissa)
    }

    /// Encode PCM samples to μ-law
    pub fn encode(pcm: &[i16]) -> Bytes {
        let mut output = BytesMut::with_capacity(pcm.len());
        for &sample in pcm {
            output.put_u8(Self::encode_sample(sample));
        }
        output.freeze()
    }

    /// Decode μ-law to PCM samples
    pub fn decode(ulaw: &[u8]) -> Vec<i16> {
        ulaw.iter()
            .map(|&byte| Self::ULAW_DECOMPRESS_TABLE[byte as usize])
            .collect()
    }
}

/// G.711 A-law (PCMA) Codec
pub struct PcmaCodec;

impl PcmaCodec {
    /// Upper bound of each segment in 13-bit magnitude
    const SEGMENT_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

    /// A-law decompression lookup table
    const ALAW_DECOMPRESS_TABLE: [i16; 256] = [
        -5504, -5248, -6016, -5760, -4480, -4224, -4992, -4736,
        -7552, -7296, -8064, -7808, -6528, -6272, -7040, -6784,
        -2752, -2624, -3008, -2880, -2240, -2112, -2496, -2368,
        -3776, -3648, -4032, -3904, -3264, -3136, -3520, -3392,
        -22016, -20992, -24064, -23040, -17920, -16896, -19968, -18944,
        -30208, -29184, -32256, -31232, -26112, -25088, -28160, -27136,
        -11008, -10496, -12032, -11520, -8960, -8448, -9984, -9472,
        -15104, -14592, -16128, -15616, -13056, -12544, -14080, -13568,
        -344, -328, -376, -360, -280, -264, -312, -296,
        -472, -456, -504, -488, -408, -392, -440, -424,
        -88, -72, -120, -104, -24, -8, -56, -40,
        -216, -200, -248, -232, -152, -136, -184, -168,
        -1376, -1312, -1504, -1440, -1120, -1056, -1248, -1184,
        -1888, -1824, -2016, -1952, -1632, -1568, -1760, -1696,
        -688, -656, -752, -720, -560, -528, -624, -592,
        -944, -912, -1008, -976, -816, -784, -880, -848,
        5504, 5248, 6016, 5760, 4480, 4224, 4992, 4736,
        7552, 7296, 8064, 7808, 6528, 6272, 7040, 6784,
        2752, 2624, 3008, 2880, 2240, 2112, 2496, 2368,
        3776, 3648, 4032, 3904, 3264, 3136, 3520, 3392,
        22016, 20992, 24064, 23040, 17920, 16896, 19968, 18944,
        30208, 29184, 32256, 31232, 26112, 25088, 28160, 27136,
        11008, 10496, 12032, 11520, 8960, 8448, 9984, 9472,
        15104, 14592, 16128, 15616, 13056, 12544, 14080, 13568,
        344, 328, 376, 360, 280, 264, 312, 296,
        472, 456, 504, 488, 408, 392, 440, 424,
        88, 72, 120, 104, 24, 8, 56, 40,
        216, 200, 248, 232, 152, 136, 184, 168,
        1376, 1312, 1504, 1440, 1120, 1056, 1248, 1184,
        1888, 1824, 2016, 1952, 1632, 1568, 1760, 1696,
        688, 656, 752, 720, 560, 528, 624, 592,
        944, 912, 1008, 976, 816, 784, 880, 848,
    ];

    pub fn encode_sample(sample: i16) -> u8 {
        let mut pcm = (sample as i32) >> 3;
        let mask: u8 = if pcm >= 0 {
            0xD5
        } else {
            pcm = -pcm - 1;
            0x55
        };

        let segment = Self::SEGMENT_END
            .iter()
            .position(|&end| pcm <= end)
            .unwrap_or(8);
        if segment >= 8 {
            return 0x7F ^ mask;
        }

        let shift = if segment < 2 { 1 } else { segment };
        let aval = ((segment as u8) << 4) | ((pcm >> shift) & 0x0F) as u8;
        aval ^ mask
    }

    /// Encode PCM samples to A-law
    pub fn encode(pcm: &[i16]) -> Bytes {
        let mut output = BytesMut::with_capacity(pcm.len());
        for &sample in pcm {
            output.put_u8(Self::encode_sample(sample));
        }
        output.freeze()
    }

    /// Decode A-law to PCM samples
    pub fn decode(alaw: &[u8]) -> Vec<i16> {
        alaw.iter()
            .map(|&byte| Self::ALAW_DECOMPRESS_TABLE[byte as usize])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_g711_type_payload() {
        assert_eq!(G711Type::PCMU.payload_type(), 0);
        assert_eq!(G711Type::PCMA.payload_type(), 8);
        assert_eq!(G711Type::from_payload_type(8), Some(G711Type::PCMA));
        assert_eq!(G711Type::from_payload_type(101), None);
    }

    #[test]
    fn test_pcmu_full_range_within_quantization_bound() {
        for sample in i16::MIN..=i16::MAX {
            let decoded = PcmuCodec::decode(&[PcmuCodec::encode_sample(sample)])[0];
            let mag = (sample as i32).abs();
            let err = (decoded as i32 - sample as i32).abs();

            // half a quantization step of the segment, or the clip distance
            let bound = if mag > 32635 { 644 } else { (mag + 132) / 32 };
            assert!(
                err <= bound,
                "sample {} decoded as {} (err {}, bound {})",
                sample,
                decoded,
                err,
                bound
            );
            if sample != 0 && decoded != 0 {
                assert_eq!(sample.signum(), decoded.signum(), "sign flipped for {}", sample);
            }
        }
    }

    #[test]
    fn test_pcmu_known_values() {
        assert_eq!(PcmuCodec::encode_sample(0), 0xFF);
        assert_eq!(PcmuCodec::encode_sample(i16::MAX), 0x80);
        assert_eq!(PcmuCodec::encode_sample(i16::MIN), 0x00);
        assert_eq!(G711Type::PCMU.silence(), PcmuCodec::encode_sample(0));
    }

    #[test]
    fn test_pcma_encode_decode() {
        let original: Vec<i16> = vec![0, 5000, -5000, 10000, -10000, 20000, -20000];
        let encoded = PcmaCodec::encode(&original);
        let decoded = PcmaCodec::decode(&encoded);

        assert_eq!(original.len(), decoded.len());
        assert!(decoded[0].abs() < 16, "Silence decode error");

        for i in 1..original.len() {
            let orig = original[i] as f64;
            let dec = decoded[i] as f64;
            assert_eq!(original[i].signum(), decoded[i].signum(), "Sign mismatch at {}", i);
            let ratio = dec / orig;
            assert!(ratio > 0.95 && ratio < 1.05, "sample {}: {} -> {}", i, orig, dec);
        }
    }

    #[test]
    fn test_pcma_full_range_no_panic() {
        for sample in i16::MIN..=i16::MAX {
            let decoded = PcmaCodec::decode(&[PcmaCodec::encode_sample(sample)])[0];
            let err = (decoded as i32 - sample as i32).abs();
            assert!(err <= 1024, "sample {} decoded as {}", sample, decoded);
        }
    }

    #[test]
    fn test_silence_bytes() {
        assert_eq!(G711Type::PCMA.silence(), PcmaCodec::encode_sample(0));
        let encoded = G711Type::PCMU.encode(&[0; 160]);
        assert!(encoded.iter().all(|&b| b == 0xFF));
        for sample in G711Type::PCMA.decode(&G711Type::PCMA.encode(&[0; 160])) {
            assert!(sample.abs() < 16, "Decoded silence not near zero");
        }
    }
}
