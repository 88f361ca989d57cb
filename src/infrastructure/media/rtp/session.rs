//! RTP stream state and packetization

use super::packet::RtpPacket;
use crate::domain::audio::AudioBuffer;
use crate::infrastructure::media::codec::G711Type;
use bytes::{BufMut, BytesMut};
use rand::Rng;
use tracing::debug;

/// 20 ms at 8 kHz
pub const SAMPLES_PER_PACKET: usize = 160;

/// Counters for one outbound RTP stream
///
/// Sequence and timestamp start at random values and wrap at 16 and 32 bits.
/// Every packet advances the sequence by one and the timestamp by the samples
/// it carries, so gaps in the source never show up as gaps on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpStreamState {
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl RtpStreamState {
    /// Fresh random SSRC, sequence and timestamp
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            ssrc: rng.gen(),
            sequence: rng.gen(),
            timestamp: rng.gen(),
        }
    }

    pub fn with_seed(ssrc: u32, sequence: u16, timestamp: u32) -> Self {
        Self {
            ssrc,
            sequence,
            timestamp,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Step past a packet carrying `samples` samples
    pub fn advance(&mut self, samples: u32) {
        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples);
    }
}

/// Turns an [`AudioBuffer`] into wire-ready G.711 RTP packets
pub struct RtpPacketizer {
    codec: G711Type,
    state: RtpStreamState,
}

impl RtpPacketizer {
    pub fn new(codec: G711Type) -> Self {
        Self::with_state(codec, RtpStreamState::random())
    }

    pub fn with_state(codec: G711Type, state: RtpStreamState) -> Self {
        Self { codec, state }
    }

    pub fn state(&self) -> RtpStreamState {
        self.state
    }

    pub fn codec(&self) -> G711Type {
        self.codec
    }

    /// One packet per 160-sample frame; a short last frame is padded with
    /// encoded silence. Marker stays clear on every packet.
    pub fn packetize(&mut self, audio: &AudioBuffer) -> Vec<RtpPacket> {
        let silence = self.codec.silence();
        let mut packets = Vec::with_capacity(audio.len().div_ceil(SAMPLES_PER_PACKET));

        for frame in audio.samples().chunks(SAMPLES_PER_PACKET) {
            let mut payload = BytesMut::with_capacity(SAMPLES_PER_PACKET);
            payload.extend_from_slice(&self.codec.encode(frame));
            payload.put_bytes(silence, SAMPLES_PER_PACKET - frame.len());

            packets.push(RtpPacket::new(
                self.codec.payload_type(),
                self.state.sequence(),
                self.state.timestamp(),
                self.state.ssrc(),
                payload.freeze(),
            ));

            self.state.advance(SAMPLES_PER_PACKET as u32);
        }

        debug!(
            "Packetized {} samples into {} {} packets, ssrc={:08x}",
            audio.len(),
            packets.len(),
            self.codec,
            self.state.ssrc()
        );

        packets
    }
}
