//! Media: G.711 encoding, RTP framing and paced playout

pub mod codec;
pub mod rtp;
pub mod stream;

pub use codec::{G711Type, PcmaCodec, PcmuCodec};
pub use rtp::{RtpError, RtpPacket, RtpPacketizer, RtpStreamState, SAMPLES_PER_PACKET};
pub use stream::{RtpStreamer, PACKET_INTERVAL};
