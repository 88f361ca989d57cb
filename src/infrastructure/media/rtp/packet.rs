//! RTP Packet (RFC 3550)

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// RTP Packet
///
/// The dialer only ever emits the fixed 12-byte header: no padding, no
/// extension, no CSRC list. Parsing tolerates all three so test peers can
/// inspect whatever arrives.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           synchronization source (SSRC) identifier            |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// Marker bit
    pub marker: bool,
    /// Payload type
    pub payload_type: u8,
    /// Sequence number
    pub sequence: u16,
    /// Timestamp
    pub timestamp: u32,
    /// Synchronization source identifier
    pub ssrc: u32,
    /// Payload data
    pub payload: Bytes,
}

impl RtpPacket {
    pub const VERSION: u8 = 2;
    pub const HEADER_SIZE: usize = 12;

    pub fn new(payload_type: u8, sequence: u16, timestamp: u32, ssrc: u32, payload: Bytes) -> Self {
        Self {
            marker: false,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            payload,
        }
    }

    /// Parse RTP packet from bytes
    pub fn parse(data: &[u8]) -> Result<Self, RtpError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(RtpError::PacketTooShort);
        }

        let mut buf = data;

        // Byte 0: V(2), P(1), X(1), CC(4)
        let byte0 = buf.get_u8();
        let version = (byte0 >> 6) & 0x03;
        let padding = (byte0 & 0x20) != 0;
        let extension = (byte0 & 0x10) != 0;
        let csrc_count = (byte0 & 0x0F) as usize;

        if version != Self::VERSION {
            return Err(RtpError::InvalidVersion(version));
        }

        // Byte 1: M(1), PT(7)
        let byte1 = buf.get_u8();
        let marker = (byte1 & 0x80) != 0;
        let payload_type = byte1 & 0x7F;

        let sequence = buf.get_u16();
        let timestamp = buf.get_u32();
        let ssrc = buf.get_u32();

        if buf.remaining() < csrc_count * 4 {
            return Err(RtpError::PacketTooShort);
        }
        buf.advance(csrc_count * 4);

        if extension {
            if buf.remaining() < 4 {
                return Err(RtpError::PacketTooShort);
            }
            let _profile = buf.get_u16();
            let length = buf.get_u16() as usize * 4;
            if buf.remaining() < length {
                return Err(RtpError::PacketTooShort);
            }
            buf.advance(length);
        }

        let mut payload_len = buf.remaining();
        if padding {
            let padding_len = *buf.last().ok_or(RtpError::InvalidPadding)? as usize;
            if padding_len == 0 || padding_len > payload_len {
                return Err(RtpError::InvalidPadding);
            }
            payload_len -= padding_len;
        }

        Ok(Self {
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
            payload: Bytes::copy_from_slice(&buf[..payload_len]),
        })
    }

    /// Serialize RTP packet to bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.payload.len());

        buf.put_u8(Self::VERSION << 6);
        buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        buf.put_slice(&self.payload);

        buf.freeze()
    }

    pub fn set_marker(&mut self, marker: bool) {
        self.marker = marker;
    }
}

impl fmt::Display for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RTP[PT={}, Seq={}, TS={}, SSRC={:08x}, Marker={}, Payload={}]",
            self.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
            self.marker,
            self.payload.len()
        )
    }
}

/// RTP errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtpError {
    #[error("Packet too short")]
    PacketTooShort,
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),
    #[error("Invalid padding")]
    InvalidPadding,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let packet = RtpPacket::new(8, 0x0102, 0x03040506, 0x0708090A, Bytes::from_static(&[0xD5; 4]));
        let data = packet.serialize();

        assert_eq!(data.len(), 16);
        assert_eq!(data[0], 0x80);
        assert_eq!(data[1], 8);
        assert_eq!(&data[2..4], &[0x01, 0x02]);
        assert_eq!(&data[4..8], &[0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&data[8..12], &[0x07, 0x08, 0x09, 0x0A]);
        assert_eq!(&data[12..], &[0xD5; 4]);
    }

    #[test]
    fn test_rtp_packet_with_marker() {
        let mut packet = RtpPacket::new(0, 100, 1000, 0xAABBCCDD, Bytes::from_static(b"Test"));
        packet.set_marker(true);

        let data = packet.serialize();
        assert_eq!(data[1], 0x80);
        assert!(RtpPacket::parse(&data).unwrap().marker);
    }

    #[test]
    fn test_parse_skips_csrc_and_padding() {
        let mut data = vec![0xA2, 0x00, 0x00, 0x01, 0, 0, 0, 160, 0, 0, 0, 1];
        data.extend_from_slice(&[0x11; 8]); // two CSRCs
        data.extend_from_slice(&[0xFF, 0xFF]);
        data.extend_from_slice(&[0x00, 0x02]); // two bytes of padding

        let parsed = RtpPacket::parse(&data).unwrap();
        assert_eq!(parsed.sequence, 1);
        assert_eq!(parsed.timestamp, 160);
        assert_eq!(parsed.payload.as_ref(), &[0xFF, 0xFF]);
    }

    #[test]
    fn test_rtp_min_size() {
        let data = vec![0u8; 11];
        assert_eq!(RtpPacket::parse(&data), Err(RtpError::PacketTooShort));
    }

    #[test]
    fn test_rtp_invalid_version() {
        let mut data = vec![0u8; 12];
        data[0] = 0x40;
        assert_eq!(RtpPacket::parse(&data), Err(RtpError::InvalidVersion(1)));
    }
}
