//! RTP (Real-time Transport Protocol) Implementation
//!
//! This module implements the sending half of RTP according to RFC 3550.

pub mod packet;
pub mod session;

pub use packet::{RtpError, RtpPacket};
pub use session::{RtpPacketizer, RtpStreamState, SAMPLES_PER_PACKET};
