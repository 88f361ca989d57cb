//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - SIP signaling (messages, digest auth, SDP, the call engine)
//! - Media (G.711 codecs, RTP packetization and streaming)

pub mod media;
pub mod protocols;
