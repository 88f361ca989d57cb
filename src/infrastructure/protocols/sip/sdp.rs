//! SDP (Session Description Protocol) offer/answer for a single audio stream

use crate::infrastructure::media::codec::G711Type;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Payload types offered, preferred first
fn offered_codecs(preferred: G711Type) -> [G711Type; 2] {
    match preferred {
        G711Type::PCMU => [G711Type::PCMU, G711Type::PCMA],
        G711Type::PCMA => [G711Type::PCMA, G711Type::PCMU],
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdpError {
    #[error("No media endpoint: {0}")]
    NoEndpoint(String),

    #[error("No common codec in answer (offered formats {0:?})")]
    NoCommonCodec(Vec<String>),
}

/// Parsed or generated SDP session
#[derive(Debug, Clone)]
pub struct SdpSession {
    pub version: u32,
    pub origin: Option<SdpOrigin>,
    pub session_name: String,
    /// Session-level `c=` line
    pub connection: Option<SdpConnection>,
    pub media: Vec<SdpMedia>,
}

#[derive(Debug, Clone)]
pub struct SdpOrigin {
    pub username: String,
    pub session_id: String,
    pub session_version: String,
    pub network_type: String,
    pub address_type: String,
    pub address: String,
}

#[derive(Debug, Clone)]
pub struct SdpConnection {
    pub network_type: String,
    pub address_type: String,
    pub address: String,
}

impl SdpConnection {
    fn for_ip(ip: IpAddr) -> Self {
        Self {
            network_type: "IN".to_string(),
            address_type: address_type(ip).to_string(),
            address: ip.to_string(),
        }
    }

    fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split_whitespace().collect();
        if parts.len() < 3 {
            return None;
        }
        Some(Self {
            network_type: parts[0].to_string(),
            address_type: parts[1].to_string(),
            address: parts[2].to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SdpMedia {
    pub media_type: String,
    pub port: u16,
    pub protocol: String,
    pub formats: Vec<String>,
    /// (payload_type, encoding)
    pub rtpmap: Vec<(String, String)>,
    /// Media-level `c=` line, overrides the session one
    pub connection: Option<SdpConnection>,
    /// Attributes other than rtpmap, verbatim
    pub attributes: Vec<String>,
}

fn address_type(ip: IpAddr) -> &'static str {
    if ip.is_ipv4() {
        "IP4"
    } else {
        "IP6"
    }
}

impl SdpSession {
    /// Offer for one sendrecv audio stream carrying PCMU and PCMA at 20 ms
    pub fn create_audio_offer(local_ip: IpAddr, rtp_port: u16, preferred: G711Type) -> Self {
        let codecs = offered_codecs(preferred);
        Self {
            version: 0,
            origin: Some(SdpOrigin {
                username: "-".to_string(),
                session_id: chrono::Utc::now().timestamp().to_string(),
                session_version: "1".to_string(),
                network_type: "IN".to_string(),
                address_type: address_type(local_ip).to_string(),
                address: local_ip.to_string(),
            }),
            session_name: "-".to_string(),
            connection: Some(SdpConnection::for_ip(local_ip)),
            media: vec![SdpMedia {
                media_type: "audio".to_string(),
                port: rtp_port,
                protocol: "RTP/AVP".to_string(),
                formats: codecs
                    .iter()
                    .map(|c| c.payload_type().to_string())
                    .collect(),
                rtpmap: codecs
                    .iter()
                    .map(|c| {
                        (
                            c.payload_type().to_string(),
                            format!("{}/{}", c.name(), c.clock_rate()),
                        )
                    })
                    .collect(),
                connection: None,
                attributes: vec!["sendrecv".to_string(), "ptime:20".to_string()],
            }],
        }
    }

    /// Parse SDP from a message body; tolerant of LF-only line endings
    pub fn parse(sdp_body: &str) -> Self {
        let mut version = 0;
        let mut origin: Option<SdpOrigin> = None;
        let mut session_name = String::new();
        let mut connection: Option<SdpConnection> = None;
        let mut media: Vec<SdpMedia> = Vec::new();

        for line in sdp_body.lines() {
            let line = line.trim();
            if line.len() < 2 || line.as_bytes()[1] != b'=' {
                continue;
            }

            let (field_type, value) = line.split_at(2);
            let value = value.trim();

            match field_type {
                "v=" => {
                    version = value.parse().unwrap_or(0);
                }
                "o=" => {
                    let parts: Vec<&str> = value.split_whitespace().collect();
                    if parts.len() >= 6 {
                        origin = Some(SdpOrigin {
                            username: parts[0].to_string(),
                            session_id: parts[1].to_string(),
                            session_version: parts[2].to_string(),
                            network_type: parts[3].to_string(),
                            address_type: parts[4].to_string(),
                            address: parts[5].to_string(),
                        });
                    }
                }
                "s=" => {
                    session_name = value.to_string();
                }
                "c=" => {
                    let conn = SdpConnection::parse(value);
                    match media.last_mut() {
                        Some(current) => current.connection = conn,
                        None => connection = conn,
                    }
                }
                "m=" => {
                    let parts: Vec<&str> = value.split_whitespace().collect();
                    // A malformed port keeps the line but marks it unusable
                    if parts.len() >= 3 {
                        media.push(SdpMedia {
                            media_type: parts[0].to_string(),
                            port: parts[1].parse().unwrap_or(0),
                            protocol: parts[2].to_string(),
                            formats: parts[3..].iter().map(|s| s.to_string()).collect(),
                            rtpmap: Vec::new(),
                            connection: None,
                            attributes: Vec::new(),
                        });
                    }
                }
                "a=" => {
                    if let Some(current) = media.last_mut() {
                        if let Some(rtpmap_value) = value.strip_prefix("rtpmap:") {
                            if let Some((pt, encoding)) = rtpmap_value.split_once(' ') {
                                current.rtpmap.push((pt.to_string(), encoding.trim().to_string()));
                            }
                        } else {
                            current.attributes.push(value.to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        Self {
            version,
            origin,
            session_name,
            connection,
            media,
        }
    }

    /// Get media description for audio
    pub fn audio_media(&self) -> Option<&SdpMedia> {
        self.media.iter().find(|m| m.media_type == "audio")
    }

    /// Where the far end wants audio sent
    pub fn remote_endpoint(&self) -> Result<SocketAddr, SdpError> {
        let audio = self
            .audio_media()
            .ok_or_else(|| SdpError::NoEndpoint("no m=audio line".to_string()))?;

        if audio.port == 0 {
            return Err(SdpError::NoEndpoint("audio port missing or zero".to_string()));
        }

        let connection = audio
            .connection
            .as_ref()
            .or(self.connection.as_ref())
            .ok_or_else(|| SdpError::NoEndpoint("no c= line".to_string()))?;

        let ip: IpAddr = connection.address.parse().map_err(|_| {
            SdpError::NoEndpoint(format!("bad connection address {}", connection.address))
        })?;

        if ip.is_unspecified() {
            return Err(SdpError::NoEndpoint(format!("connection address {}", ip)));
        }

        Ok(SocketAddr::new(ip, audio.port))
    }

    /// First format on the audio line that this agent can send
    pub fn negotiated_codec(&self) -> Result<G711Type, SdpError> {
        let audio = self
            .audio_media()
            .ok_or_else(|| SdpError::NoEndpoint("no m=audio line".to_string()))?;

        audio
            .formats
            .iter()
            .filter_map(|f| f.parse::<u8>().ok())
            .find_map(G711Type::from_payload_type)
            .ok_or_else(|| SdpError::NoCommonCodec(audio.formats.clone()))
    }
}

impl fmt::Display for SdpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v={}\r\n", self.version)?;

        if let Some(origin) = &self.origin {
            write!(
                f,
                "o={} {} {} {} {} {}\r\n",
                origin.username,
                origin.session_id,
                origin.session_version,
                origin.network_type,
                origin.address_type,
                origin.address
            )?;
        }

        write!(f, "s={}\r\n", self.session_name)?;

        if let Some(conn) = &self.connection {
            write!(f, "c={} {} {}\r\n", conn.network_type, conn.address_type, conn.address)?;
        }

        f.write_str("t=0 0\r\n")?;

        for media in &self.media {
            write!(
                f,
                "m={} {} {} {}\r\n",
                media.media_type,
                media.port,
                media.protocol,
                media.formats.join(" ")
            )?;
            if let Some(conn) = &media.connection {
                write!(f, "c={} {} {}\r\n", conn.network_type, conn.address_type, conn.address)?;
            }
            for (pt, encoding) in &media.rtpmap {
                write!(f, "a=rtpmap:{} {}\r\n", pt, encoding)?;
            }
            for attribute in &media.attributes {
                write!(f, "a={}\r\n", attribute)?;
            }
        }

        Ok(())
    }
}
