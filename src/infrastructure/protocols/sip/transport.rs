//! SIP transport: one UDP socket per call

use super::message::{SipError, SipMessage};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

const MAX_DATAGRAM: usize = 65535;

/// Incoming SIP message with source information
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message: SipMessage,
    pub source: SocketAddr,
}

/// Signaling socket owned by a single dialog
pub struct SignalingSocket {
    socket: UdpSocket,
    server: SocketAddr,
}

impl SignalingSocket {
    pub async fn bind(local: SocketAddr, server: SocketAddr) -> Result<Self, SipError> {
        let socket = UdpSocket::bind(local).await?;
        debug!("SIP socket bound to {} for server {}", socket.local_addr()?, server);
        Ok(Self { socket, server })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SipError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// Send to the SIP server
    pub async fn send(&self, data: &[u8]) -> Result<(), SipError> {
        self.send_to(data, self.server).await
    }

    pub async fn send_to(&self, data: &[u8], destination: SocketAddr) -> Result<(), SipError> {
        self.socket.send_to(data, destination).await?;
        debug!(
            "Sent {} bytes to {}:\n{}",
            data.len(),
            destination,
            String::from_utf8_lossy(data)
        );
        Ok(())
    }

    /// Next parseable SIP message before `deadline`; `None` once it passes.
    /// Datagrams that are not SIP are logged and skipped.
    pub async fn recv_until(&self, deadline: Instant) -> Result<Option<IncomingMessage>, SipError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, source) = match timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                Err(_) => return Ok(None),
                Ok(result) => result?,
            };

            match SipMessage::parse(&buf[..len]) {
                Ok(message) => {
                    debug!("Received {} bytes from {}", len, source);
                    return Ok(Some(IncomingMessage { message, source }));
                }
                Err(e) => {
                    warn!("Dropping unparseable datagram from {}: {}", source, e);
                }
            }
        }
    }
}

/// Address of the interface that routes to `server`.
///
/// Connecting a UDP socket sends nothing; it only makes the kernel pick a
/// source address. Loopback is the answer when there is no route.
pub async fn detect_local_ip(server: SocketAddr) -> IpAddr {
    let unspecified: SocketAddr = match server {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let route = async {
        let socket = UdpSocket::bind(unspecified).await?;
        socket.connect(server).await?;
        socket.local_addr()
    };

    match route.await {
        Ok(addr) if !addr.ip().is_unspecified() => addr.ip(),
        Ok(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Err(e) => {
            warn!("Could not determine local IP towards {}: {}, using 127.0.0.1", server, e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_recv_until_times_out() {
        let socket = SignalingSocket::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:9".parse().unwrap())
            .await
            .unwrap();
        let deadline = Instant::now() + Duration::from_millis(50);
        assert!(socket.recv_until(deadline).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recv_skips_garbage() {
        let socket = SignalingSocket::bind("127.0.0.1:0".parse().unwrap(), "127.0.0.1:9".parse().unwrap())
            .await
            .unwrap();
        let local = socket.local_addr().unwrap();

        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        peer.send_to(b"\x00\x01garbage", local).await.unwrap();
        peer.send_to(
            b"SIP/2.0 180 Ringing\r\nCall-ID: x@y\r\nCSeq: 1 INVITE\r\nContent-Length: 0\r\n\r\n",
            local,
        )
        .await
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let incoming = socket.recv_until(deadline).await.unwrap().unwrap();
        assert_eq!(incoming.source, peer.local_addr().unwrap());
        assert_eq!(incoming.message.as_response().unwrap().status_code(), 180);
    }

    #[tokio::test]
    async fn test_detect_local_ip_loopback() {
        let ip = detect_local_ip("127.0.0.1:5060".parse().unwrap()).await;
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
}
