//! Paced RTP playout
//!
//! The streamer runs on its own tokio task so that whatever the signaling
//! side is doing cannot disturb packet timing. It shares nothing with the
//! dialog except the remote endpoint it was given and a cancellation token.

use super::rtp::RtpPacket;
use crate::domain::call::MediaOutcome;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One G.711 frame
pub const PACKET_INTERVAL: Duration = Duration::from_millis(20);

/// Sends a prepared packet sequence to one remote endpoint
pub struct RtpStreamer {
    socket: UdpSocket,
    remote: SocketAddr,
    packet_interval: Duration,
    start_delay: Duration,
}

impl RtpStreamer {
    pub fn new(socket: UdpSocket, remote: SocketAddr) -> Self {
        Self {
            socket,
            remote,
            packet_interval: PACKET_INTERVAL,
            start_delay: Duration::ZERO,
        }
    }

    /// Bind a fresh socket on `local`
    #[cfg(test)]
    async fn bind(local: SocketAddr, remote: SocketAddr) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(local).await?;
        Ok(Self::new(socket, remote))
    }

    #[cfg(test)]
    fn with_packet_interval(mut self, packet_interval: Duration) -> Self {
        self.packet_interval = packet_interval;
        self
    }

    /// Wait this long after the answer before the first packet
    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    /// Run on a separate task; the handle resolves to the single terminal report
    pub fn spawn(self, packets: Vec<RtpPacket>, cancel: CancellationToken) -> JoinHandle<MediaOutcome> {
        tokio::spawn(self.run(packets, cancel))
    }

    /// Send every packet on a fixed tick. Cancellation is only observed
    /// between packets, never halfway through a send.
    async fn run(self, packets: Vec<RtpPacket>, cancel: CancellationToken) -> MediaOutcome {
        let total = packets.len();
        let mut packets_sent: u64 = 0;

        info!(
            "RTP stream to {} starting: {} packets every {:?}",
            self.remote, total, self.packet_interval
        );

        if !self.start_delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return MediaOutcome::Cancelled { packets_sent },
                _ = sleep(self.start_delay) => {}
            }
        }

        let mut ticker = interval(self.packet_interval);
        // A late tick is caught up rather than shifting the whole schedule
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        for packet in packets {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("RTP stream to {} cancelled after {} packets", self.remote, packets_sent);
                    return MediaOutcome::Cancelled { packets_sent };
                }
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.socket.send_to(&packet.serialize(), self.remote).await {
                warn!("RTP send to {} failed: {}", self.remote, e);
                return MediaOutcome::Failed {
                    packets_sent,
                    error: e.to_string(),
                };
            }
            packets_sent += 1;
            debug!("Sent {}", packet);
        }

        info!("RTP stream to {} completed: {} packets", self.remote, packets_sent);
        MediaOutcome::Completed { packets_sent }
    }
}
