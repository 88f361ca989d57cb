//! Outbound call engine
//!
//! One `place_call` owns one signaling socket and drives one dialog:
//! INVITE (answering at most one digest challenge), ACK, RTP playout on a
//! separate task, then BYE. Whatever happens is folded into a `CallReport`.

use super::auth::{AuthChallenge, DigestCredentials, DigestResponse};
use super::builder::{RequestBuilder, ResponseBuilder};
use super::call_state::{DialogEvent, InvalidTransition};
use super::message::{SipError, SipMessage, SipMethod, SipRequest, SipResponse};
use super::sdp::SdpSession;
use super::session::CallSession;
use super::transport::{detect_local_ip, IncomingMessage, SignalingSocket};
use crate::config::Config;
use crate::domain::audio::AudioBuffer;
use crate::domain::call::{CallOutcomeSink, CallReport, MediaOutcome};
use crate::domain::shared::{CallError, SipUri};
use crate::infrastructure::media::{RtpPacketizer, RtpStreamer};
use crate::interface::metrics;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, UdpSocket};
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a signaling read blocks while media is playing
const SIGNALING_POLL: Duration = Duration::from_secs(1);

/// How long to wait for the answer to our BYE
const BYE_TIMEOUT: Duration = Duration::from_secs(2);

/// User part of From/Contact when no account is configured
const ANONYMOUS_USER: &str = "sip-dialer";

impl From<SipError> for CallError {
    fn from(err: SipError) -> Self {
        match err {
            SipError::TransportError(msg) => CallError::Transport(msg),
            other => CallError::Protocol(other.to_string()),
        }
    }
}

impl From<InvalidTransition> for CallError {
    fn from(err: InvalidTransition) -> Self {
        CallError::Protocol(err.to_string())
    }
}

/// Places outbound calls and plays an audio buffer into them
pub struct SipDialer {
    config: Config,
    credentials: DigestCredentials,
    sink: Option<Arc<dyn CallOutcomeSink>>,
}

impl SipDialer {
    pub fn new(config: Config) -> Self {
        let credentials = DigestCredentials::new(&config.sip.username, &config.sip.password);
        Self {
            config,
            credentials,
            sink: None,
        }
    }

    /// Hand every finished report to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn CallOutcomeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Call `destination` (a bare number or a `sip:` URI), play `audio` once
    /// answered and hang up.
    ///
    /// `timeout` bounds the INVITE transaction, challenge included. Never
    /// fails: every error ends up in the report's outcome.
    pub async fn place_call(&self, destination: &str, audio: &AudioBuffer, timeout: Duration) -> CallReport {
        let mut report = CallReport::new(String::new(), destination.to_string());

        let result = match self.prepare(destination, timeout).await {
            Ok(mut dialog) => {
                report.call_id = dialog.session.call_id.clone();
                report.destination = dialog.session.remote_uri.to_string();
                info!(
                    "Calling {} via {} (Call-ID {})",
                    report.destination,
                    dialog.socket.server(),
                    report.call_id
                );

                let result = dialog.run(audio, &mut report).await;
                if result.is_err() {
                    // a failed dialog may already be terminal
                    let _ = dialog.session.apply(DialogEvent::Failed);
                }
                result
            }
            Err(e) => Err(e),
        };

        let report = match result {
            Ok(media) => report.connected(media),
            Err(err) => report.failed(&err),
        };

        metrics::record_report(&report);
        if let Some(sink) = &self.sink {
            sink.record(&report).await;
        }
        report
    }

    /// Resolve the server, bind both sockets and create the session
    async fn prepare(&self, destination: &str, timeout: Duration) -> Result<Dialog<'_>, CallError> {
        let sip = &self.config.sip;

        let remote_uri = SipUri::for_destination(destination, sip.domain()).map_err(CallError::Protocol)?;

        let server = lookup_host((sip.server_host.as_str(), sip.server_port))
            .await
            .map_err(|e| CallError::Transport(format!("Cannot resolve {}: {}", sip.server_host, e)))?
            .next()
            .ok_or_else(|| CallError::Transport(format!("No address for {}", sip.server_host)))?;

        let local_ip = match sip.local_ip {
            Some(ip) => ip,
            None => detect_local_ip(server).await,
        };
        let any: IpAddr = match server {
            SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
            SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
        };

        let socket = SignalingSocket::bind(SocketAddr::new(any, sip.local_port), server).await?;
        let local_sip = SocketAddr::new(local_ip, socket.local_addr()?.port());

        let rtp_socket = UdpSocket::bind(SocketAddr::new(any, self.config.media.rtp_port))
            .await
            .map_err(|e| CallError::Transport(format!("Failed to bind RTP socket: {}", e)))?;
        let rtp_port = rtp_socket
            .local_addr()
            .map_err(|e| CallError::Transport(e.to_string()))?
            .port();
        let local_rtp = SocketAddr::new(local_ip, rtp_port);

        let user = if sip.username.is_empty() {
            ANONYMOUS_USER
        } else {
            sip.username.as_str()
        };
        let local_uri = SipUri::new(user.to_string(), sip.domain().to_string(), None);
        let contact = format!("sip:{}@{}", user, local_sip);

        let session = CallSession::new(local_uri, remote_uri, local_ip, local_rtp);
        let offer = SdpSession::create_audio_offer(local_ip, rtp_port, self.config.media.codec).to_string();

        Ok(Dialog {
            dialer: self,
            socket,
            rtp_socket: Some(rtp_socket),
            session,
            local_sip,
            contact,
            offer,
            deadline: Instant::now() + timeout,
            authorization: None,
            saw_provisional: false,
            last_ack: None,
        })
    }
}

/// What woke the in-call loop
enum InCall {
    MediaDone(Result<MediaOutcome, JoinError>),
    Signaling(Result<Option<IncomingMessage>, SipError>),
}

/// State of one call while `place_call` runs
struct Dialog<'a> {
    dialer: &'a SipDialer,
    socket: SignalingSocket,
    /// Handed to the streamer once the call is answered
    rtp_socket: Option<UdpSocket>,
    session: CallSession,
    /// Address advertised in Via
    local_sip: SocketAddr,
    contact: String,
    offer: String,
    deadline: Instant,
    /// Header answering the challenge, once there was one
    authorization: Option<(&'static str, String)>,
    saw_provisional: bool,
    /// ACK for the 2xx, resent if the 2xx is retransmitted
    last_ack: Option<Vec<u8>>,
}

impl Dialog<'_> {
    async fn run(&mut self, audio: &AudioBuffer, report: &mut CallReport) -> Result<MediaOutcome, CallError> {
        self.invite_transaction(report).await?;
        self.stream(audio).await
    }

    /// INVITE until a final response or the deadline
    async fn invite_transaction(&mut self, report: &mut CallReport) -> Result<(), CallError> {
        self.send_invite().await?;

        loop {
            let incoming = match self.socket.recv_until(self.deadline).await? {
                Some(incoming) => incoming,
                None => {
                    warn!("No final response for {} before the deadline", self.session.call_id);
                    if self.saw_provisional {
                        if let Err(e) = self.send_cancel().await {
                            warn!("Failed to send CANCEL: {}", e);
                        }
                    }
                    return Err(CallError::NetworkTimeout);
                }
            };

            let response = match incoming.message {
                SipMessage::Response(response) => response,
                SipMessage::Request(request) => {
                    debug!("Ignoring {} during call setup", request.method().map_or("request", |m| m.as_str()));
                    continue;
                }
            };

            if !self.is_current_invite(&response) {
                debug!(
                    "Ignoring stale response {} {}",
                    response.status_code(),
                    response.reason()
                );
                continue;
            }

            let status = response.status_code();
            if status >= 200 {
                report.final_status = Some(status);
            }

            match status {
                100..=199 => {
                    info!("{} {}", status, response.reason());
                    self.saw_provisional = true;
                    self.session.apply(DialogEvent::Provisional)?;
                }
                200..=299 => return self.accept_answer(&response, report).await,
                401 | 407 => self.answer_challenge(&response).await?,
                _ => {
                    info!("Call rejected: {} {}", status, response.reason());
                    self.send_ack_for_failure(&response).await?;
                    return Err(CallError::rejection(status, response.reason()));
                }
            }
        }
    }

    fn is_current_invite(&self, response: &SipResponse) -> bool {
        response.call_id().as_deref() == Some(self.session.call_id.as_str())
            && response.cseq() == Some((self.session.cseq, SipMethod::Invite.as_str().to_string()))
    }

    async fn answer_challenge(&mut self, response: &SipResponse) -> Result<(), CallError> {
        let status = response.status_code();
        self.send_ack_for_failure(response).await?;

        if self.authorization.is_some() {
            return Err(CallError::AuthFailure(format!(
                "Challenged again ({}) after authenticating",
                status
            )));
        }

        let (challenge_header, answer_header) = if status == 407 {
            ("Proxy-Authenticate", "Proxy-Authorization")
        } else {
            ("WWW-Authenticate", "Authorization")
        };

        let value = response
            .header(challenge_header)
            .ok_or_else(|| CallError::AuthFailure(format!("{} without {}", status, challenge_header)))?;
        let challenge = AuthChallenge::parse(&value).map_err(|e| CallError::AuthFailure(e.to_string()))?;

        info!("Answering {} challenge for realm \"{}\"", status, challenge.realm);
        metrics::record_auth_challenge(status);

        self.session.apply(DialogEvent::Challenged)?;
        self.session.next_transaction();

        let uri = self.session.remote_uri.to_string();
        let digest = DigestResponse::answer(
            &self.dialer.credentials,
            &challenge,
            SipMethod::Invite.as_str(),
            &uri,
        );
        self.authorization = Some((answer_header, digest.to_header_value()));

        self.send_invite().await
    }

    async fn accept_answer(&mut self, response: &SipResponse, report: &mut CallReport) -> Result<(), CallError> {
        let sdp = SdpSession::parse(&String::from_utf8_lossy(response.body()));
        let remote_rtp = sdp
            .remote_endpoint()
            .map_err(|e| CallError::NegotiationFailure(e.to_string()))?;
        let codec = sdp
            .negotiated_codec()
            .map_err(|e| CallError::NegotiationFailure(e.to_string()))?;

        self.session.remote_tag = response.to_tag();
        self.session.remote_target = response.contact_uri();
        self.session.remote_rtp = Some(remote_rtp);
        self.session.codec = Some(codec);
        self.session.apply(DialogEvent::Answered)?;
        report.mark_answered(remote_rtp, codec.name());

        info!("Call answered, media to {} ({})", remote_rtp, codec);

        self.session.refresh_branch();
        let ack = self
            .in_dialog_request(SipMethod::Ack, self.session.cseq)
            .build();
        self.socket.send(&ack).await?;
        self.last_ack = Some(ack);
        Ok(())
    }

    /// Play the buffer while answering in-dialog signaling, then hang up
    async fn stream(&mut self, audio: &AudioBuffer) -> Result<MediaOutcome, CallError> {
        let (remote, codec, rtp_socket) = match (self.session.remote_rtp, self.session.codec, self.rtp_socket.take()) {
            (Some(remote), Some(codec), Some(socket)) => (remote, codec, socket),
            _ => return Err(CallError::Protocol("Answered without negotiated media".to_string())),
        };

        self.session.apply(DialogEvent::MediaStarted)?;

        let packets = RtpPacketizer::new(codec).packetize(audio);
        let cancel = CancellationToken::new();
        // the streamer never outlives this call, however it is left
        let _stop_media = cancel.clone().drop_guard();
        let mut handle = RtpStreamer::new(rtp_socket, remote)
            .with_start_delay(self.dialer.config.media.start_delay())
            .spawn(packets, cancel.clone());

        let mut remote_bye: Option<(SipRequest, SocketAddr)> = None;
        let media = loop {
            let event = tokio::select! {
                joined = &mut handle => InCall::MediaDone(joined),
                incoming = self.socket.recv_until(Instant::now() + SIGNALING_POLL) => InCall::Signaling(incoming),
            };

            match event {
                InCall::MediaDone(joined) => break media_result(joined),
                InCall::Signaling(Ok(Some(incoming))) => {
                    if let Some(bye) = self.in_call_message(incoming).await {
                        info!("Remote hung up {}", self.session.call_id);
                        cancel.cancel();
                        remote_bye = Some(bye);
                        break media_result((&mut handle).await);
                    }
                }
                InCall::Signaling(Ok(None)) => {}
                InCall::Signaling(Err(e)) => {
                    warn!("Signaling socket failed during playout: {}", e);
                    break media_result((&mut handle).await);
                }
            }
        };

        match remote_bye {
            Some((bye, source)) => {
                if let Err(e) = self.reply_ok(&bye, source).await {
                    warn!("Failed to answer BYE for {}: {}", self.session.call_id, e);
                }
            }
            None if self.dialer.config.call.send_bye => {
                if let Err(e) = self.hang_up().await {
                    warn!("BYE for {} failed: {}", self.session.call_id, e);
                }
            }
            None => {}
        }

        self.session.apply(DialogEvent::Ended)?;
        Ok(media)
    }

    /// Handle one message received while media plays; returns a BYE that
    /// ends the dialog. Send failures here never end the call.
    async fn in_call_message(&mut self, incoming: IncomingMessage) -> Option<(SipRequest, SocketAddr)> {
        match incoming.message {
            SipMessage::Request(request) => {
                if request.call_id().as_deref() != Some(self.session.call_id.as_str()) {
                    debug!("Ignoring request for another dialog");
                    return None;
                }
                match request.method() {
                    Some(SipMethod::Bye) => Some((request, incoming.source)),
                    other => {
                        debug!("Ignoring in-dialog {:?}", other);
                        None
                    }
                }
            }
            SipMessage::Response(response) => {
                // our ACK got lost and the 2xx is retransmitted
                if response.is_success() && self.is_current_invite(&response) {
                    if let Some(ack) = &self.last_ack {
                        debug!("Re-sending ACK for retransmitted {}", response.status_code());
                        if let Err(e) = self.socket.send(ack).await {
                            warn!("Failed to re-send ACK for {}: {}", self.session.call_id, e);
                        }
                    }
                }
                None
            }
        }
    }

    async fn reply_ok(&self, request: &SipRequest, destination: SocketAddr) -> Result<(), CallError> {
        let response = ResponseBuilder::ok().build_for_request(request)?;
        self.socket.send_to(&response.to_bytes(), destination).await?;
        Ok(())
    }

    /// Send BYE and wait briefly for its final response
    async fn hang_up(&mut self) -> Result<(), CallError> {
        let cseq = self.session.next_transaction();
        let bye = self.in_dialog_request(SipMethod::Bye, cseq).build();
        self.socket.send(&bye).await?;
        info!("Sent BYE for {}", self.session.call_id);

        let deadline = Instant::now() + BYE_TIMEOUT;
        while let Some(incoming) = self.socket.recv_until(deadline).await? {
            match incoming.message {
                SipMessage::Response(response)
                    if response.cseq() == Some((cseq, SipMethod::Bye.as_str().to_string()))
                        && !response.is_provisional() =>
                {
                    debug!("BYE answered: {} {}", response.status_code(), response.reason());
                    return Ok(());
                }
                // both sides hung up at once
                SipMessage::Request(request)
                    if request.method() == Some(SipMethod::Bye)
                        && request.call_id().as_deref() == Some(self.session.call_id.as_str()) =>
                {
                    self.reply_ok(&request, incoming.source).await?;
                }
                _ => {}
            }
        }

        warn!("No answer to BYE for {}", self.session.call_id);
        Ok(())
    }

    async fn send_invite(&mut self) -> Result<(), CallError> {
        let uri = self.session.remote_uri.to_string();
        let mut builder = RequestBuilder::new(SipMethod::Invite, &uri)
            .via(self.local_sip, &self.session.branch)
            .from(&self.session.local_uri.to_string(), &self.session.local_tag)
            .to(&uri, None)
            .call_id(&self.session.call_id)
            .cseq(self.session.cseq)
            .contact(&self.contact)
            .user_agent(&self.dialer.config.sip.user_agent);
        if let Some((name, value)) = &self.authorization {
            builder = builder.header(name, value.clone());
        }
        let invite = builder.body("application/sdp", self.offer.clone()).build();

        self.socket.send(&invite).await?;
        self.session.apply(DialogEvent::InviteSent)?;
        info!("Sent INVITE to {} (CSeq {})", uri, self.session.cseq);
        Ok(())
    }

    /// ACK for a non-2xx final response: same transaction as the INVITE
    async fn send_ack_for_failure(&self, response: &SipResponse) -> Result<(), CallError> {
        let uri = self.session.remote_uri.to_string();
        let to_tag = response.to_tag();
        let ack = RequestBuilder::new(SipMethod::Ack, &uri)
            .via(self.local_sip, &self.session.branch)
            .from(&self.session.local_uri.to_string(), &self.session.local_tag)
            .to(&uri, to_tag.as_deref())
            .call_id(&self.session.call_id)
            .cseq(self.session.cseq)
            .user_agent(&self.dialer.config.sip.user_agent)
            .build();
        self.socket.send(&ack).await?;
        Ok(())
    }

    async fn send_cancel(&self) -> Result<(), CallError> {
        let uri = self.session.remote_uri.to_string();
        let cancel = RequestBuilder::new(SipMethod::Cancel, &uri)
            .via(self.local_sip, &self.session.branch)
            .from(&self.session.local_uri.to_string(), &self.session.local_tag)
            .to(&uri, None)
            .call_id(&self.session.call_id)
            .cseq(self.session.cseq)
            .user_agent(&self.dialer.config.sip.user_agent)
            .build();
        self.socket.send(&cancel).await?;
        info!("Sent CANCEL for {}", self.session.call_id);
        Ok(())
    }

    /// ACK or BYE within the established dialog
    fn in_dialog_request(&self, method: SipMethod, cseq: u32) -> RequestBuilder {
        let to = self.session.remote_uri.to_string();
        RequestBuilder::new(method, self.session.in_dialog_target())
            .via(self.local_sip, &self.session.branch)
            .from(&self.session.local_uri.to_string(), &self.session.local_tag)
            .to(&to, self.session.remote_tag.as_deref())
            .call_id(&self.session.call_id)
            .cseq(cseq)
            .contact(&self.contact)
            .user_agent(&self.dialer.config.sip.user_agent)
    }
}

fn media_result(joined: Result<MediaOutcome, JoinError>) -> MediaOutcome {
    joined.unwrap_or_else(|e| MediaOutcome::Failed {
        packets_sent: 0,
        error: format!("RTP task failed: {}", e),
    })
}
