//! Per-call dialog state

use super::call_state::{DialogEvent, DialogState, InvalidTransition};
use crate::domain::shared::SipUri;
use crate::infrastructure::media::codec::G711Type;
use rand::Rng;
use std::net::{IpAddr, SocketAddr};
use tracing::debug;

/// RFC 3261 magic cookie every branch starts with
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

fn random_token(bytes: usize) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..bytes).map(|_| rng.gen()).collect();
    hex::encode(random_bytes)
}

/// One outbound call attempt.
///
/// Call-ID and From tag are fixed at creation; the branch changes with every
/// new request; CSeq only ever grows.
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    pub local_uri: SipUri,
    pub remote_uri: SipUri,
    pub local_tag: String,
    /// To tag from the final response
    pub remote_tag: Option<String>,
    /// Where in-dialog requests go (remote Contact, else the request URI)
    pub remote_target: Option<String>,
    pub cseq: u32,
    pub branch: String,
    pub codec: Option<G711Type>,
    pub local_rtp: SocketAddr,
    pub remote_rtp: Option<SocketAddr>,
    state: DialogState,
}

impl CallSession {
    pub fn new(local_uri: SipUri, remote_uri: SipUri, local_ip: IpAddr, local_rtp: SocketAddr) -> Self {
        Self {
            call_id: format!("{}@{}", uuid::Uuid::new_v4().simple(), local_ip),
            local_uri,
            remote_uri,
            local_tag: random_token(4),
            remote_tag: None,
            remote_target: None,
            cseq: 1,
            branch: Self::new_branch(),
            codec: None,
            local_rtp,
            remote_rtp: None,
            state: DialogState::Idle,
        }
    }

    fn new_branch() -> String {
        format!("{}{}", BRANCH_MAGIC_COOKIE, random_token(8))
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn apply(&mut self, event: DialogEvent) -> Result<DialogState, InvalidTransition> {
        let next = self.state.transition(event)?;
        if next != self.state {
            debug!("Dialog {}: {} -> {}", self.call_id, self.state, next);
        }
        self.state = next;
        Ok(next)
    }

    /// Fresh branch and the next CSeq, for a new client transaction
    pub fn next_transaction(&mut self) -> u32 {
        self.cseq += 1;
        self.branch = Self::new_branch();
        self.cseq
    }

    /// Fresh branch under the same CSeq (the ACK for a 2xx)
    pub fn refresh_branch(&mut self) {
        self.branch = Self::new_branch();
    }

    /// Request-URI for ACK/BYE
    pub fn in_dialog_target(&self) -> String {
        self.remote_target
            .clone()
            .unwrap_or_else(|| self.remote_uri.to_string())
    }
}
