//! Call value objects

use crate::domain::shared::error::CallError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of one outbound call attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code")]
pub enum CallOutcome {
    /// The callee answered and media was started
    Connected,
    /// 486 Busy Here
    Busy,
    /// 404 Not Found
    NotFound,
    /// 603 Decline
    Declined,
    /// No final response before the deadline, or 408 Request Timeout
    Timeout,
    /// Challenge could not be answered or repeated after one retry
    AuthFailed,
    /// The answer carried no usable media endpoint
    NegotiationFailed,
    /// Any other final failure response
    Rejected(u16),
    /// Socket-level failure on the signaling path
    TransportError,
    /// Malformed or unexpected signaling
    ProtocolError,
}

impl CallOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, CallOutcome::Connected)
    }

    /// Map a final SIP failure status to an outcome
    pub fn from_status(code: u16) -> Self {
        match code {
            486 => CallOutcome::Busy,
            404 => CallOutcome::NotFound,
            603 => CallOutcome::Declined,
            408 => CallOutcome::Timeout,
            401 | 407 => CallOutcome::AuthFailed,
            code => CallOutcome::Rejected(code),
        }
    }

    /// Label used for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Connected => "connected",
            CallOutcome::Busy => "busy",
            CallOutcome::NotFound => "not_found",
            CallOutcome::Declined => "declined",
            CallOutcome::Timeout => "timeout",
            CallOutcome::AuthFailed => "auth_failed",
            CallOutcome::NegotiationFailed => "negotiation_failed",
            CallOutcome::Rejected(_) => "rejected",
            CallOutcome::TransportError => "transport_error",
            CallOutcome::ProtocolError => "protocol_error",
        }
    }
}

impl From<&CallError> for CallOutcome {
    fn from(err: &CallError) -> Self {
        match err {
            CallError::NetworkTimeout => CallOutcome::Timeout,
            CallError::AuthFailure(_) => CallOutcome::AuthFailed,
            CallError::NegotiationFailure(_) => CallOutcome::NegotiationFailed,
            CallError::RemoteRejection { code, .. } => CallOutcome::from_status(*code),
            CallError::Transport(_) => CallOutcome::TransportError,
            CallError::Protocol(_) => CallOutcome::ProtocolError,
        }
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutcome::Rejected(code) => write!(f, "rejected ({})", code),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// How the media leg of a connected call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MediaOutcome {
    /// Every packet of the audio buffer was sent
    Completed { packets_sent: u64 },
    /// Stopped early because the dialog ended (remote BYE)
    Cancelled { packets_sent: u64 },
    /// The RTP socket failed mid-stream
    Failed { packets_sent: u64, error: String },
}

impl MediaOutcome {
    pub fn packets_sent(&self) -> u64 {
        match self {
            MediaOutcome::Completed { packets_sent }
            | MediaOutcome::Cancelled { packets_sent }
            | MediaOutcome::Failed { packets_sent, .. } => *packets_sent,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MediaOutcome::Failed { .. })
    }
}
