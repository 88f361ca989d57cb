//! Call errors

use thiserror::Error;

/// Call result type
pub type Result<T> = std::result::Result<T, CallError>;

/// Everything that can end a call attempt early.
///
/// Every variant is folded into a [`CallOutcome`](crate::domain::call::CallOutcome)
/// by the dialog engine; none of them escapes `place_call` as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("No final response before the deadline")]
    NetworkTimeout,

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Media negotiation failed: {0}")]
    NegotiationFailure(String),

    #[error("Remote rejected the call: {code} {reason}")]
    RemoteRejection { code: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl CallError {
    pub fn rejection(code: u16, reason: impl Into<String>) -> Self {
        CallError::RemoteRejection {
            code,
            reason: reason.into(),
        }
    }
}
