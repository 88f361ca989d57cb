//! SIP user agent client
//!
//! Just enough of RFC 3261 to place one call over UDP and play audio into it.
//!
//! Architecture:
//! ```text
//! ┌─────────────────────────┐
//! │   SipDialer / Dialog    │
//! │  (INVITE, ACK, BYE)     │
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │  CallSession + FSM      │
//! │ (tags, CSeq, branches)  │
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │   Message / Builder     │
//! │ (rsip parse, text out)  │
//! └───────────┬─────────────┘
//!             │
//! ┌───────────▼─────────────┐
//! │   Transport Layer       │
//! │        (UDP)            │
//! └─────────────────────────┘
//! ```

pub mod auth;
pub mod builder;
pub mod call_state;
pub mod dialog;
pub mod message;
pub mod sdp;
pub mod session;
pub mod transport;

pub use auth::{AuthChallenge, DigestCredentials, DigestResponse};
pub use builder::{RequestBuilder, ResponseBuilder};
pub use call_state::{DialogEvent, DialogState, InvalidTransition};
pub use dialog::SipDialer;
pub use message::{SipError, SipMessage, SipMethod, SipRequest, SipResponse};
pub use sdp::{SdpError, SdpSession};
pub use session::CallSession;
pub use transport::{detect_local_ip, IncomingMessage, SignalingSocket};
