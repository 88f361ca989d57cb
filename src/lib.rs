//! sip-dialer - place an outbound SIP call and play a prompt into it
//!
//! Laid out the same way as a DDD service: `domain` holds the call report
//! and audio types, `infrastructure` the SIP and RTP stacks, `interface`
//! the metrics surface.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use config::Config;
pub use domain::call::{CallOutcome, CallOutcomeSink, CallReport, MediaOutcome};
pub use domain::shared::error::CallError;
pub use domain::shared::result::Result;
pub use infrastructure::protocols::sip::SipDialer;
