//! Domain layer - call outcomes, audio and shared value objects
//!
//! Nothing in here touches a socket; the infrastructure layer drives these
//! types while placing a call.

pub mod audio;
pub mod call;
pub mod shared;

pub use shared::{CallError, Result};
