//! Wire protocols spoken by the dialer

pub mod sip;
