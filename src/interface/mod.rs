//! Interface layer - what the dialer exposes beyond its Rust API
//!
//! Currently only metrics; the command line lives in `main.rs`.

pub mod metrics;

pub use metrics::init_metrics;
