//! Call result type

pub use super::error::Result;
