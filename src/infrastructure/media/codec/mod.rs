//! Audio codecs

pub mod g711;

pub use g711::{G711Type, PcmaCodec, PcmuCodec};
