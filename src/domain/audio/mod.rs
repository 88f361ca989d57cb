//! Audio domain - the prompt a call plays out

pub mod buffer;
pub mod wav;

pub use buffer::{AudioBuffer, TELEPHONY_SAMPLE_RATE};
pub use wav::{WavError, WavFile, WavFormat};
