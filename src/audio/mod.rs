//! Audio decoding and resampling

mod decoder;

pub use decoder::{decode, DecodedAudio, TARGET_SAMPLE_RATE};
