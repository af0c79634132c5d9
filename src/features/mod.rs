//! Signal-level feature extraction primitives
//!
//! Pure functions over sample slices and spectrograms. The analyzers in
//! `crate::analysis` treat these as black boxes: they consume envelopes,
//! chromagrams and beat grids without caring how they were computed.

pub mod beat;
pub mod chroma;
pub mod hpss;
pub mod onset;
pub mod pitch;
pub mod spectral;

pub use spectral::Spectrogram;

/// Default FFT size for analysis spectrograms (~186ms at 22050 Hz)
pub const N_FFT: usize = 4096;

/// Default hop between frames (~23ms at 22050 Hz)
pub const HOP_LENGTH: usize = 512;
