//! tracklens - Musician-Friendly Audio Analysis
//!
//! Analyzes an audio file to extract tempo, key, meter, song structure,
//! loudness statistics, and (optionally) chords. Every result carries a
//! calibrated confidence, a plain-language explanation, and a
//! `needs_confirmation` flag so musicians know what to trust and what to
//! verify by ear.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `audio`: Audio decoding and resampling using symphonia
//! - `features`: Shared signal features (STFT, onsets, chroma, HPSS)
//! - `analysis`: The six analyzers and their result types
//! - `pipeline`: Orchestration, progress reporting, and JSON export
//! - `cache`: On-disk result cache keyed by file identity
//! - `capture`: Ring buffer for live-capture scenarios
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tracklens::pipeline::{AnalysisOptions, AnalysisPipeline};
//!
//! let pipeline = AnalysisPipeline::new(AnalysisOptions::default()).unwrap();
//! let result = pipeline
//!     .analyze(Path::new("track.wav"), None, None)
//!     .expect("analysis failed");
//! println!("{}", result.to_musician_summary());
//! ```

pub mod analysis;
pub mod audio;
pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod types;

// Re-export key types at crate root
pub use analysis::{AnalysisResult, KeyResult, MeterResult, TempoResult};
pub use error::{Result, TracklensError};
pub use types::AudioBuffer;
