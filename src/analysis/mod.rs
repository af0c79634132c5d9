//! Musical feature analyzers
//!
//! Each analyzer consumes a mono sample buffer and produces a result
//! with a confidence score and a human-readable explanation. Analyzers
//! never fail on valid audio; weak evidence lowers confidence and sets
//! `needs_confirmation` instead.

pub mod chords;
pub mod constants;
pub mod key;
pub mod loudness;
pub mod meter;
pub mod results;
pub mod structure;
pub mod tempo;

pub use chords::ChordAnalyzer;
pub use key::KeyAnalyzer;
pub use loudness::LoudnessAnalyzer;
pub use meter::MeterAnalyzer;
pub use results::{
    AnalysisResult, AudioStats, ChordsResult, CountIn, KeyResult, MeterResult, StructureResult,
    StructureSegment, TempoResult, TrackInfo, ANALYSIS_VERSION,
};
pub use structure::StructureAnalyzer;
pub use tempo::{TempoAnalyzer, TempoPredictor};
