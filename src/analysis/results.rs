//! Analysis result types
//!
//! Everything here is serde round-trippable: a result written to JSON and
//! read back compares equal, which is what the cache relies on.

use crate::types::{Candidate, Segment};
use serde::{Deserialize, Serialize};

/// Schema version written into every result
pub const ANALYSIS_VERSION: &str = "1.0.0";

/// Count-in suggestion for playing along
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountIn {
    /// Number of bars for count-in
    pub bars: u32,
    /// BPM for the click track
    pub click_bpm: f64,
    /// Time signature, e.g. "4/4"
    pub meter: String,
    pub beats_per_bar: u32,
}

/// Complete tempo analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoResult {
    /// Primary BPM estimate
    pub global_bpm: f64,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
    /// Why this tempo was detected
    pub explanation: String,
    /// True when confidence is low enough to warrant checking by ear
    pub needs_confirmation: bool,
    /// Alternative BPM candidates (half-time, double-time, other methods)
    pub candidates: Vec<Candidate<f64>>,
    /// Tempo regions when the tempo varies over the track
    pub segments: Vec<Segment<f64>>,
    /// Beat timestamps in seconds
    pub beats: Vec<f64>,
    /// Downbeat (bar start) timestamps
    pub downbeats: Vec<f64>,
    /// Suggested count-in for playing along
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_in: Option<CountIn>,
}

/// Complete key/tonality analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    /// Primary key estimate, e.g. "A minor"
    pub global_key: String,
    pub confidence: f64,
    pub explanation: String,
    pub needs_confirmation: bool,
    /// Alternative keys (relative major/minor and close seconds)
    pub alternatives: Vec<Candidate<String>>,
    /// Key regions when modulations were detected
    pub segments: Vec<Segment<String>>,
    /// True when the track is too chromatic/atonal for a single key
    pub is_chromatic: bool,
    /// True when vocals were detected (affects the chroma strategy)
    pub vocal_detected: bool,
}

/// Time signature / meter analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterResult {
    /// Time signature, e.g. "4/4", "3/4"
    pub value: String,
    /// Beats per bar
    pub numerator: u32,
    /// Beat unit
    pub denominator: u32,
    pub confidence: f64,
    pub explanation: String,
    pub needs_confirmation: bool,
    /// True when the analyzer defaulted to 4/4 due to low confidence
    pub fallback_used: bool,
}

/// A section of the song structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSegment {
    pub start: f64,
    pub end: f64,
    /// Section label (Intro, Outro, Section A, ...)
    pub label: String,
    pub confidence: f64,
    /// Cosine similarity of this section's chroma to the previous section's
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_to_previous: Option<f64>,
}

/// Complete song structure analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureResult {
    pub segments: Vec<StructureSegment>,
    pub explanation: String,
    /// Structure detection is always best-effort
    pub needs_confirmation: bool,
}

/// Chord progression analysis (optional, best-effort)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordsResult {
    pub enabled: bool,
    /// Disclaimer about accuracy
    pub warning: String,
    /// Chord symbols over time, e.g. "Am", "C", "Gdim"
    pub segments: Vec<Segment<String>>,
    pub needs_confirmation: bool,
}

/// Technical audio statistics useful for musicians
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStats {
    /// Integrated loudness in LUFS (K-weighting approximation)
    pub lufs_integrated: f64,
    /// Max short-term loudness over 3s windows
    pub lufs_short_term_max: f64,
    /// Peak sample level in dBFS
    pub peak_dbfs: f64,
    /// Dynamic range (crest factor) in dB
    pub dynamic_range: f64,
    /// Spectral brightness over time: [(time, 0-1), ...]
    pub brightness_curve: Vec<(f64, f64)>,
    /// Short-term loudness over time: [(time, lufs), ...]
    pub loudness_curve: Vec<(f64, f64)>,
    /// Estimated A4 tuning frequency in Hz
    pub tuning_reference: f64,
    /// Deviation from 440 Hz in cents
    pub tuning_deviation_cents: f64,
}

/// Basic track information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub path: String,
    pub filename: String,
    /// Duration in seconds
    pub duration: f64,
    /// Sample rate of the source file
    pub sample_rate: u32,
    /// 1 = mono, 2 = stereo
    pub channels: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u32>,
    pub format: String,
}

/// Complete analysis result for a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub track: TrackInfo,
    pub tempo: TempoResult,
    pub key: KeyResult,
    pub meter: MeterResult,
    pub structure: StructureResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chords: Option<ChordsResult>,
    pub audio_stats: AudioStats,
    pub analysis_version: String,
    pub analysis_time_seconds: f64,
    /// RFC 3339 timestamp of when the analysis ran
    pub analyzed_at: String,
}

impl AnalysisResult {
    /// Human-readable summary for musicians
    pub fn to_musician_summary(&self) -> String {
        let mut lines = vec![
            "=== Music Analysis Summary ===".to_string(),
            format!("File: {}", self.track.filename),
            format!(
                "Duration: {:.1}s ({})",
                self.track.duration,
                format_duration(self.track.duration)
            ),
            String::new(),
            format!(
                "TEMPO: {:.1} BPM (confidence: {:.0}%)",
                self.tempo.global_bpm,
                self.tempo.confidence * 100.0
            ),
        ];

        let alt_bpms: Vec<String> = self
            .tempo
            .candidates
            .iter()
            .filter(|c| c.value != self.tempo.global_bpm)
            .map(|c| format!("{:.0}", c.value))
            .collect();
        if !alt_bpms.is_empty() {
            lines.push(format!("  Alternatives: {} BPM", alt_bpms.join(", ")));
        }

        lines.push(String::new());
        lines.push(format!(
            "KEY: {} (confidence: {:.0}%)",
            self.key.global_key,
            self.key.confidence * 100.0
        ));

        if !self.key.alternatives.is_empty() {
            let alts: Vec<&str> = self
                .key
                .alternatives
                .iter()
                .map(|c| c.value.as_str())
                .collect();
            lines.push(format!("  Alternatives: {}", alts.join(", ")));
        }

        lines.push(String::new());
        lines.push(format!(
            "METER: {} (confidence: {:.0}%)",
            self.meter.value,
            self.meter.confidence * 100.0
        ));
        lines.push(String::new());
        lines.push(format!(
            "LOUDNESS: {:.1} LUFS",
            self.audio_stats.lufs_integrated
        ));
        lines.push(format!("PEAK: {:.1} dBFS", self.audio_stats.peak_dbfs));
        lines.push(format!(
            "DYNAMIC RANGE: {:.1} dB",
            self.audio_stats.dynamic_range
        ));

        if !self.structure.segments.is_empty() {
            lines.push(String::new());
            lines.push("STRUCTURE:".to_string());
            for seg in &self.structure.segments {
                lines.push(format!(
                    "  {} - {}: {} ({:.0}%)",
                    format_time(seg.start),
                    format_time(seg.end),
                    seg.label,
                    seg.confidence * 100.0
                ));
            }
        }

        lines.join("\n")
    }
}

fn format_duration(seconds: f64) -> String {
    let total = seconds as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn format_time(seconds: f64) -> String {
    let mins = (seconds / 60.0).floor() as u64;
    let secs = seconds - mins as f64 * 60.0;
    format!("{}:{:05.2}", mins, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            track: TrackInfo {
                path: "/music/track.wav".into(),
                filename: "track.wav".into(),
                duration: 125.5,
                sample_rate: 44100,
                channels: 2,
                bit_depth: Some(16),
                format: "wav".into(),
            },
            tempo: TempoResult {
                global_bpm: 128.0,
                confidence: 0.92,
                explanation: "Ensemble analysis detected 128.0 BPM.".into(),
                needs_confirmation: false,
                candidates: vec![Candidate::new(128.0, 0.95), Candidate::new(64.0, 0.45)],
                segments: vec![Segment::new(0.0, 125.5, 128.0, 0.88)],
                beats: vec![0.0, 0.469, 0.938],
                downbeats: vec![0.0],
                count_in: Some(CountIn {
                    bars: 1,
                    click_bpm: 128.0,
                    meter: "4/4".into(),
                    beats_per_bar: 4,
                }),
            },
            key: KeyResult {
                global_key: "A minor".into(),
                confidence: 0.71,
                explanation: "Strong tonal center: A minor.".into(),
                needs_confirmation: false,
                alternatives: vec![Candidate::new("C major".to_string(), 0.55)],
                segments: vec![],
                is_chromatic: false,
                vocal_detected: false,
            },
            meter: MeterResult {
                value: "4/4".into(),
                numerator: 4,
                denominator: 4,
                confidence: 0.8,
                explanation: "Strong 4/4 pattern detected.".into(),
                needs_confirmation: false,
                fallback_used: false,
            },
            structure: StructureResult {
                segments: vec![StructureSegment {
                    start: 0.0,
                    end: 125.5,
                    label: "Main".into(),
                    confidence: 0.5,
                    similarity_to_previous: None,
                }],
                explanation: "Track too short for structure analysis.".into(),
                needs_confirmation: true,
            },
            chords: None,
            audio_stats: AudioStats {
                lufs_integrated: -9.2,
                lufs_short_term_max: -6.1,
                peak_dbfs: -0.3,
                dynamic_range: 8.9,
                brightness_curve: vec![(0.0, 0.42)],
                loudness_curve: vec![(0.0, -9.5)],
                tuning_reference: 440.0,
                tuning_deviation_cents: 0.0,
            },
            analysis_version: ANALYSIS_VERSION.to_string(),
            analysis_time_seconds: 3.21,
            analyzed_at: "2026-01-15T12:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_json_round_trip_is_lossless() {
        let result = sample_result();
        let json = serde_json::to_string_pretty(&result).unwrap();
        let parsed: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, parsed);

        // And a second serialization is byte-identical
        let json2 = serde_json::to_string_pretty(&parsed).unwrap();
        assert_eq!(json, json2);
    }

    #[test]
    fn test_summary_mentions_core_results() {
        let summary = sample_result().to_musician_summary();
        assert!(summary.contains("128.0 BPM"));
        assert!(summary.contains("A minor"));
        assert!(summary.contains("4/4"));
        assert!(summary.contains("-9.2 LUFS"));
    }

    #[test]
    fn test_none_chords_omitted_from_json() {
        let json = serde_json::to_string(&sample_result()).unwrap();
        assert!(!json.contains("\"chords\""));
    }
}
