//! Integration tests for the tracklens pipeline
//!
//! These tests run the full analysis chain over generated WAV fixtures and
//! verify the result contract: values in range, confidences in [0, 1],
//! non-empty explanations, and usable JSON output.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use tracklens::analysis::ANALYSIS_VERSION;
use tracklens::pipeline::{self, AnalysisOptions, AnalysisPipeline};

/// Generate a sine wave WAV file for testing
///
/// Creates a mono 16-bit WAV file at the specified path.
fn generate_sine_wav(path: &Path, frequency_hz: f32, duration_secs: f32, sample_rate: u32) {
    write_wav(path, sample_rate, |i| {
        let t = i as f32 / sample_rate as f32;
        0.5 * (2.0 * PI * frequency_hz * t).sin()
    }, duration_secs);
}

/// Generate a C major triad (C4 + E4 + G4) WAV file
fn generate_triad_wav(path: &Path, duration_secs: f32, sample_rate: u32) {
    let freqs = [261.63f32, 329.63, 392.00];
    write_wav(path, sample_rate, |i| {
        let t = i as f32 / sample_rate as f32;
        freqs
            .iter()
            .map(|f| 0.25 * (2.0 * PI * f * t).sin())
            .sum()
    }, duration_secs);
}

/// Generate a click track WAV file for tempo testing
///
/// Creates short exponentially-decaying impulses at regular intervals
/// matching the specified BPM.
fn generate_click_track(path: &Path, bpm: f32, duration_secs: f32, sample_rate: u32) {
    let samples_per_beat = (60.0 / bpm * sample_rate as f32) as usize;
    let impulse_samples = (0.005 * sample_rate as f32) as usize;
    write_wav(path, sample_rate, |i| {
        let position_in_beat = i % samples_per_beat;
        if position_in_beat < impulse_samples {
            let decay = (-5.0 * position_in_beat as f32 / impulse_samples as f32).exp();
            0.8 * decay
        } else {
            0.0
        }
    }, duration_secs);
}

/// Generate a silent WAV file
fn generate_silence_wav(path: &Path, duration_secs: f32, sample_rate: u32) {
    write_wav(path, sample_rate, |_| 0.0, duration_secs);
}

fn write_wav(path: &Path, sample_rate: u32, sample_at: impl Fn(usize) -> f32, duration_secs: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    for i in 0..num_samples {
        let sample_i16 = (sample_at(i).clamp(-1.0, 1.0) * 32767.0) as i16;
        writer
            .write_sample(sample_i16)
            .expect("Failed to write sample");
    }
    writer.finalize().expect("Failed to finalize WAV");
}

fn pipeline_without_cache() -> AnalysisPipeline {
    AnalysisPipeline::new(AnalysisOptions {
        use_cache: false,
        ..AnalysisOptions::default()
    })
    .expect("pipeline should build")
}

fn pipeline_with_cache(dir: PathBuf) -> AnalysisPipeline {
    AnalysisPipeline::new(AnalysisOptions {
        use_cache: true,
        cache_dir: Some(dir),
        ..AnalysisOptions::default()
    })
    .expect("pipeline should build")
}

/// True when `bpm` matches `expected` or an octave (half/double) of it.
fn bpm_matches_octave_family(bpm: f64, expected: f64) -> bool {
    [0.5, 1.0, 2.0]
        .iter()
        .any(|mult| (bpm - expected * mult).abs() / (expected * mult) < 0.06)
}

#[test]
fn test_click_track_tempo_detected() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("click_120.wav");
    generate_click_track(&wav, 120.0, 15.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    assert!(
        bpm_matches_octave_family(result.tempo.global_bpm, 120.0),
        "Detected {} BPM, expected 120 or an octave of it",
        result.tempo.global_bpm
    );
    assert!(!result.tempo.beats.is_empty(), "Should produce a beat grid");
    for pair in result.tempo.beats.windows(2) {
        assert!(pair[0] < pair[1], "Beat times should be increasing");
    }
    assert!(
        result.tempo.count_in.is_some(),
        "Should suggest a count-in for a rhythmic track"
    );
}

#[test]
fn test_triad_key_detected() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("c_major.wav");
    generate_triad_wav(&wav, 8.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    // A bare C-E-G triad is consistent with C major and its relative A minor
    assert!(
        result.key.global_key == "C major" || result.key.global_key == "A minor",
        "Detected {}, expected C major (or A minor)",
        result.key.global_key
    );
    assert!(!result.key.explanation.is_empty());
}

#[test]
fn test_silence_degrades_gracefully() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("silence.wav");
    generate_silence_wav(&wav, 5.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("silence should still analyze");

    assert!(result.tempo.confidence <= 0.5, "Silence should not be confident");
    assert!(result.key.needs_confirmation);
    assert!(result.audio_stats.lufs_integrated <= -60.0);
    assert!(result.audio_stats.peak_dbfs <= -60.0);
}

#[test]
fn test_short_track_structure_fallback() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("short.wav");
    generate_sine_wav(&wav, 440.0, 5.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    assert_eq!(result.structure.segments.len(), 1);
    assert_eq!(result.structure.segments[0].label, "Main");
    assert!(result.structure.needs_confirmation);
}

#[test]
fn test_result_contract_holds_for_all_analyzers() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("tone.wav");
    generate_sine_wav(&wav, 440.0, 6.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    let confidences = [
        result.tempo.confidence,
        result.key.confidence,
        result.meter.confidence,
    ];
    for c in confidences {
        assert!((0.0..=1.0).contains(&c), "Confidence {} out of range", c);
    }
    assert!(!result.tempo.explanation.is_empty());
    assert!(!result.key.explanation.is_empty());
    assert!(!result.meter.explanation.is_empty());
    assert!(!result.structure.explanation.is_empty());

    assert_eq!(result.analysis_version, ANALYSIS_VERSION);
    assert!(result.analysis_time_seconds >= 0.0);
    assert_eq!(result.track.sample_rate, 44100);
    assert_eq!(result.track.channels, 1);
}

#[test]
fn test_meter_defaults_to_common_time_on_weak_evidence() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("tone.wav");
    generate_sine_wav(&wav, 440.0, 4.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    // A steady tone has almost no beats, so the meter analyzer falls back
    assert_eq!(result.meter.value, "4/4");
    assert!(result.meter.fallback_used || result.meter.confidence < 0.7);
}

#[test]
fn test_chords_disabled_by_default_enabled_on_request() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("c_major.wav");
    generate_triad_wav(&wav, 5.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");
    assert!(result.chords.is_none(), "Chords should be off by default");

    let pipeline = AnalysisPipeline::new(AnalysisOptions {
        detect_chords: true,
        use_cache: false,
        ..AnalysisOptions::default()
    })
    .expect("pipeline should build");
    let result = pipeline
        .analyze(&wav, None, None)
        .expect("analysis should succeed");
    let chords = result.chords.expect("Chords requested");
    assert!(chords.enabled);
    assert!(!chords.warning.is_empty());
}

#[test]
fn test_json_export_round_trip() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("tone.wav");
    generate_sine_wav(&wav, 440.0, 4.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    let out = tmp.path().join("analysis.json");
    pipeline::export_json(&result, &out).expect("export should succeed");
    assert!(out.exists());

    let loaded = pipeline::load_json(&out).expect("load should succeed");
    assert_eq!(loaded, result, "Exported JSON should round-trip losslessly");

    // Spot-check the raw JSON schema
    let raw = std::fs::read_to_string(&out).expect("read JSON");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("valid JSON");
    assert!(json.get("track").is_some());
    assert!(json.get("tempo").is_some());
    assert!(json.get("key").is_some());
    assert!(json.get("meter").is_some());
    assert!(json.get("structure").is_some());
    assert!(json.get("audio_stats").is_some());
    assert!(json.get("analysis_version").is_some());
    assert!(
        json.get("chords").is_none(),
        "Disabled chords should be omitted from JSON"
    );
}

#[test]
fn test_cache_makes_reanalysis_idempotent() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("tone.wav");
    generate_sine_wav(&wav, 440.0, 4.0, 44100);

    let pipeline = pipeline_with_cache(tmp.path().join("cache"));
    let first = pipeline
        .analyze(&wav, None, None)
        .expect("first run should succeed");
    let second = pipeline
        .analyze(&wav, None, None)
        .expect("cached run should succeed");

    assert_eq!(first, second, "Cached result should equal the original");
}

#[test]
fn test_cached_run_reports_cache_stage() {
    use std::sync::{Arc, Mutex};

    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("tone.wav");
    generate_sine_wav(&wav, 440.0, 3.0, 44100);

    let pipeline = pipeline_with_cache(tmp.path().join("cache"));
    pipeline
        .analyze(&wav, None, None)
        .expect("first run should succeed");

    let stages: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let stages_in_report = Arc::clone(&stages);
    let report = move |stage: &str, _frac: f32| {
        stages_in_report.lock().unwrap().push(stage.to_string());
    };
    pipeline
        .analyze(&wav, Some(&report), None)
        .expect("cached run should succeed");
    drop(report);

    let stages = Arc::try_unwrap(stages).unwrap().into_inner().unwrap();
    assert_eq!(stages, vec!["Complete (cached)".to_string()]);
}

#[test]
fn test_full_scale_sine_peak_level() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("loud.wav");
    write_wav(&wav, 44100, |i| {
        let t = i as f32 / 44100.0;
        (2.0 * PI * 440.0 * t).sin()
    }, 3.0);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");

    assert!(
        result.audio_stats.peak_dbfs > -1.0,
        "Full-scale sine should peak near 0 dBFS, got {}",
        result.audio_stats.peak_dbfs
    );
    // Sine crest factor is ~3 dB
    assert!(
        (result.audio_stats.dynamic_range - 3.0).abs() < 1.5,
        "Sine crest factor should be near 3 dB, got {}",
        result.audio_stats.dynamic_range
    );
}

#[test]
fn test_summary_mentions_all_headline_results() {
    let tmp = TempDir::new().expect("temp dir");
    let wav = tmp.path().join("click_120.wav");
    generate_click_track(&wav, 120.0, 12.0, 44100);

    let result = pipeline_without_cache()
        .analyze(&wav, None, None)
        .expect("analysis should succeed");
    let summary = result.to_musician_summary();

    assert!(summary.contains("TEMPO:"));
    assert!(summary.contains("KEY:"));
    assert!(summary.contains("METER:"));
    assert!(summary.contains("LOUDNESS:"));
    assert!(summary.contains("click_120.wav"));
}
