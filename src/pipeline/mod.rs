//! Analysis pipeline orchestration
//!
//! Runs the full analysis chain (decode, tempo, key, meter, structure,
//! loudness, optional chords) over a single file, with progress reporting,
//! cooperative cancellation, and result caching.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::analysis::{
    AnalysisResult, ChordAnalyzer, KeyAnalyzer, LoudnessAnalyzer, MeterAnalyzer,
    StructureAnalyzer, TempoAnalyzer, TempoPredictor, TrackInfo, ANALYSIS_VERSION,
};
use crate::audio::{self, DecodedAudio};
use crate::cache::ResultCache;
use crate::error::{Result, TracklensError};
use crate::types::AudioFormat;

/// Progress callback: stage name plus overall fraction in `0.0..=1.0`.
pub type ProgressFn = dyn Fn(&str, f32);

/// Options controlling which optional analyses run and how caching behaves.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Run the (approximate) chord detector
    pub detect_chords: bool,
    /// Estimate downbeat positions alongside beats
    pub detect_downbeats: bool,
    /// Detect tempo changes over the track
    pub detect_tempo_changes: bool,
    /// Detect key modulations over the track
    pub detect_key_changes: bool,
    /// Estimate the A4 tuning reference from the pitch track
    pub estimate_tuning: bool,
    /// Read and write the result cache
    pub use_cache: bool,
    /// Override the cache directory (default: platform cache dir)
    pub cache_dir: Option<PathBuf>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            detect_chords: false,
            detect_downbeats: true,
            detect_tempo_changes: true,
            detect_key_changes: true,
            estimate_tuning: true,
            use_cache: true,
            cache_dir: None,
        }
    }
}

/// Owns all analyzers and runs them as one pipeline.
pub struct AnalysisPipeline {
    options: AnalysisOptions,
    tempo: TempoAnalyzer,
    key: KeyAnalyzer,
    meter: MeterAnalyzer,
    structure: StructureAnalyzer,
    loudness: LoudnessAnalyzer,
    chords: ChordAnalyzer,
    cache: Option<ResultCache>,
}

impl AnalysisPipeline {
    pub fn new(options: AnalysisOptions) -> Result<Self> {
        let cache = if options.use_cache {
            let cache = match &options.cache_dir {
                Some(dir) => ResultCache::open(dir)?,
                None => ResultCache::open_default()?,
            };
            Some(cache)
        } else {
            None
        };

        Ok(Self {
            options,
            tempo: TempoAnalyzer::new(),
            key: KeyAnalyzer::new(),
            meter: MeterAnalyzer::new(),
            structure: StructureAnalyzer::new(),
            loudness: LoudnessAnalyzer::new(),
            chords: ChordAnalyzer::new(),
            cache,
        })
    }

    /// Install a learned tempo predictor into the tempo ensemble.
    pub fn with_tempo_predictor(mut self, predictor: Box<dyn TempoPredictor>) -> Self {
        self.tempo = TempoAnalyzer::with_predictor(predictor);
        self
    }

    /// Analyze a single audio file.
    ///
    /// `progress` is invoked with a stage name and an overall fraction;
    /// panics inside the callback are caught and logged, never propagated.
    /// `cancel` is checked between stages; when set, the pipeline stops
    /// with [`TracklensError::Cancelled`].
    pub fn analyze(
        &self,
        path: &Path,
        progress: Option<&ProgressFn>,
        cancel: Option<&AtomicBool>,
    ) -> Result<AnalysisResult> {
        if !path.exists() {
            return Err(TracklensError::FileNotFound(path.to_path_buf()));
        }
        if !AudioFormat::is_supported_path(path) {
            return Err(TracklensError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_else(|| "none".to_string()),
            });
        }

        let report = |stage: &str, fraction: f32| {
            if let Some(f) = progress {
                if catch_unwind(AssertUnwindSafe(|| f(stage, fraction))).is_err() {
                    warn!("progress callback panicked at stage '{}'", stage);
                }
            }
        };
        let check_cancel = || -> Result<()> {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(TracklensError::Cancelled);
            }
            Ok(())
        };

        if let Some(cache) = &self.cache {
            if let Some(result) = cache.load(path) {
                info!("using cached analysis for {}", path.display());
                report("Complete (cached)", 1.0);
                return Ok(result);
            }
        }

        let started = Instant::now();

        report("Loading audio", 0.0);
        let decoded = audio::decode(path)?;
        let samples = &decoded.buffer.samples;
        let sample_rate = decoded.buffer.sample_rate;
        debug!(
            "decoded {:.1}s of audio at {} Hz",
            decoded.buffer.duration, sample_rate
        );

        check_cancel()?;
        report("Analyzing tempo", 0.1);
        let mut tempo = self.tempo.analyze(samples, sample_rate);
        if !self.options.detect_downbeats {
            tempo.downbeats.clear();
        }
        if !self.options.detect_tempo_changes {
            tempo.segments.clear();
        }
        report("Analyzing tempo", 0.25);

        check_cancel()?;
        report("Analyzing key", 0.3);
        let mut key = self.key.analyze(samples, sample_rate);
        if !self.options.detect_key_changes {
            key.segments.clear();
        }
        report("Analyzing key", 0.45);

        check_cancel()?;
        report("Analyzing meter", 0.5);
        let meter = self.meter.analyze(samples, sample_rate, &tempo.beats);
        if let Some(count_in) = tempo.count_in.as_mut() {
            count_in.meter = meter.value.clone();
            count_in.beats_per_bar = meter.numerator;
        }
        report("Analyzing meter", 0.6);

        check_cancel()?;
        report("Analyzing structure", 0.65);
        let structure = self.structure.analyze(samples, sample_rate);
        report("Analyzing structure", 0.75);

        check_cancel()?;
        report("Analyzing loudness", 0.8);
        let audio_stats = self
            .loudness
            .analyze(samples, sample_rate, self.options.estimate_tuning);
        report("Analyzing loudness", 0.9);

        check_cancel()?;
        let chords = if self.options.detect_chords {
            report("Analyzing chords", 0.92);
            Some(
                self.chords
                    .analyze(samples, sample_rate, Some(&tempo.beats), true),
            )
        } else {
            None
        };

        report("Finalizing", 0.98);
        let result = AnalysisResult {
            track: track_info(path, &decoded),
            tempo,
            key,
            meter,
            structure,
            chords,
            audio_stats,
            analysis_version: ANALYSIS_VERSION.to_string(),
            analysis_time_seconds: round2(started.elapsed().as_secs_f64()),
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        };

        if let Some(cache) = &self.cache {
            cache.store(path, &result);
        }

        info!(
            "analyzed {} in {:.2}s",
            path.display(),
            result.analysis_time_seconds
        );
        report("Complete", 1.0);
        Ok(result)
    }

    /// Options this pipeline was built with.
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }
}

fn track_info(path: &Path, decoded: &DecodedAudio) -> TrackInfo {
    TrackInfo {
        path: path.to_string_lossy().to_string(),
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        duration: round2(decoded.buffer.duration),
        sample_rate: decoded.source_sample_rate,
        channels: decoded.channels,
        bit_depth: decoded.bits_per_sample,
        format: decoded.format.clone(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Write a result to `output_path` as pretty JSON.
///
/// Uses a temp-file-then-rename write so an interrupted run never leaves a
/// truncated file behind.
pub fn export_json(result: &AnalysisResult, output_path: &Path) -> Result<()> {
    let temp_path = output_path.with_extension("json.tmp");

    let file = std::fs::File::create(&temp_path)
        .map_err(|e| TracklensError::output_error(output_path, e))?;
    let writer = std::io::BufWriter::new(file);

    serde_json::to_writer_pretty(writer, result).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        TracklensError::OutputError {
            path: output_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        TracklensError::output_error(output_path, e)
    })?;

    info!("wrote analysis to {}", output_path.display());
    Ok(())
}

/// Load a previously exported result.
pub fn load_json(path: &Path) -> Result<AnalysisResult> {
    let file = std::fs::File::open(path).map_err(|e| TracklensError::OutputError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let reader = std::io::BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| TracklensError::OutputError {
        path: path.to_path_buf(),
        reason: format!("Invalid analysis JSON: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    fn sine(freq: f32, secs: f32, sample_rate: u32) -> Vec<f32> {
        let n = (secs * sample_rate as f32) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn pipeline_no_cache() -> AnalysisPipeline {
        AnalysisPipeline::new(AnalysisOptions {
            use_cache: false,
            ..AnalysisOptions::default()
        })
        .unwrap()
    }

    #[test]
    fn missing_file_is_reported() {
        let err = pipeline_no_cache()
            .analyze(Path::new("/nonexistent/track.wav"), None, None)
            .unwrap_err();
        assert!(matches!(err, TracklensError::FileNotFound(_)));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "not audio").unwrap();

        let err = pipeline_no_cache().analyze(&path, None, None).unwrap_err();
        assert!(matches!(err, TracklensError::UnsupportedFormat { .. }));
    }

    #[test]
    fn cancellation_stops_early() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 2.0, 22050), 22050);

        let cancel = AtomicBool::new(true);
        let err = pipeline_no_cache()
            .analyze(&path, None, Some(&cancel))
            .unwrap_err();
        assert!(matches!(err, TracklensError::Cancelled));
    }

    #[test]
    fn analyze_produces_complete_result() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 3.0, 22050), 22050);

        let result = pipeline_no_cache().analyze(&path, None, None).unwrap();
        assert_eq!(result.analysis_version, ANALYSIS_VERSION);
        assert_eq!(result.track.filename, "tone.wav");
        assert!(result.track.duration > 2.5);
        assert!(result.chords.is_none());
        assert!(result.tempo.global_bpm > 0.0);
    }

    #[test]
    fn progress_panics_are_swallowed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 2.0, 22050), 22050);

        let cb = |_stage: &str, _frac: f32| panic!("listener bug");
        let result = pipeline_no_cache().analyze(&path, Some(&cb), None);
        assert!(result.is_ok());
    }

    #[test]
    fn progress_reaches_completion_in_order() {
        use std::sync::{Arc, Mutex};

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 2.0, 22050), 22050);

        let stages: Arc<Mutex<Vec<(String, f32)>>> = Arc::new(Mutex::new(Vec::new()));
        let stages_in_cb = Arc::clone(&stages);
        let cb = move |stage: &str, frac: f32| {
            stages_in_cb.lock().unwrap().push((stage.to_string(), frac));
        };
        pipeline_no_cache().analyze(&path, Some(&cb), None).unwrap();
        drop(cb);

        let stages = Arc::try_unwrap(stages).unwrap().into_inner().unwrap();
        assert_eq!(stages.first().map(|s| s.0.as_str()), Some("Loading audio"));
        assert_eq!(stages.last().map(|s| s.0.as_str()), Some("Complete"));
        for pair in stages.windows(2) {
            assert!(pair[0].1 <= pair[1].1);
        }
    }

    #[test]
    fn cached_second_run_matches_first() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 2.0, 22050), 22050);

        let pipeline = AnalysisPipeline::new(AnalysisOptions {
            use_cache: true,
            cache_dir: Some(tmp.path().join("cache")),
            ..AnalysisOptions::default()
        })
        .unwrap();

        let first = pipeline.analyze(&path, None, None).unwrap();
        let second = pipeline.analyze(&path, None, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn chords_included_when_enabled() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 2.0, 22050), 22050);

        let pipeline = AnalysisPipeline::new(AnalysisOptions {
            detect_chords: true,
            use_cache: false,
            ..AnalysisOptions::default()
        })
        .unwrap();
        let result = pipeline.analyze(&path, None, None).unwrap();
        let chords = result.chords.expect("chords result");
        assert!(chords.enabled);
    }

    #[test]
    fn export_then_load_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 2.0, 22050), 22050);

        let result = pipeline_no_cache().analyze(&path, None, None).unwrap();
        let out = tmp.path().join("analysis.json");
        export_json(&result, &out).unwrap();
        assert!(!out.with_extension("json.tmp").exists());

        let loaded = load_json(&out).unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn export_json_rejects_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tone.wav");
        write_wav(&path, &sine(220.0, 1.0, 22050), 22050);
        let result = pipeline_no_cache().analyze(&path, None, None).unwrap();

        let bad = tmp.path().join("no_such_dir").join("out.json");
        let err = export_json(&result, &bad).unwrap_err();
        assert!(matches!(err, TracklensError::OutputError { .. }));
    }
}
