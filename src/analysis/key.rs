//! Key and tonality detection
//!
//! Multi-profile Krumhansl-Schmuckler key finding over a blend of chroma
//! representations, with harmonic/percussive separation, tuning
//! compensation, vocal-aware chroma weighting and windowed modulation
//! detection.

use tracing::debug;

use crate::analysis::constants::*;
use crate::analysis::results::KeyResult;
use crate::features::chroma::{self, ChromaOptions};
use crate::features::pitch::{dominant_pitches, estimate_tuning_cents};
use crate::features::spectral::{spectral_centroid, stft_magnitudes, zero_crossing_rate};
use crate::features::{hpss, HOP_LENGTH, N_FFT};
use crate::types::{key_name, Candidate, Mode, PitchClass, Segment};

/// Key profiles from music cognition research, each paired with a prior
/// weight reflecting how well it generalizes to modern material.
struct KeyProfile {
    major: [f64; 12],
    minor: [f64; 12],
    weight: f64,
}

// Krumhansl-Kessler (1990), cognitive experiments
const KRUMHANSL_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const KRUMHANSL_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

// Temperley (1999), classical corpus
const TEMPERLEY_MAJOR: [f64; 12] = [5.0, 2.0, 3.5, 2.0, 4.5, 4.0, 2.0, 4.5, 2.0, 3.5, 1.5, 4.0];
const TEMPERLEY_MINOR: [f64; 12] = [5.0, 2.0, 3.5, 4.5, 2.0, 4.0, 2.0, 4.5, 3.5, 2.0, 1.5, 4.0];

// Shaath (2011), pop/electronic
const SHAATH_MAJOR: [f64; 12] = [6.6, 2.0, 3.5, 2.3, 4.6, 4.0, 2.5, 5.2, 2.4, 3.8, 2.3, 3.4];
const SHAATH_MINOR: [f64; 12] = [6.5, 2.8, 3.5, 5.4, 2.7, 3.5, 2.5, 5.2, 4.0, 2.7, 4.3, 3.2];

// EDM corpus-derived
const EDMM_MAJOR: [f64; 12] = [7.0, 1.8, 3.2, 1.8, 4.8, 3.8, 2.2, 5.5, 2.0, 3.5, 2.0, 3.0];
const EDMM_MINOR: [f64; 12] = [7.0, 2.5, 3.0, 5.8, 2.2, 3.5, 2.2, 5.5, 4.2, 2.5, 4.5, 2.8];

pub struct KeyAnalyzer {
    profiles: Vec<KeyProfile>,
}

impl Default for KeyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyAnalyzer {
    pub fn new() -> Self {
        let profiles = vec![
            KeyProfile {
                major: zscore(&KRUMHANSL_MAJOR),
                minor: zscore(&KRUMHANSL_MINOR),
                weight: 1.0,
            },
            KeyProfile {
                major: zscore(&TEMPERLEY_MAJOR),
                minor: zscore(&TEMPERLEY_MINOR),
                weight: 0.9,
            },
            KeyProfile {
                major: zscore(&SHAATH_MAJOR),
                minor: zscore(&SHAATH_MINOR),
                weight: 1.1,
            },
            KeyProfile {
                major: zscore(&EDMM_MAJOR),
                minor: zscore(&EDMM_MINOR),
                weight: 0.8,
            },
        ];
        Self { profiles }
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> KeyResult {
        let spec = stft_magnitudes(samples, sample_rate, N_FFT, HOP_LENGTH);
        let harmonic_spec = hpss::harmonic(&spec);

        let tuning = estimate_tuning_cents(&dominant_pitches(&harmonic_spec, 0.1));
        let (vocal_detected, vocal_confidence) = detect_vocals(&spec, samples);
        debug!(tuning, vocal_detected, vocal_confidence, "key preprocessing");

        // With prominent vocals the bass register (80-400 Hz) carries the
        // tonal foundation more reliably than the full spectrum
        let chroma_frames = if vocal_detected {
            let bass = chroma::chroma_from_spectrogram(&harmonic_spec, &ChromaOptions::bass(tuning));
            let standard = combined_chroma(&spec, &harmonic_spec, tuning);
            chroma::blend(&[
                (&bass, CHROMA_WEIGHT_BASS),
                (&standard, CHROMA_WEIGHT_STANDARD_WITH_VOCALS),
            ])
        } else {
            combined_chroma(&spec, &harmonic_spec, tuning)
        };

        let global_chroma = chroma::global_profile(&chroma_frames);
        let (global_key, confidence, all_scores) = self.find_key(&global_chroma);
        let alternatives = self.alternatives(&all_scores, &global_key, confidence);

        let frame_rate = spec.frame_rate();
        let segments = self.detect_modulations(&chroma_frames, frame_rate);

        let explanation = self.build_explanation(&global_key, confidence, &alternatives);

        KeyResult {
            global_key,
            confidence,
            explanation,
            needs_confirmation: confidence < KEY_MEDIUM_CONFIDENCE,
            alternatives,
            segments,
            is_chromatic: confidence < KEY_LOW_CONFIDENCE,
            vocal_detected,
        }
    }

    /// Multi-profile Krumhansl-Schmuckler: correlate the z-scored chroma
    /// against every rotation of every profile and vote with the profile
    /// weights. Returns (best key, confidence, all 24 weighted scores).
    fn find_key(&self, global_chroma: &[f64; 12]) -> (String, f64, Vec<(String, f64)>) {
        let chroma_norm = zscore(global_chroma);

        let mut all_scores: Vec<(String, f64)> = Vec::with_capacity(24);
        for root in 0..12 {
            let mut rotated = [0.0f64; 12];
            for j in 0..12 {
                rotated[j] = chroma_norm[(j + root) % 12];
            }

            for mode in [Mode::Major, Mode::Minor] {
                let mut weighted_sum = 0.0;
                let mut weight_sum = 0.0;
                for profile in &self.profiles {
                    let target = match mode {
                        Mode::Major => &profile.major,
                        Mode::Minor => &profile.minor,
                    };
                    weighted_sum += pearson(&rotated, target) * profile.weight;
                    weight_sum += profile.weight;
                }
                let score = if weight_sum > 0.0 {
                    weighted_sum / weight_sum
                } else {
                    0.0
                };
                all_scores.push((key_name(PitchClass::from_index(root), mode), score));
            }
        }

        let (best_key, best_score) = all_scores
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, s)| (k.clone(), *s))
            .expect("score table has 24 entries");

        let confidence = key_confidence(&all_scores, &best_key, best_score);
        (best_key, confidence, all_scores)
    }

    fn alternatives(
        &self,
        all_scores: &[(String, f64)],
        primary_key: &str,
        primary_confidence: f64,
    ) -> Vec<Candidate<String>> {
        let mut sorted: Vec<&(String, f64)> = all_scores.iter().collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let primary_score = all_scores
            .iter()
            .find(|(k, _)| k.as_str() == primary_key)
            .map(|(_, s)| *s)
            .unwrap_or(0.0);

        let mut alternatives = Vec::new();
        for (key, score) in sorted.iter().take(6) {
            if key.as_str() == primary_key {
                continue;
            }
            let rel_conf = if primary_score > 0.0 {
                (score / primary_score) * primary_confidence
            } else {
                0.3
            };
            alternatives.push(Candidate {
                value: key.clone(),
                confidence: round2(rel_conf.clamp(KEY_ALT_CONF_MIN, KEY_ALT_CONF_MAX)),
            });
        }
        alternatives.truncate(KEY_MAX_ALTERNATIVES);
        alternatives
    }

    /// Windowed key finding over the chroma frames. A window whose key
    /// differs with reasonable confidence opens a new segment; otherwise
    /// confidence is smoothed into the running segment.
    fn detect_modulations(
        &self,
        chroma_frames: &[[f32; 12]],
        frame_rate: f32,
    ) -> Vec<Segment<String>> {
        let n_frames = chroma_frames.len();
        let duration = n_frames as f64 / frame_rate as f64;
        let window_frames = (KEY_MOD_WINDOW_SECS * frame_rate as f64) as usize;
        let hop_frames = ((KEY_MOD_HOP_SECS * frame_rate as f64) as usize).max(1);

        if n_frames < window_frames || window_frames == 0 {
            let global = chroma::global_profile(chroma_frames);
            let (key, conf, _) = self.find_key(&global);
            return vec![Segment {
                start: 0.0,
                end: duration,
                value: key,
                confidence: conf,
            }];
        }

        let mut segments: Vec<Segment<String>> = Vec::new();
        let mut current_key: Option<String> = None;
        let mut current_conf = 0.0f64;
        let mut segment_start = 0.0f64;

        let mut frame = 0usize;
        while frame < n_frames.saturating_sub(window_frames / 2) {
            let end_frame = (frame + window_frames).min(n_frames);
            let window = chroma::global_profile(&chroma_frames[frame..end_frame]);
            let (key, conf, _) = self.find_key(&window);
            let time = frame as f64 / frame_rate as f64;

            match &current_key {
                None => {
                    current_key = Some(key);
                    current_conf = conf;
                    segment_start = 0.0;
                }
                Some(cur) if *cur != key && conf > KEY_LOW_CONFIDENCE => {
                    segments.push(Segment {
                        start: segment_start,
                        end: time,
                        value: cur.clone(),
                        confidence: round2(current_conf),
                    });
                    current_key = Some(key);
                    current_conf = conf;
                    segment_start = time;
                }
                Some(_) => {
                    current_conf = KEY_MOD_SMOOTHING * current_conf
                        + (1.0 - KEY_MOD_SMOOTHING) * conf;
                }
            }
            frame += hop_frames;
        }

        if let Some(key) = current_key {
            segments.push(Segment {
                start: segment_start,
                end: duration,
                value: key,
                confidence: round2(current_conf),
            });
        }

        merge_short_segments(segments, KEY_MOD_MIN_SEGMENT_SECS)
    }

    fn build_explanation(
        &self,
        key: &str,
        confidence: f64,
        alternatives: &[Candidate<String>],
    ) -> String {
        let mut parts: Vec<String> = Vec::new();

        if confidence >= KEY_HIGH_CONFIDENCE {
            parts.push(format!("Strong tonal center: {key}."));
        } else if confidence >= KEY_MEDIUM_CONFIDENCE {
            parts.push(format!("Clear tonal center: {key}."));
        } else if confidence >= KEY_LOW_CONFIDENCE {
            parts.push(format!("Moderate confidence: {key}."));
        } else {
            parts.push(format!("Ambiguous tonality; best guess {key}."));
        }

        if let Some(relative) = relative_key(key) {
            for alt in alternatives.iter().take(2) {
                if alt.value == relative {
                    if key.ends_with("major") {
                        parts.push(format!("The relative minor ({}) is also possible.", alt.value));
                    } else {
                        parts.push(format!("The relative major ({}) is also possible.", alt.value));
                    }
                    break;
                }
            }
        }

        parts.join(" ")
    }
}

/// Blend of three chroma views: harmonic spectrum (pitch accuracy),
/// energy-normalized smoothed chroma (noise robustness), and the raw
/// spectrum (temporal accuracy).
fn combined_chroma(
    spec: &crate::features::Spectrogram,
    harmonic_spec: &crate::features::Spectrogram,
    tuning: f32,
) -> Vec<[f32; 12]> {
    let opts = ChromaOptions {
        tuning_cents: tuning,
        ..ChromaOptions::default()
    };
    let harmonic = chroma::chroma_from_spectrogram(harmonic_spec, &opts);
    let cens = chroma::chroma_energy_normalized(harmonic_spec, &opts);
    let raw = chroma::chroma_from_spectrogram(spec, &opts);
    chroma::blend(&[
        (&harmonic, CHROMA_WEIGHT_HARMONIC),
        (&cens, CHROMA_WEIGHT_ENERGY_NORM),
        (&raw, CHROMA_WEIGHT_STFT),
    ])
}

/// Vocal presence from average spectral centroid and zero-crossing rate.
/// Both must exceed their thresholds; the score blends the two cues.
fn detect_vocals(spec: &crate::features::Spectrogram, samples: &[f32]) -> (bool, f64) {
    let centroids = spectral_centroid(spec);
    let zcr = zero_crossing_rate(samples, 2048, HOP_LENGTH);

    let avg_centroid = if centroids.is_empty() {
        0.0
    } else {
        centroids.iter().sum::<f32>() / centroids.len() as f32
    };
    let avg_zcr = if zcr.is_empty() {
        0.0
    } else {
        zcr.iter().sum::<f32>() / zcr.len() as f32
    };

    let centroid_score = (avg_centroid / VOCAL_CENTROID_NORM_HZ).min(1.0) as f64;
    let zcr_score = (avg_zcr / VOCAL_ZCR_NORM).min(1.0) as f64;
    let confidence = VOCAL_CENTROID_WEIGHT * centroid_score + VOCAL_ZCR_WEIGHT * zcr_score;

    let detected = avg_centroid > VOCAL_CENTROID_THRESHOLD_HZ && avg_zcr > VOCAL_ZCR_THRESHOLD;
    (detected, round2(confidence))
}

fn key_confidence(all_scores: &[(String, f64)], best_key: &str, best_score: f64) -> f64 {
    let relative = relative_key(best_key).unwrap_or_default();

    let mut sorted: Vec<&(String, f64)> = all_scores.iter().collect();
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    // The relative major/minor shares most of its scale tones, so it is
    // excluded when measuring separation
    let second_best = sorted
        .iter()
        .find(|(k, _)| k.as_str() != best_key && k.as_str() != relative)
        .map(|(_, s)| *s)
        .unwrap_or(0.0);

    let abs_factor = ((best_score + 1.0) / 2.0).clamp(0.0, 1.0);
    let sep_factor = ((best_score - second_best) * 3.0).clamp(0.0, 1.0);

    let avg: f64 = all_scores.iter().map(|(_, s)| s).sum::<f64>() / all_scores.len() as f64;
    let avg_factor = ((best_score - avg) * 2.0).clamp(0.0, 1.0);

    let confidence = KEY_CONF_ABS_WEIGHT * abs_factor
        + KEY_CONF_SEP_WEIGHT * sep_factor
        + KEY_CONF_AVG_WEIGHT * avg_factor;

    round2((confidence * KEY_CONF_SCALE).clamp(KEY_CONF_MIN, KEY_CONF_MAX))
}

fn relative_key(key: &str) -> Option<String> {
    let (pitch, mode) = key.rsplit_once(' ')?;
    let pitch_idx = (0..12).find(|&i| PitchClass::from_index(i).to_standard_notation() == pitch)?;
    match mode {
        "major" => Some(key_name(PitchClass::from_index((pitch_idx + 9) % 12), Mode::Minor)),
        "minor" => Some(key_name(PitchClass::from_index((pitch_idx + 3) % 12), Mode::Major)),
        _ => None,
    }
}

fn merge_short_segments(segments: Vec<Segment<String>>, min_duration: f64) -> Vec<Segment<String>> {
    if segments.len() <= 1 {
        return segments;
    }
    let mut merged: Vec<Segment<String>> = Vec::new();
    for seg in segments {
        if seg.duration() < min_duration {
            if let Some(prev) = merged.last_mut() {
                prev.end = seg.end;
                prev.confidence = prev.confidence.min(seg.confidence);
                continue;
            }
        }
        merged.push(seg);
    }
    merged
}

fn zscore(values: &[f64; 12]) -> [f64; 12] {
    let mean: f64 = values.iter().sum::<f64>() / 12.0;
    let var: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / 12.0;
    let std = var.sqrt() + 1e-10;
    let mut out = [0.0; 12];
    for (o, v) in out.iter_mut().zip(values.iter()) {
        *o = (v - mean) / std;
    }
    out
}

fn pearson(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a: f64 = a.iter().sum::<f64>() / 12.0;
    let mean_b: f64 = b.iter().sum::<f64>() / 12.0;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    let denom = (var_a * var_b).sqrt();
    if denom > 1e-12 {
        cov / denom
    } else {
        0.0
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
