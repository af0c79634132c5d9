//! Time signature / meter detection
//!
//! Scores a set of common meters with four independent pattern analyses
//! (beat accent autocorrelation, onset bar periodicity, tempogram bar
//! energy, harmonic rhythm) and combines them under commonness priors.
//! Meter detection is genuinely hard; ambiguous cases fall back to 4/4.

use tracing::debug;

use crate::analysis::constants::*;
use crate::analysis::results::MeterResult;
use crate::features::beat::{self, lag_for_bpm, tempogram, TEMPOGRAM_HOP, TEMPOGRAM_WINDOW};
use crate::features::chroma::{self, ChromaOptions};
use crate::features::onset::{autocorrelate, onset_strength};
use crate::features::spectral::stft_magnitudes;
use crate::features::{HOP_LENGTH, N_FFT};

/// Candidate meters: (name, beats per bar, beat unit)
const METERS: [(&str, u32, u32); 6] = [
    ("4/4", 4, 4),
    ("3/4", 3, 4),
    ("6/8", 6, 8),
    ("2/4", 2, 4),
    ("5/4", 5, 4),
    ("7/8", 7, 8),
];

pub struct MeterAnalyzer;

impl Default for MeterAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32, beat_times: &[f64]) -> MeterResult {
        if beat_times.len() < METER_MIN_BEATS {
            return fallback_result("Insufficient beat count");
        }

        let spec = stft_magnitudes(samples, sample_rate, N_FFT, HOP_LENGTH);
        let onset_env = onset_strength(&spec);
        let frame_rate = spec.frame_rate();

        let beat_strengths = beat_accents(&onset_env, frame_rate, beat_times);
        let strength_scores = score_accent_patterns(&beat_strengths);
        let onset_scores = score_onset_bar_periodicity(&onset_env, frame_rate, beat_times);
        let periodicity_scores = score_tempogram_periodicity(&onset_env, frame_rate);
        let harmonic_scores = score_harmonic_rhythm(&spec, frame_rate, beat_times);

        let mut combined: Vec<(&'static str, f64)> = Vec::with_capacity(METERS.len());
        for (i, (name, _, _)) in METERS.iter().enumerate() {
            let base = METER_WEIGHT_STRENGTH * strength_scores[i]
                + METER_WEIGHT_ONSET * onset_scores[i]
                + METER_WEIGHT_PERIODICITY * periodicity_scores[i]
                + METER_WEIGHT_HARMONIC * harmonic_scores[i];

            // Commonness prior: simple meters are far more frequent and
            // exotic ones need strong evidence to win
            let prior = match *name {
                "4/4" => METER_PRIOR_4_4,
                "3/4" | "6/8" => METER_PRIOR_SIMPLE,
                "5/4" | "7/8" => METER_PRIOR_EXOTIC,
                _ => 1.0,
            };
            combined.push((name, base * prior));
        }

        let (mut best_meter, best_score) = combined
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .copied()
            .expect("meter table is non-empty");

        let mut confidence = meter_confidence(&combined, best_meter);
        debug!(best_meter, best_score, confidence, "meter scores combined");

        let mut fallback_used = false;
        if matches!(best_meter, "5/4" | "7/8" | "2/4")
            && confidence < METER_EXOTIC_FALLBACK_CONFIDENCE
        {
            let score_4_4 = combined
                .iter()
                .find(|(m, _)| *m == "4/4")
                .map(|(_, s)| *s)
                .unwrap_or(0.0);
            if score_4_4 > best_score * METER_EXOTIC_FALLBACK_SCORE_RATIO {
                best_meter = "4/4";
                fallback_used = true;
                confidence = METER_EXOTIC_FALLBACK_RESULT_CONFIDENCE;
            }
        } else if confidence < METER_LOW_FALLBACK_CONFIDENCE {
            best_meter = "4/4";
            fallback_used = true;
            confidence = METER_FALLBACK_RESULT_CONFIDENCE;
        }

        let (numerator, denominator) = METERS
            .iter()
            .find(|(m, _, _)| *m == best_meter)
            .map(|(_, n, d)| (*n, *d))
            .unwrap_or((4, 4));

        let explanation = build_explanation(best_meter, confidence, &combined, fallback_used);

        MeterResult {
            value: best_meter.to_string(),
            numerator,
            denominator,
            confidence: round2(confidence),
            explanation,
            needs_confirmation: confidence < METER_MEDIUM_CONFIDENCE,
            fallback_used,
        }
    }
}

/// Onset envelope strength around each beat, normalized to the loudest
/// beat.
fn beat_accents(onset_env: &[f32], frame_rate: f32, beat_times: &[f64]) -> Vec<f64> {
    let mut strengths: Vec<f64> = beat_times
        .iter()
        .map(|&t| {
            let idx = (t * frame_rate as f64).round() as usize;
            let start = idx.saturating_sub(1);
            let end = (idx + 2).min(onset_env.len());
            if end > start {
                let window = &onset_env[start..end];
                let peak = window.iter().cloned().fold(0.0f32, f32::max) as f64;
                let mean =
                    window.iter().sum::<f32>() as f64 / window.len() as f64;
                peak + mean
            } else {
                0.0
            }
        })
        .collect();

    let max = strengths.iter().cloned().fold(0.0f64, f64::max);
    if max > 0.0 {
        for s in strengths.iter_mut() {
            *s /= max;
        }
    }
    strengths
}

/// Recurring accent patterns: autocorrelate the per-beat strengths and
/// read off the lag at beats-per-bar (boosted by the two-bar lag).
fn score_accent_patterns(beat_strengths: &[f64]) -> Vec<f64> {
    if beat_strengths.len() < 4 || beat_strengths.len() / 2 < 2 {
        return vec![0.5; METERS.len()];
    }

    let as_f32: Vec<f32> = beat_strengths.iter().map(|&s| s as f32).collect();
    let mut acf = autocorrelate(&as_f32, beat_strengths.len());
    if acf.is_empty() || acf[0] <= 0.0 {
        return vec![0.5; METERS.len()];
    }
    let norm = acf[0];
    for v in acf.iter_mut() {
        *v /= norm;
    }

    METERS
        .iter()
        .map(|&(_, bpb, _)| {
            let bpb = bpb as usize;
            if bpb < acf.len() {
                let mut score = acf[bpb] as f64;
                if 2 * bpb < acf.len() {
                    score = 0.7 * score + 0.3 * acf[2 * bpb] as f64;
                }
                score
            } else {
                0.0
            }
        })
        .collect()
}

/// Onset envelope autocorrelation at each meter's expected bar period.
fn score_onset_bar_periodicity(
    onset_env: &[f32],
    frame_rate: f32,
    beat_times: &[f64],
) -> Vec<f64> {
    if beat_times.len() < 8 {
        return vec![0.5; METERS.len()];
    }

    let intervals: Vec<f64> = beat_times.windows(2).map(|w| w[1] - w[0]).collect();
    let mean_interval = intervals.iter().sum::<f64>() / intervals.len() as f64;

    let max_lag = onset_env.len() / 2;
    if max_lag == 0 {
        return vec![0.5; METERS.len()];
    }
    let mut acf = autocorrelate(onset_env, max_lag);
    if acf.is_empty() || acf[0] <= 0.0 {
        return vec![0.5; METERS.len()];
    }
    let norm = acf[0];
    for v in acf.iter_mut() {
        *v /= norm;
    }

    METERS
        .iter()
        .map(|&(_, bpb, _)| {
            let bar_duration = mean_interval * bpb as f64;
            let lag = (bar_duration * frame_rate as f64) as usize;
            if lag == 0 || lag >= acf.len() {
                0.5
            } else {
                ((acf[lag] as f64 + 1.0) / 2.0).max(0.0)
            }
        })
        .collect()
}

/// Bar-level energy in the mean tempogram profile: each meter expects a
/// periodicity at main_tempo / beats_per_bar.
fn score_tempogram_periodicity(onset_env: &[f32], frame_rate: f32) -> Vec<f64> {
    let tg = tempogram(onset_env, frame_rate, TEMPOGRAM_WINDOW, TEMPOGRAM_HOP);
    let profile = tg.mean_lag_profile();
    if profile.is_empty() {
        return vec![0.5; METERS.len()];
    }

    let min_lag = lag_for_bpm(240.0, frame_rate).floor().max(1.0) as usize;
    let max_lag = (lag_for_bpm(40.0, frame_rate).ceil() as usize).min(profile.len() - 1);
    let main_tempo = if min_lag < max_lag {
        let mut best_lag = min_lag;
        let mut best_val = f32::NEG_INFINITY;
        for lag in min_lag..=max_lag {
            if profile[lag] > best_val {
                best_val = profile[lag];
                best_lag = lag;
            }
        }
        beat::bpm_for_lag(best_lag as f64, frame_rate)
    } else {
        120.0
    };

    let max_val = profile.iter().cloned().fold(0.0f32, f32::max) as f64 + 1e-10;
    METERS
        .iter()
        .map(|&(_, bpb, _)| {
            let bar_tempo = main_tempo / bpb as f64;
            let bar_strength =
                beat::Tempogram::strength_at_lag(&profile, lag_for_bpm(bar_tempo, frame_rate))
                    as f64
                    / max_val;
            let half_bar_strength = beat::Tempogram::strength_at_lag(
                &profile,
                lag_for_bpm(bar_tempo * 2.0, frame_rate),
            ) as f64
                / max_val;
            0.6 * bar_strength + 0.4 * half_bar_strength
        })
        .collect()
}

/// Harmonic rhythm: how often chords change. Chroma is synchronized to
/// beats, the change function (1 - cosine similarity of adjacent beats)
/// is autocorrelated, and each meter is scored at its bar lag. Very
/// discriminative between 3/4 and 4/4.
fn score_harmonic_rhythm(
    spec: &crate::features::Spectrogram,
    frame_rate: f32,
    beat_times: &[f64],
) -> Vec<f64> {
    if beat_times.len() < 8 {
        return vec![0.5; METERS.len()];
    }

    let frames = chroma::chroma_from_spectrogram(spec, &ChromaOptions::default());
    let n_frames = frames.len();
    let beat_frames: Vec<usize> = beat_times
        .iter()
        .map(|&t| (t * frame_rate as f64) as usize)
        .filter(|&f| f < n_frames)
        .collect();
    if beat_frames.len() < 4 {
        return vec![0.5; METERS.len()];
    }

    // Median chroma per beat span, L2-normalized
    let mut beat_chroma: Vec<[f32; 12]> = Vec::with_capacity(beat_frames.len() - 1);
    for pair in beat_frames.windows(2) {
        let (start, end) = (pair[0], pair[1].max(pair[0] + 1).min(n_frames));
        let mut agg = [0.0f32; 12];
        for pc in 0..12 {
            let mut vals: Vec<f32> = frames[start..end].iter().map(|f| f[pc]).collect();
            vals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            agg[pc] = vals[vals.len() / 2];
        }
        let norm = agg.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 1e-10 {
            for v in agg.iter_mut() {
                *v /= norm;
            }
        }
        beat_chroma.push(agg);
    }

    let hcdf: Vec<f32> = beat_chroma
        .windows(2)
        .map(|w| {
            let dot: f32 = (0..12).map(|i| w[0][i] * w[1][i]).sum();
            1.0 - dot
        })
        .collect();
    if hcdf.len() < 6 {
        return vec![0.5; METERS.len()];
    }

    let mut acf = autocorrelate(&hcdf, hcdf.len());
    if acf.is_empty() || acf[0] <= 0.0 {
        return vec![0.5; METERS.len()];
    }
    let norm = acf[0];
    for v in acf.iter_mut() {
        *v /= norm;
    }

    METERS
        .iter()
        .map(|&(_, bpb, _)| {
            let bpb = bpb as usize;
            if bpb < acf.len() {
                let mut score = acf[bpb] as f64;
                if 2 * bpb < acf.len() {
                    score = 0.6 * score + 0.4 * acf[2 * bpb] as f64;
                }
                score
            } else {
                0.0
            }
        })
        .collect()
}

fn meter_confidence(scores: &[(&'static str, f64)], best_meter: &str) -> f64 {
    let best_score = scores
        .iter()
        .find(|(m, _)| *m == best_meter)
        .map(|(_, s)| *s)
        .unwrap_or(0.0);
    let others: Vec<f64> = scores
        .iter()
        .filter(|(m, _)| *m != best_meter)
        .map(|(_, s)| *s)
        .collect();
    if others.is_empty() {
        return 0.50;
    }

    let second_best = others.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean: f64 = others.iter().sum::<f64>() / others.len() as f64;

    let separation = if second_best > 0.0 {
        (best_score - second_best) / second_best
    } else {
        1.0
    };
    let above_avg = if mean > 0.0 {
        (best_score - mean) / mean
    } else {
        1.0
    };

    let confidence = METER_CONF_SEP_WEIGHT * separation.min(1.0)
        + METER_CONF_AVG_WEIGHT * (above_avg * 0.5 + 0.5).min(1.0);
    confidence.clamp(METER_CONF_MIN, METER_CONF_MAX)
}

fn fallback_result(reason: &str) -> MeterResult {
    MeterResult {
        value: "4/4".to_string(),
        numerator: 4,
        denominator: 4,
        confidence: METER_FALLBACK_RESULT_CONFIDENCE,
        explanation: format!("{reason}. Defaulting to 4/4."),
        needs_confirmation: true,
        fallback_used: true,
    }
}

fn build_explanation(
    meter: &str,
    confidence: f64,
    scores: &[(&'static str, f64)],
    fallback_used: bool,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if fallback_used {
        parts.push("Low confidence; defaulting to 4/4.".to_string());
    } else if confidence >= METER_HIGH_CONFIDENCE {
        parts.push(format!("Strong {meter} pattern detected."));
    } else if confidence >= METER_MEDIUM_CONFIDENCE {
        parts.push(format!("Moderate confidence: {meter}."));
    } else {
        parts.push(format!("Best guess {meter} (low confidence)."));
    }

    if !fallback_used {
        let mut sorted: Vec<&(&'static str, f64)> = scores.iter().collect();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        if sorted.len() >= 2 && sorted[1].1 > 0.85 * sorted[0].1 {
            parts.push(format!("{} is also possible.", sorted[1].0));
        }
    }

    parts.join(" ")
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accented_clicks(
        bpm: f64,
        beats_per_bar: usize,
        duration_secs: f64,
        sample_rate: u32,
    ) -> (Vec<f32>, Vec<f64>) {
        let n = (duration_secs * sample_rate as f64) as usize;
        let mut samples = vec![0.0f32; n];
        let interval = 60.0 / bpm;
        let click_len = (0.02 * sample_rate as f64) as usize;
        let mut beats = Vec::new();
        let mut beat = 0usize;
        let mut t = 0.0;
        while t < duration_secs {
            let amp = if beat % beats_per_bar == 0 { 1.0 } else { 0.4 };
            let start = (t * sample_rate as f64) as usize;
            for i in 0..click_len.min(n.saturating_sub(start)) {
                let decay = 1.0 - i as f32 / click_len as f32;
                samples[start + i] = amp
                    * decay
                    * (2.0 * std::f32::consts::PI * 800.0 * i as f32 / sample_rate as f32).sin();
            }
            beats.push(t);
            beat += 1;
            t += interval;
        }
        (samples, beats)
    }

    #[test]
    fn too_few_beats_falls_back() {
        let result = MeterAnalyzer::new().analyze(&vec![0.0f32; 22050], 22050, &[0.0, 0.5, 1.0]);
        assert_eq!(result.value, "4/4");
        assert!(result.fallback_used);
        assert!(result.needs_confirmation);
    }

    #[test]
    fn result_has_valid_shape() {
        let (samples, beats) = accented_clicks(120.0, 4, 16.0, 22050);
        let result = MeterAnalyzer::new().analyze(&samples, 22050, &beats);
        assert!(METERS.iter().any(|(m, _, _)| *m == result.value));
        assert!((METER_CONF_MIN..=METER_CONF_MAX).contains(&result.confidence) || result.fallback_used);
        assert!(!result.explanation.is_empty());
        let expected: Vec<&str> = result.value.split('/').collect();
        assert_eq!(expected[0], result.numerator.to_string());
        assert_eq!(expected[1], result.denominator.to_string());
    }

    #[test]
    fn four_four_accents_favor_four_four() {
        let (samples, beats) = accented_clicks(120.0, 4, 24.0, 22050);
        let result = MeterAnalyzer::new().analyze(&samples, 22050, &beats);
        // Priors and the accent pattern should both point at 4/4 here
        assert_eq!(result.value, "4/4", "explanation: {}", result.explanation);
    }

    #[test]
    fn accent_pattern_scores_peak_at_bar_length() {
        // Strong every 4th beat
        let strengths: Vec<f64> = (0..32)
            .map(|i| if i % 4 == 0 { 1.0 } else { 0.3 })
            .collect();
        let scores = score_accent_patterns(&strengths);
        let idx_4_4 = METERS.iter().position(|(m, _, _)| *m == "4/4").unwrap();
        let idx_3_4 = METERS.iter().position(|(m, _, _)| *m == "3/4").unwrap();
        assert!(scores[idx_4_4] > scores[idx_3_4]);
    }

    #[test]
    fn confidence_stays_in_bounds() {
        let scores: Vec<(&'static str, f64)> = METERS.iter().map(|(m, _, _)| (*m, 0.5)).collect();
        let conf = meter_confidence(&scores, "4/4");
        assert!((METER_CONF_MIN..=METER_CONF_MAX).contains(&conf));
    }
}
