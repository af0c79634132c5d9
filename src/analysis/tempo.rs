//! Tempo and beat detection
//!
//! Ensemble of autocorrelation-based estimators, optionally backed by a
//! learned predictor, with octave-error correction driven by onset
//! envelope periodicity. Produces a beat grid, downbeat estimates and
//! per-section tempo segments alongside the global BPM.

use tracing::debug;

use crate::analysis::constants::*;
use crate::analysis::results::{CountIn, TempoResult};
use crate::features::beat::{
    self, lag_for_bpm, tempogram, TEMPOGRAM_HOP, TEMPOGRAM_WINDOW,
};
use crate::features::onset::{autocorrelate, onset_strength};
use crate::features::spectral::stft_magnitudes;
use crate::features::{HOP_LENGTH, N_FFT};
use crate::types::{Candidate, Segment};

/// Pluggable learned tempo estimator. When present its estimate joins
/// the ensemble with the highest weight; when absent the signal-based
/// methods carry the vote on their own.
pub trait TempoPredictor: Send + Sync {
    fn predict(&self, samples: &[f32], sample_rate: u32) -> Option<f64>;
}

/// One method's vote: name, BPM folded into the canonical octave,
/// prior weight, original unfolded BPM.
struct TempoEstimate {
    method: &'static str,
    norm_bpm: f64,
    weight: f64,
    raw_bpm: f64,
}

pub struct TempoAnalyzer {
    predictor: Option<Box<dyn TempoPredictor>>,
}

impl Default for TempoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoAnalyzer {
    pub fn new() -> Self {
        Self { predictor: None }
    }

    pub fn with_predictor(predictor: Box<dyn TempoPredictor>) -> Self {
        Self {
            predictor: Some(predictor),
        }
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> TempoResult {
        let spec = stft_magnitudes(samples, sample_rate, N_FFT, HOP_LENGTH);
        let onset_env = onset_strength(&spec);
        let frame_rate = spec.frame_rate();
        let duration = samples.len() as f64 / sample_rate as f64;

        let signal_quality = signal_quality(&onset_env);

        let mut estimates: Vec<TempoEstimate> = Vec::new();

        let learned_bpm = self
            .predictor
            .as_ref()
            .and_then(|p| p.predict(samples, sample_rate));
        if let Some(bpm) = learned_bpm {
            let weight = if signal_quality > 0.5 {
                TEMPO_WEIGHT_LEARNED_GOOD
            } else {
                TEMPO_WEIGHT_LEARNED_POOR
            };
            estimates.push(TempoEstimate {
                method: "learned",
                norm_bpm: normalize_to_range(bpm),
                weight,
                raw_bpm: bpm,
            });
        }

        if let Some(bpm) = tempogram_tempo(&onset_env, frame_rate) {
            estimates.push(TempoEstimate {
                method: "tempogram",
                norm_bpm: normalize_to_range(bpm),
                weight: TEMPO_WEIGHT_BEAT_TRACK,
                raw_bpm: bpm,
            });
        }

        if let Some(bpm) = beat::estimate_tempo_windowed(&onset_env, frame_rate) {
            estimates.push(TempoEstimate {
                method: "windowed",
                norm_bpm: normalize_to_range(bpm),
                weight: TEMPO_WEIGHT_WINDOWED,
                raw_bpm: bpm,
            });
        }

        if let Some(bpm) = beat::estimate_tempo_acf(&onset_env, frame_rate) {
            estimates.push(TempoEstimate {
                method: "acf",
                norm_bpm: normalize_to_range(bpm),
                weight: TEMPO_WEIGHT_ACF,
                raw_bpm: bpm,
            });
        }

        for est in &estimates {
            debug!(
                method = est.method,
                raw_bpm = est.raw_bpm,
                norm_bpm = est.norm_bpm,
                weight = est.weight,
                "tempo method vote"
            );
        }

        let (ensemble_bpm, confidence, candidates) =
            ensemble_tempo(&estimates, &onset_env, learned_bpm.is_some());

        let final_bpm = octave_correction(ensemble_bpm, &onset_env, frame_rate);
        debug!(ensemble_bpm, final_bpm, confidence, "tempo ensemble settled");

        let mut beats = beat::track_beats(&onset_env, frame_rate, final_bpm);
        if beats.is_empty() {
            beats = beat::uniform_beats(duration, final_bpm);
        }

        let downbeats = estimate_downbeats(samples, sample_rate, &beats);
        let segments = detect_tempo_changes(&onset_env, frame_rate, duration, final_bpm);
        let explanation =
            build_explanation(final_bpm, confidence, &candidates, learned_bpm.is_some());

        TempoResult {
            global_bpm: final_bpm,
            confidence,
            explanation,
            needs_confirmation: confidence < TEMPO_LOW_CONFIDENCE,
            candidates,
            segments,
            beats,
            downbeats,
            count_in: Some(CountIn {
                bars: 1,
                click_bpm: final_bpm,
                meter: "4/4".to_string(),
                beats_per_bar: 4,
            }),
        }
    }
}

/// Fold a BPM into the canonical 60-180 octave.
fn normalize_to_range(mut bpm: f64) -> f64 {
    if bpm <= 0.0 {
        return TEMPO_FALLBACK_BPM;
    }
    while bpm < TEMPO_RANGE_MIN {
        bpm *= 2.0;
    }
    while bpm > TEMPO_RANGE_MAX {
        bpm /= 2.0;
    }
    bpm
}

/// Heuristic signal quality in [0.1, 1.0] from onset envelope shape.
/// Clear beats show a high peak-to-mean ratio and moderate variation.
fn signal_quality(onset_env: &[f32]) -> f64 {
    if onset_env.is_empty() {
        return 0.3;
    }
    let mean = onset_env.iter().sum::<f32>() / onset_env.len() as f32;
    if mean <= 0.0 {
        return 0.3;
    }
    let peak = onset_env.iter().cloned().fold(0.0f32, f32::max);
    let peak_to_mean = (peak / (mean + 1e-10)) as f64;
    let peak_score = ((peak_to_mean - 2.0) / 6.0).clamp(0.0, 1.0);

    let var = onset_env
        .iter()
        .map(|&x| {
            let d = x - mean;
            d * d
        })
        .sum::<f32>()
        / onset_env.len() as f32;
    let cv = (var.sqrt() / (mean + 1e-10)) as f64;
    let variance_score = (1.0 - (cv - 1.5).abs() / 2.0).clamp(0.0, 1.0);

    (0.6 * peak_score + 0.4 * variance_score).clamp(0.1, 1.0)
}

/// Global tempo from the mean lag profile of a windowed autocorrelation
/// tempogram.
fn tempogram_tempo(onset_env: &[f32], frame_rate: f32) -> Option<f64> {
    let tg = tempogram(onset_env, frame_rate, TEMPOGRAM_WINDOW, TEMPOGRAM_HOP);
    let profile = tg.mean_lag_profile();
    if profile.is_empty() {
        return None;
    }

    let min_lag = lag_for_bpm(beat::BPM_MAX, frame_rate).floor().max(1.0) as usize;
    let max_lag = (lag_for_bpm(beat::BPM_MIN, frame_rate).ceil() as usize).min(profile.len() - 1);
    if min_lag >= max_lag {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best_val = 0.0f32;
    for lag in min_lag..=max_lag {
        if profile[lag] > best_val {
            best_val = profile[lag];
            best_lag = lag;
        }
    }
    if best_lag == 0 || best_val <= 0.0 {
        return None;
    }
    Some(beat::bpm_for_lag(best_lag as f64, frame_rate))
}

/// Weighted voting across the method estimates. Votes are clustered by
/// octave-folded BPM with 5% tolerance; the heaviest cluster wins and
/// its weighted mean becomes the global tempo.
fn ensemble_tempo(
    estimates: &[TempoEstimate],
    onset_env: &[f32],
    has_learned: bool,
) -> (f64, f64, Vec<Candidate<f64>>) {
    if estimates.is_empty() {
        return (TEMPO_FALLBACK_BPM, TEMPO_FALLBACK_CONFIDENCE, Vec::new());
    }

    // Cluster centers hold indices into `estimates`
    let mut clusters: Vec<(f64, Vec<usize>)> = Vec::new();
    for (i, est) in estimates.iter().enumerate() {
        let mut placed = false;
        for (center, members) in clusters.iter_mut() {
            if (est.norm_bpm - *center).abs() / *center < TEMPO_CLUSTER_TOLERANCE {
                members.push(i);
                placed = true;
                break;
            }
        }
        if !placed {
            clusters.push((est.norm_bpm, vec![i]));
        }
    }

    let best = clusters
        .iter()
        .max_by(|a, b| {
            let wa: f64 = a.1.iter().map(|&i| estimates[i].weight).sum();
            let wb: f64 = b.1.iter().map(|&i| estimates[i].weight).sum();
            wa.partial_cmp(&wb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("clusters is non-empty when estimates is non-empty");

    let weight_sum: f64 = best.1.iter().map(|&i| estimates[i].weight).sum();
    let final_bpm = if weight_sum > 0.0 {
        let weighted: f64 = best
            .1
            .iter()
            .map(|&i| estimates[i].norm_bpm * estimates[i].weight)
            .sum();
        weighted / weight_sum
    } else {
        best.0
    };
    let final_bpm = round1(final_bpm);

    let confidence = ensemble_confidence(estimates, final_bpm, onset_env, has_learned);
    let candidates = build_candidates(estimates, final_bpm);

    (final_bpm, confidence, candidates)
}

fn ensemble_confidence(
    estimates: &[TempoEstimate],
    final_bpm: f64,
    onset_env: &[f32],
    has_learned: bool,
) -> f64 {
    let mut total_weight = 0.0;
    let mut agreeing_weight = 0.0;
    let mut agreeing_methods = 0usize;
    for est in estimates {
        total_weight += est.weight;
        if (est.norm_bpm - final_bpm).abs() / final_bpm < TEMPO_CLUSTER_TOLERANCE {
            agreeing_weight += est.weight;
            agreeing_methods += 1;
        }
    }
    let agreement = if total_weight > 0.0 {
        agreeing_weight / total_weight
    } else {
        0.5
    };

    let consensus_bonus = if agreeing_methods >= 3 {
        TEMPO_CONSENSUS_BONUS_3
    } else if agreeing_methods >= 2 {
        TEMPO_CONSENSUS_BONUS_2
    } else {
        0.0
    };

    let learned_agrees = estimates
        .iter()
        .any(|e| e.method == "learned" && (e.norm_bpm - final_bpm).abs() / final_bpm < 0.03);

    let mut confidence = if learned_agrees {
        (agreement * 1.15 + consensus_bonus).min(TEMPO_CAP_LEARNED_AGREES)
    } else if has_learned {
        (agreement * 1.05 + consensus_bonus).min(TEMPO_CAP_LEARNED_PRESENT)
    } else {
        (agreement + consensus_bonus).min(TEMPO_CAP_ENSEMBLE_ONLY)
    };

    // A nearly flat onset envelope means the rhythm itself is ambiguous
    if !onset_env.is_empty() {
        let mean = onset_env.iter().sum::<f32>() / onset_env.len() as f32;
        let var = onset_env
            .iter()
            .map(|&x| {
                let d = x - mean;
                d * d
            })
            .sum::<f32>()
            / onset_env.len() as f32;
        let cv = var.sqrt() / (mean + 1e-10);
        if cv < TEMPO_FLAT_CV_THRESHOLD {
            confidence *= TEMPO_FLAT_PENALTY;
        }
    }

    round2(confidence.max(TEMPO_CONFIDENCE_FLOOR))
}

/// Candidate list: the winner first, then half/double time, then any
/// dissenting method estimates.
fn build_candidates(estimates: &[TempoEstimate], final_bpm: f64) -> Vec<Candidate<f64>> {
    let mut candidates = Vec::new();
    let mut seen: Vec<i64> = Vec::new();

    let mut push = |bpm: f64, confidence: f64, candidates: &mut Vec<Candidate<f64>>| {
        let key = bpm.round() as i64;
        if !seen.contains(&key) {
            seen.push(key);
            candidates.push(Candidate {
                value: round1(bpm),
                confidence,
            });
        }
    };

    push(final_bpm, TEMPO_CANDIDATE_PRIMARY, &mut candidates);

    let half = final_bpm / 2.0;
    if (TEMPO_ABSOLUTE_MIN..=TEMPO_ABSOLUTE_MAX).contains(&half) {
        push(half, TEMPO_CANDIDATE_OCTAVE, &mut candidates);
    }
    let double = final_bpm * 2.0;
    if (TEMPO_ABSOLUTE_MIN..=TEMPO_ABSOLUTE_MAX).contains(&double) {
        push(double, TEMPO_CANDIDATE_OCTAVE, &mut candidates);
    }

    for est in estimates {
        let conf = round2((est.weight * TEMPO_CANDIDATE_METHOD_SCALE).min(TEMPO_CANDIDATE_METHOD_CAP));
        push(est.norm_bpm, conf, &mut candidates);
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(TEMPO_MAX_CANDIDATES);
    candidates
}

/// Pick between the estimate and its half/double octave by comparing
/// autocorrelation strength at the corresponding beat periods.
fn octave_correction(bpm: f64, onset_env: &[f32], frame_rate: f32) -> f64 {
    let max_lag = (onset_env.len() / 2)
        .min(lag_for_bpm(TEMPO_ABSOLUTE_MIN, frame_rate) as usize + 10);
    if max_lag < 10 {
        return bpm;
    }

    let mut acf = autocorrelate(onset_env, max_lag);
    if acf.is_empty() || acf[0] <= 0.0 {
        return bpm;
    }
    let norm = acf[0];
    for v in acf.iter_mut() {
        *v /= norm;
    }

    let strength_at = |tempo: f64| -> f32 {
        if tempo <= 0.0 {
            return 0.0;
        }
        let lag = (lag_for_bpm(tempo, frame_rate) as usize).max(1);
        if lag >= acf.len() {
            return 0.0;
        }
        let start = lag.saturating_sub(2);
        let end = (lag + 3).min(acf.len());
        acf[start..end].iter().cloned().fold(0.0f32, f32::max)
    };

    let current = strength_at(bpm);
    let half = bpm / 2.0;
    let half_strength = if half >= TEMPO_ABSOLUTE_MIN {
        strength_at(half)
    } else {
        0.0
    };
    let double = bpm * 2.0;
    let double_strength = if double <= TEMPO_ABSOLUTE_MAX {
        strength_at(double)
    } else {
        0.0
    };

    let mut best_bpm = bpm;
    let mut best_strength = current;

    if half_strength > current * OCTAVE_STRENGTH_RATIO
        && (OCTAVE_HALF_MIN..=OCTAVE_HALF_MAX).contains(&half)
    {
        best_bpm = half;
        best_strength = half_strength;
    }

    if double_strength > best_strength * OCTAVE_STRENGTH_RATIO
        && bpm < OCTAVE_DOUBLE_BELOW
        && double <= OCTAVE_DOUBLE_MAX
    {
        best_bpm = double;
    }

    round1(best_bpm)
}

/// Bar starts guessed from beat accents. The phase whose every-4th
/// beats carry the most RMS energy wins; with under 4 beats only the
/// first beat is reported.
fn estimate_downbeats(samples: &[f32], sample_rate: u32, beat_times: &[f64]) -> Vec<f64> {
    if beat_times.len() < 4 {
        return beat_times.first().map(|&t| vec![t]).unwrap_or_default();
    }

    let window = (0.05 * sample_rate as f64) as usize;
    let strengths: Vec<f64> = beat_times
        .iter()
        .map(|&t| {
            let center = (t * sample_rate as f64) as usize;
            let start = center.saturating_sub(window);
            let end = (center + window).min(samples.len());
            if end > start {
                let seg = &samples[start..end];
                let energy: f64 = seg.iter().map(|&s| (s as f64) * (s as f64)).sum();
                (energy / seg.len() as f64).sqrt()
            } else {
                0.0
            }
        })
        .collect();

    let meter = 4usize;
    let mut best_phase = 0usize;
    let mut best_score = -1.0f64;
    for phase in 0..meter {
        let accents: Vec<f64> = strengths.iter().skip(phase).step_by(meter).cloned().collect();
        if !accents.is_empty() {
            let score = accents.iter().sum::<f64>() / accents.len() as f64;
            if score > best_score {
                best_score = score;
                best_phase = phase;
            }
        }
    }

    beat_times
        .iter()
        .skip(best_phase)
        .step_by(meter)
        .cloned()
        .collect()
}

/// Windowed tempo over the track. Adjacent windows whose tempo moves by
/// more than 5% open a new segment; near-constant results collapse to a
/// single stable segment.
fn detect_tempo_changes(
    onset_env: &[f32],
    frame_rate: f32,
    duration: f64,
    global_bpm: f64,
) -> Vec<Segment<f64>> {
    let single = |confidence: f64| {
        vec![Segment {
            start: 0.0,
            end: duration,
            value: global_bpm,
            confidence,
        }]
    };

    if duration < TEMPO_DRIFT_MIN_DURATION {
        return single(TEMPO_SEGMENT_SHORT_CONFIDENCE);
    }

    let window_frames = (TEMPO_DRIFT_WINDOW_SECS * frame_rate as f64) as usize;
    let hop_frames = (TEMPO_DRIFT_HOP_SECS * frame_rate as f64) as usize;
    if window_frames == 0 || hop_frames == 0 || onset_env.len() < window_frames {
        return single(TEMPO_SEGMENT_SHORT_CONFIDENCE);
    }

    let mut segments: Vec<Segment<f64>> = Vec::new();
    let mut prev_tempo: Option<f64> = None;
    let mut segment_start = 0.0f64;
    let mut t = 0.0f64;

    while t + TEMPO_DRIFT_WINDOW_SECS <= duration {
        let start_frame = (t * frame_rate as f64) as usize;
        let end_frame = (start_frame + window_frames).min(onset_env.len());
        if end_frame <= start_frame {
            break;
        }
        let window = &onset_env[start_frame..end_frame];
        let tempo = beat::estimate_tempo_acf(window, frame_rate)
            .map(normalize_to_range)
            .unwrap_or_else(|| normalize_to_range(global_bpm));

        if let Some(prev) = prev_tempo {
            let change = (tempo - prev).abs() / prev;
            if change > TEMPO_DRIFT_CHANGE_THRESHOLD {
                segments.push(Segment {
                    start: segment_start,
                    end: t,
                    value: round1(prev),
                    confidence: TEMPO_SEGMENT_CONFIDENCE,
                });
                segment_start = t;
            }
        }
        prev_tempo = Some(tempo);
        t += TEMPO_DRIFT_HOP_SECS;
    }

    if let Some(prev) = prev_tempo {
        segments.push(Segment {
            start: segment_start,
            end: duration,
            value: round1(prev),
            confidence: TEMPO_SEGMENT_CONFIDENCE,
        });
    }

    if segments.len() > 1 {
        let min = segments.iter().map(|s| s.value).fold(f64::INFINITY, f64::min);
        let max = segments
            .iter()
            .map(|s| s.value)
            .fold(f64::NEG_INFINITY, f64::max);
        if max - min < TEMPO_DRIFT_STABLE_SPREAD {
            return single(TEMPO_SEGMENT_STABLE_CONFIDENCE);
        }
    }

    if segments.is_empty() {
        return single(TEMPO_SEGMENT_SHORT_CONFIDENCE);
    }
    segments
}

fn build_explanation(
    bpm: f64,
    confidence: f64,
    candidates: &[Candidate<f64>],
    used_learned: bool,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if used_learned {
        parts.push(format!("Learned model detected {bpm:.1} BPM."));
    } else {
        parts.push(format!("Ensemble analysis detected {bpm:.1} BPM."));
    }

    if confidence >= TEMPO_HIGH_CONFIDENCE {
        parts.push("High confidence - strong beat pattern.".to_string());
    } else if confidence >= TEMPO_MEDIUM_CONFIDENCE {
        parts.push("Good confidence - clear rhythmic structure.".to_string());
    } else if confidence >= TEMPO_LOW_CONFIDENCE {
        parts.push("Moderate confidence - verify by ear.".to_string());
    } else {
        parts.push("Low confidence - this is a best guess.".to_string());
    }

    let half = bpm / 2.0;
    let double = bpm * 2.0;
    let has_half = candidates.iter().any(|c| (c.value - half).abs() < 3.0);
    let has_double = candidates.iter().any(|c| (c.value - double).abs() < 3.0);

    if has_half && (TEMPO_ABSOLUTE_MIN..=TEMPO_ABSOLUTE_MAX).contains(&half) {
        parts.push(format!("Could also be half-time ({half:.0} BPM)."));
    } else if has_double && (TEMPO_ABSOLUTE_MIN..=TEMPO_ABSOLUTE_MAX).contains(&double) {
        parts.push(format!("Could also be double-time ({double:.0} BPM)."));
    }

    parts.join(" ")
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f64, duration_secs: f64, sample_rate: u32) -> Vec<f32> {
        let n = (duration_secs * sample_rate as f64) as usize;
        let mut samples = vec![0.0f32; n];
        let interval = 60.0 / bpm;
        let click_len = (0.01 * sample_rate as f64) as usize;
        let mut t = 0.0;
        while t < duration_secs {
            let start = (t * sample_rate as f64) as usize;
            for i in 0..click_len.min(n.saturating_sub(start)) {
                let decay = 1.0 - i as f32 / click_len as f32;
                samples[start + i] =
                    decay * (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin();
            }
            t += interval;
        }
        samples
    }

    fn is_octave_match(got: f64, expected: f64, tolerance: f64) -> bool {
        [0.5, 1.0, 2.0]
            .iter()
            .any(|m| (got - expected * m).abs() < tolerance)
    }

    #[test]
    fn click_track_tempo_detected() {
        let samples = click_track(120.0, 12.0, 22050);
        let result = TempoAnalyzer::new().analyze(&samples, 22050);
        assert!(
            is_octave_match(result.global_bpm, 120.0, 4.0),
            "got {} BPM",
            result.global_bpm
        );
        assert!(result.confidence >= 0.3 && result.confidence <= 1.0);
        assert!(!result.explanation.is_empty());
        assert!(!result.beats.is_empty());
    }

    #[test]
    fn beats_are_monotonic() {
        let samples = click_track(100.0, 10.0, 22050);
        let result = TempoAnalyzer::new().analyze(&samples, 22050);
        for pair in result.beats.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn downbeats_are_subset_of_beats() {
        let samples = click_track(120.0, 12.0, 22050);
        let result = TempoAnalyzer::new().analyze(&samples, 22050);
        for db in &result.downbeats {
            assert!(result.beats.iter().any(|b| (b - db).abs() < 1e-9));
        }
    }

    #[test]
    fn silence_falls_back_with_floor_confidence() {
        let samples = vec![0.0f32; 22050 * 5];
        let result = TempoAnalyzer::new().analyze(&samples, 22050);
        assert!(result.global_bpm >= TEMPO_ABSOLUTE_MIN);
        assert!(result.confidence >= TEMPO_CONFIDENCE_FLOOR);
        assert!(!result.explanation.is_empty());
    }

    #[test]
    fn count_in_defaults_to_one_bar() {
        let samples = click_track(120.0, 8.0, 22050);
        let result = TempoAnalyzer::new().analyze(&samples, 22050);
        let count_in = result.count_in.expect("count-in present");
        assert_eq!(count_in.bars, 1);
        assert_eq!(count_in.beats_per_bar, 4);
        assert!((count_in.click_bpm - result.global_bpm).abs() < 1e-9);
    }

    #[test]
    fn normalize_folds_octaves() {
        assert!((normalize_to_range(240.0) - 120.0).abs() < 1e-9);
        assert!((normalize_to_range(45.0) - 90.0).abs() < 1e-9);
        assert!((normalize_to_range(120.0) - 120.0).abs() < 1e-9);
    }

    #[test]
    fn candidates_include_half_and_double() {
        let estimates = vec![TempoEstimate {
            method: "acf",
            norm_bpm: 120.0,
            weight: 0.60,
            raw_bpm: 120.0,
        }];
        let candidates = build_candidates(&estimates, 120.0);
        assert!((candidates[0].value - 120.0).abs() < 1e-9);
        assert!(candidates.iter().any(|c| (c.value - 60.0).abs() < 1e-9));
        assert!(!candidates.iter().any(|c| (c.value - 240.0).abs() < 1e-9));
        assert!(candidates.len() <= TEMPO_MAX_CANDIDATES);
    }

    struct FixedPredictor(f64);
    impl TempoPredictor for FixedPredictor {
        fn predict(&self, _samples: &[f32], _sample_rate: u32) -> Option<f64> {
            Some(self.0)
        }
    }

    #[test]
    fn learned_predictor_joins_ensemble() {
        let samples = click_track(120.0, 10.0, 22050);
        let result =
            TempoAnalyzer::with_predictor(Box::new(FixedPredictor(120.0))).analyze(&samples, 22050);
        assert!(is_octave_match(result.global_bpm, 120.0, 4.0));
        assert!(result.explanation.starts_with("Learned model"));
    }
}
