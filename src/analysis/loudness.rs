//! Loudness and audio statistics
//!
//! Integrated and short-term loudness (K-weighting RMS approximation),
//! peak level, crest-factor dynamic range, brightness and loudness
//! curves, and tuning reference estimation.

use tracing::debug;

use crate::analysis::constants::*;
use crate::analysis::results::AudioStats;
use crate::features::pitch::{dominant_pitches, estimate_tuning_cents};
use crate::features::spectral::{spectral_centroid, stft_magnitudes};
use crate::features::{HOP_LENGTH, N_FFT};

pub struct LoudnessAnalyzer;

impl Default for LoudnessAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LoudnessAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32, estimate_tuning: bool) -> AudioStats {
        let (lufs_integrated, lufs_short_term_max) = measure_lufs(samples, sample_rate);
        let peak_dbfs = measure_peak(samples);
        let dynamic_range = crest_factor_db(samples);

        let spec = stft_magnitudes(samples, sample_rate, N_FFT, HOP_LENGTH);
        let brightness_curve = brightness_curve(&spec);
        let loudness_curve = loudness_curve(samples, sample_rate);

        let (tuning_reference, tuning_deviation_cents) = if estimate_tuning {
            tuning_estimate(&spec)
        } else {
            (440.0, 0.0)
        };
        debug!(
            lufs_integrated,
            peak_dbfs, tuning_reference, "loudness statistics computed"
        );

        AudioStats {
            lufs_integrated: round1(lufs_integrated),
            lufs_short_term_max: round1(lufs_short_term_max),
            peak_dbfs: round1(peak_dbfs),
            dynamic_range: round1(dynamic_range),
            brightness_curve,
            loudness_curve,
            tuning_reference: round1(tuning_reference),
            tuning_deviation_cents: round1(tuning_deviation_cents),
        }
    }
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (energy / samples.len() as f64).sqrt()
}

fn rms_to_lufs(rms: f64) -> f64 {
    if rms > 0.0 {
        20.0 * rms.log10() - LUFS_K_OFFSET
    } else {
        LUFS_SILENCE
    }
}

/// Integrated loudness plus the loudest 3-second short-term window.
/// Tracks shorter than one window report integrated + 3 dB for the
/// short-term figure.
fn measure_lufs(samples: &[f32], sample_rate: u32) -> (f64, f64) {
    let integrated = rms_to_lufs(rms(samples));

    let window = (LUFS_SHORT_TERM_WINDOW_SECS * sample_rate as f64) as usize;
    let hop = (LUFS_SHORT_TERM_HOP_SECS * sample_rate as f64) as usize;
    if window == 0 || hop == 0 || samples.len() <= window {
        return (integrated, integrated + 3.0);
    }

    let mut short_term_max = f64::NEG_INFINITY;
    let mut start = 0usize;
    while start + window <= samples.len() {
        let value = rms_to_lufs(rms(&samples[start..start + window]));
        if value.is_finite() {
            short_term_max = short_term_max.max(value);
        }
        start += hop;
    }

    if short_term_max.is_finite() {
        (integrated, short_term_max)
    } else {
        (integrated, integrated)
    }
}

fn measure_peak(samples: &[f32]) -> f64 {
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max) as f64;
    if peak > 0.0 {
        20.0 * peak.log10()
    } else {
        PEAK_SILENCE_DBFS
    }
}

/// Crest factor (peak over RMS) in dB. High values mean dynamic
/// material, low values heavy compression.
fn crest_factor_db(samples: &[f32]) -> f64 {
    let rms = rms(samples);
    let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max) as f64;
    if rms > 0.0 {
        20.0 * (peak / rms).log10()
    } else {
        0.0
    }
}

/// Spectral centroid normalized into [0,1] over the typical 500-8000 Hz
/// span, downsampled to roughly one point per half second.
fn brightness_curve(spec: &crate::features::Spectrogram) -> Vec<(f64, f64)> {
    let centroids = spectral_centroid(spec);
    let frame_rate = spec.frame_rate();
    let step = ((BRIGHTNESS_CURVE_HOP_SECS * frame_rate as f64) as usize).max(1);

    centroids
        .iter()
        .enumerate()
        .step_by(step)
        .map(|(i, &c)| {
            let brightness = ((c - BRIGHTNESS_MIN_HZ) / BRIGHTNESS_SPAN_HZ).clamp(0.0, 1.0) as f64;
            (round2(spec.frame_time(i)), round3(brightness))
        })
        .collect()
}

/// Short-term loudness curve: 400 ms RMS windows every 100 ms.
fn loudness_curve(samples: &[f32], sample_rate: u32) -> Vec<(f64, f64)> {
    let window = (LOUDNESS_CURVE_WINDOW_SECS * sample_rate as f64) as usize;
    let hop = (LOUDNESS_CURVE_HOP_SECS * sample_rate as f64) as usize;
    if window == 0 || hop == 0 || samples.len() <= window {
        return Vec::new();
    }

    let mut curve = Vec::new();
    let mut start = 0usize;
    while start + window <= samples.len() {
        let loudness = rms_to_lufs(rms(&samples[start..start + window]));
        let time = start as f64 / sample_rate as f64;
        curve.push((round2(time), round1(loudness)));
        start += hop;
    }
    curve
}

/// Most music tunes A4 to 440 Hz but some material sits at 432, 442 and
/// similar. The median cents deviation of prominent pitches near an A
/// octave gives the actual reference.
fn tuning_estimate(spec: &crate::features::Spectrogram) -> (f64, f64) {
    let pitches = dominant_pitches(spec, 0.1);
    if pitches.is_empty() {
        return (440.0, 0.0);
    }

    let mut deviations: Vec<f64> = Vec::new();
    for &pitch in &pitches {
        for octave in -4i32..5 {
            let a_freq = 440.0 * 2f64.powi(octave);
            let cents = 1200.0 * ((pitch as f64) / a_freq).log2();
            if cents.abs() < TUNING_A_WINDOW_CENTS as f64 {
                deviations.push(cents);
            }
        }
    }
    if deviations.is_empty() {
        // Fall back to the chromatic tuning estimate over all pitches
        let cents = estimate_tuning_cents(&pitches) as f64;
        return (440.0 * 2f64.powf(cents / 1200.0), cents);
    }

    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = deviations[deviations.len() / 2];
    (440.0 * 2f64.powf(median / 1200.0), median)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, secs: f64, amp: f32, sample_rate: u32) -> Vec<f32> {
        let n = (secs * sample_rate as f64) as usize;
        (0..n)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn full_scale_sine_levels() {
        let samples = sine(440.0, 5.0, 1.0, 22050);
        let stats = LoudnessAnalyzer::new().analyze(&samples, 22050, true);
        // Peak of a unit sine is 0 dBFS, RMS is -3.01 dB
        assert!(stats.peak_dbfs.abs() < 0.2, "peak {}", stats.peak_dbfs);
        assert!((stats.dynamic_range - 3.0).abs() < 0.5);
        assert!((stats.lufs_integrated - (-3.7)).abs() < 0.5);
    }

    #[test]
    fn silence_hits_floors() {
        let samples = vec![0.0f32; 22050 * 4];
        let stats = LoudnessAnalyzer::new().analyze(&samples, 22050, true);
        assert!((stats.lufs_integrated - LUFS_SILENCE).abs() < 1e-9);
        assert!((stats.peak_dbfs - PEAK_SILENCE_DBFS).abs() < 1e-9);
        assert!((stats.dynamic_range).abs() < 1e-9);
        assert!((stats.tuning_reference - 440.0).abs() < 1e-9);
    }

    #[test]
    fn short_term_max_at_least_integrated() {
        let mut samples = sine(440.0, 4.0, 0.1, 22050);
        samples.extend(sine(440.0, 4.0, 0.8, 22050));
        let stats = LoudnessAnalyzer::new().analyze(&samples, 22050, false);
        assert!(stats.lufs_short_term_max >= stats.lufs_integrated);
    }

    #[test]
    fn curves_are_time_ordered() {
        let samples = sine(1000.0, 6.0, 0.5, 22050);
        let stats = LoudnessAnalyzer::new().analyze(&samples, 22050, false);
        for pair in stats.brightness_curve.windows(2) {
            assert!(pair[1].0 > pair[0].0);
        }
        for pair in stats.loudness_curve.windows(2) {
            assert!(pair[1].0 > pair[0].0);
        }
        for &(_, b) in &stats.brightness_curve {
            assert!((0.0..=1.0).contains(&b));
        }
    }

    #[test]
    fn detuned_tone_shifts_tuning_reference() {
        // A4 at 445 Hz is about +19.6 cents sharp
        let samples = sine(445.0, 6.0, 0.5, 22050);
        let stats = LoudnessAnalyzer::new().analyze(&samples, 22050, true);
        assert!(
            stats.tuning_deviation_cents > 5.0 && stats.tuning_deviation_cents < 40.0,
            "cents {}",
            stats.tuning_deviation_cents
        );
        assert!(stats.tuning_reference > 441.0);
    }
}
