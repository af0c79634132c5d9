//! Dominant pitch tracking and tuning estimation

use crate::features::spectral::Spectrogram;

/// Dominant frequency per frame, parabolically interpolated
///
/// Frames whose peak magnitude falls below `min_ratio` of the global peak
/// are skipped, so silence and noise floors contribute nothing.
pub fn dominant_pitches(spec: &Spectrogram, min_ratio: f32) -> Vec<f32> {
    let global_peak = spec
        .mags
        .iter()
        .flat_map(|f| f.iter())
        .cloned()
        .fold(0.0f32, f32::max);
    if global_peak < 1e-10 {
        return Vec::new();
    }
    let threshold = global_peak * min_ratio;

    let mut pitches = Vec::new();
    for frame in &spec.mags {
        let (peak_bin, &peak_mag) = match frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            Some(p) => p,
            None => continue,
        };
        if peak_mag < threshold || peak_bin == 0 || peak_bin + 1 >= frame.len() {
            continue;
        }

        // Parabolic interpolation around the peak bin
        let alpha = frame[peak_bin - 1];
        let beta = frame[peak_bin];
        let gamma = frame[peak_bin + 1];
        let denom = alpha - 2.0 * beta + gamma;
        let offset = if denom.abs() > 1e-10 {
            0.5 * (alpha - gamma) / denom
        } else {
            0.0
        };

        let freq = (peak_bin as f32 + offset) * spec.sample_rate as f32 / spec.n_fft as f32;
        if freq > 20.0 {
            pitches.push(freq);
        }
    }

    pitches
}

/// Estimate tuning deviation from A440 in cents, in [-50, 50)
///
/// Each pitch is reduced to its deviation from the nearest equal-tempered
/// semitone; the median deviation is the tuning estimate. Returns 0 when no
/// pitches are available.
pub fn estimate_tuning_cents(pitches: &[f32]) -> f32 {
    if pitches.is_empty() {
        return 0.0;
    }

    let mut deviations: Vec<f32> = pitches
        .iter()
        .map(|&f| {
            let cents = 1200.0 * (f / 440.0).log2();
            let mut dev = cents.rem_euclid(100.0);
            if dev >= 50.0 {
                dev -= 100.0;
            }
            dev
        })
        .collect();

    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    deviations[deviations.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectral::stft_magnitudes;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_dominant_pitch_of_sine() {
        let samples = sine(440.0, 22050, 1.0);
        let spec = stft_magnitudes(&samples, 22050, 4096, 512);
        let pitches = dominant_pitches(&spec, 0.1);
        assert!(!pitches.is_empty());

        let mean: f32 = pitches.iter().sum::<f32>() / pitches.len() as f32;
        assert!((mean - 440.0).abs() < 5.0, "mean pitch {}", mean);
    }

    #[test]
    fn test_tuning_of_in_tune_signal() {
        let samples = sine(440.0, 22050, 1.0);
        let spec = stft_magnitudes(&samples, 22050, 4096, 512);
        let pitches = dominant_pitches(&spec, 0.1);
        let cents = estimate_tuning_cents(&pitches);
        assert!(cents.abs() < 10.0, "tuning {} cents", cents);
    }

    #[test]
    fn test_tuning_of_detuned_signal() {
        // 25 cents sharp of A4
        let detuned = 440.0 * 2.0f32.powf(25.0 / 1200.0);
        let samples = sine(detuned, 22050, 1.0);
        let spec = stft_magnitudes(&samples, 22050, 4096, 512);
        let pitches = dominant_pitches(&spec, 0.1);
        let cents = estimate_tuning_cents(&pitches);
        assert!((cents - 25.0).abs() < 10.0, "tuning {} cents", cents);
    }

    #[test]
    fn test_silence_has_no_pitches() {
        let spec = stft_magnitudes(&vec![0.0; 22050], 22050, 4096, 512);
        assert!(dominant_pitches(&spec, 0.1).is_empty());
        assert_eq!(estimate_tuning_cents(&[]), 0.0);
    }
}
