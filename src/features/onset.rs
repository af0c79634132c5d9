//! Onset strength envelope and autocorrelation helpers

use crate::features::spectral::Spectrogram;

/// Onset strength envelope via spectral flux
///
/// Positive first differences of log-compressed magnitudes, summed over
/// frequency. One value per spectrogram frame; the first frame is 0.
pub fn onset_strength(spec: &Spectrogram) -> Vec<f32> {
    let n = spec.num_frames();
    if n == 0 {
        return Vec::new();
    }

    let mut env = Vec::with_capacity(n);
    env.push(0.0);

    for t in 1..n {
        let flux: f32 = spec.mags[t]
            .iter()
            .zip(spec.mags[t - 1].iter())
            .map(|(&cur, &prev)| {
                let d = (1.0 + cur).ln() - (1.0 + prev).ln();
                if d > 0.0 {
                    d
                } else {
                    0.0
                }
            })
            .sum();
        env.push(flux);
    }

    env
}

/// Raw autocorrelation of a signal up to `max_lag` (exclusive)
///
/// `result[0]` is the energy at lag 0; divide by it for a normalized ACF.
pub fn autocorrelate(signal: &[f32], max_lag: usize) -> Vec<f32> {
    let n = signal.len();
    let max_lag = max_lag.min(n);
    let mut acf = Vec::with_capacity(max_lag);

    for lag in 0..max_lag {
        let mut sum = 0.0f32;
        for i in 0..n - lag {
            sum += signal[i] * signal[i + lag];
        }
        acf.push(sum);
    }

    acf
}

/// Autocorrelation normalized by the lag-0 energy
///
/// Returns an empty vec when the signal has no energy.
pub fn autocorrelate_normalized(signal: &[f32], max_lag: usize) -> Vec<f32> {
    let mut acf = autocorrelate(signal, max_lag);
    let energy = acf.first().copied().unwrap_or(0.0);
    if energy < 1e-10 {
        return Vec::new();
    }
    for v in &mut acf {
        *v /= energy;
    }
    acf
}

/// Subtract the mean from a signal in place (for correlation-style ACFs)
pub fn remove_mean(signal: &mut [f32]) {
    if signal.is_empty() {
        return;
    }
    let mean = signal.iter().sum::<f32>() / signal.len() as f32;
    for v in signal.iter_mut() {
        *v -= mean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectral::stft_magnitudes;

    #[test]
    fn test_onset_strength_peaks_at_clicks() {
        // 0.5s of silence with a burst in the middle
        let sample_rate = 22050u32;
        let mut samples = vec![0.0f32; sample_rate as usize / 2];
        let click_at = samples.len() / 2;
        for i in 0..256 {
            samples[click_at + i] = if i % 2 == 0 { 0.9 } else { -0.9 };
        }

        let spec = stft_magnitudes(&samples, sample_rate, 1024, 256);
        let env = onset_strength(&spec);
        assert!(!env.is_empty());

        let peak_frame = env
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap();
        let peak_time = peak_frame as f32 * 256.0 / sample_rate as f32;
        let click_time = click_at as f32 / sample_rate as f32;
        assert!(
            (peak_time - click_time).abs() < 0.1,
            "peak at {:.2}s, click at {:.2}s",
            peak_time,
            click_time
        );
    }

    #[test]
    fn test_autocorrelate_periodic_signal() {
        // Period of 50 samples
        let signal: Vec<f32> = (0..500)
            .map(|i| if i % 50 == 0 { 1.0 } else { 0.0 })
            .collect();
        let acf = autocorrelate_normalized(&signal, 200);

        assert!((acf[0] - 1.0).abs() < 1e-6);
        assert!(acf[50] > 0.8);
        assert!(acf[25] < 0.2);
    }

    #[test]
    fn test_autocorrelate_silence() {
        let acf = autocorrelate_normalized(&[0.0; 100], 50);
        assert!(acf.is_empty());
    }
}
