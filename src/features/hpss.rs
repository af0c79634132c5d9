//! Harmonic/percussive separation on magnitude spectrograms
//!
//! Median-filtering separation: harmonic content is smooth along time,
//! percussive content is smooth along frequency. A soft Wiener-style mask
//! built from the two median estimates is applied to the magnitudes. The
//! separated spectrogram feeds chroma and pitch extraction directly, so no
//! time-domain reconstruction is needed.

use crate::features::spectral::Spectrogram;

/// Median filter length along each axis (frames / bins)
const KERNEL: usize = 17;

/// Extract the harmonic component of a magnitude spectrogram
pub fn harmonic(spec: &Spectrogram) -> Spectrogram {
    let num_frames = spec.num_frames();
    if num_frames == 0 {
        return spec.clone();
    }
    let num_bins = spec.mags[0].len();
    let half = KERNEL / 2;

    // Harmonic estimate: median across time for each frequency bin
    let mut harm = vec![vec![0.0f32; num_bins]; num_frames];
    let mut column = Vec::with_capacity(KERNEL);
    for bin in 0..num_bins {
        for t in 0..num_frames {
            let lo = t.saturating_sub(half);
            let hi = (t + half + 1).min(num_frames);
            column.clear();
            column.extend((lo..hi).map(|i| spec.mags[i][bin]));
            harm[t][bin] = median(&mut column);
        }
    }

    // Percussive estimate: median across frequency for each frame
    let mut perc = vec![vec![0.0f32; num_bins]; num_frames];
    let mut row = Vec::with_capacity(KERNEL);
    for t in 0..num_frames {
        for bin in 0..num_bins {
            let lo = bin.saturating_sub(half);
            let hi = (bin + half + 1).min(num_bins);
            row.clear();
            row.extend_from_slice(&spec.mags[t][lo..hi]);
            perc[t][bin] = median(&mut row);
        }
    }

    // Soft mask from squared estimates
    let mags = (0..num_frames)
        .map(|t| {
            (0..num_bins)
                .map(|bin| {
                    let h2 = harm[t][bin] * harm[t][bin];
                    let p2 = perc[t][bin] * perc[t][bin];
                    let mask = h2 / (h2 + p2 + 1e-10);
                    spec.mags[t][bin] * mask
                })
                .collect()
        })
        .collect();

    Spectrogram {
        mags,
        n_fft: spec.n_fft,
        hop: spec.hop,
        sample_rate: spec.sample_rate,
    }
}

fn median(values: &mut [f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    values[values.len() / 2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::spectral::stft_magnitudes;
    use std::f32::consts::PI;

    #[test]
    fn test_harmonic_keeps_sustained_tone() {
        let sample_rate = 22050u32;
        // Sustained 440 Hz tone with a broadband click in the middle
        let mut samples: Vec<f32> = (0..sample_rate as usize)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let click_at = samples.len() / 2;
        for i in 0..64 {
            samples[click_at + i] += if i % 2 == 0 { 0.8 } else { -0.8 };
        }

        let spec = stft_magnitudes(&samples, sample_rate, 2048, 512);
        let harm = harmonic(&spec);

        // Energy at the tone's bin should survive the mask
        let tone_bin = (440.0 * 2048.0 / sample_rate as f32).round() as usize;
        let mid = harm.num_frames() / 4;
        let orig = spec.mags[mid][tone_bin];
        let kept = harm.mags[mid][tone_bin];
        assert!(kept > orig * 0.5, "tone energy lost: {} -> {}", orig, kept);
    }

    #[test]
    fn test_empty_spectrogram_passthrough() {
        let spec = stft_magnitudes(&[0.0; 10], 22050, 2048, 512);
        let harm = harmonic(&spec);
        assert_eq!(harm.num_frames(), 0);
    }
}
