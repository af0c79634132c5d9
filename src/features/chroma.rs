//! Chromagram extraction from magnitude spectrograms
//!
//! Each FFT bin is mapped to its nearest pitch class (C = 0) and its energy
//! accumulated into a 12-bin profile per frame. Three flavors are provided:
//! a plain mapping, an energy-normalized time-smoothed variant for
//! key-profile matching, and a bass-restricted variant for root emphasis.

use crate::features::spectral::Spectrogram;

/// Frequency range and tuning for chroma extraction
#[derive(Debug, Clone, Copy)]
pub struct ChromaOptions {
    /// Lowest frequency considered, Hz
    pub fmin: f32,
    /// Highest frequency considered, Hz
    pub fmax: f32,
    /// Tuning deviation from A440 in cents, subtracted before binning
    pub tuning_cents: f32,
}

impl Default for ChromaOptions {
    fn default() -> Self {
        Self {
            // C1 up to ~C8
            fmin: 32.7,
            fmax: 4186.0,
            tuning_cents: 0.0,
        }
    }
}

impl ChromaOptions {
    /// Bass register: roots and low harmonics only
    pub fn bass(tuning_cents: f32) -> Self {
        Self {
            fmin: 80.0,
            fmax: 400.0,
            tuning_cents,
        }
    }
}

/// Per-frame 12-bin chroma from a magnitude spectrogram
pub fn chroma_from_spectrogram(spec: &Spectrogram, opts: &ChromaOptions) -> Vec<[f32; 12]> {
    let num_bins = spec.num_bins();

    // Precompute the pitch class of every usable bin
    let classes: Vec<Option<usize>> = (0..num_bins)
        .map(|bin| {
            let f = spec.bin_frequency(bin);
            if f < opts.fmin || f > opts.fmax {
                return None;
            }
            // MIDI note number relative to A440, corrected for tuning
            let midi = 69.0 + 12.0 * (f / 440.0).log2() - opts.tuning_cents / 100.0;
            let class = (midi.round() as i32).rem_euclid(12) as usize;
            Some(class)
        })
        .collect();

    spec.mags
        .iter()
        .map(|frame| {
            let mut chroma = [0.0f32; 12];
            for (bin, &m) in frame.iter().enumerate() {
                if let Some(class) = classes[bin] {
                    chroma[class] += m * m;
                }
            }
            chroma
        })
        .collect()
}

/// Energy-normalized, time-smoothed chroma for robust key-profile matching
///
/// Frames are L1-normalized then averaged over a ~1 second window, which
/// suppresses transient voicings the way windowed energy statistics do.
pub fn chroma_energy_normalized(spec: &Spectrogram, opts: &ChromaOptions) -> Vec<[f32; 12]> {
    let raw = chroma_from_spectrogram(spec, opts);

    // L1 normalize each frame
    let normed: Vec<[f32; 12]> = raw
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total < 1e-10 {
                return [0.0; 12];
            }
            let mut out = [0.0f32; 12];
            for (o, &v) in out.iter_mut().zip(frame.iter()) {
                *o = v / total;
            }
            out
        })
        .collect();

    // Smooth over time
    let half = (spec.frame_rate() * 0.5) as usize;
    smooth_frames(&normed, half)
}

/// Moving-average smoothing over chroma frames with a +/- `half` window
fn smooth_frames(frames: &[[f32; 12]], half: usize) -> Vec<[f32; 12]> {
    let n = frames.len();
    (0..n)
        .map(|t| {
            let lo = t.saturating_sub(half);
            let hi = (t + half + 1).min(n);
            let count = (hi - lo) as f32;
            let mut out = [0.0f32; 12];
            for frame in &frames[lo..hi] {
                for (o, &v) in out.iter_mut().zip(frame.iter()) {
                    *o += v;
                }
            }
            for o in &mut out {
                *o /= count;
            }
            out
        })
        .collect()
}

/// Weighted per-frame blend of chroma flavors sharing one frame grid
pub fn blend(parts: &[(&[[f32; 12]], f32)]) -> Vec<[f32; 12]> {
    let n = parts
        .iter()
        .map(|(frames, _)| frames.len())
        .min()
        .unwrap_or(0);

    (0..n)
        .map(|t| {
            let mut out = [0.0f32; 12];
            for (frames, weight) in parts {
                // Normalize each source frame so weights compare like with like
                let total: f32 = frames[t].iter().sum();
                if total < 1e-10 {
                    continue;
                }
                for (o, &v) in out.iter_mut().zip(frames[t].iter()) {
                    *o += weight * v / total;
                }
            }
            out
        })
        .collect()
}

/// Energy-weighted global chroma profile, normalized to sum 1
///
/// Returns all zeros for silent input.
pub fn global_profile(frames: &[[f32; 12]]) -> [f64; 12] {
    let mut profile = [0.0f64; 12];
    for frame in frames {
        let energy: f32 = frame.iter().sum();
        for (p, &v) in profile.iter_mut().zip(frame.iter()) {
            *p += (v * energy) as f64;
        }
    }
    let total: f64 = profile.iter().sum();
    if total > 1e-10 {
        for p in &mut profile {
            *p /= total;
        }
    }
    profile
}
