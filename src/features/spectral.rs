//! STFT magnitude spectrograms and frame-level spectral descriptors

use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Magnitude spectrogram: `mags[frame][bin]` with `n_fft / 2 + 1` bins
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub mags: Vec<Vec<f32>>,
    pub n_fft: usize,
    pub hop: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    /// Number of time frames
    pub fn num_frames(&self) -> usize {
        self.mags.len()
    }

    /// Number of frequency bins per frame
    pub fn num_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Center frequency of a bin in Hz
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate as f32 / self.n_fft as f32
    }

    /// Frames per second of the frame grid
    pub fn frame_rate(&self) -> f32 {
        self.sample_rate as f32 / self.hop as f32
    }

    /// Time in seconds of a frame index
    pub fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 * self.hop as f64 / self.sample_rate as f64
    }
}

/// Compute an STFT magnitude spectrogram with a Hann window
///
/// Signals shorter than `n_fft` produce zero frames; callers must handle
/// empty spectrograms.
pub fn stft_magnitudes(samples: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> Spectrogram {
    let num_bins = n_fft / 2 + 1;

    if samples.len() < n_fft {
        return Spectrogram {
            mags: Vec::new(),
            n_fft,
            hop,
            sample_rate,
        };
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = hann_window(n_fft);

    let num_frames = (samples.len() - n_fft) / hop + 1;
    let mut mags = Vec::with_capacity(num_frames);
    let mut buffer: Vec<Complex<f32>> = vec![Complex::new(0.0, 0.0); n_fft];

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        for (i, &w) in window.iter().enumerate() {
            buffer[i] = Complex::new(samples[start + i] * w, 0.0);
        }

        fft.process(&mut buffer);

        let frame: Vec<f32> = buffer[..num_bins].iter().map(|c| c.norm()).collect();
        mags.push(frame);
    }

    Spectrogram {
        mags,
        n_fft,
        hop,
        sample_rate,
    }
}

/// Generate a Hann window of the given size
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

/// Spectral centroid per frame, in Hz
pub fn spectral_centroid(spec: &Spectrogram) -> Vec<f32> {
    spec.mags
        .iter()
        .map(|frame| {
            let total: f32 = frame.iter().sum();
            if total < 1e-10 {
                return 0.0;
            }
            let weighted: f32 = frame
                .iter()
                .enumerate()
                .map(|(bin, &m)| spec.bin_frequency(bin) * m)
                .sum();
            weighted / total
        })
        .collect()
}

/// Zero-crossing rate per frame (fraction of sign changes)
pub fn zero_crossing_rate(samples: &[f32], frame_len: usize, hop: usize) -> Vec<f32> {
    if samples.len() < frame_len {
        return Vec::new();
    }

    let num_frames = (samples.len() - frame_len) / hop + 1;
    let mut rates = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        let frame = &samples[start..start + frame_len];
        let crossings = frame
            .windows(2)
            .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
            .count();
        rates.push(crossings as f32 / (frame_len - 1) as f32);
    }

    rates
}

/// Number of log-spaced bands used to summarize each spectrum before the DCT
const TIMBRE_BANDS: usize = 32;

/// Cepstral timbre coefficients per frame
///
/// Log-band energies (log-spaced 50 Hz to Nyquist) followed by a DCT-II,
/// keeping the first `n_coeffs` coefficients. Captures the spectral envelope
/// shape for structural self-similarity.
pub fn timbre_coefficients(spec: &Spectrogram, n_coeffs: usize) -> Vec<Vec<f32>> {
    let nyquist = spec.sample_rate as f32 / 2.0;
    let f_lo = 50.0f32;
    let ratio = (nyquist / f_lo).ln() / TIMBRE_BANDS as f32;

    // Band edges, log spaced
    let edges: Vec<f32> = (0..=TIMBRE_BANDS)
        .map(|i| f_lo * (ratio * i as f32).exp())
        .collect();

    spec.mags
        .iter()
        .map(|frame| {
            let mut band_energy = vec![0.0f32; TIMBRE_BANDS];
            for (bin, &m) in frame.iter().enumerate() {
                let f = spec.bin_frequency(bin);
                if f < f_lo || f >= nyquist {
                    continue;
                }
                let band = (((f / f_lo).ln() / ratio) as usize).min(TIMBRE_BANDS - 1);
                debug_assert!(f >= edges[band]);
                band_energy[band] += m * m;
            }
            let log_energy: Vec<f32> = band_energy.iter().map(|&e| (e + 1e-10).ln()).collect();
            dct_ii(&log_energy, n_coeffs)
        })
        .collect()
}

/// DCT-II of a real vector, returning the first `n` coefficients
fn dct_ii(input: &[f32], n: usize) -> Vec<f32> {
    let len = input.len();
    (0..n.min(len))
        .map(|k| {
            input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI / len as f32 * (i as f32 + 0.5) * k as f32).cos())
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_hann_window_shape() {
        let window = hann_window(8);
        assert!(window[0] < 0.01);
        assert!(window[4] > 0.99);
    }

    #[test]
    fn test_stft_peak_at_sine_frequency() {
        let samples = sine(440.0, 22050, 1.0);
        let spec = stft_magnitudes(&samples, 22050, 2048, 512);
        assert!(!spec.mags.is_empty());

        let frame = &spec.mags[spec.num_frames() / 2];
        let peak_bin = frame
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap();
        let peak_freq = spec.bin_frequency(peak_bin);
        assert!(
            (peak_freq - 440.0).abs() < 22.0,
            "peak at {} Hz, expected ~440",
            peak_freq
        );
    }

    #[test]
    fn test_stft_short_signal_is_empty() {
        let spec = stft_magnitudes(&[0.0; 100], 22050, 2048, 512);
        assert_eq!(spec.num_frames(), 0);
    }

    #[test]
    fn test_spectral_centroid_tracks_frequency() {
        let low = sine(220.0, 22050, 0.5);
        let high = sine(4000.0, 22050, 0.5);

        let low_c = spectral_centroid(&stft_magnitudes(&low, 22050, 2048, 512));
        let high_c = spectral_centroid(&stft_magnitudes(&high, 22050, 2048, 512));

        let low_mean: f32 = low_c.iter().sum::<f32>() / low_c.len() as f32;
        let high_mean: f32 = high_c.iter().sum::<f32>() / high_c.len() as f32;
        assert!(high_mean > low_mean * 2.0);
    }

    #[test]
    fn test_zero_crossing_rate_scales_with_frequency() {
        let low = sine(100.0, 22050, 0.5);
        let high = sine(2000.0, 22050, 0.5);

        let low_z = zero_crossing_rate(&low, 1024, 512);
        let high_z = zero_crossing_rate(&high, 1024, 512);

        let low_mean: f32 = low_z.iter().sum::<f32>() / low_z.len() as f32;
        let high_mean: f32 = high_z.iter().sum::<f32>() / high_z.len() as f32;
        assert!(high_mean > low_mean * 5.0);
    }

    #[test]
    fn test_timbre_coefficients_shape() {
        let samples = sine(440.0, 22050, 0.5);
        let spec = stft_magnitudes(&samples, 22050, 2048, 512);
        let coeffs = timbre_coefficients(&spec, 13);
        assert_eq!(coeffs.len(), spec.num_frames());
        assert_eq!(coeffs[0].len(), 13);
    }
}
