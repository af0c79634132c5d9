//! Tempo estimation and beat tracking over onset envelopes

use crate::features::onset::{autocorrelate_normalized, remove_mean};

/// Slowest tempo considered anywhere in the pipeline
pub const BPM_MIN: f64 = 40.0;

/// Fastest tempo considered anywhere in the pipeline
pub const BPM_MAX: f64 = 220.0;

/// Transition cost weight for dynamic-programming beat tracking
const TIGHTNESS: f32 = 100.0;

/// Autocorrelation lag in frames for a BPM at a given frame rate
pub fn lag_for_bpm(bpm: f64, frame_rate: f32) -> f64 {
    60.0 * frame_rate as f64 / bpm
}

/// BPM corresponding to an autocorrelation lag in frames
pub fn bpm_for_lag(lag: f64, frame_rate: f32) -> f64 {
    60.0 * frame_rate as f64 / lag
}

/// Tempo estimate from the global autocorrelation of an onset envelope
///
/// Picks the strongest local maximum whose lag falls inside the valid BPM
/// range. Returns None for flat or too-short envelopes.
pub fn estimate_tempo_acf(onset_env: &[f32], frame_rate: f32) -> Option<f64> {
    let max_lag = (lag_for_bpm(BPM_MIN, frame_rate).ceil() as usize + 2).min(onset_env.len());
    if max_lag < 4 {
        return None;
    }

    let mut env = onset_env.to_vec();
    remove_mean(&mut env);
    let acf = autocorrelate_normalized(&env, max_lag);
    if acf.is_empty() {
        return None;
    }

    let lag_lo = lag_for_bpm(BPM_MAX, frame_rate).floor() as usize;
    let lag_lo = lag_lo.max(2);

    let mut best: Option<(usize, f32)> = None;
    for lag in lag_lo..acf.len().saturating_sub(1) {
        // Local maximum only
        if acf[lag] < acf[lag - 1] || acf[lag] < acf[lag + 1] {
            continue;
        }
        match best {
            Some((_, v)) if v >= acf[lag] => {}
            _ => best = Some((lag, acf[lag])),
        }
    }

    let (lag, strength) = best?;
    if strength <= 0.0 {
        return None;
    }
    Some(bpm_for_lag(lag as f64, frame_rate))
}

/// Time-lag tempogram: one normalized autocorrelation per analysis window
#[derive(Debug, Clone)]
pub struct Tempogram {
    /// `lag_acf[window][lag]`, each mean-removed and lag-0 normalized
    pub lag_acf: Vec<Vec<f32>>,
    pub frame_rate: f32,
    /// Envelope frame index where each window starts
    pub window_starts: Vec<usize>,
}

impl Tempogram {
    /// Elementwise mean of all window ACFs
    pub fn mean_lag_profile(&self) -> Vec<f32> {
        let max_len = self.lag_acf.iter().map(|w| w.len()).max().unwrap_or(0);
        if max_len == 0 {
            return Vec::new();
        }
        let mut profile = vec![0.0f32; max_len];
        let mut counts = vec![0u32; max_len];
        for window in &self.lag_acf {
            for (i, &v) in window.iter().enumerate() {
                profile[i] += v;
                counts[i] += 1;
            }
        }
        for (p, &c) in profile.iter_mut().zip(counts.iter()) {
            if c > 0 {
                *p /= c as f32;
            }
        }
        profile
    }

    /// Linearly interpolated profile strength at a fractional lag
    pub fn strength_at_lag(profile: &[f32], lag: f64) -> f32 {
        if profile.is_empty() || lag < 0.0 {
            return 0.0;
        }
        let idx = lag.floor() as usize;
        if idx + 1 >= profile.len() {
            return profile.last().copied().unwrap_or(0.0);
        }
        let frac = (lag - idx as f64) as f32;
        profile[idx] * (1.0 - frac) + profile[idx + 1] * frac
    }
}

/// Default tempogram window: ~12s of envelope at 43 frames/sec
pub const TEMPOGRAM_WINDOW: usize = 512;

/// Default tempogram hop between windows
pub const TEMPOGRAM_HOP: usize = 256;

/// Compute a time-lag tempogram over an onset envelope
///
/// Envelopes shorter than the window produce a single full-length window.
pub fn tempogram(onset_env: &[f32], frame_rate: f32, win: usize, hop: usize) -> Tempogram {
    let max_lag = lag_for_bpm(BPM_MIN, frame_rate).ceil() as usize + 2;

    let mut lag_acf = Vec::new();
    let mut window_starts = Vec::new();

    if onset_env.len() <= win {
        let mut env = onset_env.to_vec();
        remove_mean(&mut env);
        let acf = autocorrelate_normalized(&env, max_lag.min(env.len()));
        if !acf.is_empty() {
            lag_acf.push(acf);
            window_starts.push(0);
        }
    } else {
        let mut start = 0;
        while start + win <= onset_env.len() {
            let mut env = onset_env[start..start + win].to_vec();
            remove_mean(&mut env);
            let acf = autocorrelate_normalized(&env, max_lag.min(win));
            if !acf.is_empty() {
                lag_acf.push(acf);
                window_starts.push(start);
            }
            start += hop;
        }
    }

    Tempogram {
        lag_acf,
        frame_rate,
        window_starts,
    }
}

/// Tempo estimate from windowed autocorrelations
///
/// Each window votes with its dominant lag; the median of the per-window
/// BPMs is returned. More robust than the global ACF when the envelope is
/// non-stationary.
pub fn estimate_tempo_windowed(onset_env: &[f32], frame_rate: f32) -> Option<f64> {
    let tg = tempogram(onset_env, frame_rate, TEMPOGRAM_WINDOW, TEMPOGRAM_HOP);

    let lag_lo = (lag_for_bpm(BPM_MAX, frame_rate).floor() as usize).max(2);

    let mut bpms: Vec<f64> = Vec::new();
    for acf in &tg.lag_acf {
        let mut best: Option<(usize, f32)> = None;
        for lag in lag_lo..acf.len().saturating_sub(1) {
            if acf[lag] < acf[lag - 1] || acf[lag] < acf[lag + 1] {
                continue;
            }
            match best {
                Some((_, v)) if v >= acf[lag] => {}
                _ => best = Some((lag, acf[lag])),
            }
        }
        if let Some((lag, strength)) = best {
            if strength > 0.0 {
                bpms.push(bpm_for_lag(lag as f64, frame_rate));
            }
        }
    }

    if bpms.is_empty() {
        return None;
    }
    bpms.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some(bpms[bpms.len() / 2])
}

/// Dynamic-programming beat tracker
///
/// Finds the onset-aligned beat sequence closest to the given tempo by
/// maximizing accumulated onset strength with a log-spacing transition
/// penalty. Beat times are in seconds, strictly increasing.
pub fn track_beats(onset_env: &[f32], frame_rate: f32, bpm: f64) -> Vec<f64> {
    let n = onset_env.len();
    let period = lag_for_bpm(bpm, frame_rate);
    if n < 4 || !(1.0..n as f64).contains(&period) {
        return Vec::new();
    }

    // Normalize envelope so the transition penalty has consistent scale
    let max_env = onset_env.iter().cloned().fold(0.0f32, f32::max);
    let local: Vec<f32> = if max_env > 1e-10 {
        onset_env.iter().map(|&v| v / max_env).collect()
    } else {
        return Vec::new();
    };

    let win_lo = (period * 0.5).round() as usize;
    let win_hi = (period * 2.0).round() as usize;

    let mut cumscore = vec![0.0f32; n];
    let mut backlink: Vec<isize> = vec![-1; n];

    for i in 0..n {
        let mut best_score = 0.0f32;
        let mut best_j: isize = -1;

        let j_lo = i.saturating_sub(win_hi);
        let j_hi = i.saturating_sub(win_lo.max(1));
        if i >= win_lo.max(1) {
            for j in j_lo..=j_hi {
                let interval = (i - j) as f64;
                let cost = ((interval / period).ln() as f32).powi(2) * TIGHTNESS;
                let score = cumscore[j] - cost;
                if best_j < 0 || score > best_score {
                    best_score = score;
                    best_j = j as isize;
                }
            }
        }

        cumscore[i] = local[i] + if best_j >= 0 { best_score.max(0.0) } else { 0.0 };
        backlink[i] = best_j;
    }

    // Start backtracking from the strongest score near the end
    let tail_start = n.saturating_sub(win_hi.max(1));
    let mut end = tail_start;
    for i in tail_start..n {
        if cumscore[i] > cumscore[end] {
            end = i;
        }
    }

    let mut frames = Vec::new();
    let mut cursor = end as isize;
    while cursor >= 0 {
        frames.push(cursor as usize);
        cursor = backlink[cursor as usize];
    }
    frames.reverse();

    frames
        .iter()
        .map(|&f| f as f64 / frame_rate as f64)
        .collect()
}

/// Evenly spaced beat grid, used when the envelope carries no information
pub fn uniform_beats(duration_secs: f64, bpm: f64) -> Vec<f64> {
    if duration_secs <= 0.0 || bpm <= 0.0 {
        return Vec::new();
    }
    let interval = 60.0 / bpm;
    let count = (duration_secs / interval).floor() as usize;
    (0..=count).map(|i| i as f64 * interval).collect()
}
