//! Song structure segmentation
//!
//! Chroma and timbre features are aggregated into coarse time cells, a
//! self-similarity matrix is built over the cells, and section
//! boundaries are picked from a checkerboard-kernel novelty curve.
//! Structure detection is best-effort; labels are approximate.

use tracing::debug;

use crate::analysis::constants::*;
use crate::analysis::results::{StructureResult, StructureSegment};
use crate::features::chroma::{self, ChromaOptions};
use crate::features::spectral::{stft_magnitudes, timbre_coefficients};
use crate::features::{HOP_LENGTH, N_FFT};

/// Cell length for the self-similarity analysis. Full frame resolution
/// would make the matrix quadratic in track length; half-second cells
/// keep it small without losing section-scale detail.
const CELL_SECS: f64 = 0.5;

const N_TIMBRE: usize = 13;

/// Feature vector for one cell: L2-normalized chroma and timbre parts.
struct Cell {
    chroma: [f32; 12],
    timbre: Vec<f32>,
}

pub struct StructureAnalyzer;

impl Default for StructureAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, samples: &[f32], sample_rate: u32) -> StructureResult {
        let duration = samples.len() as f64 / sample_rate as f64;

        if duration < STRUCTURE_MIN_DURATION {
            return StructureResult {
                segments: vec![StructureSegment {
                    start: 0.0,
                    end: duration,
                    label: "Main".to_string(),
                    confidence: 0.5,
                    similarity_to_previous: None,
                }],
                explanation: "Track too short for structure analysis.".to_string(),
                needs_confirmation: true,
            };
        }

        let spec = stft_magnitudes(samples, sample_rate, N_FFT, HOP_LENGTH);
        let chroma_frames = chroma::chroma_from_spectrogram(&spec, &ChromaOptions::default());
        let timbre_frames = timbre_coefficients(&spec, N_TIMBRE);

        let cell_frames = ((CELL_SECS * spec.frame_rate() as f64).round() as usize).max(1);
        let cell_dur = cell_frames as f64 / spec.frame_rate() as f64;
        let cells = build_cells(&chroma_frames, &timbre_frames, cell_frames);
        debug!(n_cells = cells.len(), cell_dur, "structure features aggregated");

        let ssm = self_similarity(&cells);
        let novelty = novelty_curve(&ssm);
        let boundaries = find_boundaries(&novelty, duration, cell_dur);
        let segments = create_segments(&boundaries, &cells, cell_dur);
        let segments = assign_labels(segments);
        let explanation = build_explanation(segments.len());

        StructureResult {
            segments,
            explanation,
            needs_confirmation: true,
        }
    }
}

fn build_cells(
    chroma_frames: &[[f32; 12]],
    timbre_frames: &[Vec<f32>],
    cell_frames: usize,
) -> Vec<Cell> {
    let n_frames = chroma_frames.len().min(timbre_frames.len());
    let mut cells = Vec::with_capacity(n_frames / cell_frames + 1);

    let mut start = 0usize;
    while start < n_frames {
        let end = (start + cell_frames).min(n_frames);
        let count = (end - start) as f32;

        let mut ch = [0.0f32; 12];
        for frame in &chroma_frames[start..end] {
            for (c, v) in ch.iter_mut().zip(frame.iter()) {
                *c += v;
            }
        }
        for c in ch.iter_mut() {
            *c /= count;
        }
        l2_normalize(&mut ch);

        let mut tb = vec![0.0f32; N_TIMBRE];
        for frame in &timbre_frames[start..end] {
            for (t, v) in tb.iter_mut().zip(frame.iter()) {
                *t += v;
            }
        }
        for t in tb.iter_mut() {
            *t /= count;
        }
        l2_normalize(&mut tb);

        cells.push(Cell { chroma: ch, timbre: tb });
        start = end;
    }
    cells
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Pairwise cell similarity, blending harmony and timbre.
fn self_similarity(cells: &[Cell]) -> Vec<Vec<f32>> {
    let n = cells.len();
    let mut ssm = vec![vec![0.0f32; n]; n];
    for i in 0..n {
        for j in i..n {
            let ch: f32 = (0..12).map(|k| cells[i].chroma[k] * cells[j].chroma[k]).sum();
            let tb: f32 = cells[i]
                .timbre
                .iter()
                .zip(cells[j].timbre.iter())
                .map(|(a, b)| a * b)
                .sum();
            let sim = SSM_CHROMA_WEIGHT * ch + SSM_TIMBRE_WEIGHT * tb;
            ssm[i][j] = sim;
            ssm[j][i] = sim;
        }
    }
    ssm
}

/// Checkerboard-kernel novelty along the SSM diagonal, rectified,
/// peak-normalized and gaussian-smoothed.
fn novelty_curve(ssm: &[Vec<f32>]) -> Vec<f32> {
    let n = ssm.len();
    let kernel_size = (n / 4).min(32);
    if kernel_size < 4 {
        return vec![0.0; n];
    }
    let half = kernel_size / 2;

    let mut novelty = vec![0.0f32; n];
    for i in half..n - half {
        let mut sum = 0.0f32;
        for di in 0..kernel_size {
            for dj in 0..kernel_size {
                let sign = if (di < half) == (dj < half) { -1.0 } else { 1.0 };
                sum += sign * ssm[i - half + di][i - half + dj];
            }
        }
        novelty[i] = sum.max(0.0);
    }

    let max = novelty.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in novelty.iter_mut() {
            *v /= max;
        }
    }

    gaussian_smooth(&novelty, NOVELTY_SMOOTH_SIGMA)
}

fn gaussian_smooth(signal: &[f32], sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil() as i64;
    let kernel: Vec<f32> = (-radius..=radius)
        .map(|k| (-(k as f32).powi(2) / (2.0 * sigma * sigma)).exp())
        .collect();
    let ksum: f32 = kernel.iter().sum();

    let n = signal.len() as i64;
    (0..n)
        .map(|i| {
            let mut acc = 0.0f32;
            for (offset, w) in (-radius..=radius).zip(kernel.iter()) {
                let idx = (i + offset).clamp(0, n - 1) as usize;
                acc += signal[idx] * w;
            }
            acc / ksum
        })
        .collect()
}

/// Section boundaries from novelty peaks, constrained to the minimum
/// section length and the segment cap.
fn find_boundaries(novelty: &[f32], duration: f64, cell_dur: f64) -> Vec<f64> {
    if novelty.is_empty() {
        return vec![0.0, duration];
    }

    let min_cells = ((STRUCTURE_MIN_SEGMENT_SECS / cell_dur) as usize).max(1);
    let peaks = find_peaks(novelty, NOVELTY_PEAK_HEIGHT, min_cells, NOVELTY_PEAK_PROMINENCE);

    let mut boundaries = vec![0.0];
    for &peak in peaks.iter().take(STRUCTURE_MAX_SEGMENTS - 1) {
        boundaries.push(peak as f64 * cell_dur);
    }
    boundaries.push(duration);
    boundaries
}

/// Local maxima above `height` with at least `prominence` drop to the
/// surrounding terrain, thinned so no two survive within `distance`.
fn find_peaks(signal: &[f32], height: f32, distance: usize, prominence: f32) -> Vec<usize> {
    let n = signal.len();
    let mut candidates: Vec<usize> = Vec::new();
    for i in 1..n.saturating_sub(1) {
        if signal[i] > signal[i - 1] && signal[i] >= signal[i + 1] && signal[i] >= height {
            candidates.push(i);
        }
    }

    // Prominence: height above the deeper of the two valleys separating
    // this peak from higher ground
    let prominent: Vec<usize> = candidates
        .iter()
        .cloned()
        .filter(|&p| {
            let peak = signal[p];
            let mut left_min = peak;
            let mut i = p;
            while i > 0 {
                i -= 1;
                if signal[i] > peak {
                    break;
                }
                left_min = left_min.min(signal[i]);
            }
            let mut right_min = peak;
            let mut i = p;
            while i + 1 < n {
                i += 1;
                if signal[i] > peak {
                    break;
                }
                right_min = right_min.min(signal[i]);
            }
            peak - left_min.max(right_min) >= prominence
        })
        .collect();

    // Enforce distance, keeping the taller of any conflicting pair
    let mut by_height = prominent.clone();
    by_height.sort_by(|&a, &b| {
        signal[b]
            .partial_cmp(&signal[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<usize> = Vec::new();
    for p in by_height {
        if kept.iter().all(|&k| k.abs_diff(p) >= distance) {
            kept.push(p);
        }
    }
    kept.sort_unstable();
    kept
}

fn create_segments(boundaries: &[f64], cells: &[Cell], cell_dur: f64) -> Vec<StructureSegment> {
    let mut segments = Vec::new();
    for i in 0..boundaries.len().saturating_sub(1) {
        let start = boundaries[i];
        let end = boundaries[i + 1];

        let confidence = if i == 0 {
            0.6
        } else if end - start < STRUCTURE_MIN_SEGMENT_SECS * 1.5 {
            0.4
        } else {
            0.55
        };

        let similarity = if i > 0 {
            segment_similarity(cells, cell_dur, boundaries[i - 1], start, end)
        } else {
            None
        };

        segments.push(StructureSegment {
            start: round2(start),
            end: round2(end),
            label: format!("Section {}", (b'A' + (i as u8 % 26)) as char),
            confidence: round2(confidence),
            similarity_to_previous: similarity,
        });
    }
    segments
}

/// Cosine similarity of the mean chroma of two adjacent sections.
fn segment_similarity(
    cells: &[Cell],
    cell_dur: f64,
    prev_start: f64,
    current_start: f64,
    current_end: f64,
) -> Option<f64> {
    let idx = |t: f64| ((t / cell_dur) as usize).min(cells.len());
    let prev = &cells[idx(prev_start)..idx(current_start)];
    let curr = &cells[idx(current_start)..idx(current_end)];
    if prev.is_empty() || curr.is_empty() {
        return None;
    }

    let mean = |part: &[Cell]| -> [f64; 12] {
        let mut avg = [0.0f64; 12];
        for cell in part {
            for (a, v) in avg.iter_mut().zip(cell.chroma.iter()) {
                *a += *v as f64;
            }
        }
        for a in avg.iter_mut() {
            *a /= part.len() as f64;
        }
        avg
    };

    let prev_avg = mean(prev);
    let curr_avg = mean(curr);
    let norm_prev = prev_avg.iter().map(|v| v * v).sum::<f64>().sqrt();
    let norm_curr = curr_avg.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm_prev > 0.0 && norm_curr > 0.0 {
        let dot: f64 = prev_avg.iter().zip(curr_avg.iter()).map(|(a, b)| a * b).sum();
        Some(round2(dot / (norm_prev * norm_curr)))
    } else {
        None
    }
}

/// Positional heuristics: short opening sections become the intro, the
/// tail becomes the outro, highly similar neighbors keep a muted
/// confidence.
fn assign_labels(segments: Vec<StructureSegment>) -> Vec<StructureSegment> {
    if segments.is_empty() {
        return segments;
    }
    let n = segments.len();
    let total_end = segments.last().map(|s| s.end).unwrap_or(1.0).max(1e-9);

    segments
        .into_iter()
        .enumerate()
        .map(|(i, mut seg)| {
            let position_ratio = seg.start / total_end;
            if i == 0 && seg.end - seg.start < 30.0 && position_ratio < 0.1 {
                seg.label = "Intro".to_string();
                seg.confidence = 0.6;
            } else if i == n - 1 && position_ratio > 0.85 {
                seg.label = "Outro".to_string();
                seg.confidence = 0.5;
            } else if seg
                .similarity_to_previous
                .is_some_and(|s| s > STRUCTURE_REPEAT_SIMILARITY)
            {
                // Likely a repeat of the previous section type
                seg.confidence = 0.5;
            }
            seg
        })
        .collect()
}

fn build_explanation(n_segments: usize) -> String {
    if n_segments <= 2 {
        "Few distinct sections detected. The track may have a continuous structure or subtle changes."
            .to_string()
    } else if n_segments <= 6 {
        format!(
            "Detected {n_segments} distinct sections based on harmonic and timbral changes. \
             Labels are approximate; verify by ear."
        )
    } else {
        format!(
            "Detected {n_segments} sections. The track has a complex structure. \
             Section labels are best-effort estimates."
        )
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
