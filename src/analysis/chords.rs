//! Chord detection (optional, best-effort)
//!
//! Template matching of beat-synchronized chroma against major, minor
//! and diminished triad templates, with smoothing to suppress rapid
//! chord flicker. Chord detection from audio is inherently approximate.

use crate::analysis::constants::*;
use crate::analysis::results::ChordsResult;
use crate::features::chroma::{self, ChromaOptions};
use crate::features::spectral::stft_magnitudes;
use crate::features::{HOP_LENGTH, N_FFT};
use crate::types::{PitchClass, Segment};

// Triad templates in root position, root emphasized
const MAJOR_TEMPLATE: [f32; 12] = [1.0, 0.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0.7, 0.0, 0.0, 0.0, 0.0];
const MINOR_TEMPLATE: [f32; 12] = [1.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0.0, 0.7, 0.0, 0.0, 0.0, 0.0];
const DIM_TEMPLATE: [f32; 12] = [1.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0.7, 0.0, 0.0, 0.0, 0.0, 0.0];

const NO_CHORD: &str = "N.C.";

struct ChordTemplate {
    name: String,
    profile: [f32; 12],
}

pub struct ChordAnalyzer {
    templates: Vec<ChordTemplate>,
}

impl Default for ChordAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChordAnalyzer {
    pub fn new() -> Self {
        let mut templates = Vec::with_capacity(36);
        for root in 0..12 {
            let name = PitchClass::from_index(root).to_standard_notation();
            templates.push(ChordTemplate {
                name: name.to_string(),
                profile: rotate_normalized(&MAJOR_TEMPLATE, root),
            });
            templates.push(ChordTemplate {
                name: format!("{name}m"),
                profile: rotate_normalized(&MINOR_TEMPLATE, root),
            });
            templates.push(ChordTemplate {
                name: format!("{name}dim"),
                profile: rotate_normalized(&DIM_TEMPLATE, root),
            });
        }
        Self { templates }
    }

    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: u32,
        beat_times: Option<&[f64]>,
        enabled: bool,
    ) -> ChordsResult {
        if !enabled {
            return ChordsResult {
                enabled: false,
                warning: "Chord detection disabled.".to_string(),
                segments: Vec::new(),
                needs_confirmation: true,
            };
        }

        let spec = stft_magnitudes(samples, sample_rate, N_FFT, HOP_LENGTH);
        let chroma_frames = chroma::chroma_from_spectrogram(&spec, &ChromaOptions::default());
        let frame_rate = spec.frame_rate();

        let segments = match beat_times {
            Some(beats) if beats.len() > 2 => {
                self.beat_sync_chords(&chroma_frames, frame_rate, beats)
            }
            _ => self.windowed_chords(&chroma_frames, frame_rate),
        };
        let segments = smooth_chords(segments, CHORD_MIN_DURATION_SECS);

        ChordsResult {
            enabled: true,
            warning: "Chord detection is approximate; verify by ear.".to_string(),
            segments,
            needs_confirmation: true,
        }
    }

    /// One chord per beat span.
    fn beat_sync_chords(
        &self,
        chroma_frames: &[[f32; 12]],
        frame_rate: f32,
        beat_times: &[f64],
    ) -> Vec<Segment<String>> {
        let n_frames = chroma_frames.len();
        let mut segments = Vec::new();

        for pair in beat_times.windows(2) {
            let start_frame = (pair[0] * frame_rate as f64) as usize;
            let end_frame = (pair[1] * frame_rate as f64) as usize;
            if end_frame <= start_frame || end_frame > n_frames {
                continue;
            }

            let avg = mean_chroma(&chroma_frames[start_frame..end_frame]);
            let (chord, confidence) = self.match_chord(&avg);
            if confidence >= CHORD_MIN_CONFIDENCE {
                segments.push(Segment {
                    start: pair[0],
                    end: pair[1],
                    value: chord,
                    confidence: round2(confidence),
                });
            }
        }
        segments
    }

    /// Fixed-window fallback when no usable beat grid exists.
    fn windowed_chords(&self, chroma_frames: &[[f32; 12]], frame_rate: f32) -> Vec<Segment<String>> {
        let window_frames = ((CHORD_WINDOW_SECS * frame_rate as f64) as usize).max(1);
        let hop_frames = ((CHORD_HOP_SECS * frame_rate as f64) as usize).max(1);

        let mut segments = Vec::new();
        let mut frame = 0usize;
        while frame + window_frames <= chroma_frames.len() {
            let avg = mean_chroma(&chroma_frames[frame..frame + window_frames]);
            let (chord, confidence) = self.match_chord(&avg);

            if confidence >= CHORD_MIN_CONFIDENCE {
                let start = frame as f64 / frame_rate as f64;
                let end = (frame + window_frames) as f64 / frame_rate as f64;
                segments.push(Segment {
                    start: round2(start),
                    end: round2(end),
                    value: chord,
                    confidence: round2(confidence),
                });
            }
            frame += hop_frames;
        }
        segments
    }

    /// Best cosine match over all templates; silence maps to "N.C.".
    fn match_chord(&self, chroma: &[f32; 12]) -> (String, f64) {
        let norm = chroma.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= 0.0 {
            return (NO_CHORD.to_string(), 0.0);
        }

        let mut best_chord = NO_CHORD.to_string();
        let mut best_score = 0.0f32;
        for template in &self.templates {
            let score: f32 = chroma
                .iter()
                .zip(template.profile.iter())
                .map(|(c, t)| (c / norm) * t)
                .sum();
            if score > best_score {
                best_score = score;
                best_chord = template.name.clone();
            }
        }
        (best_chord, best_score as f64)
    }
}

fn rotate_normalized(template: &[f32; 12], root: usize) -> [f32; 12] {
    let mut rotated = [0.0f32; 12];
    for (i, &v) in template.iter().enumerate() {
        rotated[(i + root) % 12] = v;
    }
    let norm = rotated.iter().map(|v| v * v).sum::<f32>().sqrt();
    for v in rotated.iter_mut() {
        *v /= norm;
    }
    rotated
}

fn mean_chroma(frames: &[[f32; 12]]) -> [f32; 12] {
    let mut avg = [0.0f32; 12];
    for frame in frames {
        for (a, v) in avg.iter_mut().zip(frame.iter()) {
            *a += v;
        }
    }
    for a in avg.iter_mut() {
        *a /= frames.len() as f32;
    }
    avg
}

/// Merge consecutive identical chords (keeping the weaker confidence)
/// and drop segments too short to be musically meaningful.
fn smooth_chords(segments: Vec<Segment<String>>, min_duration: f64) -> Vec<Segment<String>> {
    let mut iter = segments.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut smoothed = Vec::new();
    for seg in iter {
        if seg.value == current.value {
            current.end = seg.end;
            current.confidence = current.confidence.min(seg.confidence);
        } else {
            if current.duration() >= min_duration {
                smoothed.push(current);
            }
            current = seg;
        }
    }
    if current.duration() >= min_duration {
        smoothed.push(current);
    }
    smoothed
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
