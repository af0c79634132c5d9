//! Calibration constants shared by the analyzers
//!
//! Every fixed threshold and weight that shapes a confidence score or an
//! ensemble decision lives here, so tuning happens in one place.

// =============================================================================
// Tempo
// =============================================================================

/// Normalization range: estimates are folded into this octave before voting
pub const TEMPO_RANGE_MIN: f64 = 60.0;
pub const TEMPO_RANGE_MAX: f64 = 180.0;

/// Absolute BPM limits for candidates
pub const TEMPO_ABSOLUTE_MIN: f64 = 40.0;
pub const TEMPO_ABSOLUTE_MAX: f64 = 220.0;

/// Prior weights of the tempo estimation methods
pub const TEMPO_WEIGHT_LEARNED_GOOD: f64 = 0.95;
pub const TEMPO_WEIGHT_LEARNED_POOR: f64 = 0.85;
pub const TEMPO_WEIGHT_BEAT_TRACK: f64 = 0.70;
pub const TEMPO_WEIGHT_WINDOWED: f64 = 0.65;
pub const TEMPO_WEIGHT_ACF: f64 = 0.60;

/// Estimates within this relative distance vote for the same cluster
pub const TEMPO_CLUSTER_TOLERANCE: f64 = 0.05;

/// Octave correction: the alternative period must be at least this strong
/// relative to the current one
pub const OCTAVE_STRENGTH_RATIO: f32 = 0.75;

/// Half-time is only accepted inside this range
pub const OCTAVE_HALF_MIN: f64 = 60.0;
pub const OCTAVE_HALF_MAX: f64 = 140.0;

/// Double-time is only considered below this tempo, and capped here
pub const OCTAVE_DOUBLE_BELOW: f64 = 70.0;
pub const OCTAVE_DOUBLE_MAX: f64 = 180.0;

/// Consensus bonuses when 3+ / 2+ methods agree
pub const TEMPO_CONSENSUS_BONUS_3: f64 = 0.08;
pub const TEMPO_CONSENSUS_BONUS_2: f64 = 0.04;

/// Confidence caps with / without a learned predictor in agreement
pub const TEMPO_CAP_LEARNED_AGREES: f64 = 0.98;
pub const TEMPO_CAP_LEARNED_PRESENT: f64 = 0.90;
pub const TEMPO_CAP_ENSEMBLE_ONLY: f64 = 0.85;

/// Flat-envelope penalty: coefficient of variation below this multiplies
/// confidence by the factor
pub const TEMPO_FLAT_CV_THRESHOLD: f32 = 0.3;
pub const TEMPO_FLAT_PENALTY: f64 = 0.85;

/// Confidence floor after all adjustments
pub const TEMPO_CONFIDENCE_FLOOR: f64 = 0.3;

/// Candidate list: primary and half/double confidences, cap and size
pub const TEMPO_CANDIDATE_PRIMARY: f64 = 0.95;
pub const TEMPO_CANDIDATE_OCTAVE: f64 = 0.45;
pub const TEMPO_CANDIDATE_METHOD_SCALE: f64 = 0.9;
pub const TEMPO_CANDIDATE_METHOD_CAP: f64 = 0.8;
pub const TEMPO_MAX_CANDIDATES: usize = 5;

/// Drift detection: window/hop in seconds, relative change threshold
pub const TEMPO_DRIFT_WINDOW_SECS: f64 = 10.0;
pub const TEMPO_DRIFT_HOP_SECS: f64 = 5.0;
pub const TEMPO_DRIFT_CHANGE_THRESHOLD: f64 = 0.05;

/// Segment spreads below this many BPM collapse into one stable segment
pub const TEMPO_DRIFT_STABLE_SPREAD: f64 = 3.0;

/// Segment confidences: per-window, collapsed-stable, short-track
pub const TEMPO_SEGMENT_CONFIDENCE: f64 = 0.7;
pub const TEMPO_SEGMENT_STABLE_CONFIDENCE: f64 = 0.88;
pub const TEMPO_SEGMENT_SHORT_CONFIDENCE: f64 = 0.85;

/// Tracks shorter than this get a single tempo segment
pub const TEMPO_DRIFT_MIN_DURATION: f64 = 30.0;

/// Fallback when no method produced an estimate
pub const TEMPO_FALLBACK_BPM: f64 = 120.0;
pub const TEMPO_FALLBACK_CONFIDENCE: f64 = 0.5;

/// Confidence tiers used in explanations and needs_confirmation
pub const TEMPO_HIGH_CONFIDENCE: f64 = 0.85;
pub const TEMPO_MEDIUM_CONFIDENCE: f64 = 0.70;
pub const TEMPO_LOW_CONFIDENCE: f64 = 0.50;

// =============================================================================
// Key
// =============================================================================

/// Confidence tiers
pub const KEY_HIGH_CONFIDENCE: f64 = 0.70;
pub const KEY_MEDIUM_CONFIDENCE: f64 = 0.55;
pub const KEY_LOW_CONFIDENCE: f64 = 0.40;

/// Vocal detection thresholds and score normalizers
pub const VOCAL_CENTROID_THRESHOLD_HZ: f32 = 1500.0;
pub const VOCAL_ZCR_THRESHOLD: f32 = 0.15;
pub const VOCAL_CENTROID_NORM_HZ: f32 = 2500.0;
pub const VOCAL_ZCR_NORM: f32 = 0.25;
pub const VOCAL_CENTROID_WEIGHT: f64 = 0.6;
pub const VOCAL_ZCR_WEIGHT: f64 = 0.4;

/// Chroma blend weights: harmonic / energy-normalized / plain STFT
pub const CHROMA_WEIGHT_HARMONIC: f32 = 0.50;
pub const CHROMA_WEIGHT_ENERGY_NORM: f32 = 0.30;
pub const CHROMA_WEIGHT_STFT: f32 = 0.20;

/// When vocals are present, bass chroma dominates the blend
pub const CHROMA_WEIGHT_BASS: f32 = 0.70;
pub const CHROMA_WEIGHT_STANDARD_WITH_VOCALS: f32 = 0.30;

/// Key confidence combination weights and scaling
pub const KEY_CONF_ABS_WEIGHT: f64 = 0.40;
pub const KEY_CONF_SEP_WEIGHT: f64 = 0.35;
pub const KEY_CONF_AVG_WEIGHT: f64 = 0.25;
pub const KEY_CONF_SCALE: f64 = 1.3;
pub const KEY_CONF_MIN: f64 = 0.20;
pub const KEY_CONF_MAX: f64 = 0.95;

/// Alternative candidates: bounds and count
pub const KEY_ALT_CONF_MIN: f64 = 0.10;
pub const KEY_ALT_CONF_MAX: f64 = 0.90;
pub const KEY_MAX_ALTERNATIVES: usize = 4;

/// Modulation detection: window/hop in seconds, smoothing and merging
pub const KEY_MOD_WINDOW_SECS: f64 = 8.0;
pub const KEY_MOD_HOP_SECS: f64 = 4.0;
pub const KEY_MOD_SMOOTHING: f64 = 0.7;
pub const KEY_MOD_MIN_SEGMENT_SECS: f64 = 6.0;

// =============================================================================
// Meter
// =============================================================================

/// Method weights: beat strengths / onset bar ACF / tempogram / harmonic rhythm
pub const METER_WEIGHT_STRENGTH: f64 = 0.30;
pub const METER_WEIGHT_ONSET: f64 = 0.20;
pub const METER_WEIGHT_PERIODICITY: f64 = 0.15;
pub const METER_WEIGHT_HARMONIC: f64 = 0.35;

/// Commonness priors applied to combined scores
pub const METER_PRIOR_4_4: f64 = 1.25;
pub const METER_PRIOR_SIMPLE: f64 = 1.15;
pub const METER_PRIOR_EXOTIC: f64 = 0.85;

/// Exotic meters below this confidence fall back to 4/4 when 4/4 is close
pub const METER_EXOTIC_FALLBACK_CONFIDENCE: f64 = 0.65;
pub const METER_EXOTIC_FALLBACK_SCORE_RATIO: f64 = 0.7;
pub const METER_EXOTIC_FALLBACK_RESULT_CONFIDENCE: f64 = 0.60;

/// Global low-confidence fallback to 4/4
pub const METER_LOW_FALLBACK_CONFIDENCE: f64 = 0.25;
pub const METER_FALLBACK_RESULT_CONFIDENCE: f64 = 0.50;

/// Confidence combination weights and clamp
pub const METER_CONF_SEP_WEIGHT: f64 = 0.6;
pub const METER_CONF_AVG_WEIGHT: f64 = 0.4;
pub const METER_CONF_MIN: f64 = 0.25;
pub const METER_CONF_MAX: f64 = 0.90;

/// Minimum beats required for pattern analysis
pub const METER_MIN_BEATS: usize = 12;

/// Confidence tiers
pub const METER_HIGH_CONFIDENCE: f64 = 0.70;
pub const METER_MEDIUM_CONFIDENCE: f64 = 0.50;

// =============================================================================
// Structure
// =============================================================================

/// Minimum section length in seconds
pub const STRUCTURE_MIN_SEGMENT_SECS: f64 = 5.0;

/// Hard cap on the number of sections
pub const STRUCTURE_MAX_SEGMENTS: usize = 20;

/// Tracks shorter than this get a single "Main" section
pub const STRUCTURE_MIN_DURATION: f64 = 30.0;

/// Self-similarity blend: chroma (harmony) vs timbre
pub const SSM_CHROMA_WEIGHT: f32 = 0.6;
pub const SSM_TIMBRE_WEIGHT: f32 = 0.4;

/// Novelty peak picking
pub const NOVELTY_PEAK_HEIGHT: f32 = 0.2;
pub const NOVELTY_PEAK_PROMINENCE: f32 = 0.1;
pub const NOVELTY_SMOOTH_SIGMA: f32 = 3.0;

/// Sections with chroma similarity above this inherit the previous label
pub const STRUCTURE_REPEAT_SIMILARITY: f64 = 0.85;

// =============================================================================
// Loudness
// =============================================================================

/// K-weighting offset for the RMS-based LUFS approximation
pub const LUFS_K_OFFSET: f64 = 0.691;

/// Floor values for silence
pub const LUFS_SILENCE: f64 = -70.0;
pub const PEAK_SILENCE_DBFS: f64 = -96.0;

/// Short-term loudness window/hop in seconds
pub const LUFS_SHORT_TERM_WINDOW_SECS: f64 = 3.0;
pub const LUFS_SHORT_TERM_HOP_SECS: f64 = 0.5;

/// Loudness curve window/hop in seconds
pub const LOUDNESS_CURVE_WINDOW_SECS: f64 = 0.4;
pub const LOUDNESS_CURVE_HOP_SECS: f64 = 0.1;

/// Brightness normalization range (typical centroid span in Hz)
pub const BRIGHTNESS_MIN_HZ: f32 = 500.0;
pub const BRIGHTNESS_SPAN_HZ: f32 = 7500.0;

/// Brightness curve output interval in seconds
pub const BRIGHTNESS_CURVE_HOP_SECS: f64 = 0.5;

/// Tuning estimation: only pitches within this many cents of an A octave count
pub const TUNING_A_WINDOW_CENTS: f32 = 50.0;

// =============================================================================
// Chords
// =============================================================================

/// Minimum template-match score to report a chord at all
pub const CHORD_MIN_CONFIDENCE: f64 = 0.4;

/// Chord segments shorter than this are dropped during smoothing
pub const CHORD_MIN_DURATION_SECS: f64 = 0.3;

/// Windowed fallback (no beat grid): window/hop in seconds
pub const CHORD_WINDOW_SECS: f64 = 0.5;
pub const CHORD_HOP_SECS: f64 = 0.25;
