use serde::{Deserialize, Serialize};

use crate::analysis::dfa::DfaResult;
use crate::stride::Stride;
use crate::types::GaitPhase;

/// Strides whose length confidence is at or below this are excluded from
/// length-derived aggregates (excluded, not down-weighted).
pub const LENGTH_CONFIDENCE_FLOOR: f64 = 0.5;

/// How many recent strides per foot feed the symmetry indices.
pub const SYMMETRY_WINDOW: usize = 10;

/// On-demand gait snapshot. Always a pure function of the stride/event
/// histories; never persisted or incrementally mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaitMetrics {
    /// Steps per minute, both feet.
    pub cadence_spm: f64,
    pub mean_stride_time_ms: f64,
    pub stance_ratio: f64,
    pub swing_ratio: f64,
    /// Mean over confident strides only (m).
    pub mean_stride_length_m: f64,
    pub walking_speed_mps: f64,
    pub step_width_m: f64,
    /// 0–100; 100 is perfectly symmetric stride timing.
    pub stride_time_symmetry: f64,
    pub stride_length_symmetry: f64,
    /// Mean left stride time over mean right stride time.
    pub left_right_ratio: f64,
    pub stride_time_cv: f64,
    pub stride_length_cv: f64,
    pub dfa_alpha: f64,
    pub left_phase: GaitPhase,
    pub right_phase: GaitPhase,
    pub step_count: u64,
}

impl Default for GaitMetrics {
    fn default() -> Self {
        Self {
            cadence_spm: 0.0,
            mean_stride_time_ms: 0.0,
            stance_ratio: 0.0,
            swing_ratio: 0.0,
            mean_stride_length_m: 0.0,
            walking_speed_mps: 0.0,
            step_width_m: 0.0,
            stride_time_symmetry: 0.0,
            stride_length_symmetry: 0.0,
            left_right_ratio: 0.0,
            stride_time_cv: 0.0,
            stride_length_cv: 0.0,
            dfa_alpha: 0.0,
            left_phase: GaitPhase::Unknown,
            right_phase: GaitPhase::Unknown,
            step_count: 0,
        }
    }
}

/// Long-horizon variability view: coefficients of variation plus the DFA
/// scaling structure of the stride-time series.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GaitVariabilityMetrics {
    pub stride_time_cv: f64,
    pub stride_length_cv: f64,
    pub dfa: DfaResult,
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu) * (v - mu)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Coefficient of variation in percent; zero when undefined.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let mu = mean(values);
    if values.len() < 2 || mu.abs() < f64::EPSILON {
        return 0.0;
    }
    std_dev(values) / mu * 100.0
}

/// Steps per minute from the mean stride time: each stride is two steps
/// when both feet contribute.
pub fn cadence_spm(mean_stride_time_ms: f64) -> f64 {
    if mean_stride_time_ms <= 0.0 {
        return 0.0;
    }
    60_000.0 / mean_stride_time_ms * 2.0
}

/// Symmetry index on [0, 100] plus the raw left/right ratio. Zero-sentinel
/// when either side has no data.
pub fn symmetry_index(left_mean: f64, right_mean: f64) -> (f64, f64) {
    if left_mean <= 0.0 || right_mean <= 0.0 {
        return (0.0, 0.0);
    }
    let ratio = left_mean / right_mean;
    let index = (100.0 - (1.0 - ratio).abs() * 100.0).clamp(0.0, 100.0);
    (index, ratio)
}

/// Mean stride length over confident strides only. Returns zero when no
/// stride qualifies.
pub fn confident_mean_length(strides: &[&Stride]) -> f64 {
    let lengths: Vec<f64> = strides
        .iter()
        .filter(|s| s.length_confidence > LENGTH_CONFIDENCE_FLOOR)
        .map(|s| s.length_m)
        .collect();
    mean(&lengths)
}
