use serde::{Deserialize, Serialize};

use crate::stride::Stride;
use crate::types::Foot;

/// How many recent strides per foot feed the fusion.
pub const FUSION_RECENT_STRIDES: usize = 5;

/// Strides at or below this length confidence are ignored.
pub const MIN_FUSION_CONFIDENCE: f64 = 0.5;

/// Confidence-weighted bilateral stride estimate. The zero value with an
/// empty source list is the "no qualifying data" sentinel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FusedStride {
    pub fused_stride_length_m: f64,
    pub fused_stride_time_ms: f64,
    pub confidence: f64,
    /// Feet that actually contributed.
    pub sources_used: Vec<Foot>,
}

/// Fuses the most recent confident strides of both feet. Stride length is
/// confidence-weighted across feet; stride time is a plain mean over every
/// qualifying stride; confidence is the mean of the per-foot confidences
/// used. Never fails: with nothing to fuse it returns the sentinel.
pub fn fuse_strides(left: &[Stride], right: &[Stride]) -> FusedStride {
    let mut weighted_length = 0.0;
    let mut weight_sum = 0.0;
    let mut confidence_sum = 0.0;
    let mut time_sum = 0.0;
    let mut time_count = 0usize;
    let mut sources_used = Vec::new();

    for (foot, strides) in [(Foot::Left, left), (Foot::Right, right)] {
        let recent: Vec<&Stride> = strides
            .iter()
            .rev()
            .take(FUSION_RECENT_STRIDES)
            .filter(|s| s.length_confidence > MIN_FUSION_CONFIDENCE)
            .collect();
        if recent.is_empty() {
            continue;
        }

        let mean_length = recent.iter().map(|s| s.length_m).sum::<f64>() / recent.len() as f64;
        let mean_confidence =
            recent.iter().map(|s| s.length_confidence).sum::<f64>() / recent.len() as f64;
        weighted_length += mean_length * mean_confidence;
        weight_sum += mean_confidence;
        confidence_sum += mean_confidence;
        time_sum += recent.iter().map(|s| s.duration_ms).sum::<f64>();
        time_count += recent.len();
        sources_used.push(foot);
    }

    if sources_used.is_empty() {
        return FusedStride::default();
    }

    FusedStride {
        fused_stride_length_m: weighted_length / weight_sum,
        fused_stride_time_ms: time_sum / time_count as f64,
        confidence: confidence_sum / sources_used.len() as f64,
        sources_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stride(foot: Foot, duration_ms: f64, length_m: f64, confidence: f64) -> Stride {
        Stride {
            foot,
            start_ms: 0.0,
            end_ms: duration_ms,
            duration_ms,
            stance_ms: duration_ms * 0.6,
            swing_ms: duration_ms * 0.4,
            length_m,
            length_confidence: confidence,
        }
    }

    #[test]
    fn no_data_yields_sentinel() {
        let fused = fuse_strides(&[], &[]);
        assert_eq!(fused, FusedStride::default());
        assert!(fused.sources_used.is_empty());
    }

    #[test]
    fn low_confidence_strides_never_contribute() {
        let left = vec![stride(Foot::Left, 1000.0, 1.2, 0.3)];
        let fused = fuse_strides(&left, &[]);
        assert!(fused.sources_used.is_empty());
        assert_relative_eq!(fused.fused_stride_length_m, 0.0);
    }

    #[test]
    fn single_foot_fusion() {
        let left = vec![
            stride(Foot::Left, 1000.0, 1.0, 0.8),
            stride(Foot::Left, 1100.0, 1.2, 0.8),
        ];
        let fused = fuse_strides(&left, &[]);
        assert_eq!(fused.sources_used, vec![Foot::Left]);
        assert_relative_eq!(fused.fused_stride_length_m, 1.1);
        assert_relative_eq!(fused.fused_stride_time_ms, 1050.0);
        assert_relative_eq!(fused.confidence, 0.8);
    }

    #[test]
    fn bilateral_fusion_weights_by_confidence() {
        let left = vec![stride(Foot::Left, 1000.0, 1.0, 0.9)];
        let right = vec![stride(Foot::Right, 1000.0, 2.0, 0.6)];
        let fused = fuse_strides(&left, &right);
        assert_eq!(fused.sources_used, vec![Foot::Left, Foot::Right]);
        // (1.0*0.9 + 2.0*0.6) / 1.5 = 1.4: pulled toward the trusted foot.
        assert_relative_eq!(fused.fused_stride_length_m, 1.4);
        assert_relative_eq!(fused.confidence, 0.75);
    }

    #[test]
    fn only_recent_strides_are_considered() {
        let mut left: Vec<Stride> = (0..10)
            .map(|_| stride(Foot::Left, 1000.0, 0.5, 0.9))
            .enumerate()
            .map(|(i, mut s)| {
                s.end_ms = (i + 1) as f64 * 1000.0;
                s
            })
            .collect();
        // Five newest strides have a different length.
        for s in left.iter_mut().skip(5) {
            s.length_m = 1.5;
        }
        let fused = fuse_strides(&left, &[]);
        assert_relative_eq!(fused.fused_stride_length_m, 1.5);
    }
}
