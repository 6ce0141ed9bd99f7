use log::debug;
use serde::{Deserialize, Serialize};

/// Minimum stride count before DFA is attempted. Below this the scaling
/// exponent is statistically meaningless; 256+ is ideal.
pub const MIN_DFA_SAMPLES: usize = 64;

/// Candidate box sizes; filtered to at most a quarter of the series length.
const BOX_SIZES: [usize; 5] = [4, 8, 16, 32, 64];

/// Minimum (box size, fluctuation) pairs for the log–log regression.
const MIN_FIT_POINTS: usize = 3;

/// Scaling band treated as long-range correlated, healthy-gait-like.
const LONG_RANGE_ALPHA_MIN: f64 = 0.8;
const LONG_RANGE_ALPHA_MAX: f64 = 1.2;

/// Detrended-fluctuation-analysis outcome. The zero value doubles as the
/// "not enough data" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DfaResult {
    /// Scaling exponent (slope of log fluctuation vs log box size).
    /// ~0.5 for uncorrelated series, 0.8–1.2 for healthy gait.
    pub alpha: f64,
    /// R² of the log–log fit.
    pub fit_r2: f64,
    pub long_range_correlation: bool,
    /// How many box sizes actually contributed to the fit. Short sessions
    /// silently lose statistical power; this surfaces how much.
    pub fitted_boxes: usize,
}

/// Estimates the DFA scaling exponent of a stride-time series.
///
/// Integrates deviations from the mean, detrends the profile box-wise with
/// per-box least-squares lines, and regresses log fluctuation against log
/// box size. Returns the zero result rather than a degenerate fit whenever
/// the series is too short or too few box sizes survive filtering.
pub fn compute_dfa(stride_times_ms: &[f64]) -> DfaResult {
    let n = stride_times_ms.len();
    if n < MIN_DFA_SAMPLES {
        return DfaResult::default();
    }

    let mean = stride_times_ms.iter().sum::<f64>() / n as f64;
    let mut profile = Vec::with_capacity(n);
    let mut cumulative = 0.0;
    for &x in stride_times_ms {
        cumulative += x - mean;
        profile.push(cumulative);
    }

    let mut log_sizes = Vec::new();
    let mut log_fluctuations = Vec::new();
    for &box_size in BOX_SIZES.iter().filter(|&&b| b <= n / 4) {
        let Some(fluctuation) = box_fluctuation(&profile, box_size) else {
            continue;
        };
        log_sizes.push((box_size as f64).ln());
        log_fluctuations.push(fluctuation.ln());
    }

    if log_sizes.len() < MIN_FIT_POINTS {
        return DfaResult::default();
    }

    let (alpha, _, fit_r2) = linear_fit(&log_sizes, &log_fluctuations);
    let result = DfaResult {
        alpha,
        fit_r2,
        long_range_correlation: (LONG_RANGE_ALPHA_MIN..=LONG_RANGE_ALPHA_MAX).contains(&alpha),
        fitted_boxes: log_sizes.len(),
    };
    debug!(target: "gait_core::dfa",
        "DFA over {} strides: alpha={:.3}, r2={:.3}, boxes={}",
        n, result.alpha, result.fit_r2, result.fitted_boxes);
    result
}

/// Root-mean-square residual after per-box linear detrending, across all
/// complete non-overlapping boxes. `None` when the residual is degenerate.
fn box_fluctuation(profile: &[f64], box_size: usize) -> Option<f64> {
    let box_count = profile.len() / box_size;
    if box_count == 0 {
        return None;
    }

    let xs: Vec<f64> = (0..box_size).map(|i| i as f64).collect();
    let mut residual_sum = 0.0;
    for b in 0..box_count {
        let segment = &profile[b * box_size..(b + 1) * box_size];
        let (slope, intercept, _) = linear_fit(&xs, segment);
        for (i, &y) in segment.iter().enumerate() {
            let trend = slope * i as f64 + intercept;
            residual_sum += (y - trend) * (y - trend);
        }
    }

    let fluctuation = (residual_sum / (box_count * box_size) as f64).sqrt();
    (fluctuation.is_finite() && fluctuation > 0.0).then_some(fluctuation)
}

/// Ordinary least squares: returns (slope, intercept, R²).
fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64, f64) {
    debug_assert_eq!(xs.len(), ys.len());
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
        syy += (y - mean_y) * (y - mean_y);
    }

    if sxx.abs() < f64::EPSILON {
        return (0.0, mean_y, 0.0);
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    let r2 = if syy.abs() < f64::EPSILON {
        1.0
    } else {
        (sxy * sxy) / (sxx * syy)
    };
    (slope, intercept, r2)
}
