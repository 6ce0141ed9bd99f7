use serde::{Deserialize, Serialize};

/// Samples per foot required before its lateral variance is usable.
pub const STEP_WIDTH_WINDOW: usize = 30;

/// Output clamp (m). Physiological stance widths sit well inside this.
const WIDTH_MIN_M: f64 = 0.05;
const WIDTH_MAX_M: f64 = 0.25;

/// Variance-to-width mapping coefficients per tier.
const BILATERAL_COEFF: f64 = 0.05;
const UNILATERAL_COEFF: f64 = 0.04;

/// Fallback when neither foot has enough data.
const DEFAULT_WIDTH_M: f64 = 0.1;

/// Which fallback tier produced the estimate. Exposed so downstream
/// consumers can react to estimate quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepWidthMethod {
    /// Both feet contributed lateral variance.
    Bilateral,
    /// Only one foot qualified.
    Unilateral,
    /// Fixed population default.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepWidthEstimate {
    pub width_m: f64,
    pub method: StepWidthMethod,
    pub confidence: f64,
}

/// Maps medio-lateral acceleration variance to a lateral stance width.
/// `left_lateral` / `right_lateral` are each foot's recent medio-lateral
/// (y) acceleration values; a foot qualifies with `STEP_WIDTH_WINDOW`
/// samples or more.
pub fn estimate_step_width(left_lateral: &[f64], right_lateral: &[f64]) -> StepWidthEstimate {
    let left = qualified_variance(left_lateral);
    let right = qualified_variance(right_lateral);

    match (left, right) {
        (Some(l), Some(r)) => StepWidthEstimate {
            width_m: width_from_variance((l + r) / 2.0, BILATERAL_COEFF),
            method: StepWidthMethod::Bilateral,
            confidence: 0.7,
        },
        (Some(v), None) | (None, Some(v)) => StepWidthEstimate {
            width_m: width_from_variance(v, UNILATERAL_COEFF),
            method: StepWidthMethod::Unilateral,
            confidence: 0.4,
        },
        (None, None) => StepWidthEstimate {
            width_m: DEFAULT_WIDTH_M,
            method: StepWidthMethod::Default,
            confidence: 0.1,
        },
    }
}

fn width_from_variance(variance: f64, coefficient: f64) -> f64 {
    (WIDTH_MIN_M + variance.sqrt() * coefficient).clamp(WIDTH_MIN_M, WIDTH_MAX_M)
}

fn qualified_variance(lateral: &[f64]) -> Option<f64> {
    if lateral.len() < STEP_WIDTH_WINDOW {
        return None;
    }
    let window = &lateral[lateral.len() - STEP_WIDTH_WINDOW..];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let variance =
        window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / window.len() as f64;
    Some(variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn lateral(amplitude: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    #[test]
    fn default_tier_without_data() {
        let estimate = estimate_step_width(&[], &[]);
        assert_eq!(estimate.method, StepWidthMethod::Default);
        assert_relative_eq!(estimate.width_m, 0.1);
        assert_relative_eq!(estimate.confidence, 0.1);
    }

    #[test]
    fn unilateral_tier_with_one_foot() {
        let estimate = estimate_step_width(&lateral(1.0, 40), &lateral(1.0, 10));
        assert_eq!(estimate.method, StepWidthMethod::Unilateral);
        assert_relative_eq!(estimate.confidence, 0.4);
        // Variance 1.0, so width = 0.05 + 1.0 * 0.04.
        assert_relative_eq!(estimate.width_m, 0.09, epsilon = 1e-9);
    }

    #[test]
    fn bilateral_tier_with_both_feet() {
        let estimate = estimate_step_width(&lateral(1.0, 40), &lateral(1.0, 40));
        assert_eq!(estimate.method, StepWidthMethod::Bilateral);
        assert_relative_eq!(estimate.confidence, 0.7);
        assert_relative_eq!(estimate.width_m, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn width_is_always_inside_the_clamp() {
        for amplitude in [0.0, 0.01, 1.0, 10.0, 1000.0] {
            let estimate = estimate_step_width(&lateral(amplitude, 60), &lateral(amplitude, 60));
            assert!(
                (0.05..=0.25).contains(&estimate.width_m),
                "width {} out of clamp for amplitude {}",
                estimate.width_m,
                amplitude
            );
        }
    }

    #[test]
    fn only_the_recent_window_counts() {
        // Old wild swings followed by 30 quiet samples: variance comes from
        // the quiet tail.
        let mut values = lateral(50.0, 30);
        values.extend(std::iter::repeat(0.0).take(STEP_WIDTH_WINDOW));
        let estimate = estimate_step_width(&values, &[]);
        assert_eq!(estimate.method, StepWidthMethod::Unilateral);
        assert_relative_eq!(estimate.width_m, 0.05);
    }
}
