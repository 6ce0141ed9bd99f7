use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::SensorSample;

/// Extra samples required beyond the smoothing window before a scan is
/// attempted. Below this the refiner reports "insufficient data" rather
/// than risking a spurious extremum at the window edge.
const MIN_EXTRA_SAMPLES: usize = 5;

/// Configuration for the gyro-only toe-off refiner.
#[derive(Debug, Clone)]
pub struct GyroToeOffConfig {
    /// Centered moving-average window over the sagittal angular velocity.
    pub smoothing_window: usize,
    /// Peak must be below this to count (rad/s). The −2.0 rad/s sagittal
    /// swing-initiation signature follows Shull et al.
    pub threshold_rps: f64,
}

impl Default for GyroToeOffConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            threshold_rps: -2.0,
        }
    }
}

/// A refined toe-off found in the buffered gyro trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroToeOffResult {
    /// Most negative smoothed sagittal angular velocity (rad/s).
    pub peak_velocity: f64,
    /// How far before the newest buffered sample the peak sits (ms).
    pub time_offset_ms: f64,
    /// `min(1, |peak / threshold|)`.
    pub confidence: f64,
}

/// Independent confirmation pass for toe-off: smooths the sagittal angular
/// velocity and scans for the deepest local minimum below the threshold.
/// Stateless between calls; operates on whatever window the caller hands it.
#[derive(Debug, Clone, Default)]
pub struct GyroToeOffRefiner {
    config: GyroToeOffConfig,
}

impl GyroToeOffRefiner {
    pub fn new(config: GyroToeOffConfig) -> Self {
        assert!(config.smoothing_window >= 3 && config.smoothing_window % 2 == 1);
        assert!(config.threshold_rps < 0.0);
        Self { config }
    }

    /// Scans `samples` (oldest first) for the toe-off signature. Returns
    /// `None` when the window is too short or no qualifying minimum exists.
    pub fn detect(&self, samples: &[SensorSample]) -> Option<GyroToeOffResult> {
        let window = self.config.smoothing_window;
        if samples.len() < window + MIN_EXTRA_SAMPLES {
            return None;
        }

        let sagittal: Vec<f64> = samples
            .iter()
            .map(|s| s.sagittal_angular_velocity())
            .collect();
        let smoothed = centered_moving_average(&sagittal, window);

        // Interior local minima only; the trace ends are smoothing artifacts.
        let mut best: Option<(usize, f64)> = None;
        for i in 1..smoothed.len().saturating_sub(1) {
            let v = smoothed[i];
            if v >= self.config.threshold_rps {
                continue;
            }
            if v > smoothed[i - 1] || v > smoothed[i + 1] {
                continue;
            }
            match best {
                Some((_, current)) if current <= v => {}
                _ => best = Some((i, v)),
            }
        }

        let (index, peak_velocity) = best?;
        let newest = samples.last()?.timestamp_ms;
        let result = GyroToeOffResult {
            peak_velocity,
            time_offset_ms: newest - samples[index].timestamp_ms,
            confidence: (peak_velocity / self.config.threshold_rps).abs().min(1.0),
        };
        debug!(target: "gait_core::detect",
            "Gyro toe-off: peak={:.2} rad/s, {:.0} ms before window end, confidence={:.2}",
            result.peak_velocity, result.time_offset_ms, result.confidence);
        Some(result)
    }
}

/// Centered moving average; elements near the edges average over the part
/// of the window that exists.
fn centered_moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let half = window / 2;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(half);
            let end = (i + half + 1).min(values.len());
            values[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}
