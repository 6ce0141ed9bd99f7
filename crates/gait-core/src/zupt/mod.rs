use log::debug;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::types::{GaitPhase, SensorSample, STANDARD_GRAVITY};

/// Configuration for the ZUPT-aided dead-reckoning integrator.
#[derive(Debug, Clone)]
pub struct ZuptConfig {
    /// Angular-velocity magnitude below which the foot may be stationary (rad/s).
    pub gyro_threshold_rps: f64,
    /// Allowed deviation of |accel| from gravity while stationary (m/s²).
    pub accel_threshold_mps2: f64,
    /// Gravity magnitude subtracted from the vertical axis (m/s²).
    pub gravity_mps2: f64,
    /// Fixed integration period (s). One over the nominal sample rate.
    pub sample_period_s: f64,
    /// Hard clamp on a single stride length (m).
    pub min_stride_length_m: f64,
    pub max_stride_length_m: f64,
    /// Band inside which the raw length is fully trusted (m).
    pub trusted_min_m: f64,
    pub trusted_max_m: f64,
}

impl Default for ZuptConfig {
    fn default() -> Self {
        Self {
            gyro_threshold_rps: 0.5,
            accel_threshold_mps2: 2.0,
            gravity_mps2: STANDARD_GRAVITY,
            sample_period_s: 0.01,
            min_stride_length_m: 0.1,
            max_stride_length_m: 2.5,
            trusted_min_m: 0.3,
            trusted_max_m: 2.0,
        }
    }
}

/// Zero-velocity predicate: low rotation and near-gravity acceleration
/// magnitude together indicate a planted foot.
pub fn is_zero_velocity(gyro_magnitude: f64, accel_magnitude: f64, config: &ZuptConfig) -> bool {
    gyro_magnitude < config.gyro_threshold_rps
        && (accel_magnitude - config.gravity_mps2).abs() < config.accel_threshold_mps2
}

/// Stride length read out of the integrator at stride completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrideLength {
    /// Horizontal-plane displacement, clamped to the plausible band (m).
    pub length_m: f64,
    /// 1.0 inside the trusted band, degrading outside it.
    pub confidence: f64,
}

/// Per-foot velocity/displacement integrator with zero-velocity resets.
/// The resets are what keeps this useful: without them the double
/// integration diverges within a handful of strides.
#[derive(Debug, Clone)]
pub struct ZuptIntegrator {
    config: ZuptConfig,
    velocity: Vector3<f64>,
    displacement: Vector3<f64>,
    zupt_active: bool,
}

impl ZuptIntegrator {
    pub fn new(config: ZuptConfig) -> Self {
        Self {
            config,
            velocity: Vector3::zeros(),
            displacement: Vector3::zeros(),
            zupt_active: false,
        }
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.velocity
    }

    pub fn displacement(&self) -> Vector3<f64> {
        self.displacement
    }

    pub fn zupt_active(&self) -> bool {
        self.zupt_active
    }

    /// Advances the integrator by one sample. Must run in lockstep with
    /// event detection: `phase` is the foot's phase after this sample was
    /// classified, and a Stance classification forces the velocity reset
    /// even when the instantaneous ZUPT condition narrowly misses.
    pub fn update(&mut self, sample: &SensorSample, phase: GaitPhase) {
        let stationary = is_zero_velocity(
            sample.gyro_magnitude(),
            sample.accel_magnitude(),
            &self.config,
        );

        if stationary || phase == GaitPhase::Stance {
            self.velocity = Vector3::zeros();
            self.zupt_active = true;
            return;
        }

        self.zupt_active = false;
        let dt = self.config.sample_period_s;
        let linear = Vector3::new(
            sample.accel.x,
            sample.accel.y,
            sample.accel.z - self.config.gravity_mps2,
        );
        self.velocity += linear * dt;
        self.displacement += self.velocity * dt;
    }

    /// Reads the accumulated horizontal displacement as a stride length and
    /// resets displacement for the next stride. Confidence is 1.0 inside
    /// the trusted band and degrades with distance outside it; the returned
    /// length is clamped regardless.
    pub fn finish_stride(&mut self) -> StrideLength {
        let raw = (self.displacement.x * self.displacement.x
            + self.displacement.y * self.displacement.y)
            .sqrt();
        let length_m = raw.clamp(
            self.config.min_stride_length_m,
            self.config.max_stride_length_m,
        );

        let confidence = if raw < self.config.trusted_min_m {
            (raw / self.config.trusted_min_m).max(0.1)
        } else if raw > self.config.trusted_max_m {
            (self.config.trusted_max_m / raw).max(0.1)
        } else {
            1.0
        };

        debug!(target: "gait_core::zupt",
            "Stride length {:.3} m (raw {:.3} m, confidence {:.2})", length_m, raw, confidence);

        self.displacement = Vector3::zeros();
        StrideLength {
            length_m,
            confidence,
        }
    }

    pub fn reset(&mut self) {
        self.velocity = Vector3::zeros();
        self.displacement = Vector3::zeros();
        self.zupt_active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(accel: Vector3<f64>, gyro: Vector3<f64>) -> SensorSample {
        SensorSample::new(0.0, accel, gyro)
    }

    /// Predicate table mirroring the firmware's ZUPT regression self-test:
    /// stillness and typical sensor noise classify stationary, an accel
    /// spike or a slow rotation classify moving.
    #[test]
    fn zero_velocity_predicate_table() {
        let config = ZuptConfig::default();
        let g = config.gravity_mps2;

        // Perfect stillness.
        assert!(is_zero_velocity(0.0, g, &config));
        // Typical sensor noise.
        assert!(is_zero_velocity(0.03, g + 0.18, &config));
        // Accel spike above the 2.0 m/s² deviation limit.
        assert!(!is_zero_velocity(0.01, g + 2.5, &config));
        // Rotation above the gyro limit.
        assert!(!is_zero_velocity(0.6, g + 0.1, &config));
        // High but tolerated accel deviation.
        assert!(is_zero_velocity(0.01, g + 1.9, &config));
    }

    #[test]
    fn perfectly_static_signal_never_drifts() {
        let mut integrator = ZuptIntegrator::new(ZuptConfig::default());
        let gravity_only = sample(Vector3::new(0.0, 0.0, STANDARD_GRAVITY), Vector3::zeros());

        // Phase Unknown on purpose: the predicate alone must hold the reset.
        for _ in 0..1000 {
            integrator.update(&gravity_only, GaitPhase::Unknown);
        }
        assert_relative_eq!(integrator.displacement().norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(integrator.velocity().norm(), 0.0, epsilon = 1e-12);
        assert!(integrator.zupt_active());
    }

    #[test]
    fn stance_forces_reset_even_when_predicate_misses() {
        let mut integrator = ZuptIntegrator::new(ZuptConfig::default());
        // Vigorous signal that fails the ZUPT condition outright.
        let moving = sample(
            Vector3::new(4.0, 0.0, STANDARD_GRAVITY),
            Vector3::new(0.0, 2.0, 0.0),
        );
        integrator.update(&moving, GaitPhase::Stance);
        assert!(integrator.zupt_active());
        assert_relative_eq!(integrator.velocity().norm(), 0.0);
    }

    #[test]
    fn swing_integrates_forward_displacement() {
        let mut integrator = ZuptIntegrator::new(ZuptConfig::default());
        // 2 m/s² forward for 1 s of swing at 100 Hz. Kinematics put the
        // displacement near 0.5 * a * t² = 1.0 m.
        let moving = sample(
            Vector3::new(2.0, 0.0, STANDARD_GRAVITY),
            Vector3::new(0.0, 3.0, 0.0),
        );
        for _ in 0..100 {
            integrator.update(&moving, GaitPhase::Swing);
        }
        assert!(!integrator.zupt_active());
        assert_relative_eq!(integrator.displacement().x, 1.0, epsilon = 0.05);
        assert_relative_eq!(integrator.velocity().x, 2.0, epsilon = 1e-6);

        let stride = integrator.finish_stride();
        assert_relative_eq!(stride.length_m, 1.0, epsilon = 0.05);
        assert_relative_eq!(stride.confidence, 1.0);
        // Displacement is consumed by the readout.
        assert_relative_eq!(integrator.displacement().norm(), 0.0);
    }

    #[test]
    fn stride_length_is_clamped_and_confidence_degrades() {
        let mut integrator = ZuptIntegrator::new(ZuptConfig::default());

        // Essentially no displacement: clamped up to the minimum, low trust.
        let short = integrator.finish_stride();
        assert_relative_eq!(short.length_m, 0.1);
        assert!(short.confidence <= 0.1 + 1e-9);

        // Runaway displacement: clamped down, trust degrades inversely.
        let runaway = sample(
            Vector3::new(8.0, 0.0, STANDARD_GRAVITY),
            Vector3::new(0.0, 3.0, 0.0),
        );
        for _ in 0..200 {
            integrator.update(&runaway, GaitPhase::Swing);
        }
        let long = integrator.finish_stride();
        assert_relative_eq!(long.length_m, 2.5);
        assert!(long.confidence < 1.0);
        assert!(long.confidence >= 0.1);
    }
}
