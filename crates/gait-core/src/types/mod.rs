use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Anatomical side a sensor is strapped to. Used as the per-foot key
/// throughout the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Foot {
    Left,
    Right,
}

impl Foot {
    /// Both feet, in a fixed iteration order.
    pub const BOTH: [Foot; 2] = [Foot::Left, Foot::Right];
}

/// Gait cycle phase for a single foot. Mutated only by the event detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaitPhase {
    /// Foot in contact with the ground.
    Stance,
    /// Foot airborne.
    Swing,
    /// No classification yet (startup, or after reset).
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GaitEventKind {
    HeelStrike,
    ToeOff,
    MidStance,
    MidSwing,
}

/// A discrete gait event. Immutable once emitted; appended to a bounded
/// per-foot history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaitEvent {
    pub kind: GaitEventKind,
    pub timestamp_ms: f64,
    pub foot: Foot,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
}

/// One IMU sample for one foot, already expressed in the upstream
/// gravity-aware segment frame: x forward, y medio-lateral, z up.
/// Acceleration in m/s², angular velocity in rad/s, timestamp in
/// milliseconds comparable across feet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub timestamp_ms: f64,
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}

impl SensorSample {
    pub fn new(timestamp_ms: f64, accel: Vector3<f64>, gyro: Vector3<f64>) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
        }
    }

    /// True when every component (timestamp included) is finite. Non-finite
    /// samples must never enter the pipeline: one NaN would poison the ZUPT
    /// integrator state for the rest of the session.
    pub fn is_finite(&self) -> bool {
        self.timestamp_ms.is_finite()
            && self.accel.iter().all(|v| v.is_finite())
            && self.gyro.iter().all(|v| v.is_finite())
    }

    pub fn accel_magnitude(&self) -> f64 {
        self.accel.norm()
    }

    pub fn gyro_magnitude(&self) -> f64 {
        self.gyro.norm()
    }

    /// Sagittal-plane angular velocity: rotation about the medio-lateral
    /// axis (y) in the segment frame.
    pub fn sagittal_angular_velocity(&self) -> f64 {
        self.gyro.y
    }
}

/// Errors raised at the ingestion boundary. Everything past the telemetry
/// buffer treats missing or implausible data as a normal condition with a
/// zero/sentinel result, never an error.
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("non-finite component in sample at t={timestamp_ms} ms")]
    NonFinite { timestamp_ms: f64 },

    #[error("timestamp regression on {foot:?}: {timestamp_ms} ms < {previous_ms} ms")]
    TimestampRegression {
        foot: Foot,
        timestamp_ms: f64,
        previous_ms: f64,
    },
}
