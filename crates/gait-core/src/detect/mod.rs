pub mod heel_strike;
pub mod toe_off;

pub use heel_strike::{
    AdaptiveThreshold, DetectionOutcome, DetectorConfig, HeelStrikeDetector, StrideTiming,
};
pub use toe_off::{GyroToeOffConfig, GyroToeOffRefiner, GyroToeOffResult};
