use log::debug;
use std::collections::VecDeque;

use crate::types::{Foot, GaitEvent, GaitEventKind, GaitPhase, SensorSample};

/// Physiological clamp for the heel-strike threshold (m/s²).
const HEEL_STRIKE_THRESHOLD_MIN: f64 = 10.0;
const HEEL_STRIKE_THRESHOLD_MAX: f64 = 25.0;

/// Toe-off threshold never drops below this (m/s²).
const TOE_OFF_THRESHOLD_MIN: f64 = 5.0;

/// Fraction of the heel-strike threshold the previous magnitude must sit
/// below for a rising crossing to count.
const CROSSING_LOW_FRACTION: f64 = 0.7;

/// Configuration for the per-foot adaptive-threshold detector. Field units
/// are physical; defaults are tuned for foot-mounted IMUs during walking.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Starting heel-strike threshold before any adaptation (m/s²).
    pub initial_heel_strike_threshold: f64,
    /// Shortest plausible stride (ms). Heel-strike intervals below this
    /// never produce a stride; half of it is the heel-strike debounce.
    pub min_stride_ms: f64,
    /// Longest plausible stride (ms).
    pub max_stride_ms: f64,
    /// Stance fraction assumed when no toe-off was seen inside the stride.
    pub min_stance_ratio: f64,
    /// Minimum dwell in stance before a toe-off may fire (ms).
    pub toe_off_dwell_ms: f64,
    /// Debounce between successive toe-offs (ms).
    pub toe_off_debounce_ms: f64,
    /// Forward (x) acceleration a candidate toe-off must exceed (m/s²).
    /// Heuristic gate; only meaningful if the upstream orientation pipeline
    /// really maps x to the direction of progression.
    pub min_forward_accel: f64,
    /// Peak-history depth driving threshold adaptation.
    pub peak_history: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            initial_heel_strike_threshold: 15.0,
            min_stride_ms: 600.0,
            max_stride_ms: 2000.0,
            min_stance_ratio: 0.6,
            toe_off_dwell_ms: 100.0,
            toe_off_debounce_ms: 200.0,
            min_forward_accel: 3.0,
            peak_history: 20,
        }
    }
}

/// Self-tuning detection thresholds. Magnitudes above half the current
/// heel-strike threshold feed a bounded peak history; the heel-strike
/// threshold tracks 70% of that history's mean, clamped to a
/// physiologically plausible band, and the toe-off threshold follows at
/// half of it.
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    heel_strike: f64,
    toe_off: f64,
    recent_peaks: VecDeque<f64>,
    capacity: usize,
}

impl AdaptiveThreshold {
    pub fn new(initial_heel_strike: f64, capacity: usize) -> Self {
        assert!(capacity > 0);
        let heel_strike =
            initial_heel_strike.clamp(HEEL_STRIKE_THRESHOLD_MIN, HEEL_STRIKE_THRESHOLD_MAX);
        Self {
            heel_strike,
            toe_off: (heel_strike * 0.5).max(TOE_OFF_THRESHOLD_MIN),
            recent_peaks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn heel_strike(&self) -> f64 {
        self.heel_strike
    }

    pub fn toe_off(&self) -> f64 {
        self.toe_off
    }

    /// Feeds one acceleration magnitude into the adaptation history.
    pub fn observe(&mut self, magnitude: f64) {
        if magnitude <= self.heel_strike * 0.5 {
            return;
        }
        if self.recent_peaks.len() == self.capacity {
            self.recent_peaks.pop_front();
        }
        self.recent_peaks.push_back(magnitude);

        let mean = self.recent_peaks.iter().sum::<f64>() / self.recent_peaks.len() as f64;
        self.heel_strike =
            (mean * 0.7).clamp(HEEL_STRIKE_THRESHOLD_MIN, HEEL_STRIKE_THRESHOLD_MAX);
        self.toe_off = (self.heel_strike * 0.5).max(TOE_OFF_THRESHOLD_MIN);
    }
}

/// Timing of a completed stride, reported when a new same-foot heel-strike
/// lands a plausible interval after the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrideTiming {
    pub start_ms: f64,
    pub end_ms: f64,
    pub duration_ms: f64,
    pub stance_ms: f64,
    pub swing_ms: f64,
}

/// What one detector tick produced.
#[derive(Debug, Clone, Default)]
pub struct DetectionOutcome {
    pub events: Vec<GaitEvent>,
    /// Present only when this tick's heel-strike closed a valid stride.
    pub stride: Option<StrideTiming>,
}

/// Per-foot heel-strike / toe-off state machine over consecutive
/// acceleration magnitudes.
#[derive(Debug, Clone)]
pub struct HeelStrikeDetector {
    config: DetectorConfig,
    foot: Foot,
    threshold: AdaptiveThreshold,
    phase: GaitPhase,
    prev_magnitude: Option<f64>,
    last_heel_strike_ms: Option<f64>,
    last_toe_off_ms: Option<f64>,
}

impl HeelStrikeDetector {
    pub fn new(foot: Foot, config: DetectorConfig) -> Self {
        let threshold =
            AdaptiveThreshold::new(config.initial_heel_strike_threshold, config.peak_history);
        Self {
            config,
            foot,
            threshold,
            phase: GaitPhase::Unknown,
            prev_magnitude: None,
            last_heel_strike_ms: None,
            last_toe_off_ms: None,
        }
    }

    pub fn phase(&self) -> GaitPhase {
        self.phase
    }

    pub fn thresholds(&self) -> &AdaptiveThreshold {
        &self.threshold
    }

    pub fn last_heel_strike_ms(&self) -> Option<f64> {
        self.last_heel_strike_ms
    }

    /// Processes one sample. At most one heel-strike and one toe-off can be
    /// emitted per tick; a heel-strike may additionally close a stride.
    pub fn update(&mut self, sample: &SensorSample) -> DetectionOutcome {
        let magnitude = sample.accel_magnitude();
        let t = sample.timestamp_ms;
        let mut outcome = DetectionOutcome::default();

        if self.is_heel_strike(magnitude, t) {
            let confidence = (magnitude / (self.threshold.heel_strike() * 2.0)).min(1.0);
            outcome.events.push(GaitEvent {
                kind: GaitEventKind::HeelStrike,
                timestamp_ms: t,
                foot: self.foot,
                confidence,
            });
            outcome.stride = self.close_stride(t);
            debug!(target: "gait_core::detect",
                "{:?} heel-strike at t={:.0} ms (mag={:.2}, threshold={:.2})",
                self.foot, t, magnitude, self.threshold.heel_strike());

            self.phase = GaitPhase::Stance;
            self.last_heel_strike_ms = Some(t);
        } else if self.is_toe_off(sample, magnitude, t) {
            let confidence = (sample.accel.x / (self.config.min_forward_accel * 2.0)).min(1.0);
            outcome.events.push(GaitEvent {
                kind: GaitEventKind::ToeOff,
                timestamp_ms: t,
                foot: self.foot,
                confidence,
            });
            debug!(target: "gait_core::detect",
                "{:?} toe-off at t={:.0} ms (forward={:.2})", self.foot, t, sample.accel.x);

            self.phase = GaitPhase::Swing;
            self.last_toe_off_ms = Some(t);
        }

        self.threshold.observe(magnitude);
        self.prev_magnitude = Some(magnitude);
        outcome
    }

    /// Rising crossing of the adaptive threshold from well below it,
    /// debounced to half a minimum stride.
    fn is_heel_strike(&self, magnitude: f64, t: f64) -> bool {
        let threshold = self.threshold.heel_strike();
        let Some(prev) = self.prev_magnitude else {
            return false;
        };
        if prev >= threshold * CROSSING_LOW_FRACTION || magnitude <= threshold {
            return false;
        }
        match self.last_heel_strike_ms {
            Some(last) => t - last >= self.config.min_stride_ms / 2.0,
            None => true,
        }
    }

    fn is_toe_off(&self, sample: &SensorSample, magnitude: f64, t: f64) -> bool {
        if self.phase != GaitPhase::Stance {
            return false;
        }
        let Some(heel_strike) = self.last_heel_strike_ms else {
            return false;
        };
        if t - heel_strike < self.config.toe_off_dwell_ms {
            return false;
        }
        if let Some(last) = self.last_toe_off_ms {
            if t - last < self.config.toe_off_debounce_ms {
                return false;
            }
        }
        magnitude > self.threshold.toe_off() && sample.accel.x > self.config.min_forward_accel
    }

    /// Builds stride timing when the interval back to the previous
    /// heel-strike is plausible. Stance comes from the observed toe-off when
    /// one occurred inside the stride; otherwise the configured minimum
    /// stance fraction stands in. Swing is the residual.
    fn close_stride(&self, t: f64) -> Option<StrideTiming> {
        let start_ms = self.last_heel_strike_ms?;
        let duration_ms = t - start_ms;
        if duration_ms < self.config.min_stride_ms || duration_ms > self.config.max_stride_ms {
            return None;
        }
        let stance_ms = match self.last_toe_off_ms {
            Some(toe_off) if toe_off > start_ms && toe_off <= t => toe_off - start_ms,
            _ => duration_ms * self.config.min_stance_ratio,
        };
        Some(StrideTiming {
            start_ms,
            end_ms: t,
            duration_ms,
            stance_ms,
            swing_ms: (duration_ms - stance_ms).max(0.0),
        })
    }

    pub fn reset(&mut self) {
        self.threshold = AdaptiveThreshold::new(
            self.config.initial_heel_strike_threshold,
            self.config.peak_history,
        );
        self.phase = GaitPhase::Unknown;
        self.prev_magnitude = None;
        self.last_heel_strike_ms = None;
        self.last_toe_off_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn sample(t: f64, accel: Vector3<f64>) -> SensorSample {
        SensorSample::new(t, accel, Vector3::zeros())
    }

    fn quiet(t: f64) -> SensorSample {
        sample(t, Vector3::new(0.0, 0.0, 9.8))
    }

    /// Low-magnitude sample followed by a spike: the crossing shape the
    /// detector looks for.
    fn strike_pair(detector: &mut HeelStrikeDetector, t: f64) -> DetectionOutcome {
        detector.update(&sample(t - 10.0, Vector3::new(0.0, 0.0, 4.0)));
        detector.update(&sample(t, Vector3::new(0.0, 0.0, 18.0)))
    }

    #[test]
    fn detects_heel_strike_on_rising_crossing() {
        let mut detector = HeelStrikeDetector::new(Foot::Left, DetectorConfig::default());
        detector.update(&quiet(0.0));
        let outcome = strike_pair(&mut detector, 100.0);
        assert_eq!(outcome.events.len(), 1);
        let event = outcome.events[0];
        assert_eq!(event.kind, GaitEventKind::HeelStrike);
        assert_eq!(event.foot, Foot::Left);
        assert!(event.confidence > 0.0 && event.confidence <= 1.0);
        assert_eq!(detector.phase(), GaitPhase::Stance);
    }

    #[test]
    fn heel_strike_is_debounced() {
        let mut detector = HeelStrikeDetector::new(Foot::Left, DetectorConfig::default());
        detector.update(&quiet(0.0));
        let first = strike_pair(&mut detector, 100.0);
        assert_eq!(first.events.len(), 1);
        // 100 ms later: well inside the 300 ms debounce.
        let second = strike_pair(&mut detector, 200.0);
        assert!(second.events.is_empty());
    }

    #[test]
    fn consecutive_strikes_at_valid_interval_close_a_stride() {
        let mut detector = HeelStrikeDetector::new(Foot::Right, DetectorConfig::default());
        detector.update(&quiet(0.0));
        let first = strike_pair(&mut detector, 1000.0);
        assert!(first.stride.is_none());

        let second = strike_pair(&mut detector, 2000.0);
        let stride = second.stride.expect("1000 ms interval should close a stride");
        assert_relative_eq!(stride.duration_ms, 1000.0);
        assert_relative_eq!(stride.start_ms, 1000.0);
        // No toe-off seen: stance falls back to the minimum stance fraction.
        assert_relative_eq!(stride.stance_ms, 600.0);
        assert_relative_eq!(stride.swing_ms, 400.0);
    }

    #[test]
    fn out_of_range_interval_yields_event_but_no_stride() {
        let mut detector = HeelStrikeDetector::new(Foot::Left, DetectorConfig::default());
        detector.update(&quiet(0.0));
        strike_pair(&mut detector, 1000.0);
        // 2500 ms later: above MAX_STRIDE_MS.
        let outcome = strike_pair(&mut detector, 3500.0);
        assert_eq!(outcome.events.len(), 1);
        assert!(outcome.stride.is_none());
    }

    #[test]
    fn toe_off_requires_stance_dwell_and_forward_push() {
        let mut detector = HeelStrikeDetector::new(Foot::Left, DetectorConfig::default());
        detector.update(&quiet(0.0));
        strike_pair(&mut detector, 1000.0);

        // Inside the 100 ms dwell: gated.
        let early = detector.update(&sample(1050.0, Vector3::new(6.0, 0.0, 5.0)));
        assert!(early.events.is_empty());

        // Past the dwell but without forward acceleration: gated.
        let flat = detector.update(&sample(1300.0, Vector3::new(0.0, 0.0, 9.8)));
        assert!(flat.events.is_empty());

        // Forward push above the gate with magnitude above the toe-off
        // threshold: fires and flips to swing.
        let outcome = detector.update(&sample(1600.0, Vector3::new(6.0, 0.0, 5.0)));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].kind, GaitEventKind::ToeOff);
        assert_eq!(detector.phase(), GaitPhase::Swing);

        // Already in swing: no second toe-off.
        let repeat = detector.update(&sample(1900.0, Vector3::new(6.0, 0.0, 5.0)));
        assert!(repeat.events.is_empty());
    }

    #[test]
    fn observed_toe_off_defines_stance_time() {
        let mut detector = HeelStrikeDetector::new(Foot::Left, DetectorConfig::default());
        detector.update(&quiet(0.0));
        strike_pair(&mut detector, 1000.0);
        detector.update(&sample(1600.0, Vector3::new(6.0, 0.0, 5.0)));

        let outcome = strike_pair(&mut detector, 2000.0);
        let stride = outcome.stride.expect("stride");
        assert_relative_eq!(stride.stance_ms, 600.0);
        assert_relative_eq!(stride.swing_ms, 400.0);
    }

    #[test]
    fn thresholds_stay_inside_physiological_bounds() {
        let mut threshold = AdaptiveThreshold::new(15.0, 20);
        // Pathologically large peaks cannot push the threshold past the cap.
        for _ in 0..40 {
            threshold.observe(120.0);
        }
        assert_relative_eq!(threshold.heel_strike(), HEEL_STRIKE_THRESHOLD_MAX);
        assert_relative_eq!(threshold.toe_off(), HEEL_STRIKE_THRESHOLD_MAX * 0.5);

        // Small peaks cannot drag it below the floor, and the toe-off
        // threshold keeps its own minimum.
        let mut threshold = AdaptiveThreshold::new(15.0, 20);
        for _ in 0..40 {
            threshold.observe(8.0);
        }
        assert_relative_eq!(threshold.heel_strike(), HEEL_STRIKE_THRESHOLD_MIN);
        assert_relative_eq!(threshold.toe_off(), TOE_OFF_THRESHOLD_MIN);
    }

    #[test]
    fn sub_threshold_magnitudes_do_not_adapt() {
        let mut threshold = AdaptiveThreshold::new(15.0, 20);
        let before = threshold.heel_strike();
        for _ in 0..50 {
            threshold.observe(2.0);
        }
        assert_relative_eq!(threshold.heel_strike(), before);
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut detector = HeelStrikeDetector::new(Foot::Left, DetectorConfig::default());
        detector.update(&quiet(0.0));
        strike_pair(&mut detector, 1000.0);
        assert_eq!(detector.phase(), GaitPhase::Stance);

        detector.reset();
        assert_eq!(detector.phase(), GaitPhase::Unknown);
        assert!(detector.last_heel_strike_ms().is_none());
    }
}
