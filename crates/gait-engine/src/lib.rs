use std::collections::VecDeque;

use log::{debug, info};

use gait_core::analysis::{
    compute_dfa, estimate_step_width, fuse_strides, DfaResult, FusedStride, StepWidthEstimate,
};
use gait_core::buffer::TelemetryBuffer;
use gait_core::detect::{
    DetectorConfig, GyroToeOffConfig, GyroToeOffRefiner, GyroToeOffResult, HeelStrikeDetector,
};
use gait_core::metrics::{
    cadence_spm, coefficient_of_variation, confident_mean_length, mean, symmetry_index,
    GaitMetrics, GaitVariabilityMetrics, LENGTH_CONFIDENCE_FLOOR, SYMMETRY_WINDOW,
};
use gait_core::stride::{Stride, StrideHistory};
use gait_core::types::{Foot, GaitEvent, GaitEventKind, GaitPhase, SampleError, SensorSample};
use gait_core::zupt::{ZuptConfig, ZuptIntegrator};

/// Engine-wide configuration. Per-component configs nest here so one value
/// (the nominal sample rate) can size the buffers and the integration
/// period consistently.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Nominal per-foot sample rate (Hz). Fixed-period integration and the
    /// 5 s telemetry window both derive from it.
    pub sample_rate_hz: f64,
    pub detector: DetectorConfig,
    pub zupt: ZuptConfig,
    pub gyro_toe_off: GyroToeOffConfig,
    /// Bounded per-foot gait-event history depth.
    pub max_events_per_foot: usize,
    /// Bounded per-foot stride history depth.
    pub max_strides_per_foot: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 100.0,
            detector: DetectorConfig::default(),
            zupt: ZuptConfig::default(),
            gyro_toe_off: GyroToeOffConfig::default(),
            max_events_per_foot: 256,
            max_strides_per_foot: 128,
        }
    }
}

/// Everything the engine owns for one foot: buffer, detector, integrator,
/// and the bounded event/stride histories they feed.
struct FootPipeline {
    foot: Foot,
    buffer: TelemetryBuffer,
    detector: HeelStrikeDetector,
    integrator: ZuptIntegrator,
    events: VecDeque<GaitEvent>,
    strides: StrideHistory,
    max_events: usize,
    /// Samples pushed since the last `process_frame`.
    unprocessed: usize,
}

impl FootPipeline {
    fn new(foot: Foot, config: &EngineConfig) -> Self {
        let mut zupt = config.zupt.clone();
        zupt.sample_period_s = 1.0 / config.sample_rate_hz;
        Self {
            foot,
            buffer: TelemetryBuffer::with_rate(foot, config.sample_rate_hz),
            detector: HeelStrikeDetector::new(foot, config.detector.clone()),
            integrator: ZuptIntegrator::new(zupt),
            events: VecDeque::with_capacity(config.max_events_per_foot),
            strides: StrideHistory::new(config.max_strides_per_foot),
            max_events: config.max_events_per_foot,
            unprocessed: 0,
        }
    }

    fn push_sample(&mut self, sample: SensorSample) -> Result<(), SampleError> {
        self.buffer.push(sample)?;
        // A flood of pushes between frames can evict still-unprocessed
        // samples; the backlog can never exceed what the buffer holds.
        self.unprocessed = (self.unprocessed + 1).min(self.buffer.len());
        Ok(())
    }

    /// Runs detection and integration over the backlog, building strides as
    /// heel-strikes close them. Returns the events emitted.
    fn process_pending(&mut self) -> Vec<GaitEvent> {
        let pending: Vec<SensorSample> = self.buffer.recent(self.unprocessed).copied().collect();
        self.unprocessed = 0;

        let mut emitted = Vec::new();
        for sample in pending {
            let outcome = self.detector.update(&sample);
            self.integrator.update(&sample, self.detector.phase());

            if let Some(timing) = outcome.stride {
                let length = self.integrator.finish_stride();
                let stride = Stride {
                    foot: self.foot,
                    start_ms: timing.start_ms,
                    end_ms: timing.end_ms,
                    duration_ms: timing.duration_ms,
                    stance_ms: timing.stance_ms,
                    swing_ms: timing.swing_ms,
                    length_m: length.length_m,
                    length_confidence: length.confidence,
                };
                debug!(target: "gait_engine",
                    "{:?} stride closed: {:.0} ms, {:.2} m (confidence {:.2})",
                    self.foot, stride.duration_ms, stride.length_m, stride.length_confidence);
                self.strides.push(stride);
            }

            for event in outcome.events {
                if self.events.len() == self.max_events {
                    self.events.pop_front();
                }
                self.events.push_back(event);
                emitted.push(event);
            }
        }
        emitted
    }

    fn lateral_accels(&self) -> Vec<f64> {
        self.buffer.iter().map(|s| s.accel.y).collect()
    }

    fn strides_vec(&self) -> Vec<Stride> {
        self.strides.iter().copied().collect()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.detector.reset();
        self.integrator.reset();
        self.events.clear();
        self.strides.clear();
        self.unprocessed = 0;
    }
}

/// Streaming gait engine: one instance per capture session, owned and
/// mutated by a single thread. `process_frame` is a pure function of
/// (state, new samples); all query methods are read-only snapshots that are
/// plain values, safe to message across threads.
pub struct GaitEngine {
    left: FootPipeline,
    right: FootPipeline,
    refiner: GyroToeOffRefiner,
    step_count: u64,
}

impl GaitEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            left: FootPipeline::new(Foot::Left, &config),
            right: FootPipeline::new(Foot::Right, &config),
            refiner: GyroToeOffRefiner::new(config.gyro_toe_off.clone()),
            step_count: 0,
        }
    }

    fn pipeline(&self, foot: Foot) -> &FootPipeline {
        match foot {
            Foot::Left => &self.left,
            Foot::Right => &self.right,
        }
    }

    fn pipeline_mut(&mut self, foot: Foot) -> &mut FootPipeline {
        match foot {
            Foot::Left => &mut self.left,
            Foot::Right => &mut self.right,
        }
    }

    /// Ingestion entry point for the upstream collaborator. Samples must
    /// already be expressed in the gravity-aware segment frame; validation
    /// happens here so nothing non-finite reaches the integrator.
    pub fn push_sample(&mut self, foot: Foot, sample: SensorSample) -> Result<(), SampleError> {
        self.pipeline_mut(foot).push_sample(sample)
    }

    /// Processes every sample pushed since the previous call and returns
    /// the gait events emitted by this call, time-ordered. This is the
    /// pull-model observer: callers poll the return value once per tick.
    pub fn process_frame(&mut self) -> Vec<GaitEvent> {
        let mut events = Vec::new();
        for foot in Foot::BOTH {
            events.extend(self.pipeline_mut(foot).process_pending());
        }
        self.step_count += events
            .iter()
            .filter(|e| e.kind == GaitEventKind::HeelStrike)
            .count() as u64;
        events.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
        events
    }

    /// On-demand metrics snapshot; a pure function of the histories.
    pub fn get_metrics(&self) -> GaitMetrics {
        let left_strides = self.left.strides_vec();
        let right_strides = self.right.strides_vec();
        let all: Vec<&Stride> = left_strides.iter().chain(right_strides.iter()).collect();
        if all.is_empty() {
            return GaitMetrics {
                left_phase: self.left.detector.phase(),
                right_phase: self.right.detector.phase(),
                step_count: self.step_count,
                step_width_m: self.get_step_width_estimate().width_m,
                ..GaitMetrics::default()
            };
        }

        let durations: Vec<f64> = all.iter().map(|s| s.duration_ms).collect();
        let stances: Vec<f64> = all.iter().map(|s| s.stance_ms).collect();
        let swings: Vec<f64> = all.iter().map(|s| s.swing_ms).collect();
        let mean_stride_time_ms = mean(&durations);
        let mean_stride_length_m = confident_mean_length(&all);

        let walking_speed_mps = if mean_stride_time_ms > 0.0 && mean_stride_length_m > 0.0 {
            mean_stride_length_m / (mean_stride_time_ms / 1000.0)
        } else {
            0.0
        };

        let (stance_ratio, swing_ratio) = if mean_stride_time_ms > 0.0 {
            (
                mean(&stances) / mean_stride_time_ms,
                mean(&swings) / mean_stride_time_ms,
            )
        } else {
            (0.0, 0.0)
        };

        let left_recent: Vec<&Stride> = self.left.strides.recent(SYMMETRY_WINDOW).collect();
        let right_recent: Vec<&Stride> = self.right.strides.recent(SYMMETRY_WINDOW).collect();
        let left_times: Vec<f64> = left_recent.iter().map(|s| s.duration_ms).collect();
        let right_times: Vec<f64> = right_recent.iter().map(|s| s.duration_ms).collect();
        let (stride_time_symmetry, left_right_ratio) =
            symmetry_index(mean(&left_times), mean(&right_times));
        let (stride_length_symmetry, _) = symmetry_index(
            confident_mean_length(&left_recent),
            confident_mean_length(&right_recent),
        );

        let confident_lengths: Vec<f64> = all
            .iter()
            .filter(|s| s.length_confidence > LENGTH_CONFIDENCE_FLOOR)
            .map(|s| s.length_m)
            .collect();

        GaitMetrics {
            cadence_spm: cadence_spm(mean_stride_time_ms),
            mean_stride_time_ms,
            stance_ratio,
            swing_ratio,
            mean_stride_length_m,
            walking_speed_mps,
            step_width_m: self.get_step_width_estimate().width_m,
            stride_time_symmetry,
            stride_length_symmetry,
            left_right_ratio,
            stride_time_cv: coefficient_of_variation(&durations),
            stride_length_cv: coefficient_of_variation(&confident_lengths),
            dfa_alpha: self.compute_dfa(&self.chronological_stride_times()).alpha,
            left_phase: self.left.detector.phase(),
            right_phase: self.right.detector.phase(),
            step_count: self.step_count,
        }
    }

    /// Gyro-only toe-off refinement over the foot's buffered window.
    pub fn detect_gyro_toe_off(&self, foot: Foot) -> Option<GyroToeOffResult> {
        let samples: Vec<SensorSample> = self.pipeline(foot).buffer.iter().copied().collect();
        self.refiner.detect(&samples)
    }

    pub fn estimate_step_width(&self) -> f64 {
        self.get_step_width_estimate().width_m
    }

    pub fn get_step_width_estimate(&self) -> StepWidthEstimate {
        estimate_step_width(&self.left.lateral_accels(), &self.right.lateral_accels())
    }

    /// DFA over an arbitrary stride-time series; exposed for offline use on
    /// recorded sessions as well as the live histories.
    pub fn compute_dfa(&self, stride_times_ms: &[f64]) -> DfaResult {
        compute_dfa(stride_times_ms)
    }

    pub fn get_gait_variability_metrics(&self) -> GaitVariabilityMetrics {
        let left = self.left.strides_vec();
        let right = self.right.strides_vec();
        let durations: Vec<f64> = left
            .iter()
            .chain(right.iter())
            .map(|s| s.duration_ms)
            .collect();
        let confident_lengths: Vec<f64> = left
            .iter()
            .chain(right.iter())
            .filter(|s| s.length_confidence > LENGTH_CONFIDENCE_FLOOR)
            .map(|s| s.length_m)
            .collect();
        GaitVariabilityMetrics {
            stride_time_cv: coefficient_of_variation(&durations),
            stride_length_cv: coefficient_of_variation(&confident_lengths),
            dfa: compute_dfa(&self.chronological_stride_times()),
        }
    }

    pub fn fuse_multi_imu_strides(&self) -> FusedStride {
        fuse_strides(&self.left.strides_vec(), &self.right.strides_vec())
    }

    /// The most recent `count` events across both feet, newest first.
    pub fn get_recent_events(&self, count: usize) -> Vec<GaitEvent> {
        let mut events = Vec::new();
        for foot in Foot::BOTH {
            events.extend(self.pipeline(foot).events.iter().copied());
        }
        events.sort_by(|a, b| b.timestamp_ms.total_cmp(&a.timestamp_ms));
        events.truncate(count);
        events
    }

    pub fn phase(&self, foot: Foot) -> GaitPhase {
        self.pipeline(foot).detector.phase()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Current stride history for one foot, oldest first. Part of the
    /// inspection seam for test harnesses.
    pub fn strides(&self, foot: Foot) -> Vec<Stride> {
        self.pipeline(foot).strides_vec()
    }

    /// State-injection seam: appends pre-built strides to a foot's history
    /// so aggregate metrics can be tested without synthesizing raw signals.
    /// Strides are subject to the same bounded-history eviction as live
    /// ones; the cumulative step count is not touched.
    pub fn inject_strides(&mut self, foot: Foot, strides: impl IntoIterator<Item = Stride>) {
        let pipeline = self.pipeline_mut(foot);
        for stride in strides {
            pipeline.strides.push(stride);
        }
    }

    /// Clears every buffer, history, and detector/integrator state,
    /// abandoning any half-built stride. Idempotent and safe mid-stride.
    pub fn reset(&mut self) {
        for foot in Foot::BOTH {
            self.pipeline_mut(foot).reset();
        }
        self.step_count = 0;
        info!(target: "gait_engine", "Engine reset");
    }

    /// Both feet's stride durations, ordered by stride completion time, for
    /// the session-wide DFA series.
    fn chronological_stride_times(&self) -> Vec<f64> {
        let mut strides: Vec<(f64, f64)> = self
            .left
            .strides
            .iter()
            .chain(self.right.strides.iter())
            .map(|s| (s.end_ms, s.duration_ms))
            .collect();
        strides.sort_by(|a, b| a.0.total_cmp(&b.0));
        strides.into_iter().map(|(_, duration)| duration).collect()
    }
}

impl Default for GaitEngine {
    fn default() -> Self {
        Self::new()
    }
}
