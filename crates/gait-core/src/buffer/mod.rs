use log::warn;
use std::collections::VecDeque;

use crate::types::{Foot, SampleError, SensorSample};

/// Streaming window retained per foot, in seconds.
pub const DEFAULT_WINDOW_SECS: f64 = 5.0;

/// Bounded per-foot FIFO of validated IMU samples. Oldest samples are
/// dropped when the window overflows; nothing downstream ever sees an
/// unbounded history or a non-finite vector.
#[derive(Debug, Clone)]
pub struct TelemetryBuffer {
    foot: Foot,
    samples: VecDeque<SensorSample>,
    capacity: usize,
    last_timestamp_ms: Option<f64>,
}

impl TelemetryBuffer {
    /// Creates a buffer holding `capacity` samples.
    pub fn new(foot: Foot, capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            foot,
            samples: VecDeque::with_capacity(capacity),
            capacity,
            last_timestamp_ms: None,
        }
    }

    /// Creates a buffer sized for `DEFAULT_WINDOW_SECS` at the given rate.
    pub fn with_rate(foot: Foot, sample_rate_hz: f64) -> Self {
        assert!(sample_rate_hz.is_finite() && sample_rate_hz > 0.0);
        let capacity = (sample_rate_hz * DEFAULT_WINDOW_SECS).ceil() as usize;
        Self::new(foot, capacity.max(1))
    }

    /// Validates and appends a sample. Non-finite vectors and timestamp
    /// regressions are rejected here, at the boundary; equal timestamps are
    /// tolerated (the per-foot stream is non-decreasing, not strictly
    /// increasing).
    pub fn push(&mut self, sample: SensorSample) -> Result<(), SampleError> {
        if !sample.is_finite() {
            warn!(target: "gait_core::buffer",
                "Rejected non-finite sample on {:?} at t={}", self.foot, sample.timestamp_ms);
            return Err(SampleError::NonFinite {
                timestamp_ms: sample.timestamp_ms,
            });
        }
        if let Some(previous_ms) = self.last_timestamp_ms {
            if sample.timestamp_ms < previous_ms {
                warn!(target: "gait_core::buffer",
                    "Rejected timestamp regression on {:?}: {} < {}",
                    self.foot, sample.timestamp_ms, previous_ms);
                return Err(SampleError::TimestampRegression {
                    foot: self.foot,
                    timestamp_ms: sample.timestamp_ms,
                    previous_ms,
                });
            }
        }

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.last_timestamp_ms = Some(sample.timestamp_ms);
        Ok(())
    }

    pub fn foot(&self) -> Foot {
        self.foot
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.back()
    }

    /// Iterates over the most recent `count` samples, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &SensorSample> {
        let skip = self.samples.len().saturating_sub(count);
        self.samples.iter().skip(skip)
    }

    /// All buffered samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.last_timestamp_ms = None;
    }
}
