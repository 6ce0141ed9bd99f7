use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::types::Foot;

/// Default number of strides retained per foot.
pub const DEFAULT_STRIDE_CAPACITY: usize = 128;

/// One completed stride: two consecutive same-foot heel-strikes plus the
/// dead-reckoned length between them. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stride {
    pub foot: Foot,
    pub start_ms: f64,
    pub end_ms: f64,
    pub duration_ms: f64,
    pub stance_ms: f64,
    pub swing_ms: f64,
    pub length_m: f64,
    /// Trust in `length_m`; aggregates exclude strides at or below 0.5.
    pub length_confidence: f64,
}

/// Bounded, time-ordered per-foot stride history. Oldest strides are
/// discarded on overflow, matching the sliding-window contract of the rest
/// of the pipeline.
#[derive(Debug, Clone)]
pub struct StrideHistory {
    strides: VecDeque<Stride>,
    capacity: usize,
}

impl StrideHistory {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            strides: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, stride: Stride) {
        if self.strides.len() == self.capacity {
            self.strides.pop_front();
        }
        self.strides.push_back(stride);
    }

    pub fn len(&self) -> usize {
        self.strides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stride> {
        self.strides.iter()
    }

    /// The most recent `count` strides, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &Stride> {
        let skip = self.strides.len().saturating_sub(count);
        self.strides.iter().skip(skip)
    }

    pub fn durations_ms(&self) -> Vec<f64> {
        self.strides.iter().map(|s| s.duration_ms).collect()
    }

    pub fn clear(&mut self) {
        self.strides.clear();
    }
}

impl Default for StrideHistory {
    fn default() -> Self {
        Self::new(DEFAULT_STRIDE_CAPACITY)
    }
}
