pub mod dfa;
pub mod fusion;
pub mod step_width;

pub use dfa::{compute_dfa, DfaResult, MIN_DFA_SAMPLES};
pub use fusion::{fuse_strides, FusedStride, FUSION_RECENT_STRIDES, MIN_FUSION_CONFIDENCE};
pub use step_width::{
    estimate_step_width, StepWidthEstimate, StepWidthMethod, STEP_WIDTH_WINDOW,
};
