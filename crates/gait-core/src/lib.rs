pub mod analysis;
pub mod buffer;
pub mod detect;
pub mod metrics;
pub mod stride;
pub mod types;
pub mod zupt;
