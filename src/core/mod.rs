//! Core layer - time sampling and sample selection.
//!
//! - [`TimeSampling`] / [`TimeSamplingType`] - When samples were recorded
//! - [`TimeSamplingInfo`] - Archive-reported sampling descriptor
//! - [`SampleSelector`] - Sample selection by index or time

mod sample;
mod time_sampling;

pub use sample::SampleSelector;
pub use time_sampling::{TimeSampling, TimeSamplingInfo, TimeSamplingType};
