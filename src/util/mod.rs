//! Utility types shared across the crate.
//!
//! - [`Chrono`] - Time value type
//! - [`Error`] / [`Result`] - Error handling

mod error;

pub use error::*;

/// Chrono type - time value (seconds).
pub type Chrono = f64;
