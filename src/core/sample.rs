//! Sample selection.
//!
//! A selector picks one sample of an animated property, either by
//! explicit index or by archive time.

use crate::util::Chrono;

/// Sample selector for reading property samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSelector {
    /// Select by exact index.
    Index(usize),
    /// Select by time - floor (largest index <= time).
    TimeFloor(Chrono),
    /// Select by time - ceil (smallest index >= time).
    TimeCeil(Chrono),
    /// Select by time - nearest.
    TimeNear(Chrono),
}

impl SampleSelector {
    /// Create a selector for a specific index.
    pub const fn index(i: usize) -> Self {
        Self::Index(i)
    }

    /// Create a selector for floor time.
    pub const fn time_floor(t: Chrono) -> Self {
        Self::TimeFloor(t)
    }

    /// Create a selector for ceil time.
    pub const fn time_ceil(t: Chrono) -> Self {
        Self::TimeCeil(t)
    }

    /// Create a selector for nearest time.
    pub const fn time_near(t: Chrono) -> Self {
        Self::TimeNear(t)
    }

    /// Resolve to a sample index against a time sampling.
    pub fn resolve(&self, ts: &crate::core::TimeSampling, num_samples: usize) -> usize {
        match *self {
            Self::Index(i) => i.min(num_samples.saturating_sub(1)),
            Self::TimeFloor(t) => ts.floor_index(t, num_samples).0,
            Self::TimeCeil(t) => ts.ceil_index(t, num_samples).0,
            Self::TimeNear(t) => ts.near_index(t, num_samples).0,
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TimeSampling;

    #[test]
    fn test_sample_selector() {
        let sel = SampleSelector::index(5);
        assert!(matches!(sel, SampleSelector::Index(5)));

        let sel = SampleSelector::time_near(1.5);
        assert!(matches!(sel, SampleSelector::TimeNear(t) if (t - 1.5).abs() < 1e-10));
    }

    #[test]
    fn test_resolve_against_uniform() {
        let ts = TimeSampling::uniform(1.0, 0.0);
        assert_eq!(SampleSelector::time_floor(2.5).resolve(&ts, 10), 2);
        assert_eq!(SampleSelector::time_ceil(2.5).resolve(&ts, 10), 3);
        assert_eq!(SampleSelector::time_near(2.4).resolve(&ts, 10), 2);
        assert_eq!(SampleSelector::index(99).resolve(&ts, 10), 9);
    }
}
