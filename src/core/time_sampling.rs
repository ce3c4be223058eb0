//! Time sampling types.
//!
//! Archive properties are sampled over time. The TimeSampling struct
//! describes when each sample was recorded; TimeSamplingInfo pairs it
//! with the archive-reported maximum sample count so the covered time
//! range can be queried.

use crate::util::Chrono;

/// Type of time sampling.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSamplingType {
    /// Single static sample at time 0 (identity sampling).
    Identity,

    /// Uniform sampling: samples at regular intervals.
    /// start_time + index * time_per_cycle
    Uniform {
        time_per_cycle: Chrono,
        start_time: Chrono,
    },

    /// Cyclic sampling: repeating pattern of sample times.
    Cyclic {
        time_per_cycle: Chrono,
        times: Vec<Chrono>,
    },

    /// Acyclic sampling: explicit time for each sample.
    Acyclic { times: Vec<Chrono> },
}

impl Default for TimeSamplingType {
    fn default() -> Self {
        Self::Identity
    }
}

/// Time sampling information for a property.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSampling {
    /// The type of sampling.
    pub sampling_type: TimeSamplingType,
}

impl TimeSampling {
    /// Identity time sampling (single sample at time 0).
    pub const IDENTITY: Self = Self {
        sampling_type: TimeSamplingType::Identity,
    };

    /// Create uniform time sampling.
    pub fn uniform(time_per_cycle: Chrono, start_time: Chrono) -> Self {
        Self {
            sampling_type: TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            },
        }
    }

    /// Create cyclic time sampling.
    pub fn cyclic(time_per_cycle: Chrono, times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            },
        }
    }

    /// Create acyclic time sampling from explicit times.
    pub fn acyclic(times: Vec<Chrono>) -> Self {
        Self {
            sampling_type: TimeSamplingType::Acyclic { times },
        }
    }

    /// Get the time for a specific sample index.
    pub fn sample_time(&self, index: usize) -> Chrono {
        match &self.sampling_type {
            TimeSamplingType::Identity => 0.0,
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => *start_time + (index as Chrono) * *time_per_cycle,
            TimeSamplingType::Cyclic {
                time_per_cycle,
                times,
            } => {
                if times.is_empty() {
                    return 0.0;
                }
                let cycle = index / times.len();
                let local_idx = index % times.len();
                times[local_idx] + (cycle as Chrono) * *time_per_cycle
            }
            TimeSamplingType::Acyclic { times } => times.get(index).copied().unwrap_or(0.0),
        }
    }

    /// Find the floor index (largest index with time <= given time).
    pub fn floor_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        match &self.sampling_type {
            TimeSamplingType::Identity => (0, 0.0),
            TimeSamplingType::Uniform {
                time_per_cycle,
                start_time,
            } => {
                if time <= *start_time {
                    return (0, *start_time);
                }
                let idx = ((time - start_time) / time_per_cycle).floor() as usize;
                let idx = idx.min(num_samples - 1);
                (idx, self.sample_time(idx))
            }
            TimeSamplingType::Cyclic { .. } | TimeSamplingType::Acyclic { .. } => {
                // Binary search for floor
                let mut lo = 0;
                let mut hi = num_samples;
                while lo < hi {
                    let mid = lo + (hi - lo) / 2;
                    if self.sample_time(mid) <= time {
                        lo = mid + 1;
                    } else {
                        hi = mid;
                    }
                }
                let idx = if lo > 0 { lo - 1 } else { 0 };
                (idx, self.sample_time(idx))
            }
        }
    }

    /// Find the ceiling index (smallest index with time >= given time).
    pub fn ceil_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_time >= time {
            return (floor_idx, floor_time);
        }

        let ceil_idx = (floor_idx + 1).min(num_samples - 1);
        (ceil_idx, self.sample_time(ceil_idx))
    }

    /// Find the nearest index to the given time.
    pub fn near_index(&self, time: Chrono, num_samples: usize) -> (usize, Chrono) {
        if num_samples == 0 {
            return (0, 0.0);
        }

        let (floor_idx, floor_time) = self.floor_index(time, num_samples);
        if floor_idx >= num_samples - 1 {
            return (floor_idx, floor_time);
        }

        let ceil_idx = floor_idx + 1;
        let ceil_time = self.sample_time(ceil_idx);

        if (time - floor_time).abs() <= (ceil_time - time).abs() {
            (floor_idx, floor_time)
        } else {
            (ceil_idx, ceil_time)
        }
    }

    /// Time covered by the first `num_samples` samples.
    /// Returns (0, 0) when there are no samples.
    pub fn time_range(&self, num_samples: usize) -> (Chrono, Chrono) {
        if num_samples == 0 {
            return (0.0, 0.0);
        }
        (self.sample_time(0), self.sample_time(num_samples - 1))
    }
}

impl Default for TimeSampling {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// An archive-reported time sampling descriptor: the sampling itself
/// plus the maximum number of samples any property takes against it.
///
/// Sessions hold these behind `Arc` so a descriptor can be matched
/// back to its archive index by pointer identity.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeSamplingInfo {
    pub sampling: TimeSampling,
    pub max_num_samples: usize,
}

impl TimeSamplingInfo {
    pub fn new(sampling: TimeSampling, max_num_samples: usize) -> Self {
        Self {
            sampling,
            max_num_samples,
        }
    }

    /// Time covered by this descriptor's samples.
    pub fn time_range(&self) -> (Chrono, Chrono) {
        self.sampling.time_range(self.max_num_samples)
    }
}
