//! Digital filters for sensor smoothing
//!
//! A tilt or reflectance sample taken once per tick is noisy; the stop
//! predicates and the derivative term of the heading law smooth over a
//! short history rather than trusting any single reading.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Trait for digital filters
pub trait Filter: Send + Sync {
    /// Update the filter with a new sample and return the filtered output
    fn update(&mut self, sample: f64) -> f64;

    /// Reset the filter state
    fn reset(&mut self);

    /// Get the current filtered value without updating
    fn value(&self) -> f64;
}

/// First-order low-pass filter (exponential moving average)
///
/// The first sample passes through unchanged so the filter does not have to
/// climb up from zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowPassFilter {
    /// Smoothing factor (0-1). Lower = more smoothing.
    alpha: f64,
    value: f64,
    primed: bool,
}

impl LowPassFilter {
    /// Create a new low-pass filter with the given smoothing factor
    ///
    /// # Panics
    /// Panics if alpha is not in `[0, 1]`
    pub fn new(alpha: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "Alpha must be between 0 and 1"
        );
        Self {
            alpha,
            value: 0.0,
            primed: false,
        }
    }

    /// Get the smoothing factor
    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Filter for LowPassFilter {
    fn update(&mut self, sample: f64) -> f64 {
        if self.primed {
            self.value += self.alpha * (sample - self.value);
        } else {
            self.value = sample;
            self.primed = true;
        }
        self.value
    }

    fn reset(&mut self) {
        self.value = 0.0;
        self.primed = false;
    }

    fn value(&self) -> f64 {
        self.value
    }
}

/// Sliding-window average over the last `window` samples
///
/// A fixed-capacity ring: pushing into a full window evicts the oldest
/// sample in O(1), and the mean comes from a running sum rather than a
/// rescan. [`is_full`](Self::is_full) lets callers gate a decision on having
/// seen a complete window first, which is how tilt settling avoids reacting
/// to the first bump of a ramp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovingAverageFilter {
    window: usize,
    samples: VecDeque<f64>,
    sum: f64,
}

impl MovingAverageFilter {
    /// Create a filter averaging over `window` samples
    ///
    /// # Panics
    /// Panics if `window` is 0
    pub fn new(window: usize) -> Self {
        assert!(window > 0, "Window must be > 0");
        Self {
            window,
            samples: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    /// Get the window size
    pub fn window(&self) -> usize {
        self.window
    }

    /// Whether the window has seen at least `window` samples
    pub fn is_full(&self) -> bool {
        self.samples.len() == self.window
    }

    /// Number of samples currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no samples have been pushed yet
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Filter for MovingAverageFilter {
    fn update(&mut self, sample: f64) -> f64 {
        if self.samples.len() == self.window {
            if let Some(old) = self.samples.pop_front() {
                self.sum -= old;
            }
        }
        self.samples.push_back(sample);
        self.sum += sample;
        self.sum / self.samples.len() as f64
    }

    fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }

    fn value(&self) -> f64 {
        if self.samples.is_empty() {
            0.0
        } else {
            self.sum / self.samples.len() as f64
        }
    }
}
