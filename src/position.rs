//! # Position Accumulator
//!
//! Running sum of raw pointer displacement since startup, shared between the
//! pointer producer (the only writer) and the ranging producer (a reader).
//!
//! Each axis lives in its own [`AtomicI64`], so a reader never observes a torn
//! value for either axis. The pair is not snapshotted together: a read racing
//! with [`PositionAccumulator::add`] may see the new `x` with the old `y`. Both
//! axes are reported at a coarse rate, so that skew is tolerated.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::calibration::CalibrationProfile;

/// Cumulative raw displacement on two axes.
#[derive(Debug, Default)]
pub struct PositionAccumulator {
    x: AtomicI64,
    y: AtomicI64,
}

impl PositionAccumulator {
    /// Creates an accumulator at the origin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one displacement sample.
    pub fn add(&self, dx: i64, dy: i64) {
        self.x.fetch_add(dx, Ordering::Relaxed);
        self.y.fetch_add(dy, Ordering::Relaxed);
    }

    /// Returns the raw `(x, y)` totals.
    #[must_use]
    pub fn read(&self) -> (i64, i64) {
        (self.x.load(Ordering::Relaxed), self.y.load(Ordering::Relaxed))
    }

    /// Returns the current position in centimeters.
    #[must_use]
    pub fn read_centimeters(&self, profile: &CalibrationProfile) -> (f64, f64) {
        let (x, y) = self.read();
        (profile.to_centimeters(x), profile.to_centimeters(y))
    }
}
